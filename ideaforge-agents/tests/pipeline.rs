//! End-to-end factory runs against a scripted model and a fake chain.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ideaforge_agents::factory::{Factory, FactoryConfig, RepoRequest};
use ideaforge_agents::llm::{CompletionFailure, CompletionRequest, JsonCompletion};
use ideaforge_agents::{FactoryError, IdeaRequest, PipelineError, Stage};
use ideaforge_chain::{ChainConfig, ContractDeployer, DeployError, Deployer, DeploymentDetails, SolcManager};
use serde_json::{Map, Value, json};
use tokio::time::Instant;

/// Replies keyed by the agent persona named in the system prompt.
struct ScriptedModel {
    replies: HashMap<&'static str, Value>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn ticket_marketplace() -> Self {
        let mut replies = HashMap::new();
        replies.insert(
            "Product Planner",
            json!({
                "summary": "A marketplace where fans resell event tickets at fair prices.",
                "user_segments": ["Concert-goers", "Event organizers"],
                "value_proposition": ["Fraud-proof tickets", "Capped resale prices"],
                "problems": ["Scalping"],
                "success_metrics": ["Resales per event"]
            }),
        );
        replies.insert(
            "Blockchain Architect",
            json!({
                "recommended_chain": "Polygon",
                "web3_library": "ethers.js",
                "rationale": "Cheap NFT transfers.",
                "web3_integration": ["MetaMask wallet connection", "Gasless listing via relayer"],
                "token_and_governance": {"need_token": false}
            }),
        );
        replies.insert(
            "Full-Stack Architect",
            json!({
                "frontend_components": ["Event listing page", "Resale checkout"],
                "backend_services": ["Event metadata indexer"],
                "api_endpoints": [{"method": "GET", "path": "/api/events", "description": "list events"}],
                "next_steps": ["Pilot with one venue"]
            }),
        );
        replies.insert(
            "Smart Contract Engineer",
            json!({"contracts": [
                {"name": "TicketNFT", "description": "ERC-721 tickets"},
                {"name": "TicketMarketplace", "description": "Capped resale"}
            ]}),
        );
        replies.insert("Tokenomics Designer", json!({"hasToken": false}));
        replies.insert(
            "Code Generator",
            json!({
                "contracts": [
                    {"path": "contracts/TicketNFT.sol", "content": "pragma solidity ^0.8.19;\n\ncontract TicketNFT {\n    uint256 public supply;\n}\n"},
                    {"path": "contracts/TicketMarketplace.sol", "content": "pragma solidity ^0.8.19;\ncontract TicketMarketplace {}\n"}
                ],
                "backend": [
                    {"path": "backend/main.py", "content": "from fastapi import FastAPI\napp = FastAPI()\n"},
                    {"path": "web3/connection.js", "content": "export const CONTRACT = \"<DEPLOYED_CONTRACT_ADDRESS>\";\n"}
                ],
                "frontend": [
                    {"path": "frontend/src/App.tsx", "content": "export default function App() { return null; }\n"}
                ]
            }),
        );
        replies.insert(
            "Security Auditor",
            json!({
                "risk_level": "medium",
                "critical_issues": [],
                "warnings": ["Resale cap can be bypassed off-platform"],
                "recommendations": ["Add transfer hooks"]
            }),
        );
        Self {
            replies,
            calls: Mutex::default(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonCompletion for ScriptedModel {
    async fn complete_json(&self, request: CompletionRequest) -> Result<Map<String, Value>, CompletionFailure> {
        let system = &request.messages[0].content;
        let (name, reply) = self
            .replies
            .iter()
            .find(|(name, _)| system.contains(&format!("'{name}'")))
            .unwrap_or_else(|| panic!("no scripted reply for prompt: {system}"));
        self.calls.lock().unwrap().push(name.to_string());
        Ok(reply.as_object().cloned().unwrap())
    }
}

/// Pretends to deploy and records what it was asked to deploy.
#[derive(Default)]
struct FakeChain {
    deployed: Mutex<Vec<(String, String)>>,
    fail_with: Option<String>,
}

#[async_trait]
impl ContractDeployer for FakeChain {
    async fn deploy_contract(
        &self,
        source: &str,
        contract_name: &str,
        _deadline: Instant,
    ) -> Result<DeploymentDetails, DeployError> {
        self.deployed
            .lock()
            .unwrap()
            .push((contract_name.to_string(), source.to_string()));
        if let Some(reason) = &self.fail_with {
            return Err(DeployError::Compilation(reason.clone()));
        }
        Ok(DeploymentDetails {
            address: "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".into(),
            network: "Polygon Amoy".into(),
            explorer_url: "https://amoy.polygonscan.com/address/0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".into(),
            tx_hash: format!("0x{}", "ab".repeat(32)),
            compiler_version: "0.8.19".into(),
            requested_compiler_version: "0.8.19".into(),
        })
    }
}

fn idea() -> IdeaRequest {
    IdeaRequest {
        idea: "ticket resale marketplace".into(),
        stage: Stage::New,
        industry: Some("events".into()),
    }
}

fn read_entry(zip: &[u8], name: &str) -> Option<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip)).unwrap();
    let mut file = archive.by_name(name).ok()?;
    let mut out = String::new();
    file.read_to_string(&mut out).unwrap();
    Some(out)
}

fn is_checksummed_address(s: &str) -> bool {
    s.len() == 42 && s.starts_with("0x") && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[tokio::test]
async fn ticket_marketplace_framework() {
    let model = Arc::new(ScriptedModel::ticket_marketplace());
    let factory = Factory::new(model.clone(), Arc::new(FakeChain::default()), FactoryConfig::default());

    let result = factory.generate_framework(&idea()).await.unwrap();

    assert!(!result.framework.recommended_chain.is_empty());
    assert_eq!(result.framework.smart_contracts, vec!["TicketNFT", "TicketMarketplace"]);
    assert_eq!(result.agent_traces.len(), 5);
    assert!(!result.tokenomics.unwrap().has_token);
    assert_eq!(
        model.calls(),
        vec!["Product Planner", "Blockchain Architect", "Full-Stack Architect", "Smart Contract Engineer", "Tokenomics Designer"]
    );

    let json = serde_json::to_value(&factory.generate_framework(&idea()).await.unwrap()).unwrap();
    assert_eq!(json["tokenomics"], json!({"hasToken": false}));
    assert_eq!(json["agent_traces"][0]["description"], "High-level product strategy");
}

#[tokio::test]
async fn ticket_marketplace_repo_with_deployment() {
    let model = Arc::new(ScriptedModel::ticket_marketplace());
    let chain = Arc::new(FakeChain::default());
    let factory = Factory::new(model.clone(), chain.clone(), FactoryConfig::default());

    let framework = factory.generate_framework(&idea()).await.unwrap().framework;
    let result = factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: Some(framework),
        })
        .await
        .unwrap();

    // Framework supplied, so only the code and security agents ran again.
    assert_eq!(model.calls().len(), 7);

    let deployed = chain.deployed.lock().unwrap().clone();
    assert_eq!(deployed.len(), 1);
    assert_eq!(deployed[0].0, "TicketNFT");

    let details = result.deployment.unwrap();
    assert!(is_checksummed_address(&details.address));
    assert!(result.deployment_error.is_none());
    assert_eq!(result.security_report.warnings.len(), 1);

    let connection = read_entry(&result.zip, "web3/connection.js").unwrap();
    assert!(connection.contains(&details.address));
    assert!(read_entry(&result.zip, "deployment.json").is_some());
    assert!(read_entry(&result.zip, "docs/ARCHITECTURE.md").is_some());
    let readme = read_entry(&result.zip, "README.md").unwrap();
    assert!(readme.contains("deployed to **Polygon Amoy**"));
}

#[tokio::test]
async fn repo_without_framework_reruns_design_agents() {
    let model = Arc::new(ScriptedModel::ticket_marketplace());
    let factory = Factory::new(model.clone(), Arc::new(FakeChain::default()), FactoryConfig::default());

    factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: None,
        })
        .await
        .unwrap();
    assert_eq!(model.calls().len(), 7);
    assert_eq!(model.calls()[5], "Code Generator");
}

#[tokio::test]
async fn deployment_failure_still_returns_archive() {
    let model = Arc::new(ScriptedModel::ticket_marketplace());
    let chain = Arc::new(FakeChain {
        fail_with: Some("ParserError: expected ';'".into()),
        ..Default::default()
    });
    let factory = Factory::new(model, chain, FactoryConfig::default());

    let result = factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: None,
        })
        .await
        .unwrap();
    assert!(result.deployment.is_none());
    let error = result.deployment_error.unwrap();
    assert!(error.contains("ParserError"));
    let readme = read_entry(&result.zip, "README.md").unwrap();
    assert!(readme.contains(&format!("> {error}")));
    assert!(read_entry(&result.zip, "deployment.json").is_none());
}

#[tokio::test]
async fn missing_credentials_skip_deployment_quietly() {
    let model = Arc::new(ScriptedModel::ticket_marketplace());
    let deployer = Deployer::new(ChainConfig::default(), Arc::new(SolcManager::new(std::env::temp_dir())));
    let factory = Factory::new(model, Arc::new(deployer), FactoryConfig::default());

    let result = factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: None,
        })
        .await
        .unwrap();
    assert!(result.deployment.is_none());
    assert!(result.deployment_error.is_none());
    let readme = read_entry(&result.zip, "README.md").unwrap();
    assert!(readme.contains("Deployment has not been run yet."));
}

#[tokio::test]
async fn package_imports_deploy_fallback_contract() {
    let mut model = ScriptedModel::ticket_marketplace();
    model.replies.insert(
        "Code Generator",
        json!({"contracts": [{
            "path": "contracts/TicketNFT.sol",
            "content": "pragma solidity ^0.8.20;\nimport \"@openzeppelin/contracts/token/ERC721/ERC721.sol\";\ncontract TicketNFT is ERC721 { constructor() ERC721(\"T\", \"T\") {} }"
        }]}),
    );
    let chain = Arc::new(FakeChain::default());
    let factory = Factory::new(Arc::new(model), chain.clone(), FactoryConfig::default());

    factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: None,
        })
        .await
        .unwrap();
    let deployed = chain.deployed.lock().unwrap().clone();
    assert_eq!(deployed[0].0, "AutoDeployedContract");
    assert!(deployed[0].1.contains("for: ticket resale marketplace"));
}

#[tokio::test]
async fn malformed_security_report_fails_the_request() {
    let mut model = ScriptedModel::ticket_marketplace();
    model.replies.insert("Security Auditor", json!({"risk_level": "unknowable"}));
    let factory = Factory::new(Arc::new(model), Arc::new(FakeChain::default()), FactoryConfig::default());

    let err = factory
        .generate_repo(&RepoRequest {
            idea: idea(),
            framework: None,
        })
        .await
        .unwrap_err();
    match err {
        FactoryError::Pipeline(PipelineError::Schema(v)) => assert_eq!(v.agent, "Security Auditor"),
        other => panic!("unexpected error: {other:?}"),
    }
}
