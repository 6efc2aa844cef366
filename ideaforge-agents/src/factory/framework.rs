//! Framework pipeline: planner → chain → app → contracts → tokenomics → assembly.
//!
//! The four design agents are mandatory; any failure aborts the run. The
//! tokenomics agent is best-effort: a failure is logged and recorded as
//! `null` in the shared context.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::prompts::{APP, CHAIN, CONTRACTS, PLANNER, TOKENOMICS};
use super::schema::Fields;
use crate::agent::{AgentSpec, AgentTrace, IdeaRequest, SharedContext, run_agent};
use crate::error::{PipelineError, SchemaViolation};
use crate::llm::JsonCompletion;
use crate::tokenomics::TokenomicsData;

pub const DEFAULT_CHAIN: &str = "Base";

/// The canonical design derived from the agents' outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Framework {
    pub summary: String,
    #[serde(default)]
    pub user_segments: Vec<String>,
    #[serde(default)]
    pub value_proposition: Vec<String>,
    pub recommended_chain: String,
    #[serde(default)]
    pub web3_library: Option<String>,
    #[serde(default)]
    pub smart_contracts: Vec<String>,
    #[serde(default)]
    pub frontend_components: Vec<String>,
    #[serde(default)]
    pub backend_services: Vec<String>,
    #[serde(default)]
    pub web3_integration: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Everything one framework run produced.
#[derive(Debug, Clone)]
pub struct FrameworkRun {
    pub framework: Framework,
    pub traces: Vec<AgentTrace>,
    /// `None` when the tokenomics agent failed or returned an unusable shape.
    pub tokenomics: Option<TokenomicsData>,
    pub context: SharedContext,
}

async fn mandatory(
    llm: &dyn JsonCompletion,
    agent: &AgentSpec,
    idea: &IdeaRequest,
    shared: &mut SharedContext,
    traces: &mut Vec<AgentTrace>,
    timeout: Duration,
) -> Result<(), PipelineError> {
    let run = run_agent(llm, agent, idea, shared, timeout)
        .await
        .map_err(|e| PipelineError::agent(agent.name, e))?;
    shared.record(agent.key, Value::Object(run.output));
    traces.push(run.trace);
    Ok(())
}

pub async fn run_framework_pipeline(
    llm: &dyn JsonCompletion,
    idea: &IdeaRequest,
    timeout: Duration,
) -> Result<FrameworkRun, PipelineError> {
    let mut shared = SharedContext::new();
    let mut traces = Vec::new();

    for agent in [&PLANNER, &CHAIN, &APP, &CONTRACTS] {
        mandatory(llm, agent, idea, &mut shared, &mut traces, timeout).await?;
    }

    let tokenomics = match run_agent(llm, &TOKENOMICS, idea, &shared, timeout).await {
        Ok(run) => {
            let value = Value::Object(run.output);
            let parsed = match TokenomicsData::from_agent_output(&value) {
                Ok(data) => Some(data),
                Err(e) => {
                    tracing::warn!(error = %e, "Tokenomics output unusable; dropping it");
                    None
                }
            };
            shared.record(TOKENOMICS.key, value);
            traces.push(run.trace);
            parsed
        }
        Err(e) => {
            tracing::warn!(error = %e, "Tokenomics agent failed; continuing without it");
            shared.record(TOKENOMICS.key, Value::Null);
            None
        }
    };

    let framework = assemble_framework(&shared)?;
    tracing::info!(
        chain = %framework.recommended_chain,
        contracts = framework.smart_contracts.len(),
        has_token = tokenomics.as_ref().is_some_and(|t| t.has_token),
        "Framework assembled"
    );

    Ok(FrameworkRun {
        framework,
        traces,
        tokenomics,
        context: shared,
    })
}

fn section<'a>(shared: &'a SharedContext, agent: &AgentSpec) -> Result<&'a serde_json::Map<String, Value>, SchemaViolation> {
    match shared.get(agent.key) {
        Some(Value::Object(map)) => Ok(map),
        other => Err(SchemaViolation {
            agent: agent.name.to_string(),
            reason: format!("no '{}' output in shared context", agent.key),
            raw: other.map(Value::to_string).unwrap_or_default(),
        }),
    }
}

/// Pure assembly of the framework from recorded agent outputs.
pub fn assemble_framework(shared: &SharedContext) -> Result<Framework, SchemaViolation> {
    let planner = Fields::new(PLANNER.name, section(shared, &PLANNER)?);
    let chain = Fields::new(CHAIN.name, section(shared, &CHAIN)?);
    let app = Fields::new(APP.name, section(shared, &APP)?);
    let contracts = Fields::new(CONTRACTS.name, section(shared, &CONTRACTS)?);

    let smart_contracts = contracts
        .array("contracts")?
        .iter()
        .filter_map(|c| c.get("name").and_then(Value::as_str))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    Ok(Framework {
        summary: planner.string_or("summary", "")?,
        user_segments: planner.string_list("user_segments")?,
        value_proposition: planner.string_list("value_proposition")?,
        recommended_chain: chain.string_or("recommended_chain", DEFAULT_CHAIN)?,
        web3_library: chain.opt_string("web3_library")?,
        smart_contracts,
        frontend_components: app.string_list("frontend_components")?,
        backend_services: app.string_list("backend_services")?,
        web3_integration: chain.string_list("web3_integration")?,
        next_steps: app.string_list("next_steps")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Stage;
    use crate::llm::{CompletionFailure, CompletionRequest};
    use async_trait::async_trait;
    use serde_json::{Map, json};
    use std::sync::Mutex;

    /// Answers by agent name found in the system prompt.
    struct ByAgent {
        replies: Vec<(&'static str, Result<Value, &'static str>)>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JsonCompletion for ByAgent {
        async fn complete_json(&self, req: CompletionRequest) -> Result<Map<String, Value>, CompletionFailure> {
            let system = &req.messages[0].content;
            for (name, reply) in &self.replies {
                if system.contains(&format!("'{name}'")) {
                    self.calls.lock().unwrap().push(name.to_string());
                    return match reply {
                        Ok(v) => Ok(v.as_object().cloned().unwrap()),
                        Err(msg) => Err(CompletionFailure::Transport(msg.to_string())),
                    };
                }
            }
            panic!("unexpected agent prompt: {system}");
        }
    }

    fn idea() -> IdeaRequest {
        IdeaRequest {
            idea: "ticket resale marketplace".into(),
            stage: Stage::New,
            industry: Some("events".into()),
        }
    }

    fn base_replies() -> Vec<(&'static str, Result<Value, &'static str>)> {
        vec![
            ("Product Planner", Ok(json!({"summary": "Resell tickets", "user_segments": ["fans"]}))),
            ("Blockchain Architect", Ok(json!({
                "recommended_chain": "Polygon",
                "web3_library": "ethers.js",
                "web3_integration": ["MetaMask"],
                "token_and_governance": {"need_token": false}
            }))),
            ("Full-Stack Architect", Ok(json!({"frontend_components": ["Listing page"], "next_steps": ["Pilot"]}))),
            ("Smart Contract Engineer", Ok(json!({"contracts": [{"name": "TicketNFT"}, {"description": "no name"}]}))),
            ("Tokenomics Designer", Ok(json!({"hasToken": false}))),
        ]
    }

    #[tokio::test]
    async fn runs_agents_in_order_and_assembles() {
        let llm = ByAgent { replies: base_replies(), calls: Mutex::default() };
        let run = run_framework_pipeline(&llm, &idea(), Duration::from_secs(1)).await.unwrap();

        assert_eq!(
            *llm.calls.lock().unwrap(),
            vec!["Product Planner", "Blockchain Architect", "Full-Stack Architect", "Smart Contract Engineer", "Tokenomics Designer"]
        );
        assert_eq!(run.framework.recommended_chain, "Polygon");
        assert_eq!(run.framework.smart_contracts, vec!["TicketNFT"]);
        assert_eq!(run.framework.web3_library.as_deref(), Some("ethers.js"));
        assert!(run.framework.backend_services.is_empty());
        assert_eq!(run.traces.len(), 5);
        assert_eq!(run.traces[1].description, "Chain / tokenomics / Web3 flows");
        assert_eq!(run.tokenomics, Some(TokenomicsData::no_token()));
    }

    #[tokio::test]
    async fn tokenomics_failure_is_tolerated() {
        let mut replies = base_replies();
        replies[4] = ("Tokenomics Designer", Err("boom"));
        let llm = ByAgent { replies, calls: Mutex::default() };
        let run = run_framework_pipeline(&llm, &idea(), Duration::from_secs(1)).await.unwrap();
        assert!(run.tokenomics.is_none());
        assert_eq!(run.traces.len(), 4);
        assert_eq!(run.context.get("tokenomics"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn mandatory_failure_aborts() {
        let mut replies = base_replies();
        replies[2] = ("Full-Stack Architect", Err("down"));
        let llm = ByAgent { replies, calls: Mutex::default() };
        let err = run_framework_pipeline(&llm, &idea(), Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Agent { ref agent, .. } if agent == "Full-Stack Architect"));
        assert_eq!(llm.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let mut shared = SharedContext::new();
        for key in ["planner", "chain", "app", "contracts"] {
            shared.record(key, json!({}));
        }
        let fw = assemble_framework(&shared).unwrap();
        assert_eq!(fw.recommended_chain, "Base");
        assert_eq!(fw.summary, "");
        assert!(fw.smart_contracts.is_empty());
        assert_eq!(fw.web3_library, None);
    }

    #[test]
    fn wrong_types_are_schema_violations() {
        let mut shared = SharedContext::new();
        shared.record("planner", json!({"summary": ["not", "a", "string"]}));
        for key in ["chain", "app", "contracts"] {
            shared.record(key, json!({}));
        }
        let err = assemble_framework(&shared).unwrap_err();
        assert_eq!(err.agent, "Product Planner");
    }
}
