//! Factory orchestrator: drives one request from idea to framework or repo.

use std::sync::Arc;
use std::time::Duration;

use ideaforge_chain::{ContractDeployer, DeployError, DeploymentDetails};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::codegen::{SecurityReport, run_code_generation};
use super::framework::{Framework, run_framework_pipeline};
use crate::agent::{AgentTrace, DEFAULT_AGENT_TIMEOUT, IdeaRequest};
use crate::archive::{ArchiveError, DeploymentOutcome, build_repo_zip};
use crate::error::PipelineError;
use crate::llm::JsonCompletion;
use crate::selector::select_contract_for_deployment;
use crate::tokenomics::TokenomicsData;

/// Default ceiling on one deployment, compile through receipt.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(180);

const LAST_RESORT_HINT: &str = "Auto project";

#[derive(Debug, Clone)]
pub struct FactoryConfig {
    /// Timeout for each completion call.
    pub agent_timeout: Duration,
    pub deploy_timeout: Duration,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            deploy_timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }
}

/// Request phase, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Designing,
    Generating,
    Deploying,
    Packaging,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Designing => write!(f, "designing"),
            Phase::Generating => write!(f, "generating"),
            Phase::Deploying => write!(f, "deploying"),
            Phase::Packaging => write!(f, "packaging"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("failed to build archive: {0}")]
    Archive(#[from] ArchiveError),
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameworkResult {
    pub framework: Framework,
    pub agent_traces: Vec<AgentTrace>,
    pub tokenomics: Option<TokenomicsData>,
}

/// An idea plus, optionally, the framework an earlier call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoRequest {
    #[serde(flatten)]
    pub idea: IdeaRequest,
    #[serde(default)]
    pub framework: Option<Framework>,
}

#[derive(Debug, Clone)]
pub struct RepoResult {
    pub zip: Vec<u8>,
    pub security_report: SecurityReport,
    pub deployment: Option<DeploymentDetails>,
    pub deployment_error: Option<String>,
}

/// The idea factory.
pub struct Factory {
    llm: Arc<dyn JsonCompletion>,
    deployer: Arc<dyn ContractDeployer>,
    config: FactoryConfig,
}

impl Factory {
    pub fn new(llm: Arc<dyn JsonCompletion>, deployer: Arc<dyn ContractDeployer>, config: FactoryConfig) -> Self {
        Self { llm, deployer, config }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    /// Fast path: design only, no code and no archive.
    pub async fn generate_framework(&self, idea: &IdeaRequest) -> Result<FrameworkResult, FactoryError> {
        tracing::info!(phase = %Phase::Designing, stage = %idea.stage, "Generating framework");
        let run = run_framework_pipeline(self.llm.as_ref(), idea, self.config.agent_timeout).await?;
        let tokenomics = run.tokenomics.map(|mut t| {
            t.normalize();
            t
        });
        Ok(FrameworkResult {
            framework: run.framework,
            agent_traces: run.traces,
            tokenomics,
        })
    }

    /// Slow path: code, security review, deployment attempt, archive.
    ///
    /// Deployment problems never fail the request; they land in
    /// `deployment_error` and the README instead.
    pub async fn generate_repo(&self, request: &RepoRequest) -> Result<RepoResult, FactoryError> {
        let idea = &request.idea;
        let framework = match &request.framework {
            Some(framework) => framework.clone(),
            None => {
                tracing::info!(phase = %Phase::Designing, "No framework supplied; running design agents");
                run_framework_pipeline(self.llm.as_ref(), idea, self.config.agent_timeout)
                    .await?
                    .framework
            }
        };

        tracing::info!(phase = %Phase::Generating, "Generating code");
        let generated = run_code_generation(self.llm.as_ref(), idea, &framework, self.config.agent_timeout).await?;

        let outcome = self.deploy(idea, &framework, &generated.plan).await;

        tracing::info!(phase = %Phase::Packaging, "Building archive");
        let zip = build_repo_zip(&framework, &generated.plan, &generated.security, &outcome)?;

        Ok(RepoResult {
            zip,
            security_report: generated.security,
            deployment: outcome.details().cloned(),
            deployment_error: outcome.error().map(str::to_string),
        })
    }

    async fn deploy(
        &self,
        idea: &IdeaRequest,
        framework: &Framework,
        plan: &super::codegen::CodePlan,
    ) -> DeploymentOutcome {
        let hint = [idea.idea.as_str(), framework.summary.as_str()]
            .into_iter()
            .find(|s| !s.trim().is_empty())
            .unwrap_or(LAST_RESORT_HINT);

        let Some(selected) = select_contract_for_deployment(plan, hint) else {
            tracing::info!("No contract source generated; nothing to deploy");
            return DeploymentOutcome::NotRun;
        };

        tracing::info!(
            phase = %Phase::Deploying,
            contract = %selected.name,
            substituted = selected.substituted,
            "Deploying contract"
        );
        let deadline = Instant::now() + self.config.deploy_timeout;
        match self
            .deployer
            .deploy_contract(&selected.source, &selected.name, deadline)
            .await
        {
            Ok(details) => {
                tracing::info!(address = %details.address, network = %details.network, "Contract deployed");
                DeploymentOutcome::Deployed(details)
            }
            Err(DeployError::Skipped(reason)) => {
                tracing::info!(%reason, "Skipping deployment");
                DeploymentOutcome::NotRun
            }
            Err(e) => {
                tracing::error!(error = %e, "Contract deployment failed");
                DeploymentOutcome::Failed(e.to_string())
            }
        }
    }
}
