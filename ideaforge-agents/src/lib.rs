//! ideaforge-agents: multi-agent idea-to-repo pipeline.
//!
//! - Framework: product, chain, app and contract design from one idea
//! - Repo: generated code, security review, optional testnet deployment, zip
//! - Projects: saved framework results per user

pub mod agent;
pub mod archive;
pub mod error;
pub mod factory;
pub mod llm;
pub mod projects;
pub mod selector;
pub mod tokenomics;

pub use agent::{AgentTrace, IdeaRequest, Stage};
pub use error::{PipelineError, SchemaViolation};
pub use factory::{Factory, FactoryConfig, FactoryError, FrameworkResult, RepoRequest, RepoResult};
pub use llm::{JsonCompletion, OpenAiClient};
pub use projects::{NewProject, Project, ProjectStore, ProjectSummary, StoreError};
