//! Idea factory.
//!
//! A fixed roster of role-scoped agents turns a one-line idea into a
//! product framework, then into a runnable repository.
//!
//! Agent roles:
//! - Product Planner: product concept, users, value
//! - Blockchain Architect: chain, library, token need
//! - Full-Stack Architect: screens, services, endpoints
//! - Smart Contract Engineer: contract set
//! - Tokenomics Designer: optional token distribution
//! - Code Generator: fixed-layout source files
//! - Security Auditor: bounded risk report

pub mod codegen;
pub mod framework;
mod orchestrator;
pub mod prompts;
mod schema;

pub use codegen::{CodeGeneration, CodePlan, FileRecord, RiskLevel, SecurityReport, run_code_generation};
pub use framework::{Framework, FrameworkRun, assemble_framework, run_framework_pipeline};
pub use orchestrator::{
    DEFAULT_DEPLOY_TIMEOUT, Factory, FactoryConfig, FactoryError, FrameworkResult, Phase, RepoRequest, RepoResult,
};
