//! Downloadable repository archive.
//!
//! Layout: `README.md`, every generated file under its declared path,
//! `docs/ARCHITECTURE.md` (synthesized when the plan has none), and
//! `deployment.json` when a contract went live.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use ideaforge_chain::{DeploymentDetails, inject_contract_address};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::factory::codegen::{CodePlan, SecurityReport};
use crate::factory::framework::Framework;

const CONNECTION_HELPER: &str = "web3/connection.js";
const ARCHITECTURE_DOC: &str = "docs/ARCHITECTURE.md";

pub const PROJECT_REPORT: &str = "## Auto-Generated Web3 Project\n\n\
    This project was generated by a multi-agent pipeline (planner, chain architect, \
    app architect, contracts, code, and security). Use this repo as a starting point \
    and customize it for your real product.";

/// What happened to the on-chain deployment for this archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    Deployed(DeploymentDetails),
    Failed(String),
    NotRun,
}

impl DeploymentOutcome {
    pub fn details(&self) -> Option<&DeploymentDetails> {
        match self {
            DeploymentOutcome::Deployed(d) => Some(d),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DeploymentOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

fn bullet_block(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

fn deployment_section(outcome: &DeploymentOutcome) -> String {
    match outcome {
        DeploymentOutcome::Deployed(d) => format!(
            "This contract has been deployed to **{}**.\n\n\
             - Address: `{}`\n\
             - Explorer: {}\n\
             - Tx Hash: {}\n\
             - Compiler: solc {}\n\n",
            d.network,
            d.address,
            if d.explorer_url.is_empty() { "N/A" } else { &d.explorer_url },
            if d.tx_hash.is_empty() { "N/A" } else { &d.tx_hash },
            d.compiler_version,
        ),
        DeploymentOutcome::Failed(reason) => format!(
            "Automatic deployment attempted but failed:\n\n\
             > {reason}\n\n\
             Use Hardhat scripts in this repo to deploy manually once the issue is resolved.\n\n"
        ),
        DeploymentOutcome::NotRun => {
            "Deployment has not been run yet. Use the provided Hardhat scripts when ready.\n\n".to_string()
        }
    }
}

fn security_section(report: &SecurityReport) -> String {
    format!(
        "## Security Review\n\n\
         Risk level: **{}**\n\n\
         ### Critical Issues\n{}\n\n\
         ### Warnings\n{}\n\n\
         ### Recommendations\n{}\n\n",
        report.risk_level,
        bullet_block(&report.critical_issues),
        bullet_block(&report.warnings),
        bullet_block(&report.recommendations),
    )
}

pub fn render_readme(framework: &Framework, security: &SecurityReport, outcome: &DeploymentOutcome) -> String {
    format!(
        "# Auto-generated Web3 Project\n\n\
         ## Summary\n\n{summary}\n\n\
         ### User Segments\n{segments}\n\n\
         ### Value Proposition\n{value}\n\n\
         ### Recommended Chain\n{chain}\n\n\
         ### Smart Contracts\n{contracts}\n\n\
         ### Frontend Components\n{frontend}\n\n\
         ### Backend Services\n{backend}\n\n\
         ### Web3 Integration\n{web3}\n\n\
         ### Next Steps\n{next}\n\n\
         ## On-chain Deployment\n{deployment}\
         {security}\
         ---\n\n\
         ## Detailed Report\n\n{PROJECT_REPORT}\n",
        summary = framework.summary,
        segments = bullet_block(&framework.user_segments),
        value = bullet_block(&framework.value_proposition),
        chain = framework.recommended_chain,
        contracts = bullet_block(&framework.smart_contracts),
        frontend = bullet_block(&framework.frontend_components),
        backend = bullet_block(&framework.backend_services),
        web3 = bullet_block(&framework.web3_integration),
        next = bullet_block(&framework.next_steps),
        deployment = deployment_section(outcome),
        security = security_section(security),
    )
}

fn architecture_doc(framework: &Framework) -> String {
    format!(
        "# Architecture Overview\n\n\
         This document describes the architecture generated by the multi-agent system.\n\n\
         - Recommended chain: {}\n\
         - Key smart contracts: {}\n\
         - Frontend components: {}\n\
         - Backend services: {}\n\n\
         Use this as a starting point and extend as needed.\n",
        framework.recommended_chain,
        framework.smart_contracts.join(", "),
        framework.frontend_components.join(", "),
        framework.backend_services.join(", "),
    )
}

/// Strip leading slashes. Empty paths and any `..` segment are rejected.
fn normalize_path(path: &str) -> Option<String> {
    let trimmed = path.trim().trim_start_matches('/');
    if trimmed.is_empty() || trimmed.split(['/', '\\']).any(|seg| seg == "..") {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn build_repo_zip(
    framework: &Framework,
    plan: &CodePlan,
    security: &SecurityReport,
    outcome: &DeploymentOutcome,
) -> Result<Vec<u8>, ArchiveError> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut written: HashSet<String> = HashSet::new();

    zip.start_file("README.md", options)?;
    zip.write_all(render_readme(framework, security, outcome).as_bytes())?;
    written.insert("README.md".to_string());

    for file in plan.files() {
        let Some(path) = normalize_path(&file.path) else {
            tracing::warn!(path = %file.path, "Skipping generated file with unsafe path");
            continue;
        };
        if !written.insert(path.clone()) {
            tracing::warn!(path = %path, "Skipping duplicate generated file");
            continue;
        }
        let content = match outcome.details() {
            Some(details) if path.eq_ignore_ascii_case(CONNECTION_HELPER) => {
                inject_contract_address(&file.content, details)
            }
            _ => file.content.clone(),
        };
        zip.start_file(path.as_str(), options)?;
        zip.write_all(content.as_bytes())?;
    }

    if !written.contains(ARCHITECTURE_DOC) {
        zip.start_file(ARCHITECTURE_DOC, options)?;
        zip.write_all(architecture_doc(framework).as_bytes())?;
    }

    if let Some(details) = outcome.details() {
        zip.start_file("deployment.json", options)?;
        zip.write_all(serde_json::to_string_pretty(details)?.as_bytes())?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}
