//! Picks the one contract that gets deployed from a generated file plan.
//!
//! Pure: the same plan and hint always produce the same selection.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::factory::codegen::CodePlan;

pub const DEFAULT_CONTRACT_NAME: &str = "MyContract";
pub const FALLBACK_CONTRACT_NAME: &str = "AutoDeployedContract";
const DEFAULT_HINT: &str = "Auto-generated project";
const MAX_HINT_CHARS: usize = 80;

static COMMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").expect("comment regex"));

static CONTRACT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(abstract\s+)?contract\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\{|is\b)").expect("contract regex")
});

static EXTERNAL_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bimport\s+(?:[^;"']*?\bfrom\s+)?["']@"#).expect("import regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedContract {
    pub name: String,
    pub source: String,
    /// True when the generated source was replaced by the fallback contract.
    pub substituted: bool,
}

/// Name of the first concrete contract declared in `source`.
pub fn declared_contract_name(source: &str) -> Option<String> {
    let code = COMMENTS.replace_all(source, "");
    CONTRACT_DECL
        .captures_iter(&code)
        .find(|caps| caps.get(1).is_none())
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Whether the source pulls in a package import such as `@openzeppelin/...`.
pub fn has_external_imports(source: &str) -> bool {
    EXTERNAL_IMPORT.is_match(source)
}

/// A self-contained logging contract, so deployment can always be attempted.
pub fn fallback_contract(project_hint: &str) -> (String, String) {
    let hint = project_hint.trim();
    let hint = if hint.is_empty() { DEFAULT_HINT } else { hint };
    let safe_hint: String = hint.replace(['\r', '\n'], " ").chars().take(MAX_HINT_CHARS).collect();

    let source = format!(
        r#"// Fallback contract deployed automatically for: {safe_hint}
// Simple log-only contract (no external imports) so deployment always succeeds.
pragma solidity ^0.8.20;

contract {FALLBACK_CONTRACT_NAME} {{
    address public owner;
    event MessageLogged(address indexed sender, string message);

    constructor() {{
        owner = msg.sender;
    }}

    function logMessage(string calldata message) external {{
        emit MessageLogged(msg.sender, message);
    }}
}}
"#
    );
    (FALLBACK_CONTRACT_NAME.to_string(), source)
}

/// Choose the contract to deploy, or `None` when no contract file has content.
pub fn select_contract_for_deployment(plan: &CodePlan, project_hint: &str) -> Option<SelectedContract> {
    let file = plan.contracts.iter().find(|f| !f.content.trim().is_empty())?;
    let source = file.content.trim();

    if has_external_imports(source) {
        tracing::info!(path = %file.path, "Contract has package imports; using fallback contract");
        let (name, source) = fallback_contract(project_hint);
        return Some(SelectedContract {
            name,
            source,
            substituted: true,
        });
    }

    let name = declared_contract_name(source)
        .or_else(|| {
            Path::new(&file.path)
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_CONTRACT_NAME.to_string());

    Some(SelectedContract {
        name,
        source: source.to_string(),
        substituted: false,
    })
}
