//! Code generation: framework in, file plan and security review out.
//!
//! The context is narrowed to the finalized framework so the code prompt
//! does not carry the whole design trace. Both agents are mandatory.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::framework::Framework;
use super::prompts::{CODE, SECURITY};
use super::schema::Fields;
use crate::agent::{AgentTrace, IdeaRequest, SharedContext, run_agent};
use crate::error::{PipelineError, SchemaViolation};
use crate::llm::JsonCompletion;

const MAX_FINDINGS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,
    pub content: String,
}

/// Generated source files, grouped the way the code agent emits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePlan {
    #[serde(default)]
    pub contracts: Vec<FileRecord>,
    #[serde(default)]
    pub backend: Vec<FileRecord>,
    #[serde(default)]
    pub frontend: Vec<FileRecord>,
}

impl CodePlan {
    pub fn from_agent_output(output: &Map<String, Value>) -> Result<Self, SchemaViolation> {
        let fields = Fields::new(CODE.name, output);
        Ok(Self {
            contracts: file_records(&fields, "contracts")?,
            backend: file_records(&fields, "backend")?,
            frontend: file_records(&fields, "frontend")?,
        })
    }

    /// Every file in archive order: contracts, backend, frontend.
    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.contracts.iter().chain(&self.backend).chain(&self.frontend)
    }
}

fn file_records(fields: &Fields<'_>, section: &str) -> Result<Vec<FileRecord>, SchemaViolation> {
    fields
        .array(section)?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let path = item.get("path").and_then(Value::as_str);
            let content = match item.get("content") {
                None | Some(Value::Null) => Some(""),
                Some(v) => v.as_str(),
            };
            match (item.is_object(), path, content) {
                (true, Some(path), Some(content)) => Ok(FileRecord {
                    path: path.to_string(),
                    content: content.to_string(),
                }),
                _ => Err(fields.violation(format!(
                    "'{section}[{i}]' should be an object with string 'path' and 'content'"
                ))),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        })
    }
}

impl RiskLevel {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityReport {
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub critical_issues: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl SecurityReport {
    pub fn from_agent_output(output: &Map<String, Value>) -> Result<Self, SchemaViolation> {
        let fields = Fields::new(SECURITY.name, output);
        let level = fields
            .opt_string("risk_level")?
            .ok_or_else(|| fields.violation("missing 'risk_level'"))?;
        let risk_level = RiskLevel::parse(&level)
            .ok_or_else(|| fields.violation(format!("unknown risk_level '{level}'")))?;

        let bounded = |key: &str| -> Result<Vec<String>, SchemaViolation> {
            let mut items = fields.string_list(key)?;
            items.truncate(MAX_FINDINGS);
            Ok(items)
        };

        Ok(Self {
            risk_level,
            critical_issues: bounded("critical_issues")?,
            warnings: bounded("warnings")?,
            recommendations: bounded("recommendations")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CodeGeneration {
    pub plan: CodePlan,
    pub security: SecurityReport,
    pub traces: Vec<AgentTrace>,
}

pub async fn run_code_generation(
    llm: &dyn JsonCompletion,
    idea: &IdeaRequest,
    framework: &Framework,
    timeout: Duration,
) -> Result<CodeGeneration, PipelineError> {
    let mut shared = SharedContext::new();
    let framework_json = serde_json::to_value(framework).unwrap_or(Value::Null);
    shared.record("framework", framework_json);

    let code = run_agent(llm, &CODE, idea, &shared, timeout)
        .await
        .map_err(|e| PipelineError::agent(CODE.name, e))?;
    let plan = CodePlan::from_agent_output(&code.output)?;
    shared.record(CODE.key, Value::Object(code.output));

    let security = run_agent(llm, &SECURITY, idea, &shared, timeout)
        .await
        .map_err(|e| PipelineError::agent(SECURITY.name, e))?;
    let report = SecurityReport::from_agent_output(&security.output)?;

    tracing::info!(
        files = plan.files().count(),
        contracts = plan.contracts.len(),
        risk = %report.risk_level,
        "Code generated"
    );

    Ok(CodeGeneration {
        plan,
        security: report,
        traces: vec![code.trace, security.trace],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Stage;
    use crate::llm::{CompletionFailure, CompletionRequest};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn plan_sections_default_to_empty() {
        let plan = CodePlan::from_agent_output(&obj(json!({
            "contracts": [{"path": "contracts/TicketNFT.sol", "content": "contract TicketNFT {}"}]
        })))
        .unwrap();
        assert_eq!(plan.contracts.len(), 1);
        assert!(plan.backend.is_empty());
        assert!(plan.frontend.is_empty());
    }

    #[test]
    fn malformed_plan_section_is_a_violation() {
        let err = CodePlan::from_agent_output(&obj(json!({"backend": [{"content": "x"}]}))).unwrap_err();
        assert_eq!(err.agent, "Code Generator");
        assert!(err.reason.contains("backend[0]"));
        assert!(CodePlan::from_agent_output(&obj(json!({"frontend": "App.tsx"}))).is_err());
    }

    #[test]
    fn security_report_is_bounded_and_case_insensitive() {
        let report = SecurityReport::from_agent_output(&obj(json!({
            "risk_level": "Medium",
            "warnings": ["a", "b", "c", "d"]
        })))
        .unwrap();
        assert_eq!(report.risk_level, RiskLevel::Medium);
        assert_eq!(report.warnings.len(), 3);
        assert!(report.critical_issues.is_empty());
        assert_eq!(serde_json::to_value(&report).unwrap()["risk_level"], "medium");
    }

    #[test]
    fn unknown_risk_level_is_a_violation() {
        let err = SecurityReport::from_agent_output(&obj(json!({"risk_level": "catastrophic"}))).unwrap_err();
        assert!(err.reason.contains("catastrophic"));
        assert!(SecurityReport::from_agent_output(&obj(json!({}))).is_err());
    }

    struct Scripted {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JsonCompletion for Scripted {
        async fn complete_json(&self, req: CompletionRequest) -> Result<Map<String, Value>, CompletionFailure> {
            let user = req.messages[1].content.clone();
            let system = req.messages[0].content.clone();
            self.prompts.lock().unwrap().push(user);
            if system.contains("'Code Generator'") {
                Ok(obj(json!({"contracts": [{"path": "contracts/TicketNFT.sol", "content": "contract TicketNFT {}"}]})))
            } else {
                Ok(obj(json!({"risk_level": "low"})))
            }
        }
    }

    #[tokio::test]
    async fn context_is_narrowed_to_framework() {
        let llm = Scripted { prompts: Mutex::default() };
        let idea = IdeaRequest { idea: "tickets".into(), stage: Stage::New, industry: None };
        let framework = Framework {
            summary: "Resell tickets".into(),
            recommended_chain: "Base".into(),
            ..Default::default()
        };
        let out = run_code_generation(&llm, &idea, &framework, Duration::from_secs(1)).await.unwrap();
        assert_eq!(out.plan.contracts[0].path, "contracts/TicketNFT.sol");
        assert_eq!(out.security.risk_level, RiskLevel::Low);
        assert_eq!(out.traces.len(), 2);

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("\"framework\""));
        assert!(!prompts[0].contains("\"planner\""));
        assert!(!prompts[0].contains("\"code\""));
        assert!(prompts[1].contains("\"code\""));
    }
}
