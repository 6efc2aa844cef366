//! Agent runner.
//!
//! An agent is one role-scoped completion call: a persona, the user's idea,
//! everything earlier agents produced, and a task template. The runner
//! builds the prompts, makes exactly one call, and hands back the JSON
//! object together with a trace record.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::llm::{ChatMessage, CompletionFailure, CompletionRequest, JsonCompletion};

/// Per-call completion timeout.
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(120);

/// Where the product is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    New,
    Existing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::New => write!(f, "new"),
            Stage::Existing => write!(f, "existing"),
        }
    }
}

/// The user's request. Immutable for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdeaRequest {
    pub idea: String,
    pub stage: Stage,
    #[serde(default)]
    pub industry: Option<String>,
}

/// One executed agent, for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTrace {
    pub name: String,
    pub description: String,
    pub output: Value,
}

/// Prior agents' outputs keyed by agent key, in execution order.
///
/// Append-only for the lifetime of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SharedContext(Map<String, Value>);

impl SharedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an agent's output. A key is written once; later writes are ignored.
    pub fn record(&mut self, key: &str, value: Value) {
        if self.0.contains_key(key) {
            tracing::warn!(key = %key, "Shared context key already recorded; keeping first value");
            return;
        }
        self.0.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Static definition of one agent role.
#[derive(Debug, Clone, Copy)]
pub struct AgentSpec {
    /// Shared-context key this agent's output is stored under.
    pub key: &'static str,
    pub name: &'static str,
    /// What the agent is for; embedded in the system prompt.
    pub description: &'static str,
    /// Short label used in the trace.
    pub trace_label: &'static str,
    pub instructions: &'static str,
}

/// Output of one agent call.
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub output: Map<String, Value>,
    pub trace: AgentTrace,
}

pub fn system_prompt(agent: &AgentSpec) -> String {
    format!(
        "You are '{}', a specialized agent in a multi-agent system. \
         Your job: {}. \
         You will receive the user's idea plus JSON context from other agents. \
         You MUST respond with a single valid JSON object only, no extra text.",
        agent.name, agent.description
    )
}

pub fn user_prompt(agent: &AgentSpec, idea: &IdeaRequest, shared: &SharedContext) -> String {
    format!(
        "User Idea:\n\
         - Idea: {}\n\
         - Stage: {}\n\
         - Industry: {}\n\
         \n\
         Shared context from other agents (as JSON):\n\
         {}\n\
         \n\
         Your task:\n\
         {}\n\
         \n\
         Rules:\n\
         - Output only a single JSON object.\n\
         - Do not wrap it in backticks.\n\
         - Do not include explanations outside of the JSON.",
        idea.idea,
        idea.stage,
        idea.industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("unspecified"),
        shared.to_pretty_json(),
        agent.instructions.trim(),
    )
}

/// Run one agent: one completion call, no retries.
pub async fn run_agent(
    llm: &dyn JsonCompletion,
    agent: &AgentSpec,
    idea: &IdeaRequest,
    shared: &SharedContext,
    timeout: Duration,
) -> Result<AgentRun, CompletionFailure> {
    tracing::info!(agent = agent.name, context_keys = shared.0.len(), "Running agent");
    let request = CompletionRequest {
        messages: vec![
            ChatMessage::system(system_prompt(agent)),
            ChatMessage::user(user_prompt(agent, idea, shared)),
        ],
        timeout,
    };
    let output = llm.complete_json(request).await?;
    let trace = AgentTrace {
        name: agent.name.to_string(),
        description: agent.trace_label.to_string(),
        output: Value::Object(output.clone()),
    };
    Ok(AgentRun { output, trace })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const SCOUT: AgentSpec = AgentSpec {
        key: "scout",
        name: "Scout Agent",
        description: "check prompt construction",
        trace_label: "Prompt scout",
        instructions: "\n  Return JSON like {\"ok\": true}\n",
    };

    #[derive(Default)]
    struct Recorder(Mutex<Vec<CompletionRequest>>);

    #[async_trait]
    impl JsonCompletion for Recorder {
        async fn complete_json(
            &self,
            request: CompletionRequest,
        ) -> Result<Map<String, Value>, CompletionFailure> {
            self.0.lock().unwrap().push(request);
            Ok(json!({"ok": true}).as_object().cloned().unwrap_or_default())
        }
    }

    fn idea() -> IdeaRequest {
        IdeaRequest {
            idea: "ticket resale marketplace".into(),
            stage: Stage::New,
            industry: None,
        }
    }

    #[test]
    fn system_prompt_embeds_persona_and_json_rule() {
        let prompt = system_prompt(&SCOUT);
        assert!(prompt.starts_with("You are 'Scout Agent'"));
        assert!(prompt.contains("Your job: check prompt construction."));
        assert!(prompt.contains("single valid JSON object only"));
    }

    #[test]
    fn user_prompt_embeds_idea_and_context() {
        let mut shared = SharedContext::new();
        shared.record("planner", json!({"summary": "Resell tickets safely"}));
        let prompt = user_prompt(&SCOUT, &idea(), &shared);
        assert!(prompt.contains("- Idea: ticket resale marketplace"));
        assert!(prompt.contains("- Stage: new"));
        assert!(prompt.contains("- Industry: unspecified"));
        assert!(prompt.contains("\"summary\": \"Resell tickets safely\""));
        assert!(prompt.contains("Your task:\nReturn JSON like {\"ok\": true}"));
    }

    #[test]
    fn blank_industry_reads_as_unspecified() {
        let req = IdeaRequest {
            industry: Some("   ".into()),
            ..idea()
        };
        let prompt = user_prompt(&SCOUT, &req, &SharedContext::new());
        assert!(prompt.contains("- Industry: unspecified"));

        let req = IdeaRequest {
            industry: Some(" events ".into()),
            ..idea()
        };
        assert!(user_prompt(&SCOUT, &req, &SharedContext::new()).contains("- Industry: events\n"));
    }

    #[test]
    fn prompt_lists_context_in_execution_order() {
        let mut shared = SharedContext::new();
        shared.record("planner", json!({"summary": "s"}));
        shared.record("chain", json!({"recommended_chain": "Base"}));
        shared.record("app", json!({}));
        let prompt = user_prompt(&SCOUT, &idea(), &shared);
        let planner = prompt.find("\"planner\"").unwrap();
        let chain = prompt.find("\"chain\"").unwrap();
        let app = prompt.find("\"app\"").unwrap();
        assert!(planner < chain && chain < app);
    }

    #[test]
    fn shared_context_is_append_only() {
        let mut shared = SharedContext::new();
        shared.record("chain", json!({"recommended_chain": "Base"}));
        shared.record("chain", json!({"recommended_chain": "Polygon"}));
        shared.record("app", json!({}));
        assert_eq!(shared.get("chain").unwrap()["recommended_chain"], "Base");
        assert_eq!(shared.keys().collect::<Vec<_>>(), vec!["chain", "app"]);
    }

    #[tokio::test]
    async fn run_agent_makes_one_call_and_traces_it() {
        let llm = Recorder::default();
        let run = run_agent(&llm, &SCOUT, &idea(), &SharedContext::new(), Duration::from_secs(7))
            .await
            .unwrap();
        assert_eq!(run.output["ok"], true);
        assert_eq!(run.trace.name, "Scout Agent");
        assert_eq!(run.trace.description, "Prompt scout");

        let calls = llm.0.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].timeout, Duration::from_secs(7));
        assert_eq!(calls[0].messages[0].role, "system");
        assert_eq!(calls[0].messages[1].role, "user");
    }

    #[test]
    fn stage_serializes_lowercase() {
        let req: IdeaRequest =
            serde_json::from_value(json!({"idea": "x", "stage": "existing", "industry": "events"})).unwrap();
        assert_eq!(req.stage, Stage::Existing);
        assert_eq!(serde_json::to_value(Stage::New).unwrap(), json!("new"));
    }
}
