//! JSON completion client.
//!
//! Every agent talks to the model through `JsonCompletion`: a single request
//! carrying an ordered message list, answered with one JSON object. No
//! retries; a failed call is reported once and the caller decides.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_MODEL: &str = "gpt-5.1";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// One completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub timeout: Duration,
}

/// Why a completion call produced no usable JSON object.
#[derive(Debug, thiserror::Error)]
pub enum CompletionFailure {
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion request timed out after {0:?}")]
    Timeout(Duration),
    #[error("completion API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("completion response had no message content")]
    EmptyResponse,
    #[error("completion returned malformed JSON ({reason}): {raw}")]
    MalformedJson { raw: String, reason: String },
    #[error("completion returned JSON that is not an object: {0}")]
    NotAnObject(String),
}

/// The completion seam. Implemented by `OpenAiClient` and by test fakes.
#[async_trait]
pub trait JsonCompletion: Send + Sync {
    async fn complete_json(
        &self,
        request: CompletionRequest,
    ) -> Result<Map<String, Value>, CompletionFailure>;
}

/// Parse model text strictly as a single JSON object.
pub fn parse_json_object(text: &str) -> Result<Map<String, Value>, CompletionFailure> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| CompletionFailure::MalformedJson {
        raw: truncate(text, 500),
        reason: e.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CompletionFailure::NotAnObject(truncate(&other.to_string(), 200))),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions client in JSON mode.
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl JsonCompletion for OpenAiClient {
    async fn complete_json(
        &self,
        request: CompletionRequest,
    ) -> Result<Map<String, Value>, CompletionFailure> {
        let body = serde_json::json!({
            "model": &self.model,
            "messages": request.messages,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompletionFailure::Timeout(request.timeout)
                } else {
                    CompletionFailure::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionFailure::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await.map_err(|e| {
            if e.is_timeout() {
                CompletionFailure::Timeout(request.timeout)
            } else {
                CompletionFailure::Transport(format!("failed to read completion response: {e}"))
            }
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(CompletionFailure::EmptyResponse)?;

        parse_json_object(&text)
    }
}
