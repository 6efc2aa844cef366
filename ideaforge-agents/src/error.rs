use crate::llm::CompletionFailure;

// ── Errors ──────────────────────────────────────────────────────────

/// Agent output that parsed as JSON but does not have the documented shape.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{agent} returned an unexpected shape: {reason}")]
pub struct SchemaViolation {
    pub agent: String,
    pub reason: String,
    /// The offending output, compact JSON.
    pub raw: String,
}

/// Why a pipeline stopped before producing its result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{agent} failed: {source}")]
    Agent {
        agent: String,
        #[source]
        source: CompletionFailure,
    },
    #[error(transparent)]
    Schema(#[from] SchemaViolation),
}

impl PipelineError {
    pub(crate) fn agent(agent: &str, source: CompletionFailure) -> Self {
        PipelineError::Agent {
            agent: agent.to_string(),
            source,
        }
    }
}
