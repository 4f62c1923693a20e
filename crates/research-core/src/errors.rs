use thiserror::Error;

/// Errors emitted by the research-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Raised when field descriptors are empty, collide, or name an unknown type.
    #[error("invalid schema definition: {0}")]
    SchemaDefinition(String),

    /// Raised when the text-generation collaborator returns an unusable plan.
    #[error("plan generation failed: {0}")]
    PlanGeneration(String),

    /// Raised when agent output carries no recognizable record structure.
    #[error("malformed agent output: {0}")]
    MalformedOutput(String),

    /// Raised when the text-generation transport fails outright.
    #[error("text generation request failed: {0}")]
    LlmTransport(String),

    /// Raised when the automation agent fails to return at all.
    #[error("automation agent failed: {0}")]
    AgentTransport(String),

    /// Raised when a run is cancelled at a suspension point.
    #[error("run cancelled: {0}")]
    Cancelled(String),
}

impl CoreError {
    /// Helper for schema definition failures.
    pub fn schema_definition(message: impl Into<String>) -> Self {
        Self::SchemaDefinition(message.into())
    }

    /// Helper for plan generation failures.
    pub fn plan_generation(message: impl Into<String>) -> Self {
        Self::PlanGeneration(message.into())
    }

    /// Helper for unrecognizable agent output.
    pub fn malformed_output(message: impl Into<String>) -> Self {
        Self::MalformedOutput(message.into())
    }

    /// Helper for text-generation transport failures.
    pub fn llm_transport(message: impl Into<String>) -> Self {
        Self::LlmTransport(message.into())
    }

    /// Helper for automation agent transport failures.
    pub fn agent_transport(message: impl Into<String>) -> Self {
        Self::AgentTransport(message.into())
    }

    /// Helper for cancellation signals.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    /// Stable label for log fields and counters.
    pub fn telemetry_label(&self) -> &'static str {
        match self {
            Self::SchemaDefinition(_) => "schema_definition",
            Self::PlanGeneration(_) => "plan_generation",
            Self::MalformedOutput(_) => "malformed_output",
            Self::LlmTransport(_) => "llm_transport",
            Self::AgentTransport(_) => "agent_transport",
            Self::Cancelled(_) => "cancelled",
        }
    }

    /// Whether re-entering the drafting stage with a fresh plan could help.
    pub fn is_drafting_failure(&self) -> bool {
        matches!(
            self,
            Self::SchemaDefinition(_) | Self::PlanGeneration(_) | Self::LlmTransport(_)
        )
    }
}
