//! Error types for the agent runtime.

use thiserror::Error;

/// Errors produced by agent execution and model client adapters.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent received a task with an operation it does not implement.
    #[error("agent {agent_id} does not support operation {operation}")]
    UnsupportedOperation { agent_id: String, operation: String },

    /// The model client's primary path failed; callers should have fallen
    /// back rather than propagate this, but it is kept visible for logging.
    #[error("model client error: {0}")]
    ModelClient(String),

    /// Both the primary and fallback execution paths failed.
    #[error("agent {agent_id} exhausted both primary and fallback paths: {reason}")]
    BothPathsFailed { agent_id: String, reason: String },

    /// Input failed task-specific validation before dispatch.
    #[error("invalid task input: {0}")]
    InvalidInput(String),

    /// A catch-all for errors whose text is classified by the retry logic
    /// (rate limit / timeout / auth failure phrasing) rather than matched by type.
    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, AgentError>;
