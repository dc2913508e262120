//! Agent runtime error types.

use thiserror::Error;

/// Errors surfaced by the agent reasoning loop and its supporting modules
/// (context building, compression, configuration).
///
/// Provider- and tool-level failures are not re-modeled here: a failed
/// `Provider::chat` call or `ToolRegistry::execute` call already carries its
/// own typed error, and this enum's job is to add loop-level context around
/// those, not to duplicate them.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("llm provider error: {0}")]
    Llm(#[from] locus_llms::Error),

    #[error("context overflow: session exceeds its configured token budget")]
    ContextOverflow,

    #[error("reasoning loop exceeded its max_iterations budget ({0})")]
    IterationBudgetExceeded(u32),

    #[error("delegate fan-out limit exceeded ({0})")]
    DelegateFanOutExceeded(u32),

    #[error("run cancelled")]
    Cancelled,

    #[error("session error: {0}")]
    Session(#[from] locus_core::CoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
