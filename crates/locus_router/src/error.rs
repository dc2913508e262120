//! Router error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("message blocked by {stage}: {reason}")]
    Blocked { stage: String, reason: String },

    #[error("no agent registered for id '{0}'")]
    UnknownAgent(String),

    #[error("session error: {0}")]
    Session(#[from] locus_core::CoreError),

    #[error("agent run error: {0}")]
    Runtime(#[from] locus_runtime::RuntimeError),

    #[error("message queued while offline")]
    QueuedOffline,

    #[error("cluster lock for session held by another node")]
    ClusterLockContended,
}

pub type Result<T> = std::result::Result<T, RouterError>;
