//! Core error taxonomy shared across the runtime, router, and tool layers.

use thiserror::Error;

/// Coarse classification used by callers that need to branch on retryability
/// without downcasting the underlying [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Cancelled,
    Timeout,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    BreakerOpen,
    ContextOverflow,
    ProviderUnavailable,
    ToolFailed,
    ToolRetryable,
    Validation,
    Internal,
}

impl ErrorKind {
    /// Whether an outer layer may retry an operation that failed with this kind.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::BreakerOpen
                | ErrorKind::ToolRetryable
                | ErrorKind::Timeout
                | ErrorKind::ProviderUnavailable
        )
    }
}

/// The single error currency crossing module boundaries inside the Core.
///
/// Every variant carries the operation name it failed during and, where
/// available, the underlying cause. Leaf crates define their own error
/// types for local detail and convert into `CoreError` at the boundary,
/// preserving the original as `#[source]`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{operation}: cancelled")]
    Cancelled { operation: String },

    #[error("{operation}: timed out")]
    Timeout { operation: String },

    #[error("{operation}: not found: {what}")]
    NotFound { operation: String, what: String },

    #[error("{operation}: already exists: {what}")]
    AlreadyExists { operation: String, what: String },

    #[error("{operation}: permission denied: {reason}")]
    PermissionDenied { operation: String, reason: String },

    #[error("{operation}: circuit breaker open")]
    BreakerOpen { operation: String },

    #[error("{operation}: context window overflow")]
    ContextOverflow { operation: String },

    #[error("{operation}: provider unavailable: {reason}")]
    ProviderUnavailable { operation: String, reason: String },

    #[error("{operation}: tool failed: {reason}")]
    ToolFailed { operation: String, reason: String },

    #[error("{operation}: tool failed (retryable): {reason}")]
    ToolRetryable { operation: String, reason: String },

    #[error("{operation}: validation failed: {reason}")]
    Validation { operation: String, reason: String },

    #[error("{operation}: internal error")]
    Internal {
        operation: String,
        #[source]
        cause: anyhow::Error,
    },
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Cancelled { .. } => ErrorKind::Cancelled,
            CoreError::Timeout { .. } => ErrorKind::Timeout,
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            CoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CoreError::BreakerOpen { .. } => ErrorKind::BreakerOpen,
            CoreError::ContextOverflow { .. } => ErrorKind::ContextOverflow,
            CoreError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            CoreError::ToolFailed { .. } => ErrorKind::ToolFailed,
            CoreError::ToolRetryable { .. } => ErrorKind::ToolRetryable,
            CoreError::Validation { .. } => ErrorKind::Validation,
            CoreError::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn operation(&self) -> &str {
        match self {
            CoreError::Cancelled { operation }
            | CoreError::Timeout { operation }
            | CoreError::BreakerOpen { operation }
            | CoreError::ContextOverflow { operation }
            | CoreError::NotFound { operation, .. }
            | CoreError::AlreadyExists { operation, .. }
            | CoreError::PermissionDenied { operation, .. }
            | CoreError::ProviderUnavailable { operation, .. }
            | CoreError::ToolFailed { operation, .. }
            | CoreError::ToolRetryable { operation, .. }
            | CoreError::Validation { operation, .. }
            | CoreError::Internal { operation, .. } => operation,
        }
    }

    pub fn cancelled(operation: impl Into<String>) -> Self {
        CoreError::Cancelled { operation: operation.into() }
    }

    pub fn not_found(operation: impl Into<String>, what: impl Into<String>) -> Self {
        CoreError::NotFound { operation: operation.into(), what: what.into() }
    }

    pub fn already_exists(operation: impl Into<String>, what: impl Into<String>) -> Self {
        CoreError::AlreadyExists { operation: operation.into(), what: what.into() }
    }

    pub fn internal(operation: impl Into<String>, cause: impl Into<anyhow::Error>) -> Self {
        CoreError::Internal { operation: operation.into(), cause: cause.into() }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_kinds_match_taxonomy() {
        assert!(ErrorKind::BreakerOpen.is_retryable());
        assert!(ErrorKind::ToolRetryable.is_retryable());
        assert!(ErrorKind::Timeout.is_retryable());
        assert!(ErrorKind::ProviderUnavailable.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::PermissionDenied.is_retryable());
        assert!(!ErrorKind::NotFound.is_retryable());
    }

    #[test]
    fn not_found_carries_operation_and_kind() {
        let err = CoreError::not_found("session.get", "session abc123");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.operation(), "session.get");
        assert!(err.to_string().contains("session abc123"));
    }

    #[test]
    fn internal_preserves_source() {
        let cause = anyhow::anyhow!("disk full");
        let err = CoreError::internal("session.save", cause);
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(std::error::Error::source(&err).is_some());
    }
}
