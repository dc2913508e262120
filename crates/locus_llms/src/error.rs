//! Provider-layer errors. These stay local to `locus_llms`; callers that
//! cross into the rest of the Core convert them into `locus_core::CoreError`
//! via `From`, preserving this error as the `#[source]`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("provider already registered: {0}")]
    ProviderAlreadyRegistered(String),

    #[error("circuit breaker open for provider {0}")]
    BreakerOpen(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("http error: {0}")]
    Http(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether an outer layer (the Circuit Breaker, the Failover chain) may
    /// retry an operation that failed with this error. Mirrors
    /// `locus_core::error::ErrorKind::is_retryable` for the provider-local
    /// error currency.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Error::Cancelled | Error::ProviderNotFound(_))
    }
}

impl From<&Error> for locus_core::CoreError {
    fn from(err: &Error) -> Self {
        match err {
            Error::ProviderNotFound(id) => {
                locus_core::CoreError::not_found("llm.chat", format!("provider {id}"))
            }
            Error::BreakerOpen(id) => locus_core::CoreError::BreakerOpen {
                operation: format!("llm.chat[{id}]"),
            },
            Error::Cancelled => locus_core::CoreError::cancelled("llm.chat"),
            Error::RateLimitExceeded | Error::Timeout(_) | Error::Http(_) => {
                locus_core::CoreError::ProviderUnavailable {
                    operation: "llm.chat".into(),
                    reason: err.to_string(),
                }
            }
            other => locus_core::CoreError::ProviderUnavailable {
                operation: "llm.chat".into(),
                reason: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
