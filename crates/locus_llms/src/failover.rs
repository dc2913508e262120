//! Failover Provider (C4): an ordered chain of providers tried in sequence
//! until one succeeds or the chain is exhausted.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse};

/// Tries `primary`, then each of `fallbacks` in order, on any retryable
/// failure. The same request is reused unmutated across attempts. A
/// cancellation short-circuits the chain immediately rather than falling
/// through to the next candidate.
pub struct FailoverProvider {
    name: String,
    chain: Vec<Arc<dyn Provider>>,
}

impl FailoverProvider {
    /// `chain` must be non-empty; `chain[0]` is the primary.
    pub fn new(name: impl Into<String>, chain: Vec<Arc<dyn Provider>>) -> Self {
        assert!(!chain.is_empty(), "failover chain must have at least one provider");
        Self { name: name.into(), chain }
    }
}

#[async_trait]
impl Provider for FailoverProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let mut last_err: Option<Error> = None;
        for candidate in &self.chain {
            match candidate.chat(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(err) => {
                    last_err = Some(err);
                    continue;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Other("failover chain exhausted".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingProvider {
        id: &'static str,
        calls: AtomicUsize,
        fails: bool,
        cancels: bool,
    }

    #[async_trait]
    impl Provider for RecordingProvider {
        fn name(&self) -> &str {
            self.id
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.cancels {
                return Err(Error::Cancelled);
            }
            if self.fails {
                return Err(Error::Other(format!("{} failed", self.id)));
            }
            Ok(ChatResponse {
                message: Message::assistant(self.id),
                usage: Usage::default(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn req() -> ChatRequest {
        ChatRequest::new("model", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn primary_success_never_touches_fallback() {
        let primary = Arc::new(RecordingProvider { id: "primary", calls: AtomicUsize::new(0), fails: false, cancels: false });
        let fallback = Arc::new(RecordingProvider { id: "fallback", calls: AtomicUsize::new(0), fails: false, cancels: false });
        let chain = FailoverProvider::new("chain", vec![primary.clone(), fallback.clone()]);

        let resp = chain.chat(req()).await.unwrap();
        assert_eq!(resp.message.content, "primary");
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_to_next_on_failure() {
        let primary = Arc::new(RecordingProvider { id: "primary", calls: AtomicUsize::new(0), fails: true, cancels: false });
        let fallback = Arc::new(RecordingProvider { id: "fallback", calls: AtomicUsize::new(0), fails: false, cancels: false });
        let chain = FailoverProvider::new("chain", vec![primary, fallback]);

        let resp = chain.chat(req()).await.unwrap();
        assert_eq!(resp.message.content, "fallback");
    }

    #[tokio::test]
    async fn returns_last_error_when_all_fail() {
        let a = Arc::new(RecordingProvider { id: "a", calls: AtomicUsize::new(0), fails: true, cancels: false });
        let b = Arc::new(RecordingProvider { id: "b", calls: AtomicUsize::new(0), fails: true, cancels: false });
        let chain = FailoverProvider::new("chain", vec![a, b]);

        let err = chain.chat(req()).await.unwrap_err();
        assert!(err.to_string().contains("b failed"));
    }

    #[tokio::test]
    async fn cancellation_short_circuits_without_trying_fallback() {
        let primary = Arc::new(RecordingProvider { id: "primary", calls: AtomicUsize::new(0), fails: false, cancels: true });
        let fallback = Arc::new(RecordingProvider { id: "fallback", calls: AtomicUsize::new(0), fails: false, cancels: false });
        let chain = FailoverProvider::new("chain", vec![primary, fallback.clone()]);

        let err = chain.chat(req()).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
    }
}
