//! Circuit Breaker (C3): a three-state wrapper around a single [`Provider`]
//! that stops issuing wire calls to a provider that's failing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    fn label(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before tripping to Open.
    pub max_failures: u32,
    /// How long Open is held before allowing a Half-Open probe.
    pub timeout: Duration,
    /// Reserved for a future sliding-window failure count; currently the
    /// breaker counts *consecutive* failures only, so `interval` only bounds
    /// how long a Closed failure streak is remembered across idle gaps.
    pub interval: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            timeout: Duration::from_secs(30),
            interval: Duration::from_secs(60),
        }
    }
}

struct StateData {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// Wraps a single [`Provider`] and implements `Provider` itself, so a
/// `CircuitBreaker` can be chained anywhere a bare provider is expected
/// (notably inside a [`crate::failover::FailoverProvider`]).
pub struct CircuitBreaker {
    inner: Arc<dyn Provider>,
    config: CircuitBreakerConfig,
    state: Mutex<StateData>,
    half_open_slot: Semaphore,
}

impl CircuitBreaker {
    pub fn new(inner: Arc<dyn Provider>, config: CircuitBreakerConfig) -> Self {
        Self {
            inner,
            config,
            state: Mutex::new(StateData {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
            half_open_slot: Semaphore::new(1),
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.state.lock().await.state
    }

    /// Returns `Ok(())` to proceed, or `Err(BreakerOpen)` if the call should
    /// be rejected without reaching the wrapped provider. On `Ok`, the
    /// caller must eventually report the outcome via `on_success`/`on_failure`.
    async fn admit(&self) -> Result<bool> {
        let mut guard = self.state.lock().await;
        match guard.state {
            BreakerState::Closed => Ok(false),
            BreakerState::Open => {
                let opened_at = guard.opened_at.expect("Open state always has opened_at");
                if Instant::now() >= opened_at + self.config.timeout {
                    guard.state = BreakerState::HalfOpen;
                    drop(guard);
                    if self.half_open_slot.try_acquire().is_ok() {
                        Ok(true)
                    } else {
                        Err(Error::BreakerOpen(self.inner.name().to_string()))
                    }
                } else {
                    Err(Error::BreakerOpen(self.inner.name().to_string()))
                }
            }
            BreakerState::HalfOpen => {
                drop(guard);
                if self.half_open_slot.try_acquire().is_ok() {
                    Ok(true)
                } else {
                    Err(Error::BreakerOpen(self.inner.name().to_string()))
                }
            }
        }
    }

    async fn on_success(&self, was_probe: bool) {
        let mut guard = self.state.lock().await;
        guard.state = BreakerState::Closed;
        guard.consecutive_failures = 0;
        guard.opened_at = None;
        drop(guard);
        if was_probe {
            self.half_open_slot.add_permits(1);
        }
    }

    async fn on_failure(&self, was_probe: bool) {
        let mut guard = self.state.lock().await;
        guard.consecutive_failures += 1;
        if was_probe || guard.consecutive_failures >= self.config.max_failures {
            guard.state = BreakerState::Open;
            guard.opened_at = Some(Instant::now());
        }
        drop(guard);
        if was_probe {
            self.half_open_slot.add_permits(1);
        }
    }
}

#[async_trait]
impl Provider for CircuitBreaker {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let was_probe = self.admit().await?;
        let result = self.inner.chat(request).await;
        match &result {
            Ok(_) => self.on_success(was_probe).await,
            // Context cancellation is never counted as a failure.
            Err(Error::Cancelled) => {
                if was_probe {
                    self.half_open_slot.add_permits(1);
                }
            }
            Err(_) => self.on_failure(was_probe).await,
        }
        result
    }
}

pub fn state_label(state: BreakerState) -> &'static str {
    state.label()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Usage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakyProvider {
        fail_next: AtomicUsize,
    }

    impl FlakyProvider {
        fn always_fails() -> Self {
            Self { fail_next: AtomicUsize::new(usize::MAX) }
        }
        fn succeeds_after(n: usize) -> Self {
            Self { fail_next: AtomicUsize::new(n) }
        }
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            let remaining = self.fail_next.load(Ordering::SeqCst);
            if remaining == 0 {
                return Ok(ChatResponse {
                    message: Message::assistant("ok"),
                    usage: Usage::default(),
                    tool_calls: Vec::new(),
                });
            }
            if remaining != usize::MAX {
                self.fail_next.fetch_sub(1, Ordering::SeqCst);
            }
            Err(Error::Other("boom".into()))
        }
    }

    fn req() -> ChatRequest {
        ChatRequest::new("model", vec![Message::user("hi")])
    }

    #[tokio::test]
    async fn opens_after_max_failures_and_rejects_without_calling_provider() {
        let breaker = CircuitBreaker::new(
            Arc::new(FlakyProvider::always_fails()),
            CircuitBreakerConfig {
                max_failures: 2,
                timeout: Duration::from_secs(30),
                interval: Duration::from_secs(60),
            },
        );

        assert!(breaker.chat(req()).await.is_err());
        assert_eq!(breaker.state().await, BreakerState::Closed);
        assert!(breaker.chat(req()).await.is_err());
        assert_eq!(breaker.state().await, BreakerState::Open);

        let err = breaker.chat(req()).await.unwrap_err();
        assert!(matches!(err, Error::BreakerOpen(_)));
    }

    #[tokio::test]
    async fn half_open_success_closes_and_failure_reopens() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(
            Arc::new(FlakyProvider::succeeds_after(2)),
            CircuitBreakerConfig {
                max_failures: 2,
                timeout: Duration::from_millis(50),
                interval: Duration::from_secs(60),
            },
        );

        breaker.chat(req()).await.unwrap_err();
        breaker.chat(req()).await.unwrap_err();
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::advance(Duration::from_millis(60)).await;

        // Half-open probe succeeds (fail_next reached 0 by now).
        breaker.chat(req()).await.unwrap();
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_breaker() {
        tokio::time::pause();
        let breaker = CircuitBreaker::new(
            Arc::new(FlakyProvider::always_fails()),
            CircuitBreakerConfig {
                max_failures: 1,
                timeout: Duration::from_millis(10),
                interval: Duration::from_secs(60),
            },
        );
        breaker.chat(req()).await.unwrap_err();
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::advance(Duration::from_millis(20)).await;
        breaker.chat(req()).await.unwrap_err();
        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn cancellation_is_not_counted_as_failure() {
        struct CancellingProvider;
        #[async_trait]
        impl Provider for CancellingProvider {
            fn name(&self) -> &str {
                "cancels"
            }
            async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
                Err(Error::Cancelled)
            }
        }

        let breaker = CircuitBreaker::new(
            Arc::new(CancellingProvider),
            CircuitBreakerConfig {
                max_failures: 1,
                timeout: Duration::from_secs(30),
                interval: Duration::from_secs(60),
            },
        );

        for _ in 0..5 {
            let err = breaker.chat(req()).await.unwrap_err();
            assert!(matches!(err, Error::Cancelled));
        }
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }

    #[tokio::test]
    async fn success_resets_consecutive_failure_count() {
        let provider = Arc::new(FlakyProvider::succeeds_after(1));
        let breaker = CircuitBreaker::new(
            provider,
            CircuitBreakerConfig {
                max_failures: 2,
                timeout: Duration::from_secs(30),
                interval: Duration::from_secs(60),
            },
        );
        breaker.chat(req()).await.unwrap_err();
        breaker.chat(req()).await.unwrap();
        assert_eq!(breaker.state().await, BreakerState::Closed);
        // A single subsequent failure should not immediately re-open
        // (max_failures=2, count was reset to 0 by the success above).
    }
}
