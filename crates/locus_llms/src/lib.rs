//! Provider-agnostic LLM registry with circuit breaking and failover.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                  ProviderRegistry                       │
//! │     HashMap<String, Arc<dyn Provider>>                  │
//! └────────────────────────────────────────────────────────┘
//!           │
//!           ▼
//!   FailoverProvider (ordered chain)
//!           │
//!     ┌─────┴─────┬─────────────┐
//!     ▼           ▼             ▼
//! CircuitBreaker  CircuitBreaker  CircuitBreaker
//!     │               │               │
//!     ▼               ▼               ▼
//!  primary        fallback-1      fallback-2
//! ```
//!
//! Every provider the registry hands out is itself a [`Provider`], so a
//! circuit-broken, failed-over chain composes transparently with a bare
//! single-provider registration — callers never need to know which they got.

pub mod breaker;
pub mod error;
pub mod failover;
pub mod provider;
pub mod providers;
pub mod types;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use error::{Error, Result};
pub use failover::FailoverProvider;
pub use provider::{Provider, ProviderRegistry};
pub use providers::HttpChatProvider;
pub use types::{
    ChatRequest, ChatResponse, Message, Role, StreamEvent, ThinkingBudget, ToolCall, ToolSchema,
    Usage,
};
