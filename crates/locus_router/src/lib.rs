//! The Router (C11): the Core's inbound entry point. Resolves a
//! `(channel, transport-session-id)` key to a session, serializes access to
//! that session via the lock `SessionManager` already hands out, runs a
//! middleware pipeline, resolves which agent should answer, dispatches
//! `Agent.Run`, and composes the outbound reply — optionally kicking off a
//! background Curator update and consulting offline/cluster hooks before any
//! of that happens. See `router::Router::handle` for the step-by-step
//! contract.

pub mod cluster;
pub mod curator;
pub mod error;
pub mod message;
pub mod middleware;
pub mod offline;
pub mod router;
pub mod strategy;

pub use cluster::{ClusterCoordinator, NullClusterCoordinator};
pub use curator::{Curator, NullCurator};
pub use error::{Result, RouterError};
pub use message::{InboundMessage, OutboundMessage};
pub use middleware::{
    default_pipeline, AllowAllAuthorizer, AuthorizerMiddleware, Middleware, MiddlewareOutcome,
    PrivacyFilter, SecretScanner, ServiceAuthorizer,
};
pub use offline::{AlwaysOnline, OfflineManager, OfflineQueue, QueuedMessage};
pub use router::{Router, RouterBuilder};
pub use strategy::{AgentRouterStrategy, Resolution, RoutingRule};
