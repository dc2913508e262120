//! Cluster mode (§4.11, optional): a global, TTL'd lock keyed by session so
//! two nodes never process the same session concurrently. The in-process
//! per-session lock (`SessionManager`'s `Arc<Mutex<Session>>`) already
//! covers single-node exclusivity; this is the cross-node extension of it.

use async_trait::async_trait;
use locus_core::SessionKey;
use std::time::Duration;

#[async_trait]
pub trait ClusterCoordinator: Send + Sync {
    /// Attempts to acquire the lock for `key`, held for at most `ttl`.
    /// Returns `true` if acquired.
    async fn try_lock(&self, key: &SessionKey, ttl: Duration) -> bool;
    /// Releases a lock this node previously acquired for `key`.
    async fn unlock(&self, key: &SessionKey);
}

/// Single-node default: every lock attempt trivially succeeds, `unlock` is
/// a no-op. Correct whenever the Router isn't deployed behind a cluster.
pub struct NullClusterCoordinator;

#[async_trait]
impl ClusterCoordinator for NullClusterCoordinator {
    async fn try_lock(&self, _key: &SessionKey, _ttl: Duration) -> bool {
        true
    }

    async fn unlock(&self, _key: &SessionKey) {}
}
