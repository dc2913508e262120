//! Offline mode (§4.11): substitute a local-only provider when the network
//! is unreachable, or queue to disk if no local provider exists.

use std::collections::VecDeque;
use std::sync::Arc;

use locus_core::SessionKey;
use tokio::sync::Mutex;

use crate::message::InboundMessage;

/// Reports network reachability and, if one is configured, hands back a
/// local-only agent id the Router should dispatch to instead of the
/// session's normally-configured agent.
pub trait OfflineManager: Send + Sync {
    fn is_network_unreachable(&self) -> bool;
    fn local_agent_id(&self) -> Option<String>;
}

/// Always reports the network as reachable; the Router never consults
/// offline handling with this configured. The default.
pub struct AlwaysOnline;

impl OfflineManager for AlwaysOnline {
    fn is_network_unreachable(&self) -> bool {
        false
    }

    fn local_agent_id(&self) -> Option<String> {
        None
    }
}

/// One message held because it arrived while offline and no local provider
/// could answer it.
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub message: InboundMessage,
}

/// FIFO, per-session backlog of messages the Router couldn't serve while
/// offline. `replay` drains a session's queue in arrival order — the
/// Router calls it once connectivity is confirmed restored; this crate
/// doesn't itself poll for reconnection, since that cadence is a
/// deployment decision (see the `OfflineManager` this queue is paired with).
#[derive(Default)]
pub struct OfflineQueue {
    by_session: Mutex<std::collections::HashMap<SessionKey, VecDeque<QueuedMessage>>>,
}

impl OfflineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn enqueue(&self, message: InboundMessage) {
        let mut guard = self.by_session.lock().await;
        guard
            .entry(message.session_key.clone())
            .or_default()
            .push_back(QueuedMessage { message });
    }

    pub async fn replay(&self, key: &SessionKey) -> Vec<QueuedMessage> {
        let mut guard = self.by_session.lock().await;
        guard.remove(key).map(Vec::from).unwrap_or_default()
    }

    pub async fn pending_count(&self, key: &SessionKey) -> usize {
        self.by_session.lock().await.get(key).map(VecDeque::len).unwrap_or(0)
    }
}

pub type SharedOfflineQueue = Arc<OfflineQueue>;

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SessionKey {
        SessionKey::new("cli", "s1")
    }

    #[tokio::test]
    async fn enqueue_then_replay_preserves_order() {
        let queue = OfflineQueue::new();
        queue.enqueue(InboundMessage::new(key(), "a", "first")).await;
        queue.enqueue(InboundMessage::new(key(), "a", "second")).await;

        let replayed = queue.replay(&key()).await;
        assert_eq!(replayed.len(), 2);
        assert_eq!(replayed[0].message.text, "first");
        assert_eq!(replayed[1].message.text, "second");
    }

    #[tokio::test]
    async fn replay_drains_the_queue() {
        let queue = OfflineQueue::new();
        queue.enqueue(InboundMessage::new(key(), "a", "first")).await;
        queue.replay(&key()).await;
        assert_eq!(queue.pending_count(&key()).await, 0);
    }

    #[tokio::test]
    async fn queues_are_independent_per_session() {
        let queue = OfflineQueue::new();
        let other = SessionKey::new("cli", "s2");
        queue.enqueue(InboundMessage::new(key(), "a", "one")).await;
        queue.enqueue(InboundMessage::new(other.clone(), "b", "two")).await;

        assert_eq!(queue.pending_count(&key()).await, 1);
        assert_eq!(queue.pending_count(&other).await, 1);
    }
}
