//! Typed in-process pub/sub (C1). Every component that needs to notify
//! observers — the Agent, the Circuit Breaker, the Process Manager, the
//! Scheduler — publishes through one shared [`EventBus`] instead of holding
//! its own ad-hoc channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::event::SessionEvent;
use crate::session::SessionKey;

/// Coarse discriminant subscribers filter on. Kept separate from the
/// payload so a filter doesn't need to match on full enum shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Session,
    Provider,
    Process,
    Scheduler,
    Router,
}

/// The full payload of a bus event. `Session` wraps the existing
/// [`SessionEvent`] stream (turn deltas, tool lifecycle, etc); the other
/// variants are the system-level events named throughout the component
/// design (`ProviderFailed`, `ProcessStarted`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    Session {
        session_key: SessionKey,
        event: SessionEvent,
    },
    ProviderFailed {
        provider: String,
        reason: String,
    },
    BreakerStateChanged {
        provider: String,
        from: String,
        to: String,
    },
    ProcessStarted {
        process_session_id: String,
        command: String,
    },
    ProcessExited {
        process_session_id: String,
        exit_code: Option<i32>,
        reason: String,
    },
    ToolInvoked {
        session_key: SessionKey,
        tool: String,
        is_error: bool,
        duration_ms: u64,
    },
    TaskStarted {
        task_name: String,
    },
    TaskCompleted {
        task_name: String,
    },
    TaskFailed {
        task_name: String,
        reason: String,
    },
    RouterError {
        session_key: SessionKey,
        reason: String,
    },
    Cancelled {
        session_key: SessionKey,
        operation: String,
    },
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Session { .. } => EventKind::Session,
            EventPayload::ProviderFailed { .. } | EventPayload::BreakerStateChanged { .. } => {
                EventKind::Provider
            }
            EventPayload::ProcessStarted { .. } | EventPayload::ProcessExited { .. } => {
                EventKind::Process
            }
            EventPayload::ToolInvoked { .. } => EventKind::Session,
            EventPayload::TaskStarted { .. }
            | EventPayload::TaskCompleted { .. }
            | EventPayload::TaskFailed { .. } => EventKind::Scheduler,
            EventPayload::RouterError { .. } | EventPayload::Cancelled { .. } => EventKind::Router,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            kind: payload.kind(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Default bound of a subscriber's queue; matches the spec's stated default.
pub const DEFAULT_SUBSCRIBER_QUEUE: usize = 64;

struct Subscriber {
    id: u64,
    filter: Option<Vec<EventKind>>,
    tx: mpsc::Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscriber {
    fn accepts(&self, kind: EventKind) -> bool {
        match &self.filter {
            None => true,
            Some(kinds) => kinds.contains(&kind),
        }
    }
}

/// A subscriber's receiving half plus an atomic drop counter the bus bumps
/// whenever this subscriber's queue was full and an event for it was
/// dropped. Publishers never block on a full queue.
pub struct Subscription {
    pub id: u64,
    pub rx: mpsc::Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl Subscription {
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// In-process pub/sub hub. Owned by the composition root as the one
/// legitimate piece of process-wide global state (besides the signal
/// handler); created once in `main` and explicitly closed during teardown.
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    queue_size: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_queue_size(DEFAULT_SUBSCRIBER_QUEUE)
    }

    pub fn with_queue_size(queue_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            queue_size,
        }
    }

    /// Registers a subscriber. `filter = None` receives every event kind.
    pub async fn subscribe(&self, filter: Option<Vec<EventKind>>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.queue_size);
        let dropped = Arc::new(AtomicU64::new(0));
        let sub = Subscriber {
            id,
            filter,
            tx,
            dropped: dropped.clone(),
        };
        self.subscribers.write().await.push(sub);
        Subscription { id, rx, dropped }
    }

    pub async fn unsubscribe(&self, id: u64) {
        self.subscribers.write().await.retain(|s| s.id != id);
    }

    /// Publishes to every matching subscriber. Never blocks: a subscriber
    /// whose queue is full has the event dropped for it and its drop
    /// counter incremented, but every other subscriber still receives it.
    pub async fn publish(&self, payload: EventPayload) {
        let event = Event::new(payload);
        let subs = self.subscribers.read().await;
        for sub in subs.iter() {
            if !sub.accepts(event.kind) {
                continue;
            }
            if sub.tx.try_send(event.clone()).is_err() {
                sub.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drops all subscribers, closing their receiving halves. Any events
    /// already queued remain drainable until the `Subscription` is dropped.
    pub async fn close(&self) {
        self.subscribers.write().await.clear();
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::Role;

    fn key() -> SessionKey {
        SessionKey::new("cli", "s1")
    }

    #[tokio::test]
    async fn publish_reaches_unfiltered_subscriber() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(None).await;
        bus.publish(EventPayload::Session {
            session_key: key(),
            event: SessionEvent::turn_start(Role::User),
        })
        .await;
        let event = sub.rx.recv().await.expect("event delivered");
        assert_eq!(event.kind, EventKind::Session);
    }

    #[tokio::test]
    async fn filter_excludes_non_matching_kinds() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Some(vec![EventKind::Process])).await;
        bus.publish(EventPayload::Session {
            session_key: key(),
            event: SessionEvent::turn_end(),
        })
        .await;
        bus.publish(EventPayload::ProcessStarted {
            process_session_id: "p1".into(),
            command: "bash".into(),
        })
        .await;
        let event = sub.rx.recv().await.expect("process event delivered");
        assert!(matches!(event.payload, EventPayload::ProcessStarted { .. }));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn overflow_drops_for_slow_subscriber_without_blocking_others() {
        let bus = EventBus::with_queue_size(1);
        let mut slow = bus.subscribe(None).await;
        let mut fast = bus.subscribe(None).await;

        for _ in 0..5 {
            bus.publish(EventPayload::RouterError {
                session_key: key(),
                reason: "boom".into(),
            })
            .await;
        }

        assert!(slow.dropped_count() > 0);
        // fast's queue also only holds 1, but every publish raced the
        // previous recv here since nothing was read; just assert publish
        // never panicked/blocked and at least one event is still there.
        assert!(fast.rx.try_recv().is_ok());
        assert!(slow.rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let sub = bus.subscribe(None).await;
        bus.unsubscribe(sub.id).await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn close_clears_all_subscribers() {
        let bus = EventBus::new();
        let _a = bus.subscribe(None).await;
        let _b = bus.subscribe(None).await;
        assert_eq!(bus.subscriber_count().await, 2);
        bus.close().await;
        assert_eq!(bus.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn delivery_order_preserved_per_subscriber() {
        let bus = EventBus::with_queue_size(8);
        let mut sub = bus.subscribe(None).await;
        for i in 0..5u64 {
            bus.publish(EventPayload::TaskStarted {
                task_name: format!("t{i}"),
            })
            .await;
        }
        for i in 0..5u64 {
            let event = sub.rx.recv().await.unwrap();
            match event.payload {
                EventPayload::TaskStarted { task_name } => {
                    assert_eq!(task_name, format!("t{i}"))
                }
                _ => panic!("unexpected payload"),
            }
        }
    }
}
