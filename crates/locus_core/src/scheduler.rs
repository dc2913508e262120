//! Scheduler (C12): named actions run against a timed task list. `AddTask`
//! validates its schedule eagerly — a malformed schedule is rejected there,
//! never discovered later at dispatch — and adding or removing tasks is
//! safe to call while the dispatcher is running.
//!
//! No cron-expression grammar is implemented here: nothing in this
//! workspace's dependency tree parses one, and adding a parser crate with
//! no grounding elsewhere in the stack would be inventing a dependency
//! rather than learning one. `Schedule` instead covers the two shapes the
//! spec's task list actually needs — a fixed interval, or a single point in
//! time — which is enough to express both recurring and one-shot tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::bus::{EventBus, EventPayload};
use crate::error::{CoreError, Result};

/// How often the dispatcher wakes to check for due tasks. Coarser than the
/// shortest supported `Schedule::Interval` wastes no CPU between real
/// events; finer than it would fire a task late by up to one tick.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_interval: Duration::from_millis(250) }
    }
}

/// When a task fires next.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Fires every `period`, starting one `period` after `AddTask`.
    Interval(Duration),
    /// Fires exactly once, at `at`. A past `at` fires on the dispatcher's
    /// next tick.
    Once(DateTime<Utc>),
}

impl Schedule {
    fn validate(&self) -> Result<()> {
        match self {
            Schedule::Interval(period) if period.is_zero() => {
                Err(CoreError::Validation {
                    operation: "scheduler.add_task".to_string(),
                    reason: "interval schedule must be non-zero".to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn first_fire(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Schedule::Interval(period) => now + chrono_duration(*period),
            Schedule::Once(at) => *at,
        }
    }

    fn next_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Interval(period) => Some(now + chrono_duration(*period)),
            Schedule::Once(_) => None,
        }
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::zero())
}

/// A unit of work a task's schedule fires. `ctx` is cancelled when
/// [`Scheduler::stop`] is called while this action is in flight.
#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, ctx: CancellationToken) -> std::result::Result<(), String>;
}

struct ScheduledTask {
    schedule: Schedule,
    action: Arc<dyn Action>,
    one_shot: bool,
    next_fire: DateTime<Utc>,
}

/// Holds the task list and runs the dispatcher that fires them. One
/// `Scheduler` supports one `start`/`stop` lifecycle; `start` after a
/// `stop` is not supported (the cancellation token it stops with is
/// single-use, matching `Agent::run`'s own `CancellationToken` contract).
pub struct Scheduler {
    tasks: Arc<Mutex<HashMap<String, ScheduledTask>>>,
    bus: Arc<EventBus>,
    config: SchedulerConfig,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(bus: Arc<EventBus>, config: SchedulerConfig) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            bus,
            config,
            dispatcher: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Registers a task under `name`, validating `schedule` eagerly. Fails
    /// with `AlreadyExists` if the name is taken, leaving it untouched.
    pub async fn add_task(
        &self,
        name: impl Into<String>,
        schedule: Schedule,
        action: Arc<dyn Action>,
        one_shot: bool,
    ) -> Result<()> {
        schedule.validate()?;
        let name = name.into();
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&name) {
            return Err(CoreError::already_exists("scheduler.add_task", name));
        }
        let next_fire = schedule.first_fire(Utc::now());
        tasks.insert(name, ScheduledTask { schedule, action, one_shot, next_fire });
        Ok(())
    }

    /// Removes a task. Safe to call while the dispatcher is running — a run
    /// already in flight for this task completes, but it won't be
    /// rescheduled.
    pub async fn remove_task(&self, name: &str) -> Result<()> {
        self.tasks
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("scheduler.remove_task", name))
    }

    pub async fn task_count(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Starts the dispatcher loop as a background task. Returns immediately.
    pub async fn start(&self) {
        let tasks = self.tasks.clone();
        let bus = self.bus.clone();
        let cancel = self.cancel.clone();
        let tick = self.config.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        Self::dispatch_due(&tasks, &bus, &cancel).await;
                    }
                }
            }
        });

        *self.dispatcher.lock().await = Some(handle);
    }

    /// Cancels all in-flight runs and terminates the dispatcher, waiting
    /// for it to finish.
    pub async fn stop(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(err) = handle.await {
                warn!("scheduler dispatcher task panicked: {err}");
            }
        }
    }

    async fn dispatch_due(
        tasks: &Arc<Mutex<HashMap<String, ScheduledTask>>>,
        bus: &Arc<EventBus>,
        cancel: &CancellationToken,
    ) {
        let now = Utc::now();
        let due: Vec<(String, Arc<dyn Action>)> = {
            let mut guard = tasks.lock().await;
            let mut due = Vec::new();
            let mut to_remove = Vec::new();
            for (name, task) in guard.iter_mut() {
                if task.next_fire > now {
                    continue;
                }
                due.push((name.clone(), task.action.clone()));
                if task.one_shot {
                    to_remove.push(name.clone());
                } else if let Some(next) = task.schedule.next_fire(now) {
                    task.next_fire = next;
                } else {
                    to_remove.push(name.clone());
                }
            }
            for name in to_remove {
                guard.remove(&name);
            }
            due
        };

        for (name, action) in due {
            let bus = bus.clone();
            let child = cancel.child_token();
            tokio::spawn(async move {
                bus.publish(EventPayload::TaskStarted { task_name: name.clone() }).await;
                match action.run(child).await {
                    Ok(()) => {
                        bus.publish(EventPayload::TaskCompleted { task_name: name }).await;
                    }
                    Err(reason) => {
                        bus.publish(EventPayload::TaskFailed { task_name: name, reason }).await;
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAction {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Action for CountingAction {
        async fn run(&self, _ctx: CancellationToken) -> std::result::Result<(), String> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FailingAction;

    #[async_trait]
    impl Action for FailingAction {
        async fn run(&self, _ctx: CancellationToken) -> std::result::Result<(), String> {
            Err("boom".to_string())
        }
    }

    fn scheduler() -> (Scheduler, Arc<EventBus>) {
        let bus = Arc::new(EventBus::new());
        let config = SchedulerConfig { tick_interval: Duration::from_millis(10) };
        (Scheduler::new(bus.clone(), config), bus)
    }

    #[tokio::test]
    async fn add_task_rejects_zero_interval() {
        let (scheduler, _bus) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        let err = scheduler
            .add_task("t1", Schedule::Interval(Duration::ZERO), Arc::new(CountingAction { count }), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn add_task_rejects_duplicate_name() {
        let (scheduler, _bus) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_task(
                "t1",
                Schedule::Interval(Duration::from_millis(10)),
                Arc::new(CountingAction { count: count.clone() }),
                false,
            )
            .await
            .unwrap();
        let err = scheduler
            .add_task("t1", Schedule::Interval(Duration::from_millis(10)), Arc::new(CountingAction { count }), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn one_shot_task_runs_once_then_is_removed() {
        let (scheduler, mut bus_subscriber) = {
            let (scheduler, bus) = scheduler();
            let sub = bus.subscribe(Some(vec![crate::EventKind::Scheduler])).await;
            (scheduler, sub)
        };
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_task(
                "once",
                Schedule::Once(Utc::now() - chrono::Duration::seconds(1)),
                Arc::new(CountingAction { count: count.clone() }),
                true,
            )
            .await
            .unwrap();

        scheduler.start().await;

        let started = bus_subscriber.rx.recv().await.unwrap();
        assert!(matches!(started.payload, EventPayload::TaskStarted { .. }));
        let completed = bus_subscriber.rx.recv().await.unwrap();
        assert!(matches!(completed.payload, EventPayload::TaskCompleted { .. }));

        scheduler.stop().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.task_count().await, 0);
    }

    #[tokio::test]
    async fn failing_action_publishes_task_failed() {
        let (scheduler, bus) = scheduler();
        let mut sub = bus.subscribe(Some(vec![crate::EventKind::Scheduler])).await;
        scheduler
            .add_task("fail", Schedule::Once(Utc::now() - chrono::Duration::seconds(1)), Arc::new(FailingAction), true)
            .await
            .unwrap();

        scheduler.start().await;
        let _started = sub.rx.recv().await.unwrap();
        let failed = sub.rx.recv().await.unwrap();
        match failed.payload {
            EventPayload::TaskFailed { reason, .. } => assert_eq!(reason, "boom"),
            other => panic!("expected TaskFailed, got {other:?}"),
        }
        scheduler.stop().await;
    }

    #[tokio::test]
    async fn remove_task_drops_it_before_next_fire() {
        let (scheduler, _bus) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_task(
                "t1",
                Schedule::Interval(Duration::from_secs(3600)),
                Arc::new(CountingAction { count }),
                false,
            )
            .await
            .unwrap();
        scheduler.remove_task("t1").await.unwrap();
        assert_eq!(scheduler.task_count().await, 0);
    }

    #[tokio::test]
    async fn remove_task_missing_is_not_found() {
        let (scheduler, _bus) = scheduler();
        let err = scheduler.remove_task("ghost").await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn stop_terminates_dispatcher_without_further_fires() {
        let (scheduler, _bus) = scheduler();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler
            .add_task(
                "recurring",
                Schedule::Interval(Duration::from_millis(5)),
                Arc::new(CountingAction { count: count.clone() }),
                false,
            )
            .await
            .unwrap();
        scheduler.start().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        scheduler.stop().await;
        let seen = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
