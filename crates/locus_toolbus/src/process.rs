//! Process Manager (C6): a bounded pool of PTY-backed background child
//! processes, keyed by process-session-id, with ring-buffered output and
//! TTL-based reaping.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Utc};
use locus_core::{CoreError, EventBus, EventPayload, Result};
use portable_pty::{native_pty_system, CommandBuilder, MasterPty, PtySize};
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ProcessManagerConfig {
    pub max_sessions: usize,
    pub ring_buffer_capacity: usize,
    pub session_ttl: chrono::Duration,
}

impl Default for ProcessManagerConfig {
    fn default() -> Self {
        Self {
            max_sessions: 16,
            ring_buffer_capacity: 1 << 20,
            session_ttl: chrono::Duration::minutes(30),
        }
    }
}

/// A fixed-capacity byte buffer addressed by a monotonically increasing
/// logical offset. Once full, the oldest bytes are dropped as new ones
/// arrive; `Read` clamps a stale requested offset up to what's still held.
struct RingBuffer {
    capacity: usize,
    data: VecDeque<u8>,
    /// Logical offset of `data[0]`.
    base_offset: u64,
    /// Logical offset one past the last byte ever written.
    write_offset: u64,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self { capacity, data: VecDeque::with_capacity(capacity.min(8192)), base_offset: 0, write_offset: 0 }
    }

    fn append(&mut self, bytes: &[u8]) {
        self.data.extend(bytes.iter().copied());
        self.write_offset += bytes.len() as u64;
        while self.data.len() > self.capacity {
            self.data.pop_front();
            self.base_offset += 1;
        }
    }

    /// Returns (bytes, next_offset). `offset` is clamped up to `base_offset`
    /// if it names bytes that have already been evicted.
    fn read(&self, offset: u64, max_bytes: usize) -> (Vec<u8>, u64) {
        let start = offset.max(self.base_offset);
        if start >= self.write_offset {
            return (Vec::new(), self.write_offset);
        }
        let skip = (start - self.base_offset) as usize;
        let take = max_bytes.min(self.data.len().saturating_sub(skip));
        let bytes: Vec<u8> = self.data.iter().skip(skip).take(take).copied().collect();
        let next_offset = start + bytes.len() as u64;
        (bytes, next_offset)
    }

    fn write_offset(&self) -> u64 {
        self.write_offset
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Exited { exit_code: Option<i32>, reason: String },
}

pub struct ProcessSession {
    pub id: String,
    pub command: String,
    buffer: StdMutex<RingBuffer>,
    state: StdMutex<SessionState>,
    last_activity: StdMutex<DateTime<Utc>>,
    writer: Mutex<Box<dyn std::io::Write + Send>>,
    /// Kept alive only to hold the PTY master fd open for the lifetime of
    /// the session; never read directly. Wrapped in a `Mutex` solely to
    /// make `ProcessSession` `Sync` (the trait object itself isn't).
    _master: StdMutex<Box<dyn MasterPty + Send>>,
    killer: StdMutex<Option<Box<dyn portable_pty::ChildKiller + Send + Sync>>>,
}

impl ProcessSession {
    fn touch(&self) {
        *self.last_activity.lock().unwrap() = Utc::now();
    }

    pub fn describe(&self) -> ProcessDescriptor {
        ProcessDescriptor {
            id: self.id.clone(),
            command: self.command.clone(),
            state: self.state.lock().unwrap().clone(),
            last_activity: *self.last_activity.lock().unwrap(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessDescriptor {
    pub id: String,
    pub command: String,
    pub state: SessionState,
    pub last_activity: DateTime<Utc>,
}

pub struct ReadResult {
    pub bytes: Vec<u8>,
    pub next_offset: u64,
    pub eof: bool,
}

/// Bounded pool of PTY-backed child-process sessions. Reaping runs as a
/// background tick owned by whoever calls `reap_idle`; the manager itself
/// holds no background task so it stays plain-data and test-friendly.
pub struct ProcessManager {
    config: ProcessManagerConfig,
    sessions: Mutex<HashMap<String, Arc<ProcessSession>>>,
    bus: Option<Arc<EventBus>>,
}

impl ProcessManager {
    pub fn new(config: ProcessManagerConfig) -> Self {
        Self { config, sessions: Mutex::new(HashMap::new()), bus: None }
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn start(&self, command: &str, argv: &[String], env: &[(String, String)]) -> Result<String> {
        let mut sessions = self.sessions.lock().await;
        if sessions.len() >= self.config.max_sessions {
            return Err(CoreError::already_exists("process.start", "active session limit"));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| CoreError::internal("process.start", anyhow::anyhow!(e.to_string())))?;

        let mut cmd = CommandBuilder::new(command);
        cmd.args(argv);
        for (k, v) in env {
            cmd.env(k, v);
        }

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| CoreError::internal("process.start", anyhow::anyhow!(e.to_string())))?;
        let killer = child.clone_killer();

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| CoreError::internal("process.start", anyhow::anyhow!(e.to_string())))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| CoreError::internal("process.start", anyhow::anyhow!(e.to_string())))?;

        let id = Uuid::new_v4().to_string();
        let session = Arc::new(ProcessSession {
            id: id.clone(),
            command: command.to_string(),
            buffer: StdMutex::new(RingBuffer::new(self.config.ring_buffer_capacity)),
            state: StdMutex::new(SessionState::Running),
            last_activity: StdMutex::new(Utc::now()),
            writer: Mutex::new(writer),
            _master: StdMutex::new(pair.master),
            killer: StdMutex::new(Some(killer)),
        });

        let (exit_tx, mut exit_rx) = mpsc::channel::<SessionState>(1);
        let reader_session = session.clone();
        std::thread::spawn(move || {
            let mut chunk = [0u8; 4096];
            loop {
                match std::io::Read::read(&mut reader, &mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        reader_session.buffer.lock().unwrap().append(&chunk[..n]);
                        reader_session.touch();
                    }
                    Err(_) => break,
                }
            }
        });

        tokio::task::spawn_blocking(move || {
            let status = child.wait();
            let state = match status {
                Ok(status) => SessionState::Exited { exit_code: Some(status.exit_code() as i32), reason: "exited".into() },
                Err(e) => SessionState::Exited { exit_code: None, reason: e.to_string() },
            };
            let _ = exit_tx.blocking_send(state);
        });

        let exit_session = session.clone();
        let bus = self.bus.clone();
        let id_for_event = id.clone();
        tokio::spawn(async move {
            if let Some(state) = exit_rx.recv().await {
                *exit_session.state.lock().unwrap() = state.clone();
                exit_session.touch();
                if let Some(bus) = bus {
                    if let SessionState::Exited { exit_code, reason } = state {
                        bus.publish(EventPayload::ProcessExited {
                            process_session_id: id_for_event,
                            exit_code,
                            reason,
                        })
                        .await;
                    }
                }
            }
        });

        sessions.insert(id.clone(), session);
        drop(sessions);

        if let Some(bus) = &self.bus {
            bus.publish(EventPayload::ProcessStarted { process_session_id: id.clone(), command: command.to_string() })
                .await;
        }

        Ok(id)
    }

    pub async fn write(&self, id: &str, bytes: &[u8]) -> Result<()> {
        let session = self.get(id).await?;
        session.touch();
        let mut writer = session.writer.lock().await;
        std::io::Write::write_all(&mut *writer, bytes).map_err(|e| CoreError::internal("process.write", anyhow::anyhow!(e)))
    }

    pub async fn read(&self, id: &str, offset: u64, max_bytes: usize) -> Result<ReadResult> {
        let session = self.get(id).await?;
        let (bytes, next_offset, drained) = {
            let buffer = session.buffer.lock().unwrap();
            let (bytes, next_offset) = buffer.read(offset, max_bytes);
            let drained = next_offset >= buffer.write_offset();
            (bytes, next_offset, drained)
        };
        let exited = matches!(*session.state.lock().unwrap(), SessionState::Exited { .. });
        Ok(ReadResult { bytes, next_offset, eof: exited && drained })
    }

    /// Sends a kill signal to the child. The first call asks the child to
    /// terminate; a second call (or a reap after the TTL) is a hard kill.
    /// `portable-pty`'s killer only exposes one signal strength, so both
    /// calls currently resolve to the same kill — tracked as a gap until a
    /// graceful-then-forceful two-stage stop is worth the platform-specific
    /// signal plumbing it requires.
    pub async fn stop(&self, id: &str) -> Result<()> {
        let session = self.get(id).await?;
        if let Some(killer) = session.killer.lock().unwrap().as_mut() {
            let _ = killer.kill();
        }
        Ok(())
    }

    pub async fn list(&self) -> Vec<ProcessDescriptor> {
        self.sessions.lock().await.values().map(|s| s.describe()).collect()
    }

    pub async fn describe(&self, id: &str) -> Result<ProcessDescriptor> {
        Ok(self.get(id).await?.describe())
    }

    async fn get(&self, id: &str) -> Result<Arc<ProcessSession>> {
        self.sessions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("process.get", id))
    }

    /// Scans every tracked session and stops+removes any idle for longer
    /// than `SessionTTL`. Intended to be driven by a periodic tick owned by
    /// the composition root; kept outside the manager so tests can invoke
    /// it deterministically without a real timer.
    pub async fn reap_idle(&self) -> usize {
        let now = Utc::now();
        let stale: Vec<String> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .filter(|(_, s)| now.signed_duration_since(*s.last_activity.lock().unwrap()) > self.config.session_ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &stale {
            let _ = self.stop(id).await;
            self.sessions.lock().await.remove(id);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn shell_command() -> (&'static str, Vec<String>) {
        if cfg!(windows) {
            ("cmd", vec!["/C".into(), "echo hi && timeout 5".into()])
        } else {
            ("sh", vec!["-c".into(), "echo hi; sleep 5".into()])
        }
    }

    #[tokio::test]
    async fn start_then_read_observes_child_output() {
        let manager = ProcessManager::new(ProcessManagerConfig::default());
        let (cmd, argv) = shell_command();
        let id = manager.start(cmd, &argv, &[]).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(200)).await;
        let result = manager.read(&id, 0, 4096).await.unwrap();
        assert!(String::from_utf8_lossy(&result.bytes).contains("hi"));
        assert!(!result.eof, "child is still sleeping");

        manager.stop(&id).await.unwrap();
    }

    #[tokio::test]
    async fn start_rejects_when_at_capacity() {
        let manager = ProcessManager::new(ProcessManagerConfig {
            max_sessions: 1,
            ..ProcessManagerConfig::default()
        });
        let (cmd, argv) = shell_command();
        let first = manager.start(cmd, &argv, &[]).await.unwrap();

        let err = manager.start(cmd, &argv, &[]).await.unwrap_err();
        assert_eq!(err.kind(), locus_core::ErrorKind::AlreadyExists);

        manager.stop(&first).await.unwrap();
    }

    #[tokio::test]
    async fn capacity_frees_up_after_a_session_is_removed() {
        let manager = ProcessManager::new(ProcessManagerConfig {
            max_sessions: 1,
            ..ProcessManagerConfig::default()
        });
        let (cmd, argv) = shell_command();
        let first = manager.start(cmd, &argv, &[]).await.unwrap();
        manager.stop(&first).await.unwrap();
        manager.sessions.lock().await.remove(&first);

        let second = manager.start(cmd, &argv, &[]).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn reap_idle_removes_sessions_past_ttl() {
        let manager = ProcessManager::new(ProcessManagerConfig {
            session_ttl: chrono::Duration::milliseconds(1),
            ..ProcessManagerConfig::default()
        });
        let (cmd, argv) = shell_command();
        let id = manager.start(cmd, &argv, &[]).await.unwrap();

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        let reaped = manager.reap_idle().await;
        assert_eq!(reaped, 1);
        assert!(manager.describe(&id).await.is_err());
    }

    #[test]
    fn ring_buffer_clamps_evicted_offsets_upward() {
        let mut buffer = RingBuffer::new(4);
        buffer.append(b"abcdef");
        // "ab" was evicted; base_offset is now 2.
        let (bytes, next) = buffer.read(0, 10);
        assert_eq!(bytes, b"cdef");
        assert_eq!(next, 6);
    }

    #[test]
    fn ring_buffer_read_past_write_offset_is_empty() {
        let mut buffer = RingBuffer::new(8);
        buffer.append(b"hi");
        let (bytes, next) = buffer.read(2, 10);
        assert!(bytes.is_empty());
        assert_eq!(next, 2);
    }
}
