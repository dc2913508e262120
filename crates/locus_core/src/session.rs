use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::turn::Turn;

/// A session's composite identity: (channel-name, transport-session-id).
/// Two inbound messages resolve to the same session iff their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub channel: String,
    pub transport_session_id: String,
}

impl SessionKey {
    pub fn new(channel: impl Into<String>, transport_session_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            transport_session_id: transport_session_id.into(),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel, self.transport_session_id)
    }
}

/// Per-session overrides that don't belong on every turn: an explicit agent
/// override (bypassing the Router's normal selection strategy) and a locale
/// hint for reply formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id_override: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Waiting,
    Running,
    Completed,
    Failed { error: String },
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Active
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxPolicy {
    pub allowed_paths: Vec<PathBuf>,
    pub command_timeout_secs: u64,
}

impl Default for SandboxPolicy {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            command_timeout_secs: 60,
        }
    }
}

impl SandboxPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_path(mut self, path: PathBuf) -> Self {
        self.allowed_paths.push(path);
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub model: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_turns: Option<u32>,
    pub sandbox_policy: SandboxPolicy,
}

impl SessionConfig {
    pub fn new(model: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            provider: provider.into(),
            max_turns: None,
            sandbox_policy: SandboxPolicy::default(),
        }
    }

    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = Some(max);
        self
    }

    pub fn with_sandbox_policy(mut self, policy: SandboxPolicy) -> Self {
        self.sandbox_policy = policy;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub key: SessionKey,
    pub status: SessionStatus,
    pub repo_root: PathBuf,
    pub config: SessionConfig,
    pub metadata: SessionMetadata,
    pub turns: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(key: SessionKey, repo_root: PathBuf, config: SessionConfig) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            key,
            status: SessionStatus::Active,
            repo_root,
            config,
            metadata: SessionMetadata::default(),
            turns: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    /// Appends a turn and bumps `last_activity`. The only mutation path for
    /// `turns` — the transcript is append-only by construction.
    pub fn add_turn(&mut self, turn: Turn) {
        self.turns.push(turn);
        self.last_activity = Utc::now();
    }

    pub fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Running)
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// Whether this session has been idle (no turns appended) longer than `ttl`.
    pub fn is_idle_since(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.last_activity) > ttl
    }
}
