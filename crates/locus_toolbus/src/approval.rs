//! The Approver policy interface (§4.11) and its audit-log counterpart.
//!
//! These are the two capability seams the Tool Registry (C5) consults on
//! every invocation; concrete policy (always-allow, human-in-the-loop,
//! allowlist) lives outside this crate and is injected at construction.

use async_trait::async_trait;
use locus_core::SessionKey;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// How long a `RequireUser` decision waits for a human response before it
/// is treated as a timeout-Deny.
pub const DEFAULT_REQUIRE_USER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Deny { reason: String },
    RequireUser,
}

#[async_trait]
pub trait Approver: Send + Sync {
    async fn decide(&self, session_key: &SessionKey, tool_name: &str, args: &JsonValue) -> Decision;
}

/// Approves everything. Suitable for tests and for deployments that gate
/// approval elsewhere (e.g. at the Router's middleware layer).
pub struct AlwaysApprove;

#[async_trait]
impl Approver for AlwaysApprove {
    async fn decide(&self, _session_key: &SessionKey, _tool_name: &str, _args: &JsonValue) -> Decision {
        Decision::Approve
    }
}

/// Approves everything except a fixed set of recognizably destructive
/// `bash` commands and edits to recognizably sensitive file paths, which it
/// routes to [`Decision::RequireUser`].
///
/// # Security Warning
/// This is a seatbelt, not a sandbox: the patterns below are substring
/// matches against the raw command/path text and are trivially bypassed via
/// extra whitespace, pipes (`echo "rm -rf /" | sh`), shell aliases, variable
/// expansion, or backslash escaping. It catches accidental self-harm, not an
/// adversarial agent. Real isolation belongs at the sandbox layer
/// (containers, user namespaces, seccomp), not in this string match.
pub struct HeuristicApprover;

impl HeuristicApprover {
    const DANGEROUS_BASH_PATTERNS: &'static [&'static str] = &[
        "rm ",
        "rm -",
        "rmdir",
        "git push",
        "git reset --hard",
        "drop",
        "truncate",
        "delete from",
        ":(){ :|:& };:",
        "mkfs",
        "dd if=",
        "> /dev/",
        "chmod -r 777",
        "chown -r",
    ];

    const SENSITIVE_PATH_PATTERNS: &'static [&'static str] = &[
        ".env",
        ".ssh",
        ".gnupg",
        "credentials",
        "secrets",
        "id_rsa",
        "authorized_keys",
    ];

    fn bash_is_dangerous(args: &JsonValue) -> bool {
        let Some(cmd) = args.get("command").and_then(|c| c.as_str()) else {
            return false;
        };
        let cmd_lower = cmd.to_lowercase();
        Self::DANGEROUS_BASH_PATTERNS.iter().any(|p| cmd_lower.contains(p))
    }

    fn path_is_sensitive(args: &JsonValue) -> bool {
        let path = args
            .get("file_path")
            .or_else(|| args.get("path"))
            .and_then(|p| p.as_str());
        let Some(path) = path else {
            return false;
        };
        let path_lower = path.to_lowercase();
        Self::SENSITIVE_PATH_PATTERNS.iter().any(|p| path_lower.contains(p))
    }
}

#[async_trait]
impl Approver for HeuristicApprover {
    async fn decide(&self, _session_key: &SessionKey, tool_name: &str, args: &JsonValue) -> Decision {
        let flagged = match tool_name {
            "bash" => Self::bash_is_dangerous(args),
            "edit_file" | "create_file" => Self::path_is_sensitive(args),
            _ => false,
        };

        if flagged {
            Decision::RequireUser
        } else {
            Decision::Approve
        }
    }
}

#[derive(Debug)]
pub struct AuditEvent {
    pub session_key: SessionKey,
    pub tool_name: String,
    pub call_id: String,
    pub phase: AuditPhase,
}

#[derive(Debug)]
pub enum AuditPhase {
    /// Pre-invocation: records an argument fingerprint, not the raw args,
    /// so audit logs don't become a secret-exfiltration vector.
    PreInvoke { argument_fingerprint: String },
    PostInvoke { is_error: bool, duration_ms: u64, result_preview: String },
    Denied { reason: String },
}

#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn log(&self, event: AuditEvent);
}

/// In-memory audit log for tests and for CLI sessions with no external
/// audit sink configured.
#[derive(Default)]
pub struct InMemoryAuditLogger {
    events: tokio::sync::Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditLogger for InMemoryAuditLogger {
    async fn log(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }
}

/// SHA-256 of the canonical JSON encoding, truncated for log readability.
/// Mirrors the audit design's stated purpose: detect repeated/identical
/// calls without persisting the argument payload itself.
pub fn fingerprint(args: &JsonValue) -> String {
    use sha2::{Digest, Sha256};
    let canonical = serde_json::to_vec(args).unwrap_or_default();
    let digest = Sha256::digest(&canonical);
    format!("{:x}", digest)[..16].to_string()
}

pub fn truncate_preview(value: &JsonValue, max_len: usize) -> String {
    let rendered = value.to_string();
    if rendered.len() <= max_len {
        rendered
    } else {
        format!("{}…", &rendered[..max_len])
    }
}

impl Clone for AuditEvent {
    fn clone(&self) -> Self {
        Self {
            session_key: self.session_key.clone(),
            tool_name: self.tool_name.clone(),
            call_id: self.call_id.clone(),
            phase: self.phase.clone(),
        }
    }
}

impl Clone for AuditPhase {
    fn clone(&self) -> Self {
        match self {
            AuditPhase::PreInvoke { argument_fingerprint } => {
                AuditPhase::PreInvoke { argument_fingerprint: argument_fingerprint.clone() }
            }
            AuditPhase::PostInvoke { is_error, duration_ms, result_preview } => AuditPhase::PostInvoke {
                is_error: *is_error,
                duration_ms: *duration_ms,
                result_preview: result_preview.clone(),
            },
            AuditPhase::Denied { reason } => AuditPhase::Denied { reason: reason.clone() },
        }
    }
}
