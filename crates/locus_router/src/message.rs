//! Wire-level shapes a [`crate::Router`] accepts from and hands back to a
//! Channel (§6 External Interfaces): one inbound message per turn, one
//! composed outbound reply.

use locus_core::SessionKey;
use serde_json::Value as JsonValue;

/// A single message arriving from a Channel, already addressed to a session.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub session_key: SessionKey,
    pub from: String,
    pub text: String,
    pub metadata: JsonValue,
}

impl InboundMessage {
    pub fn new(session_key: SessionKey, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            session_key,
            from: from.into(),
            text: text.into(),
            metadata: JsonValue::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: JsonValue) -> Self {
        self.metadata = metadata;
        self
    }
}

/// The Router's reply to a Channel. `is_error` marks a short-circuited reply
/// (middleware block, unknown agent, ...) rather than a normal agent turn;
/// `offline_sourced` marks a reply produced by a local fallback provider or
/// by the offline queue rather than the session's configured provider.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub text: String,
    pub is_error: bool,
    pub offline_sourced: bool,
}

impl OutboundMessage {
    pub fn reply(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false, offline_sourced: false }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true, offline_sourced: false }
    }

    pub fn offline(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false, offline_sourced: true }
    }
}
