//! Context Builder (C7) and Context Guard.
//!
//! Turns a [`Session`]'s transcript into the flat [`Message`] list a
//! [`Provider`] understands, and decides when that transcript has grown
//! large enough that the Compressor needs to run before the next call.

mod messages;
mod prompt;

pub use messages::build_messages;
pub use prompt::build_system_prompt;

use locus_core::Session;
use locus_toolbus::ToolDescriptor;

use crate::config::ContextGuardConfig;

/// Estimates token cost of arbitrary text. Pluggable so a provider-accurate
/// tokenizer can replace the default heuristic without touching callers.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> u64;
}

/// Roughly 4 characters per token — the same rule of thumb the donor used,
/// kept as the default until a provider-specific tokenizer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct CharCountTokenCounter;

impl TokenCounter for CharCountTokenCounter {
    fn count(&self, text: &str) -> u64 {
        (text.len() as u64).div_ceil(4)
    }
}

/// Sums the estimated token cost of every message the Context Builder would
/// hand to the provider for `session` right now (system prompt included).
pub fn estimate_session_tokens(
    session: &Session,
    tools: &[ToolDescriptor],
    counter: &dyn TokenCounter,
) -> u64 {
    build_messages(session, tools)
        .iter()
        .map(|m| counter.count(&m.content))
        .sum()
}

/// Decides whether a session's transcript has crossed the configured
/// compression threshold.
pub struct ContextGuard {
    config: ContextGuardConfig,
    counter: std::sync::Arc<dyn TokenCounter>,
}

impl ContextGuard {
    pub fn new(config: ContextGuardConfig, counter: std::sync::Arc<dyn TokenCounter>) -> Self {
        Self { config, counter }
    }

    pub fn should_compress(&self, session: &Session, tools: &[ToolDescriptor]) -> bool {
        estimate_session_tokens(session, tools, self.counter.as_ref()) > self.config.threshold_tokens()
    }

    /// True once even a freshly-compressed transcript won't fit — the point
    /// at which the reasoning loop must give up with `ContextOverflow`
    /// rather than compress again.
    pub fn is_overflowing(&self, session: &Session, tools: &[ToolDescriptor]) -> bool {
        let usable = self.config.max_tokens.saturating_sub(self.config.reserve_tokens);
        estimate_session_tokens(session, tools, self.counter.as_ref()) > usable
    }
}

/// Most recent distinct file paths touched by tool calls in the transcript,
/// most-recent first, capped at `limit`. Used to ground the system prompt
/// in what the agent has actually been working on instead of just its own
/// summary of the conversation.
pub fn extract_recent_files(session: &Session, limit: usize) -> Vec<String> {
    use locus_core::ContentBlock;

    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();

    for turn in session.turns.iter().rev() {
        for block in &turn.blocks {
            if let ContentBlock::ToolUse { tool_use } = block {
                if let Some(path) = &tool_use.file_path {
                    let path_str = path.to_string_lossy().to_string();
                    if seen.insert(path_str.clone()) {
                        files.push(path_str);
                    }
                }
            }
        }
        if files.len() >= limit {
            break;
        }
    }

    files.truncate(limit);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use locus_core::{ContentBlock, Role, SessionConfig, SessionKey, Turn};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn session_with(turns: Vec<Turn>) -> Session {
        let mut session = Session::new(
            SessionKey::new("cli", "s1"),
            PathBuf::from("/repo"),
            SessionConfig::new("claude-sonnet-4-20250514", "anthropic"),
        );
        for turn in turns {
            session.add_turn(turn);
        }
        session
    }

    #[test]
    fn char_count_token_counter_rounds_up() {
        let counter = CharCountTokenCounter;
        assert_eq!(counter.count(""), 0);
        assert_eq!(counter.count("ab"), 1);
        assert_eq!(counter.count("abcd"), 1);
        assert_eq!(counter.count("abcde"), 2);
    }

    #[test]
    fn guard_flags_compression_past_threshold() {
        let config = ContextGuardConfig { max_tokens: 100, reserve_tokens: 10, safety_margin: 0.5 };
        let guard = ContextGuard::new(config, Arc::new(CharCountTokenCounter));
        let small = session_with(vec![Turn::user().with_block(ContentBlock::text("hi"))]);
        let big = session_with(vec![Turn::user().with_block(ContentBlock::text("x".repeat(1000)))]);
        assert!(!guard.should_compress(&small, &[]));
        assert!(guard.should_compress(&big, &[]));
    }

    #[test]
    fn guard_overflow_is_stricter_than_compress_threshold() {
        let config = ContextGuardConfig { max_tokens: 100, reserve_tokens: 10, safety_margin: 0.1 };
        let guard = ContextGuard::new(config, Arc::new(CharCountTokenCounter));
        let mid = session_with(vec![Turn::user().with_block(ContentBlock::text("x".repeat(120)))]);
        assert!(guard.should_compress(&mid, &[]));
        assert!(!guard.is_overflowing(&mid, &[]));
    }

    #[test]
    fn extract_recent_files_dedupes_and_orders_most_recent_first() {
        let tool_a = locus_core::ToolUse::new("1", "edit_file", serde_json::json!({}))
            .with_file_path(PathBuf::from("a.rs"));
        let tool_b = locus_core::ToolUse::new("2", "edit_file", serde_json::json!({}))
            .with_file_path(PathBuf::from("b.rs"));
        let tool_a_again = locus_core::ToolUse::new("3", "edit_file", serde_json::json!({}))
            .with_file_path(PathBuf::from("a.rs"));

        let session = session_with(vec![
            Turn::new(Role::Assistant).with_block(ContentBlock::tool_use(tool_a)),
            Turn::new(Role::Assistant).with_block(ContentBlock::tool_use(tool_b)),
            Turn::new(Role::Assistant).with_block(ContentBlock::tool_use(tool_a_again)),
        ]);

        let recent = extract_recent_files(&session, 5);
        assert_eq!(recent, vec!["a.rs".to_string(), "b.rs".to_string()]);
    }
}
