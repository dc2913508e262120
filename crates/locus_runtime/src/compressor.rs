//! Compressor (C8): collapses the old prefix of a session's transcript into
//! a single synthetic summary turn once the Context Guard calls for it.
//!
//! Contract: `[compressed summary turn] + [kept tail turns]`. Idempotent —
//! calling this again before any new turn has been appended past the kept
//! tail is a no-op, so the reasoning loop can call it unconditionally
//! whenever the Guard flags a session without double-summarizing.

use locus_core::{ContentBlock, Session, Turn};
use locus_llms::{ChatRequest, Message, Provider};

use crate::config::CompressorConfig;
use crate::error::Result;

const SUMMARIZE_SYSTEM_PROMPT: &str = "Summarize the following conversation between a user and \
    an autonomous coding agent. Preserve the user's goals, decisions made, files touched, and any \
    unresolved questions. Be concise; this summary replaces the full transcript for all future turns.";

/// Compresses `session` in place if it has grown past `config.keep_recent`
/// turns. A no-op if the transcript is already at or below that size.
pub async fn compress(
    session: &mut Session,
    provider: &dyn Provider,
    model: &str,
    config: &CompressorConfig,
) -> Result<()> {
    let keep_recent = config.keep_recent;

    if session.turns.len() <= keep_recent + 1 {
        return Ok(());
    }

    let split_at = session.turns.len() - keep_recent;
    let transcript = render_prefix(&session.turns[..split_at]);

    let request = ChatRequest::new(model, vec![Message::system(SUMMARIZE_SYSTEM_PROMPT), Message::user(transcript)])
        .with_max_tokens(1024);

    let response = provider.chat(request).await?;
    let summary_turn = Turn::assistant()
        .with_block(ContentBlock::text(response.message.content))
        .mark_compressed();

    let tail: Vec<Turn> = session.turns[split_at..].to_vec();
    session.turns = std::iter::once(summary_turn).chain(tail).collect();

    Ok(())
}

fn render_prefix(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("[{:?}] {}", turn.role, turn.text()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use locus_core::{ContentBlock, SessionConfig, SessionKey};
    use locus_llms::{ChatResponse, Usage};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn chat(&self, _request: ChatRequest) -> locus_llms::Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatResponse {
                message: Message::assistant("summary of the above"),
                usage: Usage::default(),
                tool_calls: Vec::new(),
            })
        }
    }

    fn session_with_turns(n: usize) -> Session {
        let mut session = Session::new(
            SessionKey::new("cli", "s1"),
            PathBuf::from("/repo"),
            SessionConfig::new("claude-sonnet-4-20250514", "anthropic"),
        );
        for i in 0..n {
            session.add_turn(Turn::user().with_block(ContentBlock::text(format!("message {i}"))));
        }
        session
    }

    #[tokio::test]
    async fn compress_is_a_no_op_under_keep_recent() {
        let provider = StubProvider { calls: AtomicUsize::new(0) };
        let mut session = session_with_turns(3);
        let config = CompressorConfig { keep_recent: 6 };
        compress(&mut session, &provider, "claude-sonnet-4-20250514", &config).await.unwrap();
        assert_eq!(session.turn_count(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn compress_collapses_prefix_and_keeps_tail() {
        let provider = StubProvider { calls: AtomicUsize::new(0) };
        let mut session = session_with_turns(10);
        let config = CompressorConfig { keep_recent: 4 };
        compress(&mut session, &provider, "claude-sonnet-4-20250514", &config).await.unwrap();

        assert_eq!(session.turn_count(), 5); // 1 summary + 4 kept
        assert!(session.turns[0].compressed);
        assert_eq!(session.turns[0].text(), "summary of the above");
        assert_eq!(session.turns[4].text(), "message 9");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn compress_is_idempotent_with_no_new_turns() {
        let provider = StubProvider { calls: AtomicUsize::new(0) };
        let mut session = session_with_turns(10);
        let config = CompressorConfig { keep_recent: 4 };
        compress(&mut session, &provider, "claude-sonnet-4-20250514", &config).await.unwrap();
        let after_first = session.turns.clone();

        compress(&mut session, &provider, "claude-sonnet-4-20250514", &config).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.turns.len(), after_first.len());
    }
}
