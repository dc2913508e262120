//! `locus run`: the composition root. Wires a provider registry, tool
//! registry, and agent into a [`locus_router::Router`], then drives an
//! interactive stdin/stdout loop through it — one [`InboundMessage`] per
//! line, one [`OutboundMessage`] printed per reply.

use std::io::{BufRead, Write};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use locus_core::{EventBus, SessionConfig, SessionKey, SessionManager};
use locus_llms::{HttpChatProvider, Provider};
use locus_router::{InboundMessage, RouterBuilder};
use locus_runtime::{Agent, AgentConfigBuilder};
use locus_toolbus::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::output;

/// Built-in provider id → (base URL, API key env var). Kept in sync with
/// `providers.rs`'s preset table; `anthropic` stays out of both for the
/// same reason — `HttpChatProvider` only speaks the OpenAI-compatible
/// `chat/completions` wire shape.
const PRESETS: &[(&str, &str, &str)] = &[
    ("zai", "https://api.z.ai/api/paas/v4", "ZAI_API_KEY"),
    ("openai", "https://api.openai.com/v1", "OPENAI_API_KEY"),
];

fn resolve_provider(provider_id: &str) -> Result<Arc<dyn Provider>> {
    let (id, base_url, env_var) = PRESETS
        .iter()
        .find(|(id, _, _)| *id == provider_id)
        .ok_or_else(|| {
            anyhow!(
                "no built-in provider preset for '{provider_id}' (available: {})",
                PRESETS.iter().map(|(id, _, _)| *id).collect::<Vec<_>>().join(", ")
            )
        })?;

    let provider = HttpChatProvider::from_env(*id, *base_url, env_var)
        .map_err(|e| anyhow!("provider '{provider_id}' is not configured: {e}"))?;
    Ok(Arc::new(provider))
}

pub async fn handle(model: Option<String>, provider: Option<String>) -> Result<()> {
    let repo_root = std::env::current_dir()?;

    let base = AgentConfigBuilder::from_env(repo_root.clone())
        .map_err(|e| anyhow!("invalid agent configuration: {e}"))?;

    let agent_config = AgentConfigBuilder::new(repo_root.clone())
        .with_model(model.unwrap_or(base.model))
        .with_provider(provider.unwrap_or(base.provider))
        .with_max_iterations(base.max_iterations)
        .with_max_delegate_fan_out(base.max_delegate_fan_out)
        .with_max_tokens(base.max_tokens)
        .with_context_guard(base.context_guard)
        .with_compressor(base.compressor)
        .with_sandbox(base.sandbox)
        .build()
        .map_err(|e| anyhow!("invalid agent configuration: {e}"))?;

    let provider_impl = resolve_provider(&agent_config.provider)?;

    let bus = Arc::new(EventBus::new());
    let tools = Arc::new(ToolRegistry::new());
    let session_manager = Arc::new(SessionManager::in_memory());

    let agent = Arc::new(Agent::new(agent_config.clone(), provider_impl, tools, bus.clone()));

    let session_config = SessionConfig::new(agent_config.model.clone(), agent_config.provider.clone());
    let router = RouterBuilder::new(session_manager, bus, repo_root, session_config)
        .with_agent("default", agent)
        .build();

    output::header(&format!(
        "locus run — model {} via {}",
        agent_config.model, agent_config.provider
    ));
    output::dim("Type a message and press enter. Ctrl-D to exit.");

    let session_key = SessionKey::new("cli", "interactive");
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();

    write!(stdout, "> ")?;
    stdout.flush()?;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            write!(stdout, "> ")?;
            stdout.flush()?;
            continue;
        }

        let inbound = InboundMessage::new(session_key.clone(), "user", line);
        match router.handle(inbound, CancellationToken::new()).await {
            Ok(reply) => {
                if reply.is_error {
                    output::error(&reply.text);
                } else if reply.offline_sourced {
                    output::warning(&reply.text);
                } else {
                    output::dim(&reply.text);
                }
            }
            Err(e) => output::error(&e.to_string()),
        }

        write!(stdout, "> ")?;
        stdout.flush()?;
    }

    Ok(())
}
