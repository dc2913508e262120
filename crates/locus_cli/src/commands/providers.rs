//! `locus providers` subcommands.

use anyhow::{anyhow, Result};
use locus_llms::{ChatRequest, HttpChatProvider, Message, Provider, ProviderRegistry};

use crate::cli::ProvidersAction;
use crate::output;

/// Built-in provider id → (base URL, API key env var). `anthropic` is
/// deliberately absent: its wire format isn't the OpenAI-compatible
/// `chat/completions` shape `HttpChatProvider` speaks, so listing it here
/// would silently misrepresent what this binary can actually talk to.
const PRESETS: &[(&str, &str, &str)] = &[
    ("zai", "https://api.z.ai/api/paas/v4", "ZAI_API_KEY"),
    ("openai", "https://api.openai.com/v1", "OPENAI_API_KEY"),
];

fn build_registry() -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for (id, base_url, env_var) in PRESETS {
        if let Ok(provider) = HttpChatProvider::from_env(*id, *base_url, env_var) {
            let _ = registry.register(*id, std::sync::Arc::new(provider));
        }
    }
    registry
}

pub async fn handle(action: ProvidersAction) -> Result<()> {
    match action {
        ProvidersAction::List => list(),
        ProvidersAction::Info { provider } => info(&provider),
        ProvidersAction::Test { provider } => test(&provider).await,
        ProvidersAction::Models { provider } => models(&provider),
    }
}

fn list() -> Result<()> {
    let registry = build_registry();
    let configured = registry.list();

    output::header("Registered Providers");

    let mut table = output::table();
    output::table_header(&mut table, "Provider", "Status");

    let rows: Vec<(String, String)> = PRESETS
        .iter()
        .map(|(id, _, env_var)| {
            let status = if configured.iter().any(|c| c == id) {
                "configured".to_string()
            } else {
                format!("missing {env_var}")
            };
            (id.to_string(), status)
        })
        .collect();

    for (id, status) in &rows {
        output::table_row(&mut table, id, status);
    }
    let items: Vec<_> = rows.iter().map(|(id, status)| (id.as_str(), status.as_str())).collect();
    output::table_print(&table, &items);

    Ok(())
}

fn info(provider_id: &str) -> Result<()> {
    let registry = build_registry();
    let provider = registry.get(provider_id).map_err(|e| anyhow!("{e}"))?;

    output::header(&format!("Provider: {}", provider_id));
    output::kv("name", provider.name());
    output::kv("status", "configured");

    Ok(())
}

async fn test(provider_id: &str) -> Result<()> {
    let registry = build_registry();
    let provider = registry.get(provider_id).map_err(|e| anyhow!("{e}"))?;

    let spinner = output::spinner(&format!("Testing {} connectivity...", provider_id));

    let request = ChatRequest::new(
        default_model_for(provider_id),
        vec![Message::user("ping")],
    )
    .with_max_tokens(8);

    match provider.chat(request).await {
        Ok(_) => {
            output::spinner_success(&spinner, &format!("{} is reachable", provider_id));
            Ok(())
        }
        Err(e) => {
            output::spinner_error(&spinner, &format!("{} connection failed", provider_id));
            Err(anyhow!("Provider test failed: {}", e))
        }
    }
}

fn models(provider_id: &str) -> Result<()> {
    // No provider in this binary exposes a model-listing endpoint; the
    // model is a free-form string passed straight through to the wire
    // request instead.
    output::dim(&format!(
        "{} does not support model listing; pass --model directly to `locus run`",
        provider_id
    ));
    Ok(())
}

fn default_model_for(provider_id: &str) -> &'static str {
    match provider_id {
        "zai" => "glm-4-plus",
        "openai" => "gpt-4o-mini",
        _ => "default",
    }
}
