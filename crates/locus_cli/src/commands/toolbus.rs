//! `locus toolbus` subcommands.

use anyhow::{anyhow, Result};
use locus_core::SessionKey;
use locus_toolbus::{ToolRegistry, ToolScope};
use serde_json::Value as JsonValue;

use crate::cli::ToolbusAction;
use crate::output;

/// No concrete tools ship registered by default; this CLI view exists so
/// `locus toolbus list/info` stays honest about that rather than pretending
/// a populated catalog exists when nothing has registered into it yet.
fn registry() -> ToolRegistry {
    ToolRegistry::new()
}

pub async fn handle(action: ToolbusAction) -> Result<()> {
    let registry = registry();

    match action {
        ToolbusAction::List => list(&registry),
        ToolbusAction::Info { tool } => info(&registry, &tool),
        ToolbusAction::Call { tool, args } => call(&registry, &tool, &args).await,
    }
}

fn list(registry: &ToolRegistry) -> Result<()> {
    let tools = registry.list();

    if tools.is_empty() {
        output::dim("No tools registered");
        return Ok(());
    }

    output::header("Registered Tools");

    let mut table = output::table();
    output::table_header(&mut table, "Tool", "Description");

    let items: Vec<_> = tools
        .iter()
        .map(|t| {
            output::table_row(&mut table, &t.name, &t.description);
            (t.name.as_str(), t.description.as_str())
        })
        .collect();

    output::table_print(&table, &items);

    Ok(())
}

fn info(registry: &ToolRegistry, tool_name: &str) -> Result<()> {
    let tools = registry.list();
    let tool = tools
        .iter()
        .find(|t| t.name == tool_name)
        .ok_or_else(|| anyhow!("Tool not found: {}", tool_name))?;

    output::header(&format!("Tool: {}", tool.name));
    output::dim(&tool.description);
    println!();
    output::header("Parameters");
    output::json_pretty(&tool.parameters);

    Ok(())
}

async fn call(registry: &ToolRegistry, tool_name: &str, args_str: &str) -> Result<()> {
    let args: JsonValue =
        serde_json::from_str(args_str).map_err(|e| anyhow!("Invalid JSON arguments: {}", e))?;

    let spinner = output::spinner(&format!("Calling {}...", tool_name));

    let session_key = SessionKey::new("cli", "toolbus-call");
    let result = registry
        .execute(tool_name, args, &session_key, "cli-call", &ToolScope::unrestricted())
        .await;

    if result.is_error {
        output::spinner_error(&spinner, &format!("{} failed", tool_name));
    } else {
        output::spinner_success(&spinner, "Completed");
    }
    println!();
    output::json_pretty(&result.output);

    Ok(())
}
