//! The `Tool` capability interface shared by every tool the registry exposes.

use async_trait::async_trait;
use locus_core::{SessionKey, ToolResultData};
use serde_json::Value as JsonValue;

/// Per-call context threaded through `Tool::execute`. Tools that need to
/// correlate their work with the owning session (e.g. a process-manager
/// backed tool) read this instead of receiving a raw session id.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub session_key: SessionKey,
    pub call_id: String,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn parameters_schema(&self) -> JsonValue;

    /// Whether invocation must pass through the Approver before the tool
    /// body runs. Mutating tools (shell, file writes, process control)
    /// override this to `true`; read-only tools may leave the default.
    fn requires_approval(&self) -> bool {
        false
    }

    async fn execute(&self, args: JsonValue, ctx: &ToolContext) -> ToolResultData;
}
