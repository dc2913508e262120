//! Tool Registry (C5): name→tool map with approval gating, audit logging,
//! and per-agent scoping, fronting whatever tools are registered.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use locus_core::{CoreError, EventBus, EventPayload, Result, SessionKey, ToolResultData};
use serde_json::Value as JsonValue;
use tokio::time::timeout;

use crate::approval::{fingerprint, truncate_preview, AlwaysApprove, AuditEvent, AuditLogger, AuditPhase, Decision, InMemoryAuditLogger, DEFAULT_REQUIRE_USER_TIMEOUT};
use crate::tool::{Tool, ToolContext};

#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

/// An allowlist restricting which tool names a particular agent/session may
/// invoke. `None` on the registry means no scoping is active.
#[derive(Debug, Clone, Default)]
pub struct ToolScope {
    allowed: Option<HashSet<String>>,
}

impl ToolScope {
    pub fn unrestricted() -> Self {
        Self { allowed: None }
    }

    pub fn allowlist(names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { allowed: Some(names.into_iter().map(Into::into).collect()) }
    }

    pub fn permits(&self, name: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(set) => set.contains(name),
        }
    }
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    approver: Arc<dyn crate::approval::Approver>,
    audit: Arc<dyn AuditLogger>,
    bus: Option<Arc<EventBus>>,
    require_user_timeout: std::time::Duration,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            approver: Arc::new(AlwaysApprove),
            audit: Arc::new(InMemoryAuditLogger::new()),
            bus: None,
            require_user_timeout: DEFAULT_REQUIRE_USER_TIMEOUT,
        }
    }

    pub fn with_approver(mut self, approver: Arc<dyn crate::approval::Approver>) -> Self {
        self.approver = approver;
        self
    }

    pub fn with_audit_logger(mut self, audit: Arc<dyn AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Registers `tool` under its own name. Fails with `AlreadyExists` if
    /// the name is already bound, leaving the existing registration intact.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::already_exists("tool.register", name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools.get(name).cloned().ok_or_else(|| CoreError::not_found("tool.get", name))
    }

    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<_> = self
            .tools
            .values()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Runs the scoping → approval → audit(pre) → invoke → audit(post)
    /// pipeline for a single tool call. Each stage's failure is terminal:
    /// a deny or scope rejection never reaches the tool body.
    pub async fn execute(
        &self,
        name: &str,
        args: JsonValue,
        session_key: &SessionKey,
        call_id: &str,
        scope: &ToolScope,
    ) -> ToolResultData {
        if !scope.permits(name) {
            return ToolResultData::error(
                serde_json::json!({ "error": format!("tool '{name}' is not in the active scope") }),
                0,
            );
        }

        let tool = match self.get(name) {
            Ok(tool) => tool,
            Err(_) => {
                return ToolResultData::error(serde_json::json!({ "error": format!("tool not found: {name}") }), 0);
            }
        };

        // Every tool, gated or not, passes through the Approver: it is the
        // Approver's job to decide per tool/args whether gating applies, not
        // the registry's. `tool.requires_approval()` is advisory metadata a
        // concrete Approver may consult, not a bypass switch.
        let decision = self.approver.decide(session_key, name, &args).await;
        let decision = match decision {
            Decision::RequireUser => {
                if let Some(bus) = &self.bus {
                    bus.publish(EventPayload::RouterError {
                        session_key: session_key.clone(),
                        reason: format!("tool '{name}' requires user approval"),
                    })
                    .await;
                }
                // No interactive response channel is wired into the registry
                // itself (that lives at the Router/CLI layer); absent one, a
                // RequireUser decision always times out and denies.
                let _: std::result::Result<(), tokio::time::error::Elapsed> =
                    timeout(self.require_user_timeout, std::future::pending::<()>()).await;
                Decision::Deny {
                    reason: format!("approval timed out after {}s", self.require_user_timeout.as_secs()),
                }
            }
            other => other,
        };

        if let Decision::Deny { reason } = decision {
            self.audit
                .log(AuditEvent {
                    session_key: session_key.clone(),
                    tool_name: name.to_string(),
                    call_id: call_id.to_string(),
                    phase: AuditPhase::Denied { reason: reason.clone() },
                })
                .await;
            return ToolResultData::error(serde_json::json!({ "error": reason }), 0);
        }

        self.audit
            .log(AuditEvent {
                session_key: session_key.clone(),
                tool_name: name.to_string(),
                call_id: call_id.to_string(),
                phase: AuditPhase::PreInvoke { argument_fingerprint: fingerprint(&args) },
            })
            .await;

        let ctx = ToolContext { session_key: session_key.clone(), call_id: call_id.to_string() };
        let start = Instant::now();
        let result = tool.execute(args, &ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.audit
            .log(AuditEvent {
                session_key: session_key.clone(),
                tool_name: name.to_string(),
                call_id: call_id.to_string(),
                phase: AuditPhase::PostInvoke {
                    is_error: result.is_error,
                    duration_ms,
                    result_preview: truncate_preview(&result.output, 256),
                },
            })
            .await;

        if let Some(bus) = &self.bus {
            bus.publish(EventPayload::ToolInvoked {
                session_key: session_key.clone(),
                tool: name.to_string(),
                is_error: result.is_error,
                duration_ms,
            })
            .await;
        }

        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeTool {
        approval: bool,
    }

    #[async_trait]
    impl Tool for FakeTool {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn description(&self) -> &'static str {
            "a fake tool"
        }
        fn parameters_schema(&self) -> JsonValue {
            serde_json::json!({})
        }
        fn requires_approval(&self) -> bool {
            self.approval
        }
        async fn execute(&self, args: JsonValue, _ctx: &ToolContext) -> ToolResultData {
            ToolResultData::success(args, 1)
        }
    }

    struct DenyingApprover;
    #[async_trait]
    impl crate::approval::Approver for DenyingApprover {
        async fn decide(&self, _s: &SessionKey, _t: &str, _a: &JsonValue) -> Decision {
            Decision::Deny { reason: "no".into() }
        }
    }

    fn key() -> SessionKey {
        SessionKey::new("cli", "s1")
    }

    #[tokio::test]
    async fn register_then_get_returns_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        assert_eq!(registry.get("fake").unwrap().name(), "fake");
    }

    #[tokio::test]
    async fn duplicate_register_fails_without_side_effect() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        let err = registry.register(Arc::new(FakeTool { approval: false })).unwrap_err();
        assert_eq!(err.kind(), locus_core::ErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn scope_rejects_names_outside_allowlist() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        let scope = ToolScope::allowlist(["other"]);
        let result = registry.execute("fake", serde_json::json!({}), &key(), "c1", &scope).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn approval_deny_short_circuits_before_invoke() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: true })).unwrap();
        let registry = registry.with_approver(Arc::new(DenyingApprover));
        let result = registry
            .execute("fake", serde_json::json!({"x": 1}), &key(), "c1", &ToolScope::unrestricted())
            .await;
        assert!(result.is_error);
        assert_eq!(result.output["error"], "no");
    }

    #[tokio::test]
    async fn approver_is_consulted_even_when_tool_does_not_require_approval() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        let registry = registry.with_approver(Arc::new(DenyingApprover));
        let result = registry
            .execute("fake", serde_json::json!({"x": 1}), &key(), "c1", &ToolScope::unrestricted())
            .await;
        assert!(result.is_error);
        assert_eq!(result.output["error"], "no");
    }

    #[tokio::test]
    async fn execute_runs_tool_when_approved() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        let result = registry
            .execute("fake", serde_json::json!({"x": 1}), &key(), "c1", &ToolScope::unrestricted())
            .await;
        assert!(!result.is_error);
        assert_eq!(result.output["x"], 1);
    }

    #[tokio::test]
    async fn audit_log_records_pre_and_post_invoke() {
        let audit = Arc::new(InMemoryAuditLogger::new());
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FakeTool { approval: false })).unwrap();
        let registry = registry.with_audit_logger(audit.clone());
        registry
            .execute("fake", serde_json::json!({}), &key(), "c1", &ToolScope::unrestricted())
            .await;
        let events = audit.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].phase, AuditPhase::PreInvoke { .. }));
        assert!(matches!(events[1].phase, AuditPhase::PostInvoke { .. }));
    }
}
