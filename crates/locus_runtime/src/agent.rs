//! The Agent (C10): the bounded reasoning loop that turns one user message
//! into a sequence of provider calls and tool executions against a
//! [`Session`].
//!
//! Loop body per iteration: build context → guard (compress if needed, bail
//! with `ContextOverflow` if compression wasn't enough) → call the provider
//! → append the assistant turn → if it made no tool calls, the turn is
//! done; otherwise execute each tool call in sequence, appending every
//! result before the next call is even considered, then loop again.
//!
//! `delegate` is special-cased rather than registered in the
//! [`ToolRegistry`]: a registered `Tool` can't hold an `Arc<Agent>` back to
//! its own registry without a reference cycle, so sub-agent dispatch is
//! intercepted here the same way the donor intercepted its `task` tool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use locus_core::{
    ContentBlock, EventBus, EventPayload, Role, Session, SessionEvent, SessionKey, SessionStatus,
    ToolResultData, ToolUse, Turn,
};
use locus_llms::{ChatRequest, Provider, ToolCall, ToolSchema};
use locus_toolbus::{ToolDescriptor, ToolRegistry, ToolScope};
use tokio_util::sync::CancellationToken;

use crate::compressor;
use crate::config::AgentConfig;
use crate::context::{self, CharCountTokenCounter, ContextGuard, TokenCounter};
use crate::error::{Result, RuntimeError};

/// Schema for the sub-agent dispatch tool. Not registered in the
/// [`ToolRegistry`] — see the module docs for why — but still advertised to
/// the model via the same `tools` field every other tool schema rides in.
fn delegate_schema() -> ToolSchema {
    ToolSchema {
        name: "delegate".to_string(),
        description: "Delegate a self-contained sub-task to a fresh sub-agent with its own \
            iteration budget and no visibility into the parent conversation beyond the task \
            description given here. Returns the sub-agent's final summary."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "The sub-task to delegate, self-contained." }
            },
            "required": ["task"]
        }),
    }
}

pub struct Agent {
    config: AgentConfig,
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    bus: Arc<EventBus>,
    guard: ContextGuard,
    delegate_fan_out: AtomicUsize,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        bus: Arc<EventBus>,
    ) -> Self {
        Self::with_token_counter(config, provider, tools, bus, Arc::new(CharCountTokenCounter))
    }

    pub fn with_token_counter(
        config: AgentConfig,
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        bus: Arc<EventBus>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        let guard = ContextGuard::new(config.context_guard.clone(), counter);
        Self { config, provider, tools, bus, guard, delegate_fan_out: AtomicUsize::new(0) }
    }

    /// Appends `user_message` to `session` and runs the reasoning loop
    /// until the model stops calling tools, the iteration budget is
    /// exhausted, the context overflows, or `cancel` fires.
    pub async fn run(
        &self,
        session: &mut Session,
        user_message: String,
        cancel: CancellationToken,
    ) -> Result<()> {
        session.set_status(SessionStatus::Running);
        session.add_turn(Turn::user().with_block(ContentBlock::text(user_message)));
        self.publish(session.key.clone(), SessionEvent::turn_start(Role::User)).await;
        self.publish(session.key.clone(), SessionEvent::turn_end()).await;

        let outcome = self.run_loop(session, &cancel).await;

        match &outcome {
            Ok(()) => {
                session.set_status(SessionStatus::Active);
                self.publish(session.key.clone(), SessionEvent::session_end(SessionStatus::Active)).await;
            }
            Err(RuntimeError::Cancelled) => {
                session.set_status(SessionStatus::Active);
            }
            Err(err) => {
                session.set_status(SessionStatus::Failed { error: err.to_string() });
                self.publish(
                    session.key.clone(),
                    SessionEvent::session_end(SessionStatus::Failed { error: err.to_string() }),
                )
                .await;
            }
        }

        outcome
    }

    async fn run_loop(&self, session: &mut Session, cancel: &CancellationToken) -> Result<()> {
        for _ in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                return Err(RuntimeError::Cancelled);
            }

            let tools = self.tools.list();

            if self.guard.should_compress(session, &tools) {
                compressor::compress(session, self.provider.as_ref(), &self.config.model, &self.config.compressor)
                    .await?;
                if self.guard.is_overflowing(session, &tools) {
                    return Err(RuntimeError::ContextOverflow);
                }
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                response = self.call_provider(session, &tools) => response?,
            };

            let assistant_turn = assistant_turn_from_response(&response);
            session.add_turn(assistant_turn);
            self.publish(session.key.clone(), SessionEvent::turn_start(Role::Assistant)).await;
            if !response.message.content.is_empty() {
                self.publish(session.key.clone(), SessionEvent::text_delta(response.message.content.clone()))
                    .await;
            }
            self.publish(session.key.clone(), SessionEvent::turn_end()).await;

            if response.tool_calls.is_empty() {
                return Ok(());
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in response.tool_calls {
                if cancel.is_cancelled() {
                    return Err(RuntimeError::Cancelled);
                }
                let result = self.dispatch_tool_call(session.key.clone(), &call, cancel).await;
                results.push((call, result));
            }

            session.add_turn(build_tool_result_turn(&results));
        }

        Err(RuntimeError::IterationBudgetExceeded(self.config.max_iterations))
    }

    async fn call_provider(
        &self,
        session: &Session,
        tools: &[ToolDescriptor],
    ) -> Result<locus_llms::ChatResponse> {
        let messages = context::build_messages(session, tools);
        let schemas: Vec<ToolSchema> = tools
            .iter()
            .map(|t| ToolSchema { name: t.name.clone(), description: t.description.clone(), parameters: t.parameters.clone() })
            .chain(std::iter::once(delegate_schema()))
            .collect();

        let request = ChatRequest::new(self.config.model.clone(), messages)
            .with_tools(schemas)
            .with_max_tokens(self.config.max_tokens);

        Ok(self.provider.chat(request).await?)
    }

    async fn dispatch_tool_call(
        &self,
        session_key: SessionKey,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> ToolResultData {
        let tool_use = ToolUse::new(call.call_id.clone(), call.name.clone(), call.arguments.clone());
        self.publish(session_key.clone(), SessionEvent::tool_start(tool_use.clone())).await;

        let result = if call.name == "delegate" {
            self.run_delegate(session_key.clone(), call, cancel).await
        } else {
            self.tools
                .execute(&call.name, call.arguments.clone(), &session_key, &call.call_id, &ToolScope::unrestricted())
                .await
        };

        self.publish(session_key, SessionEvent::tool_done(call.call_id.clone(), result.clone())).await;
        result
    }

    /// Runs a sub-agent against its own transient session, sharing this
    /// agent's provider, tool registry, and event bus. Returns the
    /// sub-agent's final assistant turn as the tool result.
    async fn run_delegate(
        &self,
        parent_key: SessionKey,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> ToolResultData {
        let active = self.delegate_fan_out.fetch_add(1, Ordering::SeqCst);
        if active >= self.config.max_delegate_fan_out as usize {
            self.delegate_fan_out.fetch_sub(1, Ordering::SeqCst);
            return ToolResultData::error(
                serde_json::json!({ "error": RuntimeError::DelegateFanOutExceeded(self.config.max_delegate_fan_out).to_string() }),
                0,
            );
        }

        let task = call.arguments.get("task").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let sub_key = SessionKey::new(parent_key.channel.clone(), format!("{}:delegate:{}", parent_key.transport_session_id, call.call_id));
        let sub_config = locus_core::SessionConfig::new(self.config.model.clone(), self.config.provider.clone());
        let mut sub_session = Session::new(sub_key, self.config.repo_root.clone(), sub_config);

        let sub_agent_config = AgentConfig { max_iterations: self.config.max_iterations.min(10), ..self.config.clone() };
        let sub_agent = Agent::with_token_counter(
            sub_agent_config,
            Arc::clone(&self.provider),
            Arc::clone(&self.tools),
            Arc::clone(&self.bus),
            Arc::new(CharCountTokenCounter),
        );

        let start = std::time::Instant::now();
        let outcome = Box::pin(sub_agent.run(&mut sub_session, task, cancel.clone())).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        self.delegate_fan_out.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(()) => {
                let summary = sub_session
                    .turns
                    .iter()
                    .rev()
                    .find(|t| t.role == Role::Assistant)
                    .map(|t| t.text())
                    .unwrap_or_default();
                ToolResultData::success(serde_json::json!({ "summary": summary }), duration_ms)
            }
            Err(err) => ToolResultData::error(serde_json::json!({ "error": err.to_string() }), duration_ms),
        }
    }

    async fn publish(&self, session_key: SessionKey, event: SessionEvent) {
        self.bus.publish(EventPayload::Session { session_key, event }).await;
    }
}

fn assistant_turn_from_response(response: &locus_llms::ChatResponse) -> Turn {
    let mut turn = Turn::assistant();
    if !response.message.content.is_empty() {
        turn = turn.with_block(ContentBlock::text(response.message.content.clone()));
    }
    for call in &response.tool_calls {
        let tool_use = ToolUse::new(call.call_id.clone(), call.name.clone(), call.arguments.clone());
        turn = turn.with_block(ContentBlock::tool_use(tool_use));
    }
    turn
}

/// Wraps each tool result as `{tool_use_id, tool_name, result, duration_ms,
/// is_error}` so [`context::build_messages`] can unpack it again into a
/// `Role::Tool` provider message keyed by `tool_use_id`.
pub(crate) fn build_tool_result_turn(results: &[(ToolCall, ToolResultData)]) -> Turn {
    let mut turn = Turn::new(Role::Tool);
    for (call, result) in results {
        turn = turn.with_block(ContentBlock::tool_result(ToolResultData {
            output: serde_json::json!({
                "tool_use_id": call.call_id,
                "tool_name": call.name,
                "result": result.output,
                "duration_ms": result.duration_ms,
                "is_error": result.is_error,
            }),
            duration_ms: result.duration_ms,
            is_error: result.is_error,
            is_retryable: result.is_retryable,
            attachments: Vec::new(),
        }));
    }
    turn
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use locus_llms::{ChatResponse, Message, Usage};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<ChatResponse>>,
        calls: StdAtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<ChatResponse>) -> Self {
            Self { responses: std::sync::Mutex::new(responses), calls: StdAtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, _request: ChatRequest) -> locus_llms::Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(ChatResponse { message: Message::assistant("done"), usage: Usage::default(), tool_calls: Vec::new() });
            }
            Ok(responses.remove(0))
        }
    }

    fn session() -> Session {
        Session::new(
            SessionKey::new("cli", "s1"),
            PathBuf::from("/repo"),
            locus_core::SessionConfig::new("claude-sonnet-4-20250514", "anthropic"),
        )
    }

    fn agent(config: AgentConfig, provider: Arc<dyn Provider>) -> Agent {
        Agent::new(config, provider, Arc::new(ToolRegistry::new()), Arc::new(EventBus::new()))
    }

    #[tokio::test]
    async fn run_stops_once_no_tool_calls_are_made() {
        let config = crate::config::AgentConfigBuilder::new(PathBuf::from("/repo")).build().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse {
            message: Message::assistant("hi there"),
            usage: Usage::default(),
            tool_calls: Vec::new(),
        }]));
        let agent = agent(config, provider.clone());
        let mut session = session();

        agent.run(&mut session, "hello".into(), CancellationToken::new()).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.status, SessionStatus::Active);
        assert_eq!(session.turns.len(), 2); // user + assistant
    }

    #[tokio::test]
    async fn run_exhausting_iterations_returns_iteration_budget_exceeded() {
        let config = crate::config::AgentConfigBuilder::new(PathBuf::from("/repo"))
            .with_max_iterations(1)
            .build()
            .unwrap();
        let call = ToolCall { call_id: "c1".into(), name: "noop".into(), arguments: serde_json::json!({}) };
        let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse {
            message: Message::assistant(""),
            usage: Usage::default(),
            tool_calls: vec![call],
        }]));
        let agent = agent(config, provider);
        let mut session = session();

        let err = agent.run(&mut session, "hello".into(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, RuntimeError::IterationBudgetExceeded(1)));
        assert_eq!(session.status, SessionStatus::Failed { error: err.to_string() });
    }

    #[tokio::test]
    async fn cancelled_before_first_iteration_returns_cancelled_and_restores_active() {
        let config = crate::config::AgentConfigBuilder::new(PathBuf::from("/repo")).build().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let agent = agent(config, provider);
        let mut session = session();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent.run(&mut session, "hello".into(), cancel).await.unwrap_err();
        assert!(matches!(err, RuntimeError::Cancelled));
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn build_tool_result_turn_wraps_call_id_and_result() {
        let call = ToolCall { call_id: "c1".into(), name: "bash".into(), arguments: serde_json::json!({}) };
        let result = ToolResultData::success(serde_json::json!("ok"), 5);
        let turn = build_tool_result_turn(&[(call, result)]);
        assert_eq!(turn.role, Role::Tool);
        assert_eq!(turn.blocks.len(), 1);
    }
}
