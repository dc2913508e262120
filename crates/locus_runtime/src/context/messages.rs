//! Turn → Message translation: the shape a [`locus_llms::Provider`]
//! actually consumes, as opposed to the richer session transcript.

use locus_core::{ContentBlock, Role as CoreRole, Session};
use locus_llms::{Message, ToolCall};
use locus_toolbus::ToolDescriptor;

use super::prompt::build_system_prompt;

/// Builds the full message list for the next provider call: one system
/// message carrying the tool catalogue, followed by one message per turn
/// in the transcript (assistant tool-calls and tool results included).
pub fn build_messages(session: &Session, tools: &[ToolDescriptor]) -> Vec<Message> {
    let mut messages = vec![Message::system(build_system_prompt(tools))];

    for turn in &session.turns {
        match turn.role {
            CoreRole::User => messages.push(Message::user(turn.text())),
            CoreRole::System => messages.push(Message::system(turn.text())),
            CoreRole::Assistant => messages.push(assistant_message(turn)),
            CoreRole::Tool => messages.extend(tool_result_messages(turn)),
        }
    }

    messages
}

fn assistant_message(turn: &locus_core::Turn) -> Message {
    let mut message = Message::assistant(turn.text());
    message.tool_calls = turn
        .blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { tool_use } => Some(ToolCall {
                call_id: tool_use.id.clone(),
                name: tool_use.name.clone(),
                arguments: tool_use.args.clone(),
            }),
            _ => None,
        })
        .collect();
    message
}

/// Unpacks the `{tool_use_id, tool_name, result, duration_ms, is_error}`
/// envelope `build_tool_result_turn` wraps each result in, back into the
/// flat `(call_id, content, is_error)` shape a provider message needs.
fn tool_result_messages(turn: &locus_core::Turn) -> Vec<Message> {
    turn.blocks
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolResult { tool_result } => {
                let call_id = tool_result
                    .output
                    .get("tool_use_id")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let content = tool_result
                    .output
                    .get("result")
                    .cloned()
                    .unwrap_or_else(|| tool_result.output.clone());
                let content = match content {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                Some(Message::tool_result(call_id, content, tool_result.is_error))
            }
            _ => None,
        })
        .collect()
}
