//! A [`Provider`] for chat-completions-style HTTP APIs — the wire shape
//! shared by Z.AI, OpenAI, and most OpenAI-compatible gateways: one POST to
//! `{base_url}/chat/completions`, bearer auth, `choices[0].message` back.
//!
//! Retry-on-429 doubles the delay each attempt and distinguishes a balance
//! exhaustion error (never worth retrying) from a transient rate limit,
//! mirroring how Z.AI's own 429 responses overload that status code for
//! both cases.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::provider::Provider;
use crate::types::{ChatRequest, ChatResponse, Message, Role, ToolCall, Usage};

const MAX_RETRIES: u32 = 3;
const BASE_RETRY_DELAY: Duration = Duration::from_millis(1000);

pub struct HttpChatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpChatProvider {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Reads the API key from `env_var`. Fails with [`Error::Other`] if it
    /// is unset, so a missing key surfaces at provider construction rather
    /// than on the first request.
    pub fn from_env(name: impl Into<String>, base_url: impl Into<String>, env_var: &str) -> Result<Self> {
        let api_key = std::env::var(env_var)
            .map_err(|_| Error::Other(format!("{env_var} is not set")))?;
        Ok(Self::new(name, base_url, api_key))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunction,
}

#[derive(Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireResponseToolCall>,
}

#[derive(Deserialize)]
struct WireResponseToolCall {
    id: String,
    function: WireResponseFunctionCall,
}

#[derive(Deserialize)]
struct WireResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn to_wire(request: &ChatRequest) -> WireRequest<'_> {
    let messages = request
        .messages
        .iter()
        .map(|m| WireMessage {
            role: role_str(m.role),
            content: m.content.clone(),
            tool_call_id: m.tool_call_id.clone(),
            tool_calls: m
                .tool_calls
                .iter()
                .map(|tc| WireToolCall {
                    id: tc.call_id.clone(),
                    kind: "function",
                    function: WireFunctionCall {
                        name: tc.name.clone(),
                        arguments: tc.arguments.to_string(),
                    },
                })
                .collect(),
        })
        .collect();

    let tools = request
        .tools
        .iter()
        .map(|t| WireTool {
            kind: "function",
            function: WireFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect();

    WireRequest {
        model: &request.model,
        messages,
        tools,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn from_wire(resp: WireResponse) -> Result<ChatResponse> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Error::MalformedResponse("no choices in response".into()))?;

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .into_iter()
        .map(|tc| {
            let arguments =
                serde_json::from_str(&tc.function.arguments).unwrap_or(serde_json::Value::Null);
            ToolCall { call_id: tc.id, name: tc.function.name, arguments }
        })
        .collect();

    let mut message = Message::assistant(choice.message.content.unwrap_or_default());
    message.tool_calls = tool_calls.clone();

    let usage = resp
        .usage
        .map(|u| Usage { input_tokens: u.prompt_tokens, output_tokens: u.completion_tokens })
        .unwrap_or_default();

    Ok(ChatResponse { message, usage, tool_calls })
}

#[async_trait]
impl Provider for HttpChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let wire = to_wire(&request);

        for attempt in 0..=MAX_RETRIES {
            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&wire)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if response.status() == StatusCode::TOO_MANY_REQUESTS {
                let body = response.text().await.unwrap_or_default();
                if body.contains("balance") || body.contains("recharge") {
                    return Err(Error::InsufficientBalance);
                }
                if attempt < MAX_RETRIES {
                    let delay = BASE_RETRY_DELAY * 2u32.pow(attempt);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(Error::RateLimitExceeded);
            }

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Http(format!("{status}: {body}")));
            }

            let parsed: WireResponse =
                response.json().await.map_err(|e| Error::MalformedResponse(e.to_string()))?;
            return from_wire(parsed);
        }

        Err(Error::RateLimitExceeded)
    }
}
