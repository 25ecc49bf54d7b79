//! Anthropic Messages API: `content` blocks instead of a flat string,
//! tool calls arrive as `tool_use` blocks and tool results go back as
//! `tool_result` blocks inside a `user` message rather than their own
//! `tool` role.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{Provider, ProviderError, ProviderResponse};
use crate::session::{Message, MessageRole};
use crate::tools::{ToolCall, ToolDefinition};

const PROVIDER_NAME: &str = "anthropic";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.anthropic.com/v1".to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    ToolResult { tool_use_id: String, content: String },
}

#[derive(Serialize)]
struct WireTool {
    name: String,
    description: String,
    input_schema: Value,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: Value },
    #[serde(other)]
    Other,
}

fn to_wire_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system = None;
    let mut wire = Vec::new();

    for m in messages {
        match m.role {
            MessageRole::System => {
                system = Some(m.content.clone());
            }
            MessageRole::User => {
                wire.push(WireMessage { role: "user", content: vec![ContentBlock::Text { text: m.content.clone() }] });
            }
            MessageRole::Assistant => {
                let mut blocks = Vec::new();
                if !m.content.is_empty() {
                    blocks.push(ContentBlock::Text { text: m.content.clone() });
                }
                for tc in &m.tool_calls {
                    blocks.push(ContentBlock::ToolUse { id: tc.id.clone(), name: tc.name.clone(), input: tc.arguments.clone() });
                }
                wire.push(WireMessage { role: "assistant", content: blocks });
            }
            MessageRole::Tool => {
                let tool_use_id = m.tool_call_id.clone().unwrap_or_default();
                wire.push(WireMessage {
                    role: "user",
                    content: vec![ContentBlock::ToolResult { tool_use_id, content: m.content.clone() }],
                });
            }
        }
    }

    (system, wire)
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::MissingApiKey(PROVIDER_NAME));
        }

        let (system, wire_messages) = to_wire_messages(messages);
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: wire_messages,
            system,
            tools: tools
                .iter()
                .map(|t| WireTool { name: t.name.clone(), description: t.description.clone(), input_schema: t.parameters_schema.clone() })
                .collect(),
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled(PROVIDER_NAME)),
            result = self
                .client
                .post(format!("{}/messages", self.base_url))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&request)
                .send() => result.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { provider: PROVIDER_NAME, status: status.as_u16(), body });
        }

        let body: MessagesResponse = response.json().await.map_err(|e| ProviderError::Decode(PROVIDER_NAME, e.to_string()))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in body.content {
            match block {
                ResponseBlock::Text { text } => content.push_str(&text),
                ResponseBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall { id, name, arguments: input }),
                ResponseBlock::Other => {}
            }
        }

        if content.is_empty() && tool_calls.is_empty() {
            return Err(ProviderError::EmptyResponse(PROVIDER_NAME));
        }

        Ok(ProviderResponse { content, tool_calls })
    }
}
