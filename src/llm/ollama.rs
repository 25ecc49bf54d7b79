//! Local inference via Ollama's `/api/chat`, extended from the teacher's
//! `/api/generate` single-prompt call (`src/ai/ollama.rs`) to the chat
//! endpoint so message history and tool definitions pass through
//! natively instead of being flattened into one prompt string.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{Provider, ProviderError, ProviderResponse};
use crate::session::{Message, MessageRole};
use crate::tools::{ToolCall, ToolDefinition};

const PROVIDER_NAME: &str = "ollama";

pub struct OllamaProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("reqwest client"),
        }
    }

    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { provider: PROVIDER_NAME, status: status.as_u16(), body });
        }
        let body: TagsResponse = response.json().await.map_err(|e| ProviderError::Decode(PROVIDER_NAME, e.to_string()))?;
        Ok(body.models.into_iter().map(|m| m.name).collect())
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Serialize)]
struct WireToolCall {
    function: WireFunctionCall,
}

#[derive(Serialize)]
struct WireFunctionCall {
    name: String,
    arguments: Value,
}

#[derive(Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

#[derive(Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: Value,
}

fn to_wire_message(m: &Message) -> WireMessage {
    let role = match m.role {
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
        MessageRole::System => "system",
    };
    WireMessage {
        role,
        content: m.content.clone(),
        tool_calls: m
            .tool_calls
            .iter()
            .map(|tc| WireToolCall { function: WireFunctionCall { name: tc.name.clone(), arguments: tc.arguments.clone() } })
            .collect(),
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.fetch_tags().await
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        _stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire_message).collect(),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunctionDef { name: t.name.clone(), description: t.description.clone(), parameters: t.parameters_schema.clone() },
                })
                .collect(),
            stream: false,
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled(PROVIDER_NAME)),
            result = self.client.post(&url).json(&request).send() => result.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { provider: PROVIDER_NAME, status: status.as_u16(), body });
        }

        let body: ChatResponse = response.json().await.map_err(|e| ProviderError::Decode(PROVIDER_NAME, e.to_string()))?;

        let tool_calls = body
            .message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(i, tc)| ToolCall { id: format!("ollama-call-{}", i), name: tc.function.name, arguments: tc.function.arguments })
            .collect();

        Ok(ProviderResponse { content: body.message.content, tool_calls })
    }
}
