//! OpenAI-compatible chat completions: works unmodified against OpenAI
//! itself, Azure OpenAI, and any other vendor (Upstage Solar, Together,
//! Groq, ...) that mirrors the `/v1/chat/completions` wire format,
//! since the only thing that differs between them is `base_url` and
//! which header carries the key - Azure additionally swaps the path
//! for a deployment-scoped one and the header for `api-key`.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{Provider, ProviderError, ProviderResponse};
use crate::session::{Message, MessageRole};
use crate::tools::{ToolCall, ToolDefinition};

const PROVIDER_NAME: &str = "openai_compatible";
const AZURE_API_VERSION: &str = "2024-06-01";

/// Azure OpenAI addresses a model by deployment name rather than model
/// name, under its own path and `api-version` query parameter.
#[derive(Debug, Clone)]
pub struct AzureOptions {
    pub deployment: String,
    pub api_version: String,
}

pub struct OpenAiCompatibleProvider {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    azure: Option<AzureOptions>,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            client: build_client(false),
            azure: None,
        }
    }

    /// Routes requests through Azure OpenAI's `/openai/deployments/{deployment}`
    /// path with an `api-key` header instead of `Authorization: Bearer`.
    /// An empty `deployment` leaves the provider on the plain OpenAI-compatible
    /// wire format.
    pub fn with_azure_deployment(mut self, deployment: impl Into<String>) -> Self {
        let deployment = deployment.into();
        if !deployment.is_empty() {
            self.azure = Some(AzureOptions { deployment, api_version: AZURE_API_VERSION.to_string() });
        }
        self
    }

    /// Rebuilds the underlying client to skip TLS certificate verification,
    /// for self-signed internal Azure/OpenAI-compatible gateways. A
    /// per-provider escape hatch, off by default.
    pub fn with_skip_tls_verify(mut self, skip: bool) -> Self {
        if skip {
            self.client = build_client(true);
        }
        self
    }

    fn request_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match &self.azure {
            Some(az) => format!("{base}/openai/deployments/{}/chat/completions?api-version={}", az.deployment, az.api_version),
            None => format!("{base}/chat/completions"),
        }
    }
}

fn build_client(skip_tls_verify: bool) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .danger_accept_invalid_certs(skip_tls_verify)
        .build()
        .expect("reqwest client")
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
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
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
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ResponseToolCall>,
}

#[derive(Deserialize)]
struct ResponseToolCall {
    id: String,
    function: ResponseFunctionCall,
}

#[derive(Deserialize)]
struct ResponseFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
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
        content: if m.content.is_empty() { None } else { Some(m.content.clone()) },
        tool_calls: m
            .tool_calls
            .iter()
            .map(|tc| WireToolCall {
                id: tc.id.clone(),
                kind: "function",
                function: WireFunctionCall { name: tc.name.clone(), arguments: tc.arguments.to_string() },
            })
            .collect(),
        tool_call_id: m.tool_call_id.clone(),
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
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
        stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        if self.api_key.is_empty() && self.azure.is_none() {
            return Err(ProviderError::MissingApiKey(PROVIDER_NAME));
        }

        let request = ChatRequest {
            model: &self.model,
            messages: messages.iter().map(to_wire_message).collect(),
            tools: tools
                .iter()
                .map(|t| WireTool {
                    kind: "function",
                    function: WireFunctionDef {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters_schema.clone(),
                    },
                })
                .collect(),
            stream: stream_sink.is_some(),
        };

        let mut req = self.client.post(self.request_url());
        req = match &self.azure {
            Some(_) => req.header("api-key", &self.api_key),
            None => req.bearer_auth(&self.api_key),
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled(PROVIDER_NAME)),
            result = req.json(&request).send() => result.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { provider: PROVIDER_NAME, status: status.as_u16(), body });
        }

        if let Some(sink) = stream_sink {
            return self.consume_stream(response, sink, cancel).await;
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(PROVIDER_NAME, e.to_string()))?;

        let choice = body.choices.into_iter().next().ok_or(ProviderError::EmptyResponse(PROVIDER_NAME))?;
        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null),
            })
            .collect();

        Ok(ProviderResponse { content: choice.message.content.unwrap_or_default(), tool_calls })
    }
}

impl OpenAiCompatibleProvider {
    async fn consume_stream(
        &self,
        response: reqwest::Response,
        sink: UnboundedSender<String>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        let mut bytes_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut content = String::new();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled(PROVIDER_NAME)),
                next = bytes_stream.next() => next,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].trim().to_string();
                buffer.drain(..=pos);
                let Some(data) = line.strip_prefix("data: ") else { continue };
                if data == "[DONE]" {
                    continue;
                }
                if let Ok(parsed) = serde_json::from_str::<StreamChunk>(data) {
                    if let Some(choice) = parsed.choices.into_iter().next() {
                        if let Some(delta) = choice.delta.content {
                            content.push_str(&delta);
                            let _ = sink.send(delta);
                        }
                    }
                }
            }
        }

        Ok(ProviderResponse { content, tool_calls: Vec::new() })
    }
}
