//! Google Gemini `generateContent`, extended from the teacher's
//! single-shot prompt call (`src/ai/gemini.rs`) with `functionDeclarations`
//! tool advertising and `functionCall`/`functionResponse` parts so a
//! multi-step agent turn round-trips through it the same as any other
//! provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{Provider, ProviderError, ProviderResponse};
use crate::session::{Message, MessageRole};
use crate::tools::{ToolCall, ToolDefinition};

const PROVIDER_NAME: &str = "gemini";
const ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolsEntry>,
}

#[derive(Serialize)]
struct ToolsEntry {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCallPart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponsePart>,
}

#[derive(Serialize, Deserialize)]
struct FunctionCallPart {
    name: String,
    args: Value,
}

#[derive(Serialize, Deserialize)]
struct FunctionResponsePart {
    name: String,
    response: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Content,
}

fn to_gemini_content(m: &Message) -> Content {
    let role = match m.role {
        MessageRole::User | MessageRole::System => "user",
        MessageRole::Assistant => "model",
        MessageRole::Tool => "function",
    }
    .to_string();

    let mut parts = Vec::new();
    if !m.content.is_empty() {
        parts.push(Part { text: Some(m.content.clone()), function_call: None, function_response: None });
    }
    for tc in &m.tool_calls {
        parts.push(Part {
            text: None,
            function_call: Some(FunctionCallPart { name: tc.name.clone(), args: tc.arguments.clone() }),
            function_response: None,
        });
    }
    if m.role == MessageRole::Tool {
        parts.push(Part {
            text: None,
            function_call: None,
            function_response: Some(FunctionResponsePart {
                name: m.tool_call_id.clone().unwrap_or_default(),
                response: serde_json::json!({ "result": m.content }),
            }),
        });
    }

    Content { role, parts }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> &str {
        ENDPOINT
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

        let system_instruction = messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| Content { role: "user".to_string(), parts: vec![Part { text: Some(m.content.clone()), function_call: None, function_response: None }] });

        let contents = messages.iter().filter(|m| m.role != MessageRole::System).map(to_gemini_content).collect();

        let request = GenerateRequest {
            contents,
            system_instruction,
            tools: if tools.is_empty() {
                Vec::new()
            } else {
                vec![ToolsEntry {
                    function_declarations: tools
                        .iter()
                        .map(|t| FunctionDeclaration { name: t.name.clone(), description: t.description.clone(), parameters: t.parameters_schema.clone() })
                        .collect(),
                }]
            },
        };

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled(PROVIDER_NAME)),
            result = self.client.post(&url).json(&request).send() => result.map_err(|e| ProviderError::Transport(e, PROVIDER_NAME))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Http { provider: PROVIDER_NAME, status: status.as_u16(), body });
        }

        let body: GenerateResponse = response.json().await.map_err(|e| ProviderError::Decode(PROVIDER_NAME, e.to_string()))?;
        let candidate = body.candidates.into_iter().next().ok_or(ProviderError::EmptyResponse(PROVIDER_NAME))?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for (i, part) in candidate.content.parts.into_iter().enumerate() {
            if let Some(text) = part.text {
                content.push_str(&text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall { id: format!("gemini-call-{}", i), name: call.name, arguments: call.args });
            }
        }

        Ok(ProviderResponse { content, tool_calls })
    }
}
