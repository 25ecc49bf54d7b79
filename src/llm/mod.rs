//! LLM Provider Port: one trait every chat backend implements, and one
//! closed enum (`AnyProvider`) the rest of the crate programs against so
//! adding a backend never means touching the agent loop.
//!
//! Grounded on `src/ai/gemini.rs` and `src/ai/ollama.rs` for the
//! request/response shape and error-message style of talking to an HTTP
//! LLM endpoint, generalized from "translate one prompt into one
//! shell command" to a full chat-with-tools turn, since the agent loop
//! now drives multi-step tool use instead of a single NL-to-command
//! translation.

pub mod anthropic;
pub mod embedded;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use retry::RetryingProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::session::Message;
use crate::tools::{ToolCall, ToolDefinition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: http {status}: {body}")]
    Http { provider: &'static str, status: u16, body: String },

    #[error("{provider}: request failed: {0}", provider = .1)]
    Transport(reqwest::Error, &'static str),

    #[error("{0}: response did not include any content or tool calls")]
    EmptyResponse(&'static str),

    #[error("{0}: missing API key (set it in config or the provider's environment variable)")]
    MissingApiKey(&'static str),

    #[error("{0}: failed to decode response JSON: {1}")]
    Decode(&'static str, String),

    #[error("{0}: request was cancelled")]
    Cancelled(&'static str),
}

impl ProviderError {
    /// Whether a retrying wrapper should try again: connection failures
    /// before a response arrived, and 502/503/504 specifically - not
    /// 4xx, and not a 500 with a body that might describe a permanent
    /// failure the caller should see immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http { status, .. } => matches!(status, 502 | 503 | 504),
            ProviderError::Transport(e, _) => !e.is_status(),
            _ => false,
        }
    }
}

/// The shape `test_connection` reports back to a caller (a setup
/// screen, a `k13d agent --check` invocation): enough to show a human
/// either a green check or a specific, actionable error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    pub connected: bool,
    pub provider: &'static str,
    pub model: String,
    pub endpoint: String,
    pub response_time_ms: u64,
    pub error: Option<String>,
    pub hint: Option<String>,
}

/// A chat backend capable of producing a full assistant turn, optionally
/// advertising tools and optionally streaming its text content as it's
/// generated. Every round-trip takes a [`CancellationToken`] so a
/// caller can abandon an in-flight request (a user cancelling a turn, a
/// turn budget running out) without leaking the underlying socket.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// The model identifier this instance talks to, for status displays
    /// and for [`Self::test_connection`]'s report.
    fn model(&self) -> &str;

    /// The endpoint this instance dials, for status displays and for
    /// [`Self::test_connection`]'s report.
    fn endpoint(&self) -> &str;

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Cheap readiness probe. The default asks [`Self::test_connection`]
    /// and reports its verdict; providers with a cheaper check override it.
    async fn ready(&self) -> bool {
        self.test_connection().await.connected
    }

    /// Models this instance could be pointed at. The default reports
    /// just the configured model; providers whose API exposes a model
    /// list (Ollama's `/api/tags`) override it.
    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        Ok(vec![self.model().to_string()])
    }

    /// Issues the smallest possible completion and times the round trip,
    /// for a setup screen to confirm "this config actually talks to
    /// something" before the user starts a real turn.
    async fn test_connection(&self) -> ConnectionTestResult {
        let started = std::time::Instant::now();
        let probe = vec![Message::user("Say 'OK'.", chrono::Utc::now())];
        let result = self.chat(&probe, &[], None, CancellationToken::new()).await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(_) => ConnectionTestResult {
                connected: true,
                provider: self.name(),
                model: self.model().to_string(),
                endpoint: self.endpoint().to_string(),
                response_time_ms,
                error: None,
                hint: None,
            },
            Err(e) => ConnectionTestResult {
                connected: false,
                provider: self.name(),
                model: self.model().to_string(),
                endpoint: self.endpoint().to_string(),
                response_time_ms,
                hint: connection_error_hint(&e),
                error: Some(e.to_string()),
            },
        }
    }
}

fn connection_error_hint(error: &ProviderError) -> Option<String> {
    match error {
        ProviderError::MissingApiKey(_) => {
            Some("set llm.api_key in config.toml or the provider's API key environment variable".to_string())
        }
        ProviderError::Http { status: 401, .. } | ProviderError::Http { status: 403, .. } => {
            Some("the configured API key was rejected - check it's valid for this provider and model".to_string())
        }
        ProviderError::Http { status: 404, .. } => {
            Some("check llm.endpoint and llm.model - the provider returned not found".to_string())
        }
        ProviderError::Transport(_, _) => Some("check llm.endpoint is reachable from this machine".to_string()),
        _ => None,
    }
}

/// Extends [`Provider`] with tool-calling for callers that want it.
/// Split out from `Provider::chat` rather than folded into one method
/// because not every caller needs tool use (`test_connection`'s probe,
/// a plain chat-only surface), and every [`Provider`] gets this for
/// free via the blanket impl below.
#[async_trait]
pub trait ToolProvider: Provider {
    async fn ask_with_tools(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        self.chat(messages, tools, None, cancel).await
    }
}

impl<P: Provider + ?Sized> ToolProvider for P {}

/// A closed sum type over every backend this crate speaks, so the agent
/// loop and config layer can hold one concrete type instead of a trait
/// object when they don't need dynamic dispatch (and can still get a
/// `&dyn Provider` via [`AnyProvider::as_dyn`] when they do).
pub enum AnyProvider {
    OpenAiCompatible(openai::OpenAiCompatibleProvider),
    Anthropic(anthropic::AnthropicProvider),
    Gemini(gemini::GeminiProvider),
    Ollama(ollama::OllamaProvider),
    Embedded(embedded::EmbeddedProvider),
}

impl AnyProvider {
    pub fn as_dyn(&self) -> &dyn Provider {
        match self {
            AnyProvider::OpenAiCompatible(p) => p,
            AnyProvider::Anthropic(p) => p,
            AnyProvider::Gemini(p) => p,
            AnyProvider::Ollama(p) => p,
            AnyProvider::Embedded(p) => p,
        }
    }
}

#[async_trait]
impl Provider for AnyProvider {
    fn name(&self) -> &'static str {
        self.as_dyn().name()
    }

    fn model(&self) -> &str {
        self.as_dyn().model()
    }

    fn endpoint(&self) -> &str {
        self.as_dyn().endpoint()
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        self.as_dyn().chat(messages, tools, stream_sink, cancel).await
    }

    async fn ready(&self) -> bool {
        self.as_dyn().ready().await
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        self.as_dyn().list_models().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_502_503_504_are_transient() {
        for status in [502, 503, 504] {
            let err = ProviderError::Http { provider: "test", status, body: String::new() };
            assert!(err.is_transient());
        }
        let err = ProviderError::Http { provider: "test", status: 400, body: String::new() };
        assert!(!err.is_transient());
        let err = ProviderError::Http { provider: "test", status: 500, body: String::new() };
        assert!(!err.is_transient());
    }

    struct StubProvider;

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-model"
        }

        fn endpoint(&self) -> &str {
            "stub://local"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _stream_sink: Option<UnboundedSender<String>>,
            _cancel: CancellationToken,
        ) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse { content: "OK".to_string(), tool_calls: Vec::new() })
        }
    }

    #[tokio::test]
    async fn test_connection_reports_success_with_timing() {
        let result = StubProvider.test_connection().await;
        assert!(result.connected);
        assert_eq!(result.provider, "stub");
        assert_eq!(result.model, "stub-model");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn ready_defaults_to_test_connection_verdict() {
        assert!(StubProvider.ready().await);
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn model(&self) -> &str {
            "m"
        }

        fn endpoint(&self) -> &str {
            "http://nowhere"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _stream_sink: Option<UnboundedSender<String>>,
            _cancel: CancellationToken,
        ) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::MissingApiKey("failing"))
        }
    }

    #[tokio::test]
    async fn test_connection_surfaces_a_hint_for_missing_api_key() {
        let result = FailingProvider.test_connection().await;
        assert!(!result.connected);
        assert!(result.hint.is_some());
    }
}
