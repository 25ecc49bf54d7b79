//! Provider for the embedded LLM supervisor's child process: once
//! `src/supervisor/` has a model server listening on localhost, it
//! speaks the same OpenAI-compatible wire format `llama.cpp`'s
//! `server` binary and most local inference runtimes expose, so this
//! is a thin wrapper rather than its own protocol implementation.

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::openai::OpenAiCompatibleProvider;
use super::{ConnectionTestResult, Provider, ProviderError, ProviderResponse};
use crate::session::Message;
use crate::tools::ToolDefinition;

const PROVIDER_NAME: &str = "embedded";

pub struct EmbeddedProvider {
    inner: OpenAiCompatibleProvider,
}

impl EmbeddedProvider {
    pub fn new(port: u16, model: impl Into<String>) -> Self {
        Self {
            inner: OpenAiCompatibleProvider::new(format!("http://127.0.0.1:{}/v1", port), "unused", model),
        }
    }
}

#[async_trait]
impl Provider for EmbeddedProvider {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        stream_sink: Option<UnboundedSender<String>>,
        cancel: CancellationToken,
    ) -> Result<ProviderResponse, ProviderError> {
        self.inner.chat(messages, tools, stream_sink, cancel).await
    }

    async fn ready(&self) -> bool {
        self.inner.ready().await
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let mut result = self.inner.test_connection().await;
        result.provider = PROVIDER_NAME;
        result
    }
}
