use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::{Provider, ProviderError, ProviderResponse};
use crate::session::Message;
use crate::tools::ToolDefinition;

/// Hard ceiling on configured retry attempts, independent of whatever a
/// user puts in `config.toml` - a misconfigured `max_attempts = 50`
/// must not turn one failed turn into a multi-hour sleep.
pub const MAX_ATTEMPTS_CEILING: u32 = 5;

/// Clamps a configured attempt count to [`MAX_ATTEMPTS_CEILING`].
pub fn clamp_max_attempts(configured: u32) -> u32 {
    configured.min(MAX_ATTEMPTS_CEILING).max(1)
}

/// Wraps any [`Provider`] with exponential-backoff-plus-jitter retries,
/// limited to the transient failures [`ProviderError::is_transient`]
/// recognizes (502/503/504, connection failures). Everything else -
/// 4xx, malformed responses, missing API keys - surfaces on the first
/// attempt; retrying those would just waste the timeout budget on a
/// failure that will never succeed.
pub struct RetryingProvider<P: Provider> {
    inner: P,
    max_attempts: u32,
    base_delay: std::time::Duration,
    max_backoff: std::time::Duration,
}

impl<P: Provider> RetryingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            max_attempts: 4,
            base_delay: std::time::Duration::from_millis(250),
            max_backoff: std::time::Duration::from_secs(10),
        }
    }

    /// `max_attempts` is clamped to [`MAX_ATTEMPTS_CEILING`] regardless
    /// of what's passed in, since this is the boundary a misconfigured
    /// value must not cross.
    pub fn with_policy(inner: P, max_attempts: u32, base_delay: std::time::Duration) -> Self {
        Self { inner, max_attempts: clamp_max_attempts(max_attempts), base_delay, max_backoff: std::time::Duration::from_secs(10) }
    }

    pub fn with_max_backoff(mut self, max_backoff: std::time::Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    fn backoff(&self, attempt: u32) -> std::time::Duration {
        let exp = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
        let capped = exp.min(self.max_backoff.as_millis() as u64);
        let jitter = rand::thread_rng().gen_range(0..=capped / 4 + 1);
        std::time::Duration::from_millis((capped + jitter).min(self.max_backoff.as_millis() as u64 + capped / 4 + 1))
    }
}

#[async_trait]
impl<P: Provider> Provider for RetryingProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
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
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled(self.inner.name()));
            }

            // Streaming can only be consumed once; only retry non-streamed calls.
            let sink = if attempt == 0 { stream_sink.clone() } else { None };
            match self.inner.chat(messages, tools, sink, cancel.clone()).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    tracing::warn!(provider = self.inner.name(), attempt, error = %e, "retrying transient provider error");
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(ProviderError::Cancelled(self.inner.name())),
                        _ = tokio::time::sleep(self.backoff(attempt)) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyProvider {
        failures_remaining: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Provider for FlakyProvider {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn model(&self) -> &str {
            "flaky-model"
        }

        fn endpoint(&self) -> &str {
            "http://flaky"
        }

        async fn chat(
            &self,
            _messages: &[Message],
            _tools: &[ToolDefinition],
            _stream_sink: Option<UnboundedSender<String>>,
            _cancel: CancellationToken,
        ) -> Result<ProviderResponse, ProviderError> {
            if self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n > 0 { Some(n - 1) } else { None })
                .is_ok()
            {
                return Err(ProviderError::Http { provider: "flaky", status: 503, body: String::new() });
            }
            Ok(ProviderResponse { content: "ok".to_string(), tool_calls: vec![] })
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let provider = RetryingProvider::with_policy(
            FlakyProvider { failures_remaining: Arc::new(AtomicU32::new(2)) },
            5,
            std::time::Duration::from_millis(1),
        );
        let result = provider.chat(&[], &[], None, CancellationToken::new()).await.unwrap();
        assert_eq!(result.content, "ok");
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let provider = RetryingProvider::with_policy(
            FlakyProvider { failures_remaining: Arc::new(AtomicU32::new(10)) },
            3,
            std::time::Duration::from_millis(1),
        );
        let result = provider.chat(&[], &[], None, CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        struct AlwaysBadRequest;
        #[async_trait]
        impl Provider for AlwaysBadRequest {
            fn name(&self) -> &'static str {
                "bad"
            }
            fn model(&self) -> &str {
                "bad-model"
            }
            fn endpoint(&self) -> &str {
                "http://bad"
            }
            async fn chat(
                &self,
                _messages: &[Message],
                _tools: &[ToolDefinition],
                _stream_sink: Option<UnboundedSender<String>>,
                _cancel: CancellationToken,
            ) -> Result<ProviderResponse, ProviderError> {
                Err(ProviderError::Http { provider: "bad", status: 400, body: "bad request".to_string() })
            }
        }
        let provider = RetryingProvider::with_policy(AlwaysBadRequest, 5, std::time::Duration::from_millis(1));
        let result = provider.chat(&[], &[], None, CancellationToken::new()).await;
        assert!(matches!(result, Err(ProviderError::Http { status: 400, .. })));
    }

    #[test]
    fn max_attempts_is_clamped_to_the_hard_ceiling() {
        assert_eq!(clamp_max_attempts(50), MAX_ATTEMPTS_CEILING);
        assert_eq!(clamp_max_attempts(3), 3);
        assert_eq!(clamp_max_attempts(0), 1);
    }

    #[test]
    fn backoff_never_exceeds_the_configured_cap() {
        let provider = RetryingProvider::with_policy(
            FlakyProvider { failures_remaining: Arc::new(AtomicU32::new(0)) },
            5,
            std::time::Duration::from_millis(500),
        )
        .with_max_backoff(std::time::Duration::from_secs(2));
        for attempt in 0..10 {
            let delay = provider.backoff(attempt);
            assert!(delay <= std::time::Duration::from_millis(2000 + 501), "attempt {attempt} backoff {delay:?} exceeded cap");
        }
    }
}
