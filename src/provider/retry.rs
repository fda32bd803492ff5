// src/provider/retry.rs - Backoff wrapper around a model provider
//
// Only errors whose `is_retriable()` holds are retried: 429, 5xx, timeouts
// and refused connections. Auth failures, bad requests and parse errors
// surface immediately.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ChatRequest, ChatResponse, ChunkStream, ModelProvider};
use crate::infra::errors::CaigentanError;

/// Exponential backoff policy. Attempt `n` waits `base * 2^n`, capped at
/// `cap`, scaled by a reproducible jitter in `[1 - jitter, 1 + jitter]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    pub max_retries: u32,
    pub base: Duration,
    pub cap: Duration,
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

impl Backoff {
    /// Wait before retry number `attempt` (0-based). A server-supplied
    /// retry-after wins over the computed delay.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint + Duration::from_millis(100);
        }
        let exp = self.base.saturating_mul(1u32 << attempt.min(16));
        let capped = exp.min(self.cap).as_secs_f64();
        let scale = 1.0 + self.jitter * (2.0 * spread(attempt) - 1.0);
        Duration::from_secs_f64((capped * scale).max(0.1))
    }
}

/// Low-discrepancy value in [0, 1) for `attempt`.
fn spread(attempt: u32) -> f64 {
    (f64::from(attempt + 1) * 0.618_033_988_749_895).fract()
}

fn retry_after(error: &CaigentanError) -> Option<Duration> {
    match error {
        CaigentanError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Retries `chat()` and the opening of `chat_stream()`. Errors in the middle
/// of a stream are passed through.
pub struct RetryProvider {
    inner: Arc<dyn ModelProvider>,
    backoff: Backoff,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn ModelProvider>, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }

    /// Default backoff with the `[provider] max_retries` bound.
    pub fn with_max_retries(inner: Arc<dyn ModelProvider>, max_retries: u32) -> Self {
        Self::new(
            inner,
            Backoff {
                max_retries,
                ..Default::default()
            },
        )
    }

    async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T, CaigentanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CaigentanError>>,
    {
        let mut attempt = 0;
        loop {
            let err = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !err.is_retriable() || attempt >= self.backoff.max_retries {
                return Err(err);
            }
            let wait = self.backoff.delay(attempt, retry_after(&err));
            attempt += 1;
            tracing::warn!(
                provider = self.inner.id(),
                attempt,
                max_retries = self.backoff.max_retries,
                wait_ms = wait.as_millis() as u64,
                "{what} failed, retrying: {err}"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[async_trait]
impl ModelProvider for RetryProvider {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, CaigentanError> {
        self.run("chat", || self.inner.chat(request.clone())).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, CaigentanError> {
        self.run("stream open", || self.inner.chat_stream(request.clone()))
            .await
    }
}
