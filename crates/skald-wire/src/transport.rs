//! HTTP/SSE transport driving the provider adapters

use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapters::{ProviderAdapter, ResetScope};
use crate::error::{Error, Result};
use crate::events::{StreamEvent, StreamEventStream};
use crate::types::{Conversation, RequestOptions};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}

/// Contract between the request loop and whatever carries the bytes
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request and stream back unified events
    async fn run(
        &self,
        adapter: Box<dyn ProviderAdapter>,
        conversation: &Conversation,
        options: &RequestOptions,
        cancel: CancellationToken,
    ) -> Result<StreamEventStream>;
}

/// Transport that POSTs adapter-built requests over HTTPS
pub struct HttpTransport {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            retry: RetryConfig::default(),
        }
    }

    /// Set retry configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    // Connect phase: POST until a success status arrives or the retry budget
    // runs out. The accumulator is reset before every attempt so a fresh
    // stream never sees leftover state.
    async fn connect(
        &self,
        adapter: &mut dyn ProviderAdapter,
        body: &serde_json::Value,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        let mut auth_retried = false;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Aborted);
            }

            adapter.reset(ResetScope::Full);
            let headers = adapter.request_headers()?;
            let endpoint = adapter.endpoint();

            let (error, server_error) = match self
                .client
                .post(&endpoint)
                .headers(headers)
                .json(body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    // One credential re-derive cycle per request.
                    if matches!(status.as_u16(), 401 | 403) && !auth_retried {
                        auth_retried = true;
                        adapter.reset(ResetScope::Auth);
                        tracing::warn!(%status, "authentication rejected, re-deriving credentials");
                        continue;
                    }

                    let server_error = status.is_server_error();
                    (status_error(status, response).await, server_error)
                }
                Err(e) => (Error::Http(e), false),
            };

            let retryable = (error.is_retryable() || server_error) && attempt < self.retry.max_retries;
            if !retryable {
                return Err(error);
            }

            let delay = match &error {
                Error::RateLimited {
                    retry_after: Some(seconds),
                } => Duration::from_secs(*seconds),
                _ => self.retry.delay_for_attempt(attempt),
            };
            tracing::warn!(
                error = %error,
                attempt = attempt + 1,
                max = self.retry.max_retries,
                ?delay,
                "request failed, retrying"
            );
            attempt += 1;
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn run(
        &self,
        mut adapter: Box<dyn ProviderAdapter>,
        conversation: &Conversation,
        options: &RequestOptions,
        cancel: CancellationToken,
    ) -> Result<StreamEventStream> {
        let body = adapter.build_request(conversation, options)?;
        let response = self.connect(adapter.as_mut(), &body, &cancel).await?;

        let stream = stream! {
            let mut bytes = response.bytes_stream();
            let mut buffer = LineBuffer::new();
            let mut events = Vec::new();

            while let Some(chunk) = bytes.next().await {
                if cancel.is_cancelled() {
                    return;
                }
                match chunk {
                    Ok(chunk) => {
                        for line in buffer.push(&chunk) {
                            adapter.process_response_line(&line, &mut events);
                        }
                        for event in events.drain(..) {
                            yield event;
                        }
                    }
                    Err(e) => {
                        yield StreamEvent::Error {
                            message: e.to_string(),
                        };
                        return;
                    }
                }
            }

            // A stream may end without a trailing newline.
            if let Some(line) = buffer.flush() {
                adapter.process_response_line(&line, &mut events);
                for event in events.drain(..) {
                    yield event;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

async fn status_error(status: reqwest::StatusCode, response: reqwest::Response) -> Error {
    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok());
    let text = response.text().await.unwrap_or_default();

    match status.as_u16() {
        429 => Error::RateLimited { retry_after },
        401 | 403 => Error::Auth(text),
        code => Error::api(code.to_string(), text),
    }
}

// SSE payloads arrive as arbitrary byte chunks; lines are split on `\n` with
// `\r` tolerated, and multi-byte characters may span chunk boundaries, so
// decoding happens per complete line.
struct LineBuffer {
    partial: Vec<u8>,
}

impl LineBuffer {
    fn new() -> Self {
        Self {
            partial: Vec::new(),
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    fn flush(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            let bytes = std::mem::take(&mut self.partial);
            Some(String::from_utf8_lossy(&bytes).into_owned())
        }
    }
}
