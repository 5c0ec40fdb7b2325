//! Provider adapters
//!
//! One adapter per vendor wire format, all behind [`ProviderAdapter`]. An
//! adapter is stateful for exactly one request at a time: `build_request`
//! shapes the outbound body, `process_response_line` consumes the inbound
//! SSE stream line by line, and `reset` prepares it for reuse.

pub mod anthropic;
pub mod google;
pub mod openai;

use reqwest::header::HeaderMap;

use crate::error::{Error, Result};
use crate::events::StreamEvent;
use crate::models::{Model, Vendor};
use crate::types::{Conversation, RequestOptions};

pub use anthropic::AnthropicAdapter;
pub use google::GoogleAdapter;
pub use openai::OpenAIAdapter;

/// How much adapter state to clear
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Clear per-request stream state for a fresh request
    Full,
    /// Clear cached credentials only, preserving stream state
    Auth,
}

/// One vendor's protocol implementation
pub trait ProviderAdapter: Send {
    /// Vendor this adapter speaks for
    fn vendor(&self) -> Vendor;

    /// Model profile the adapter was built with
    fn model(&self) -> &Model;

    /// Build the vendor request body for one conversation
    fn build_request(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<serde_json::Value>;

    /// Full URL to POST the request to
    fn endpoint(&self) -> String;

    /// Headers for the request, resolving and caching credentials
    fn request_headers(&mut self) -> Result<HeaderMap>;

    /// Consume one raw SSE line, pushing any normalized events produced.
    /// Never fails: framing lines and malformed payloads are skipped, and
    /// lines after the terminal event are ignored.
    fn process_response_line(&mut self, line: &str, events: &mut Vec<StreamEvent>);

    /// Clear per-request or credential state
    fn reset(&mut self, scope: ResetScope);
}

/// Build the adapter for a model's vendor
pub fn adapter_for(model: Model, api_key: Option<String>) -> Box<dyn ProviderAdapter> {
    match model.vendor {
        Vendor::Anthropic => Box::new(AnthropicAdapter::new(model, api_key)),
        Vendor::OpenAI => Box::new(OpenAIAdapter::new(model, api_key)),
        Vendor::Google => Box::new(GoogleAdapter::new(model, api_key)),
    }
}

/// Get an API key from environment or provided value
pub fn get_api_key(provided: Option<&str>, env_var: &str) -> Result<String> {
    if let Some(key) = provided {
        return Ok(key.to_string());
    }

    std::env::var(env_var).map_err(|_| Error::InvalidApiKey)
}

/// Credential source with cached resolution. `reset(Auth)` clears the cache
/// so the next request re-derives the key.
#[derive(Debug, Default)]
pub(crate) struct Credentials {
    provided: Option<String>,
    resolved: Option<String>,
}

impl Credentials {
    pub(crate) fn new(provided: Option<String>) -> Self {
        Self {
            provided,
            resolved: None,
        }
    }

    /// Resolve from the provided value or environment, caching the result
    pub(crate) fn resolve(&mut self, env_var: &str) -> Result<String> {
        if let Some(key) = &self.resolved {
            return Ok(key.clone());
        }
        let key = get_api_key(self.provided.as_deref(), env_var)?;
        self.resolved = Some(key.clone());
        Ok(key)
    }

    pub(crate) fn clear(&mut self) {
        self.resolved = None;
    }
}

/// Extract the JSON payload from one SSE line. Only `data:` lines carry
/// payloads; event names, comments, ids, and blank lines are framing.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix("data:")?;
    Some(payload.trim_start())
}

/// Insert model-specific extra headers, skipping any that do not parse
pub(crate) fn apply_model_headers(headers: &mut HeaderMap, model: &Model) {
    for (key, value) in &model.headers {
        if let (Ok(name), Ok(val)) = (
            key.parse::<reqwest::header::HeaderName>(),
            value.parse::<reqwest::header::HeaderValue>(),
        ) {
            headers.insert(name, val);
        }
    }
}
