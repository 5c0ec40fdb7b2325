//! Vendor and model profiles

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::thinking::ThinkingCapabilities;

/// Supported vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    Anthropic,
    OpenAI,
    Google,
}

impl Vendor {
    /// Get a human-readable name for this vendor
    pub fn name(&self) -> &'static str {
        match self {
            Vendor::Anthropic => "Anthropic",
            Vendor::OpenAI => "OpenAI",
            Vendor::Google => "Google",
        }
    }

    /// Lowercase key used in configuration tables
    pub fn key(&self) -> &'static str {
        match self {
            Vendor::Anthropic => "anthropic",
            Vendor::OpenAI => "openai",
            Vendor::Google => "google",
        }
    }

    /// Get the environment variable name for this vendor's API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Vendor::Anthropic => "ANTHROPIC_API_KEY",
            Vendor::OpenAI => "OPENAI_API_KEY",
            Vendor::Google => "GOOGLE_API_KEY",
        }
    }
}

/// Model profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g. "claude-sonnet-4-5")
    pub id: String,
    /// Vendor hosting the model
    pub vendor: Vendor,
    /// Base URL for API calls
    pub base_url: String,
    /// Thinking capability descriptor
    pub thinking: ThinkingCapabilities,
    /// Context window size in tokens
    pub context_window: u32,
    /// Maximum output tokens
    pub max_tokens: u32,
    /// Additional headers for API calls
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Model {
    /// Anthropic-hosted model with vendor defaults
    pub fn anthropic(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: Vendor::Anthropic,
            base_url: "https://api.anthropic.com".into(),
            thinking: ThinkingCapabilities::budget(1024),
            context_window: 200_000,
            max_tokens: 64_000,
            headers: HashMap::new(),
        }
    }

    /// OpenAI-hosted model with vendor defaults
    pub fn openai(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: Vendor::OpenAI,
            base_url: "https://api.openai.com/v1".into(),
            thinking: ThinkingCapabilities::effort(),
            context_window: 200_000,
            max_tokens: 100_000,
            headers: HashMap::new(),
        }
    }

    /// Google-hosted model with vendor defaults
    pub fn google(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vendor: Vendor::Google,
            base_url: "https://generativelanguage.googleapis.com".into(),
            thinking: ThinkingCapabilities::budget(128),
            context_window: 1_048_576,
            max_tokens: 65_536,
            headers: HashMap::new(),
        }
    }

    /// Override the thinking capabilities
    pub fn with_thinking(mut self, thinking: ThinkingCapabilities) -> Self {
        self.thinking = thinking;
        self
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Built-in model catalog
pub fn builtin_models() -> Vec<Model> {
    vec![
        Model::anthropic("claude-sonnet-4-5"),
        Model::anthropic("claude-opus-4-1"),
        Model::anthropic("claude-haiku-4-5"),
        Model::openai("gpt-5"),
        Model::openai("gpt-5-mini"),
        Model::openai("o4-mini"),
        Model::google("gemini-2.5-pro"),
        Model::google("gemini-2.5-flash"),
    ]
}

/// Look up a built-in model by id
pub fn find_model(id: &str) -> Option<Model> {
    builtin_models().into_iter().find(|m| m.id == id)
}

/// Default model for a vendor
pub fn default_model(vendor: Vendor) -> Model {
    match vendor {
        Vendor::Anthropic => Model::anthropic("claude-sonnet-4-5"),
        Vendor::OpenAI => Model::openai("gpt-5"),
        Vendor::Google => Model::google("gemini-2.5-flash"),
    }
}
