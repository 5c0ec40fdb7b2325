//! OpenAI Chat Completions API adapter

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::accumulator::ResponseAccumulator;
use crate::adapters::{Credentials, ProviderAdapter, ResetScope, apply_model_headers, data_payload};
use crate::error::{Error, Result};
use crate::events::{ContentEvent, StreamEvent};
use crate::models::{Model, Vendor};
use crate::thinking::{ThinkingDirective, resolve_thinking};
use crate::types::{Conversation, Part, RequestOptions, Role, ToolSpec, UsageKind};

/// Finish reasons that complete a response without an error
const NORMAL_FINISH_REASONS: [&str; 3] = ["stop", "length", "tool_calls"];

/// Adapter for the OpenAI Chat Completions streaming protocol
pub struct OpenAIAdapter {
    model: Model,
    credentials: Credentials,
    acc: ResponseAccumulator,
    finish_reason: Option<String>,
    terminated: bool,
}

impl OpenAIAdapter {
    /// Create an adapter for a model, optionally with an explicit API key
    pub fn new(model: Model, api_key: Option<String>) -> Self {
        Self {
            model,
            credentials: Credentials::new(api_key),
            acc: ResponseAccumulator::new(),
            finish_reason: None,
            terminated: false,
        }
    }

    fn handle_chunk(&mut self, chunk: StreamChunk, events: &mut Vec<StreamEvent>) {
        if let Some(error) = chunk.error {
            self.terminated = true;
            self.acc.flush_thinking(events);
            events.push(StreamEvent::Error {
                message: error.message,
            });
            return;
        }

        for choice in chunk.choices {
            // Text streams eagerly; reasoning defers to the terminal event.
            if let Some(content) = choice.delta.content {
                events.push(StreamEvent::Content(ContentEvent::TextDelta {
                    text: content,
                }));
            }
            if let Some(reasoning) = choice.delta.reasoning_content {
                self.acc.push_thinking(&reasoning);
            }

            // Tool calls fragment across chunks, keyed by index. The id and
            // name arrive once; arguments append.
            for tc in choice.delta.tool_calls.unwrap_or_default() {
                let call = self.acc.tool_call_mut(tc.index);
                if let Some(id) = tc.id {
                    call.id = id;
                }
                if let Some(function) = tc.function {
                    if let Some(name) = function.name {
                        call.name = name;
                    }
                    if let Some(args) = function.arguments {
                        call.arguments.push_str(&args);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
        }

        if let Some(usage) = chunk.usage {
            emit_usage(&usage, events);
        }
    }

    // [DONE] is the only signal that tool-call buffers are complete on this
    // protocol; there is no per-block stop event.
    fn finish(&mut self, events: &mut Vec<StreamEvent>) {
        self.terminated = true;
        self.acc.finish_all_tool_calls(events);
        self.acc.flush_thinking(events);
        match self.finish_reason.take() {
            Some(reason) if !NORMAL_FINISH_REASONS.contains(&reason.as_str()) => {
                events.push(StreamEvent::Error { message: reason });
            }
            _ => events.push(StreamEvent::ResponseComplete),
        }
    }
}

impl ProviderAdapter for OpenAIAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::OpenAI
    }

    fn model(&self) -> &Model {
        &self.model
    }

    fn build_request(
        &self,
        conversation: &Conversation,
        options: &RequestOptions,
    ) -> Result<serde_json::Value> {
        let directive = resolve_thinking(
            options.thinking,
            &options.thinking_overrides,
            &self.model.thinking,
        );

        let mut messages = Vec::new();
        for turn in &conversation.turns {
            convert_turn(turn.role, &turn.parts, &mut messages);
        }

        let tools = if options.tools.is_empty() {
            None
        } else {
            Some(options.tools.iter().map(convert_tool).collect::<Vec<_>>())
        };

        let has_tools = tools.is_some();
        let request = OpenAIRequest {
            model: self.model.id.clone(),
            messages,
            stream: true,
            stream_options: StreamOptions {
                include_usage: true,
            },
            max_tokens: Some(options.max_tokens.unwrap_or(self.model.max_tokens)),
            temperature: if directive.is_enabled() {
                None
            } else {
                options.temperature
            },
            reasoning_effort: match directive {
                ThinkingDirective::Effort(level) => Some(level.as_str().to_string()),
                _ => None,
            },
            tools,
            tool_choice: if has_tools {
                Some(serde_json::json!("auto"))
            } else {
                None
            },
        };

        Ok(serde_json::to_value(request)?)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.model.base_url)
    }

    fn request_headers(&mut self) -> Result<HeaderMap> {
        let api_key = self
            .credentials
            .resolve(self.model.vendor.api_key_env_var())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("Bearer {api_key}")
                .parse()
                .map_err(|_| Error::InvalidApiKey)?,
        );
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        apply_model_headers(&mut headers, &self.model);
        Ok(headers)
    }

    fn process_response_line(&mut self, line: &str, events: &mut Vec<StreamEvent>) {
        if self.terminated {
            return;
        }
        let Some(payload) = data_payload(line) else {
            return;
        };
        if payload == "[DONE]" {
            self.finish(events);
            return;
        }
        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => self.handle_chunk(chunk, events),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable stream line");
            }
        }
    }

    fn reset(&mut self, scope: ResetScope) {
        match scope {
            ResetScope::Full => {
                self.acc.reset();
                self.finish_reason = None;
                self.terminated = false;
            }
            ResetScope::Auth => self.credentials.clear(),
        }
    }
}

// Raw prompt counts include cache hits on this vendor, so input is reported
// net of them.
fn emit_usage(usage: &StreamUsage, events: &mut Vec<StreamEvent>) {
    let cached = usage
        .prompt_tokens_details
        .as_ref()
        .and_then(|d| d.cached_tokens)
        .unwrap_or(0);

    if let Some(prompt) = usage.prompt_tokens {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Input,
            tokens: prompt.saturating_sub(cached),
        });
    }
    if cached > 0 {
        events.push(StreamEvent::Usage {
            kind: UsageKind::CacheRead,
            tokens: cached,
        });
    }
    if let Some(completion) = usage.completion_tokens {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Output,
            tokens: completion,
        });
    }
    if let Some(reasoning) = usage
        .completion_tokens_details
        .as_ref()
        .and_then(|d| d.reasoning_tokens)
        .filter(|&t| t > 0)
    {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Thoughts,
            tokens: reasoning,
        });
    }
}

// Request types

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    stream: bool,
    stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: String,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded argument object
    arguments: String,
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<StreamUsage>,
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    reasoning_content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: u32,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
    prompt_tokens_details: Option<PromptTokensDetails>,
    completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Deserialize)]
struct PromptTokensDetails {
    cached_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionTokensDetails {
    reasoning_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

// Conversion functions

fn convert_turn(role: Role, parts: &[Part], messages: &mut Vec<OpenAIMessage>) {
    match role {
        Role::System => {
            let text: String = parts.iter().filter_map(Part::as_text).collect();
            if !text.is_empty() {
                messages.push(OpenAIMessage {
                    role: "system".to_string(),
                    content: Some(text),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
        }
        Role::User => {
            // Tool messages must directly follow the assistant message
            // carrying the matching tool_calls, so they precede user text.
            for part in parts {
                if let Part::ToolResult {
                    tool_use_id,
                    content,
                    ..
                } = part
                {
                    messages.push(OpenAIMessage {
                        role: "tool".to_string(),
                        content: Some(content.clone()),
                        tool_calls: None,
                        tool_call_id: Some(tool_use_id.clone()),
                    });
                }
            }
            let text: String = parts.iter().filter_map(Part::as_text).collect();
            if !text.is_empty() {
                messages.push(OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(text),
                    tool_calls: None,
                    tool_call_id: None,
                });
            }
        }
        Role::Assistant => {
            let mut text_parts = Vec::new();
            let mut tool_calls = Vec::new();

            for part in parts {
                match part {
                    Part::Text { text } => text_parts.push(text.as_str()),
                    Part::ToolUse { id, name, input } => {
                        tool_calls.push(OpenAIToolCall {
                            id: id.clone(),
                            call_type: "function".to_string(),
                            function: OpenAIFunctionCall {
                                name: name.clone(),
                                arguments: input.to_string(),
                            },
                        });
                    }
                    // Reasoning cannot be replayed through this API.
                    Part::Thinking { .. } | Part::ToolResult { .. } => {}
                }
            }

            if text_parts.is_empty() && tool_calls.is_empty() {
                return;
            }
            messages.push(OpenAIMessage {
                role: "assistant".to_string(),
                content: if text_parts.is_empty() {
                    None
                } else {
                    Some(text_parts.concat())
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            });
        }
    }
}

fn convert_tool(tool: &ToolSpec) -> OpenAITool {
    OpenAITool {
        tool_type: "function".to_string(),
        function: OpenAIFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
