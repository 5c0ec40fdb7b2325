//! Google Generative AI (Gemini) API adapter

use std::collections::VecDeque;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::accumulator::ResponseAccumulator;
use crate::adapters::{Credentials, ProviderAdapter, ResetScope, apply_model_headers, data_payload};
use crate::error::{Error, Result};
use crate::events::{ContentEvent, StreamEvent, ToolArguments};
use crate::models::{Model, Vendor};
use crate::thinking::{ThinkingDirective, resolve_thinking};
use crate::types::{Conversation, Part, RequestOptions, Role, ToolSpec, UsageKind};

/// Finish reasons that complete a response without an error
const NORMAL_FINISH_REASONS: [&str; 2] = ["STOP", "MAX_TOKENS"];

/// Adapter for the Google Generative AI streaming protocol
pub struct GoogleAdapter {
    model: Model,
    credentials: Credentials,
    acc: ResponseAccumulator,
    /// Thought signatures in part arrival order, sealed into one envelope at
    /// the terminal chunk
    signatures: Vec<String>,
    finish_reason: Option<String>,
    terminated: bool,
}

impl GoogleAdapter {
    /// Create an adapter for a model, optionally with an explicit API key
    pub fn new(model: Model, api_key: Option<String>) -> Self {
        Self {
            model,
            credentials: Credentials::new(api_key),
            acc: ResponseAccumulator::new(),
            signatures: Vec::new(),
            finish_reason: None,
            terminated: false,
        }
    }

    fn handle_chunk(&mut self, chunk: GeminiStreamResponse, events: &mut Vec<StreamEvent>) {
        if let Some(error) = chunk.error {
            self.terminated = true;
            self.seal_signatures();
            self.acc.flush_thinking(events);
            events.push(StreamEvent::Error {
                message: error.message,
            });
            return;
        }

        let mut finished = false;
        for candidate in chunk.candidates {
            if let Some(content) = candidate.content {
                for part in content.parts {
                    self.handle_part(part, events);
                }
            }
            if let Some(reason) = candidate.finish_reason {
                self.finish_reason = Some(reason);
                finished = true;
            }
        }

        if let Some(usage) = chunk.usage_metadata {
            emit_usage(&usage, events);
        }

        // A finishReason marks the terminal chunk; nothing follows it.
        if finished {
            self.finish(events);
        }
    }

    fn handle_part(&mut self, part: GeminiResponsePart, events: &mut Vec<StreamEvent>) {
        if let Some(signature) = part.thought_signature {
            self.signatures.push(signature);
        }

        if let Some(function_call) = part.function_call {
            // This vendor delivers complete functionCall objects and assigns
            // no ids, so one is synthesized.
            events.push(StreamEvent::Content(ContentEvent::ToolInvocation {
                id: format!("call_{}", uuid::Uuid::new_v4()),
                name: function_call.name,
                arguments: ToolArguments::Parsed(
                    function_call.args.unwrap_or_else(|| serde_json::json!({})),
                ),
            }));
        } else if let Some(text) = part.text {
            if part.thought {
                self.acc.push_thinking(&text);
            } else {
                events.push(StreamEvent::Content(ContentEvent::TextDelta { text }));
            }
        }
    }

    // Collected signatures ride out on the composite thinking marker.
    fn seal_signatures(&mut self) {
        if self.signatures.is_empty() {
            return;
        }
        match seal_envelope(std::mem::take(&mut self.signatures)) {
            Ok(encoded) => self.acc.push_signature(&encoded),
            Err(e) => tracing::warn!(error = %e, "failed to seal thought signature envelope"),
        }
    }

    fn finish(&mut self, events: &mut Vec<StreamEvent>) {
        self.terminated = true;
        self.seal_signatures();
        self.acc.flush_thinking(events);
        match self.finish_reason.take() {
            Some(reason) if !NORMAL_FINISH_REASONS.contains(&reason.as_str()) => {
                events.push(StreamEvent::Error { message: reason });
            }
            _ => events.push(StreamEvent::ResponseComplete),
        }
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Google
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

        let mut contents = Vec::new();
        let mut system_texts = Vec::new();

        for turn in &conversation.turns {
            match turn.role {
                Role::System => {
                    let text = turn.text();
                    if !text.is_empty() {
                        system_texts.push(text);
                    }
                }
                Role::User => {
                    // Function responses answer the previous model turn, so
                    // they precede the user's own text.
                    let response_parts = convert_tool_results(&turn.parts, conversation)?;
                    if !response_parts.is_empty() {
                        contents.push(GeminiContent {
                            role: Some("function".to_string()),
                            parts: response_parts,
                        });
                    }
                    let text = turn.text();
                    if !text.is_empty() {
                        contents.push(GeminiContent {
                            role: Some("user".to_string()),
                            parts: vec![GeminiPart::text(text)],
                        });
                    }
                }
                Role::Assistant => {
                    if let Some(content) = convert_assistant_turn(&turn.parts) {
                        contents.push(content);
                    }
                }
            }
        }

        let system_instruction = if system_texts.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(system_texts.join("\n\n"))],
            })
        };

        let tools = if options.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: options.tools.iter().map(convert_tool).collect(),
            }])
        };

        let request = GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(options.max_tokens.unwrap_or(self.model.max_tokens)),
                // Sampling parameters stay compatible with thinking here.
                temperature: options.temperature,
                thinking_config: match directive {
                    ThinkingDirective::Budget(thinking_budget) => Some(GeminiThinkingConfig {
                        thinking_budget,
                        include_thoughts: true,
                    }),
                    _ => None,
                },
            }),
        };

        Ok(serde_json::to_value(request)?)
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.model.base_url, self.model.id
        )
    }

    fn request_headers(&mut self) -> Result<HeaderMap> {
        let api_key = self
            .credentials
            .resolve(self.model.vendor.api_key_env_var())?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-goog-api-key",
            api_key.parse().map_err(|_| Error::InvalidApiKey)?,
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
        match serde_json::from_str::<GeminiStreamResponse>(payload) {
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
                self.signatures.clear();
                self.finish_reason = None;
                self.terminated = false;
            }
            ResetScope::Auth => self.credentials.clear(),
        }
    }
}

// Prompt counts include cached content on this vendor, so input is reported
// net of them.
fn emit_usage(usage: &GeminiUsageMetadata, events: &mut Vec<StreamEvent>) {
    let cached = usage.cached_content_token_count.unwrap_or(0);

    if let Some(prompt) = usage.prompt_token_count {
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
    if let Some(output) = usage.candidates_token_count {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Output,
            tokens: output,
        });
    }
    if let Some(thoughts) = usage.thoughts_token_count.filter(|&t| t > 0) {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Thoughts,
            tokens: thoughts,
        });
    }
}

// ============================================================================
// Signature envelope
// ============================================================================

// Reasoning resumes on this vendor by replaying per-part thought signatures,
// not thought text. The ordered signature list travels through the unified
// signature field as base64-encoded JSON and is re-attached on replay.

#[derive(Debug, Serialize, Deserialize)]
struct SignatureEnvelope {
    thought_signatures: Vec<String>,
}

fn seal_envelope(thought_signatures: Vec<String>) -> Result<String> {
    let serialized = serde_json::to_string(&SignatureEnvelope { thought_signatures })?;
    Ok(BASE64.encode(serialized))
}

fn open_envelope(signature: &str) -> Option<Vec<String>> {
    let bytes = match BASE64.decode(signature) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "discarding undecodable thought signature");
            return None;
        }
    };
    match serde_json::from_slice::<SignatureEnvelope>(&bytes) {
        Ok(envelope) => Some(envelope.thought_signatures),
        Err(e) => {
            tracing::warn!(error = %e, "discarding malformed thought signature envelope");
            None
        }
    }
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_tool_results(parts: &[Part], conversation: &Conversation) -> Result<Vec<GeminiPart>> {
    let mut converted = Vec::new();
    for part in parts {
        if let Part::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } = part
        {
            let name = conversation.tool_name_for(tool_use_id).ok_or_else(|| {
                Error::InvalidRequest(format!("no tool_use matches result id {tool_use_id}"))
            })?;
            // functionResponse bodies must be JSON objects.
            let response = if *is_error {
                serde_json::json!({ "error": content })
            } else {
                serde_json::json!({ "result": content })
            };
            converted.push(GeminiPart::FunctionResponse {
                function_response: GeminiFunctionResponse {
                    name: name.to_string(),
                    response,
                },
            });
        }
    }
    Ok(converted)
}

fn convert_assistant_turn(parts: &[Part]) -> Option<GeminiContent> {
    // One envelope per turn, carried by the first signed thinking part.
    let mut signatures: VecDeque<String> = parts
        .iter()
        .find_map(|part| match part {
            Part::Thinking {
                signature: Some(signature),
                redacted: false,
                ..
            } if !signature.is_empty() => Some(signature.as_str()),
            _ => None,
        })
        .and_then(open_envelope)
        .map(VecDeque::from)
        .unwrap_or_default();

    let mut converted = Vec::new();
    for part in parts {
        match part {
            Part::Text { text } => converted.push(GeminiPart::text(text.clone())),
            Part::ToolUse { name, input, .. } => converted.push(GeminiPart::FunctionCall {
                function_call: GeminiFunctionCall {
                    name: name.clone(),
                    args: input.clone(),
                },
                thought_signature: None,
            }),
            // Thought text is resumed via signatures, never replayed inline.
            Part::Thinking { .. } | Part::ToolResult { .. } => {}
        }
    }

    // Signatures re-attach to functionCall parts in order; a leftover
    // signature belongs to the final text part.
    for part in converted.iter_mut() {
        if signatures.is_empty() {
            break;
        }
        if let GeminiPart::FunctionCall {
            thought_signature, ..
        } = part
        {
            *thought_signature = signatures.pop_front();
        }
    }
    if let Some(signature) = signatures.pop_front() {
        for part in converted.iter_mut().rev() {
            if let GeminiPart::Text {
                thought_signature, ..
            } = part
            {
                *thought_signature = Some(signature);
                break;
            }
        }
    }

    if converted.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: Some("model".to_string()),
            parts: converted,
        })
    }
}

fn convert_tool(tool: &ToolSpec) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: Some(tool.parameters.clone()),
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
        #[serde(rename = "thoughtSignature", skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
}

impl GeminiPart {
    fn text(text: String) -> Self {
        GeminiPart::Text {
            text,
            thought_signature: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiFunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiThinkingConfig {
    thinking_budget: u32,
    include_thoughts: bool,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    error: Option<GeminiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    thought_signature: Option<String>,
    function_call: Option<GeminiResponseFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
    thoughts_token_count: Option<u32>,
    cached_content_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}
