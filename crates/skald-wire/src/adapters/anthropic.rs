//! Anthropic Messages API adapter

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::accumulator::{CurrentBlock, ResponseAccumulator};
use crate::adapters::{Credentials, ProviderAdapter, ResetScope, apply_model_headers, data_payload};
use crate::error::{Error, Result};
use crate::events::{ContentEvent, StreamEvent};
use crate::models::{Model, Vendor};
use crate::thinking::{ThinkingDirective, resolve_thinking};
use crate::types::{Conversation, Part, RequestOptions, Role, ToolSpec, UsageKind};

/// Stop reasons that finish a response without an error. Anything else is
/// surfaced verbatim through the error event.
const NORMAL_STOP_REASONS: [&str; 4] = ["end_turn", "max_tokens", "stop_sequence", "tool_use"];

/// Adapter for the Anthropic Messages streaming protocol
pub struct AnthropicAdapter {
    model: Model,
    credentials: Credentials,
    acc: ResponseAccumulator,
    stop_reason: Option<String>,
    terminated: bool,
}

impl AnthropicAdapter {
    /// Create an adapter for a model, optionally with an explicit API key
    pub fn new(model: Model, api_key: Option<String>) -> Self {
        Self {
            model,
            credentials: Credentials::new(api_key),
            acc: ResponseAccumulator::new(),
            stop_reason: None,
            terminated: false,
        }
    }

    fn handle_event(&mut self, event: WireEvent, events: &mut Vec<StreamEvent>) {
        match event {
            WireEvent::MessageStart { message } => {
                emit_usage(&message.usage, events);
            }
            WireEvent::ContentBlockStart {
                index,
                content_block,
            } => match content_block.block_type.as_str() {
                "text" => self.acc.open_block(CurrentBlock::Text),
                "thinking" => self.acc.open_block(CurrentBlock::Thinking),
                "redacted_thinking" => {
                    // Atomic ciphertext, no deltas follow.
                    self.acc.push_redacted(content_block.data.unwrap_or_default());
                }
                "tool_use" => {
                    self.acc.open_block(CurrentBlock::ToolUse);
                    let call = self.acc.tool_call_mut(index);
                    call.id = content_block.id.unwrap_or_default();
                    call.name = content_block.name.unwrap_or_default();
                }
                other => {
                    tracing::debug!(block_type = other, "ignoring unknown content block");
                }
            },
            WireEvent::ContentBlockDelta { index, delta } => match delta.delta_type.as_str() {
                "text_delta" => {
                    if self.acc.current_block() == CurrentBlock::Text {
                        events.push(StreamEvent::Content(ContentEvent::TextDelta {
                            text: delta.text.unwrap_or_default(),
                        }));
                    }
                }
                "thinking_delta" => {
                    self.acc.push_thinking(&delta.thinking.unwrap_or_default());
                }
                "signature_delta" => {
                    self.acc.push_signature(&delta.signature.unwrap_or_default());
                }
                "input_json_delta" => {
                    self.acc
                        .tool_call_mut(index)
                        .arguments
                        .push_str(&delta.partial_json.unwrap_or_default());
                }
                other => {
                    tracing::debug!(delta_type = other, "ignoring unknown delta");
                }
            },
            WireEvent::ContentBlockStop { index } => {
                if self.acc.close_block() == CurrentBlock::ToolUse {
                    self.acc.finish_tool_call(index, events);
                }
            }
            WireEvent::MessageDelta { delta, usage } => {
                if let Some(reason) = delta.stop_reason {
                    self.stop_reason = Some(reason);
                }
                emit_usage(&usage, events);
            }
            WireEvent::MessageStop => self.finish(events),
            WireEvent::Error { error } => {
                self.terminated = true;
                self.acc.flush_thinking(events);
                events.push(StreamEvent::Error {
                    message: error.message,
                });
            }
            WireEvent::Ping | WireEvent::Unknown => {}
        }
    }

    // Terminal path: deferred thinking flushes before the outcome event.
    fn finish(&mut self, events: &mut Vec<StreamEvent>) {
        self.terminated = true;
        self.acc.flush_thinking(events);
        match self.stop_reason.take() {
            Some(reason) if !NORMAL_STOP_REASONS.contains(&reason.as_str()) => {
                events.push(StreamEvent::Error { message: reason });
            }
            _ => events.push(StreamEvent::ResponseComplete),
        }
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn vendor(&self) -> Vendor {
        Vendor::Anthropic
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

        let (system, messages) = convert_turns(conversation);
        let tools = if options.tools.is_empty() {
            None
        } else {
            Some(convert_tools(&options.tools))
        };

        let request = AnthropicRequest {
            model: self.model.id.clone(),
            messages,
            max_tokens: options.max_tokens.unwrap_or(self.model.max_tokens),
            stream: true,
            system,
            // Thinking rejects sampling overrides on this vendor.
            temperature: if directive.is_enabled() {
                None
            } else {
                options.temperature
            },
            tools,
            thinking: match directive {
                ThinkingDirective::Budget(budget_tokens) => Some(ThinkingConfig {
                    thinking_type: "enabled".to_string(),
                    budget_tokens,
                }),
                _ => None,
            },
        };

        Ok(serde_json::to_value(request)?)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.model.base_url)
    }

    fn request_headers(&mut self) -> Result<HeaderMap> {
        let api_key = self
            .credentials
            .resolve(self.model.vendor.api_key_env_var())?;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", api_key.parse().map_err(|_| Error::InvalidApiKey)?);
        headers.insert("accept", "application/json".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("anthropic-version", "2023-06-01".parse().unwrap());
        headers.insert(
            "anthropic-beta",
            "fine-grained-tool-streaming-2025-05-14".parse().unwrap(),
        );
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
        match serde_json::from_str::<WireEvent>(payload) {
            Ok(event) => self.handle_event(event, events),
            Err(e) => {
                tracing::debug!(error = %e, "skipping unparseable stream line");
            }
        }
    }

    fn reset(&mut self, scope: ResetScope) {
        match scope {
            ResetScope::Full => {
                self.acc.reset();
                self.stop_reason = None;
                self.terminated = false;
            }
            ResetScope::Auth => self.credentials.clear(),
        }
    }
}

// Anthropic reports input and cache counts disjointly, so input passes
// through unadjusted; cache events appear only for positive counts.
fn emit_usage(usage: &UsageInfo, events: &mut Vec<StreamEvent>) {
    if let Some(input) = usage.input_tokens {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Input,
            tokens: input,
        });
    }
    if let Some(cache_read) = usage.cache_read_input_tokens.filter(|&t| t > 0) {
        events.push(StreamEvent::Usage {
            kind: UsageKind::CacheRead,
            tokens: cache_read,
        });
    }
    if let Some(cache_write) = usage.cache_creation_input_tokens.filter(|&t| t > 0) {
        events.push(StreamEvent::Usage {
            kind: UsageKind::CacheWrite,
            tokens: cache_write,
        });
    }
    if let Some(output) = usage.output_tokens {
        events.push(StreamEvent::Usage {
            kind: UsageKind::Output,
            tokens: output,
        });
    }
}

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<SystemBlock>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
struct SystemBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    control_type: String,
}

#[derive(Debug, Serialize)]
struct ThinkingConfig {
    #[serde(rename = "type")]
    thinking_type: String,
    budget_tokens: u32,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ============================================================================
// Response event types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    MessageStart {
        message: MessageInfo,
    },
    ContentBlockStart {
        index: u32,
        content_block: ContentBlockInfo,
    },
    ContentBlockDelta {
        index: u32,
        delta: DeltaInfo,
    },
    ContentBlockStop {
        index: u32,
    },
    MessageDelta {
        delta: MessageDelta,
        #[serde(default)]
        usage: UsageInfo,
    },
    MessageStop,
    Ping,
    Error {
        error: ApiError,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct MessageInfo {
    #[serde(default)]
    usage: UsageInfo,
}

#[derive(Debug, Default, Deserialize)]
struct UsageInfo {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
    cache_read_input_tokens: Option<u32>,
    cache_creation_input_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ContentBlockInfo {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
    /// Ciphertext for redacted thinking blocks
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeltaInfo {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    thinking: Option<String>,
    signature: Option<String>,
    partial_json: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn convert_turns(conversation: &Conversation) -> (Option<Vec<SystemBlock>>, Vec<AnthropicMessage>) {
    let mut system: Vec<SystemBlock> = vec![];
    let mut messages: Vec<AnthropicMessage> = vec![];

    for turn in &conversation.turns {
        match turn.role {
            Role::System => {
                system.push(SystemBlock {
                    block_type: "text".to_string(),
                    text: turn.text(),
                    cache_control: Some(CacheControl {
                        control_type: "ephemeral".to_string(),
                    }),
                });
            }
            Role::User => {
                let blocks: Vec<serde_json::Value> =
                    turn.parts.iter().filter_map(user_block).collect();
                push_message(&mut messages, "user", blocks);
            }
            Role::Assistant => {
                let blocks: Vec<serde_json::Value> =
                    turn.parts.iter().filter_map(assistant_block).collect();
                push_message(&mut messages, "assistant", blocks);
            }
        }
    }

    let system = if system.is_empty() { None } else { Some(system) };
    (system, messages)
}

// The API requires alternating roles, so consecutive same-role turns merge
// into one message.
fn push_message(messages: &mut Vec<AnthropicMessage>, role: &str, blocks: Vec<serde_json::Value>) {
    if blocks.is_empty() {
        return;
    }
    match messages.last_mut() {
        Some(last) if last.role == role => last.content.extend(blocks),
        _ => messages.push(AnthropicMessage {
            role: role.to_string(),
            content: blocks,
        }),
    }
}

fn user_block(part: &Part) -> Option<serde_json::Value> {
    match part {
        Part::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
        Part::ToolResult {
            tool_use_id,
            content,
            is_error,
            ..
        } => Some(serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error
        })),
        _ => None,
    }
}

fn assistant_block(part: &Part) -> Option<serde_json::Value> {
    match part {
        Part::Text { text } => Some(serde_json::json!({ "type": "text", "text": text })),
        Part::Thinking {
            text,
            redacted: true,
            ..
        } => Some(serde_json::json!({ "type": "redacted_thinking", "data": text })),
        Part::Thinking {
            text,
            signature: Some(signature),
            ..
        } if !signature.is_empty() => Some(serde_json::json!({
            "type": "thinking",
            "thinking": text,
            "signature": signature
        })),
        // Unsigned thinking cannot be replayed; the vendor rejects it.
        Part::Thinking { .. } => None,
        Part::ToolUse { id, name, input } => Some(serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input
        })),
        Part::ToolResult { .. } => None,
    }
}

fn convert_tools(tools: &[ToolSpec]) -> Vec<AnthropicTool> {
    tools
        .iter()
        .map(|tool| {
            let input_schema = if tool.parameters.is_object() {
                let mut schema = tool.parameters.clone();
                if let Some(obj) = schema.as_object_mut() {
                    obj.entry("type").or_insert(serde_json::json!("object"));
                }
                schema
            } else {
                serde_json::json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                })
            };

            AnthropicTool {
                name: tool.name.clone(),
                description: tool.description.clone(),
                input_schema,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ToolArguments;
    use crate::thinking::ThinkingIntensity;
    use crate::types::Turn;
    use serde_json::json;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(Model::anthropic("claude-sonnet-4-5"), Some("sk-test".into()))
    }

    fn feed(adapter: &mut AnthropicAdapter, lines: &[&str]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in lines {
            adapter.process_response_line(line, &mut events);
        }
        events
    }

    // --- stream processing ---

    #[test]
    fn test_thinking_deferred_until_terminal() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                "event: content_block_start",
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"Let me think..."}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":" about this."}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
                r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"text","text":""}}"#,
                r#"data: {"type":"content_block_delta","index":1,"delta":{"type":"text_delta","text":"Hello!"}}"#,
                r#"data: {"type":"content_block_stop","index":1}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Content(ContentEvent::TextDelta {
                    text: "Hello!".into()
                }),
                StreamEvent::Content(ContentEvent::Thinking {
                    text: "Let me think... about this.".into(),
                    signature: None,
                }),
                StreamEvent::ResponseComplete,
            ]
        );
    }

    #[test]
    fn test_no_thinking_marker_without_thinking_deltas() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Content(ContentEvent::TextDelta { text: "Hi".into() }),
                StreamEvent::ResponseComplete,
            ]
        );
    }

    #[test]
    fn test_signature_and_redacted_blocks() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"visible"}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"c2ln"}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
                r#"data: {"type":"content_block_start","index":1,"content_block":{"type":"redacted_thinking","data":"AAAA"}}"#,
                r#"data: {"type":"content_block_stop","index":1}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Content(ContentEvent::Thinking {
                    text: "visible".into(),
                    signature: Some("c2ln".into()),
                }),
                StreamEvent::Content(ContentEvent::RedactedThinking { data: "AAAA".into() }),
                StreamEvent::ResponseComplete,
            ]
        );
    }

    #[test]
    fn test_tool_call_fragments_reassembled() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"ls"}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"pa"}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"th\": \".\"}"}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
            ],
        );
        assert_eq!(
            events,
            vec![StreamEvent::Content(ContentEvent::ToolInvocation {
                id: "toolu_1".into(),
                name: "ls".into(),
                arguments: ToolArguments::Parsed(json!({"path": "."})),
            })]
        );
    }

    #[test]
    fn test_malformed_tool_arguments_carried_raw() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"ls"}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"path\": "}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
            ],
        );
        match &events[0] {
            StreamEvent::Content(ContentEvent::ToolInvocation { arguments, .. }) => {
                assert!(arguments.is_malformed());
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                "data: {not json",
                "event: ping",
                ": comment line",
                r#"data: {"type":"ping"}"#,
                r#"data: {"type":"something_new","payload":1}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(events, vec![StreamEvent::ResponseComplete]);
    }

    #[test]
    fn test_abnormal_stop_reason_flushes_thinking_then_errors() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"thinking","thinking":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"partial"}}"#,
                r#"data: {"type":"content_block_stop","index":0}"#,
                r#"data: {"type":"message_delta","delta":{"stop_reason":"refusal"},"usage":{"output_tokens":3}}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::Usage {
                    kind: UsageKind::Output,
                    tokens: 3,
                },
                StreamEvent::Content(ContentEvent::Thinking {
                    text: "partial".into(),
                    signature: None,
                }),
                StreamEvent::Error {
                    message: "refusal".into(),
                },
            ]
        );
    }

    #[test]
    fn test_length_stop_is_not_an_error() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"message_delta","delta":{"stop_reason":"max_tokens"},"usage":{"output_tokens":64000}}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        assert_eq!(events[1], StreamEvent::ResponseComplete);
    }

    #[test]
    fn test_error_event_terminates_stream() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
                r#"data: {"type":"message_stop"}"#,
            ],
        );
        // Nothing after the terminal event is processed.
        assert_eq!(
            events,
            vec![StreamEvent::Error {
                message: "Overloaded".into()
            }]
        );
    }

    #[test]
    fn test_usage_events_from_message_start() {
        let mut a = adapter();
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"message_start","message":{"usage":{"input_tokens":100,"output_tokens":1,"cache_read_input_tokens":0,"cache_creation_input_tokens":25}}}"#,
            ],
        );
        // Zero cache reads produce no cache-read event.
        assert_eq!(
            events,
            vec![
                StreamEvent::Usage {
                    kind: UsageKind::Input,
                    tokens: 100,
                },
                StreamEvent::Usage {
                    kind: UsageKind::CacheWrite,
                    tokens: 25,
                },
                StreamEvent::Usage {
                    kind: UsageKind::Output,
                    tokens: 1,
                },
            ]
        );
    }

    #[test]
    fn test_full_reset_allows_reuse() {
        let mut a = adapter();
        feed(&mut a, &[r#"data: {"type":"message_stop"}"#]);
        a.reset(ResetScope::Full);
        let events = feed(
            &mut a,
            &[
                r#"data: {"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"data: {"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"again"}}"#,
            ],
        );
        assert_eq!(
            events,
            vec![StreamEvent::Content(ContentEvent::TextDelta {
                text: "again".into()
            })]
        );
    }

    // --- request building ---

    #[test]
    fn test_request_replays_signed_thinking_only() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("question"));
        conv.push(Turn::assistant(vec![
            Part::signed_thinking("signed reasoning", "sig-abc"),
            Part::thinking("unsigned reasoning"),
            Part::redacted_thinking("CIPHER"),
            Part::text("answer"),
        ]));

        let body = adapter()
            .build_request(&conv, &RequestOptions::default())
            .unwrap();
        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "thinking");
        assert_eq!(content[0]["thinking"], "signed reasoning");
        assert_eq!(content[0]["signature"], "sig-abc");
        assert_eq!(content[1]["type"], "redacted_thinking");
        assert_eq!(content[1]["data"], "CIPHER");
        // Unsigned thinking was dropped; the text part is preserved.
        assert_eq!(content[2]["type"], "text");
        assert_eq!(content[2]["text"], "answer");
    }

    #[test]
    fn test_request_thinking_block_and_temperature() {
        let conv = Conversation {
            turns: vec![Turn::user("hi")],
        };
        let options = RequestOptions {
            temperature: Some(0.7),
            thinking: ThinkingIntensity::Medium,
            ..Default::default()
        };
        let body = adapter().build_request(&conv, &options).unwrap();
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 8192);
        assert!(body.get("temperature").is_none());

        // With thinking off the temperature comes back.
        let body = adapter()
            .build_request(
                &conv,
                &RequestOptions {
                    temperature: Some(0.7),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(body.get("thinking").is_none());
        assert_eq!(body["temperature"], 0.7);
    }

    #[test]
    fn test_request_system_and_tool_results() {
        let mut conv = Conversation::new();
        conv.push(Turn::system("be brief"));
        conv.push(Turn::user("run ls"));
        conv.push(Turn::assistant(vec![Part::tool_use(
            "toolu_1",
            "ls",
            json!({"path": "."}),
        )]));
        conv.resolve_tool_result("toolu_1", "a.txt", false);

        let body = adapter()
            .build_request(&conv, &RequestOptions::default())
            .unwrap();
        assert_eq!(body["system"][0]["text"], "be brief");
        assert_eq!(body["system"][0]["cache_control"]["type"], "ephemeral");

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2]["role"], "user");
        assert_eq!(messages[2]["content"][0]["type"], "tool_result");
        assert_eq!(messages[2]["content"][0]["tool_use_id"], "toolu_1");
        assert_eq!(messages[2]["content"][0]["content"], "a.txt");
    }

    #[test]
    fn test_request_merges_consecutive_user_turns() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("first"));
        conv.push(Turn::user("second"));
        let body = adapter()
            .build_request(&conv, &RequestOptions::default())
            .unwrap();
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_tool_schema_gets_object_type() {
        let tools = convert_tools(&[ToolSpec::new(
            "ls",
            "list files",
            json!({"properties": {"path": {"type": "string"}}}),
        )]);
        assert_eq!(tools[0].input_schema["type"], "object");
    }
}
