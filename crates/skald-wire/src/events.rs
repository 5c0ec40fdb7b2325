//! Unified stream events and dispatch
//!
//! Every adapter emits the same ordered event model regardless of the
//! vendor wire format. Events are plain data; delivery happens through a
//! synchronous dispatcher over [`StreamHandler`].

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::types::{Part, Turn, Usage, UsageKind};

/// Structured content produced by an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentEvent {
    /// Incremental visible text, forwarded as it arrives
    TextDelta { text: String },
    /// Composite thinking marker, held back until the stream terminates.
    /// `text` may be empty when only a signature was delivered.
    Thinking {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    /// Opaque redacted thinking block
    RedactedThinking { data: String },
    /// Complete tool invocation
    ToolInvocation {
        id: String,
        name: String,
        arguments: ToolArguments,
    },
}

/// Tool arguments as parsed from the vendor's JSON fragment stream. A
/// fragment set that never forms valid JSON is carried raw so the executor
/// can surface an input error instead of the call being dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum ToolArguments {
    Parsed(serde_json::Value),
    Malformed(String),
}

impl ToolArguments {
    /// Parse a buffered argument string. Empty buffers mean "no arguments".
    pub fn from_raw(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::Parsed(serde_json::json!({}));
        }
        match serde_json::from_str(raw) {
            Ok(value) => Self::Parsed(value),
            Err(e) => {
                tracing::warn!(error = %e, "tool arguments failed to parse, carrying raw");
                Self::Malformed(raw.to_string())
            }
        }
    }

    /// Get the parsed value, if parsing succeeded
    pub fn as_value(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Malformed(_) => None,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// One normalized event from a provider stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEvent {
    /// Content produced by the model
    Content(ContentEvent),
    /// Token count report for one category
    Usage { kind: UsageKind, tokens: u32 },
    /// The response finished normally (including length-limit stops)
    ResponseComplete,
    /// The vendor reported a generation failure; `message` carries the raw
    /// vendor reason verbatim
    Error { message: String },
}

impl StreamEvent {
    /// Check if this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::ResponseComplete | StreamEvent::Error { .. })
    }
}

/// Boxed stream of normalized events
pub type StreamEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Receiver surface for dispatched events
pub trait StreamHandler {
    fn on_content(&mut self, content: &ContentEvent) {
        let _ = content;
    }
    fn on_usage(&mut self, kind: UsageKind, tokens: u32) {
        let _ = (kind, tokens);
    }
    fn on_response_complete(&mut self) {}
    fn on_error(&mut self, message: &str) {
        let _ = message;
    }
}

/// Deliver one event to a handler
pub fn dispatch_event(event: &StreamEvent, handler: &mut dyn StreamHandler) {
    match event {
        StreamEvent::Content(content) => handler.on_content(content),
        StreamEvent::Usage { kind, tokens } => handler.on_usage(*kind, *tokens),
        StreamEvent::ResponseComplete => handler.on_response_complete(),
        StreamEvent::Error { message } => handler.on_error(message),
    }
}

/// Deliver a batch of events in order
pub fn dispatch(events: &[StreamEvent], handler: &mut dyn StreamHandler) {
    for event in events {
        dispatch_event(event, handler);
    }
}

/// Folds one request's events into the finished assistant turn.
///
/// Text deltas arrive eagerly while thinking markers arrive at the end, so
/// the assembler buffers by category and orders the final parts as thinking
/// (visible then redacted, in arrival order), text, tool uses.
#[derive(Debug, Default)]
pub struct TurnAssembler {
    thinking: Vec<Part>,
    text: String,
    tool_uses: Vec<Part>,
    usage: Usage,
    completed: bool,
    error: Option<String>,
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage totals recorded so far
    pub fn usage(&self) -> &Usage {
        &self.usage
    }

    /// Whether the stream completed normally
    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// The vendor failure reason, if the stream errored
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Build the assistant turn from everything received
    pub fn finish(self) -> Turn {
        let mut parts = self.thinking;
        if !self.text.is_empty() {
            parts.push(Part::text(self.text));
        }
        parts.extend(self.tool_uses);
        Turn::assistant(parts)
    }
}

impl StreamHandler for TurnAssembler {
    fn on_content(&mut self, content: &ContentEvent) {
        match content {
            ContentEvent::TextDelta { text } => self.text.push_str(text),
            ContentEvent::Thinking { text, signature } => {
                self.thinking.push(Part::Thinking {
                    text: text.clone(),
                    signature: signature.clone(),
                    redacted: false,
                });
            }
            ContentEvent::RedactedThinking { data } => {
                self.thinking.push(Part::redacted_thinking(data.clone()));
            }
            ContentEvent::ToolInvocation {
                id,
                name,
                arguments,
            } => {
                let input = match arguments.as_value() {
                    Some(value) => value.clone(),
                    None => serde_json::json!({}),
                };
                self.tool_uses.push(Part::tool_use(id.clone(), name.clone(), input));
            }
        }
    }

    fn on_usage(&mut self, kind: UsageKind, tokens: u32) {
        self.usage.record(kind, tokens);
    }

    fn on_response_complete(&mut self) {
        self.completed = true;
    }

    fn on_error(&mut self, message: &str) {
        self.error = Some(message.to_string());
    }
}
