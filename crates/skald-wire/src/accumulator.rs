//! Per-request response accumulation

use std::collections::BTreeMap;

use crate::events::{ContentEvent, StreamEvent, ToolArguments};

/// Which block kind is currently open on the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurrentBlock {
    #[default]
    None,
    Text,
    Thinking,
    ToolUse,
}

/// Buffered state for one in-progress tool call
#[derive(Debug, Clone, Default)]
pub struct ToolCallBuffer {
    pub id: String,
    pub name: String,
    /// Partial JSON argument string, appended fragment by fragment
    pub arguments: String,
}

/// Mutable per-request state owned by one adapter.
///
/// Text streams out eagerly; thinking text, signatures, redacted blocks,
/// and tool-call argument fragments buffer here until the block (or the
/// whole response) is known complete. Thinking is flushed only at the
/// terminal event so visible and redacted blocks render as one unit ahead
/// of the surrounding text.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    current_block: CurrentBlock,
    thinking: String,
    signature: String,
    redacted: Vec<String>,
    tool_calls: BTreeMap<u32, ToolCallBuffer>,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all buffered state for a fresh request
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn current_block(&self) -> CurrentBlock {
        self.current_block
    }

    /// Open a block, replacing whatever was current
    pub fn open_block(&mut self, kind: CurrentBlock) {
        self.current_block = kind;
    }

    /// Close the current block, returning what it was
    pub fn close_block(&mut self) -> CurrentBlock {
        std::mem::take(&mut self.current_block)
    }

    pub fn push_thinking(&mut self, text: &str) {
        self.thinking.push_str(text);
    }

    pub fn push_signature(&mut self, text: &str) {
        self.signature.push_str(text);
    }

    /// Record a redacted thinking block (atomic, no deltas)
    pub fn push_redacted(&mut self, data: String) {
        self.redacted.push(data);
    }

    /// Buffer for the tool call at a vendor-assigned index
    pub fn tool_call_mut(&mut self, index: u32) -> &mut ToolCallBuffer {
        self.tool_calls.entry(index).or_default()
    }

    /// Remove and return one finished tool call
    pub fn take_tool_call(&mut self, index: u32) -> Option<ToolCallBuffer> {
        self.tool_calls.remove(&index)
    }

    /// Check if any thinking content, signature, or redacted block is held
    pub fn has_thinking(&self) -> bool {
        !self.thinking.is_empty() || !self.signature.is_empty() || !self.redacted.is_empty()
    }

    /// Emit the deferred thinking markers and clear the buffers: one
    /// composite visible marker when any text or signature accumulated
    /// (text may be empty when only a signature arrived), then one redacted
    /// marker per redacted block, in arrival order.
    pub fn flush_thinking(&mut self, events: &mut Vec<StreamEvent>) {
        let thinking = std::mem::take(&mut self.thinking);
        let signature = std::mem::take(&mut self.signature);
        if !thinking.is_empty() || !signature.is_empty() {
            let signature = if signature.is_empty() {
                None
            } else {
                Some(signature)
            };
            events.push(StreamEvent::Content(ContentEvent::Thinking {
                text: thinking,
                signature,
            }));
        }
        for data in std::mem::take(&mut self.redacted) {
            events.push(StreamEvent::Content(ContentEvent::RedactedThinking { data }));
        }
    }

    /// Finish one tool call: parse its buffered arguments and emit the
    /// invocation marker
    pub fn finish_tool_call(&mut self, index: u32, events: &mut Vec<StreamEvent>) {
        if let Some(call) = self.take_tool_call(index) {
            events.push(tool_invocation(call));
        }
    }

    /// Finish every buffered tool call in index order
    pub fn finish_all_tool_calls(&mut self, events: &mut Vec<StreamEvent>) {
        for (_, call) in std::mem::take(&mut self.tool_calls) {
            events.push(tool_invocation(call));
        }
    }
}

fn tool_invocation(call: ToolCallBuffer) -> StreamEvent {
    StreamEvent::Content(ContentEvent::ToolInvocation {
        id: call.id,
        name: call.name,
        arguments: ToolArguments::from_raw(&call.arguments),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_transitions() {
        let mut acc = ResponseAccumulator::new();
        assert_eq!(acc.current_block(), CurrentBlock::None);
        acc.open_block(CurrentBlock::Thinking);
        assert_eq!(acc.current_block(), CurrentBlock::Thinking);
        assert_eq!(acc.close_block(), CurrentBlock::Thinking);
        assert_eq!(acc.current_block(), CurrentBlock::None);
        // Closing with nothing open is a no-op.
        assert_eq!(acc.close_block(), CurrentBlock::None);
    }

    #[test]
    fn test_flush_orders_visible_before_redacted() {
        let mut acc = ResponseAccumulator::new();
        acc.push_thinking("step one");
        acc.push_thinking(", step two");
        acc.push_signature("sig");
        acc.push_redacted("cipher-a".into());
        acc.push_redacted("cipher-b".into());

        let mut events = Vec::new();
        acc.flush_thinking(&mut events);
        assert_eq!(
            events,
            vec![
                StreamEvent::Content(ContentEvent::Thinking {
                    text: "step one, step two".into(),
                    signature: Some("sig".into()),
                }),
                StreamEvent::Content(ContentEvent::RedactedThinking {
                    data: "cipher-a".into()
                }),
                StreamEvent::Content(ContentEvent::RedactedThinking {
                    data: "cipher-b".into()
                }),
            ]
        );
        assert!(!acc.has_thinking());
    }

    #[test]
    fn test_flush_signature_only_emits_marker() {
        let mut acc = ResponseAccumulator::new();
        acc.push_signature("lonely-sig");
        let mut events = Vec::new();
        acc.flush_thinking(&mut events);
        assert_eq!(
            events,
            vec![StreamEvent::Content(ContentEvent::Thinking {
                text: String::new(),
                signature: Some("lonely-sig".into()),
            })]
        );
    }

    #[test]
    fn test_flush_empty_emits_nothing() {
        let mut acc = ResponseAccumulator::new();
        let mut events = Vec::new();
        acc.flush_thinking(&mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn test_tool_calls_kept_in_index_order() {
        let mut acc = ResponseAccumulator::new();
        acc.tool_call_mut(2).name = "third".into();
        acc.tool_call_mut(0).name = "first".into();
        acc.tool_call_mut(1).name = "second".into();
        acc.tool_call_mut(0).arguments.push_str("{}");

        let mut events = Vec::new();
        acc.finish_all_tool_calls(&mut events);
        let names: Vec<&str> = events
            .iter()
            .map(|e| match e {
                StreamEvent::Content(ContentEvent::ToolInvocation { name, .. }) => name.as_str(),
                other => panic!("unexpected: {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_finish_tool_call_parses_fragments() {
        let mut acc = ResponseAccumulator::new();
        {
            let call = acc.tool_call_mut(0);
            call.id = "call_1".into();
            call.name = "ls".into();
            call.arguments.push_str("{\"pa");
            call.arguments.push_str("th\": \".\"}");
        }
        let mut events = Vec::new();
        acc.finish_tool_call(0, &mut events);
        assert_eq!(
            events,
            vec![StreamEvent::Content(ContentEvent::ToolInvocation {
                id: "call_1".into(),
                name: "ls".into(),
                arguments: ToolArguments::Parsed(json!({"path": "."})),
            })]
        );
        // Consumed.
        assert!(acc.take_tool_call(0).is_none());
    }

    #[test]
    fn test_finish_tool_call_carries_malformed_raw() {
        let mut acc = ResponseAccumulator::new();
        {
            let call = acc.tool_call_mut(0);
            call.id = "call_1".into();
            call.name = "ls".into();
            call.arguments.push_str("{\"path\": ");
        }
        let mut events = Vec::new();
        acc.finish_tool_call(0, &mut events);
        match &events[0] {
            StreamEvent::Content(ContentEvent::ToolInvocation { arguments, .. }) => {
                assert_eq!(arguments, &ToolArguments::Malformed("{\"path\": ".into()));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut acc = ResponseAccumulator::new();
        acc.open_block(CurrentBlock::Text);
        acc.push_thinking("partial");
        acc.tool_call_mut(0).id = "call_1".into();
        acc.reset();
        assert_eq!(acc.current_block(), CurrentBlock::None);
        assert!(!acc.has_thinking());
        assert!(acc.take_tool_call(0).is_none());
    }
}
