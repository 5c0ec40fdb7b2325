//! Core conversation and request types

use serde::{Deserialize, Serialize};

use crate::thinking::{ThinkingIntensity, ThinkingOverrides};

/// Turn roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// Content parts within a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Plain text content
    Text { text: String },
    /// Reasoning content. When `redacted` is true, `text` holds the
    /// vendor's opaque ciphertext and `signature` is always `None`.
    Thinking {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
        #[serde(default)]
        redacted: bool,
    },
    /// Tool invocation requested by the model
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Result for a prior tool invocation. `pending` marks a placeholder
    /// still awaiting execution or human approval.
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: String,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        pending: bool,
    },
}

impl Part {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an unsigned thinking part
    pub fn thinking(text: impl Into<String>) -> Self {
        Self::Thinking {
            text: text.into(),
            signature: None,
            redacted: false,
        }
    }

    /// Create a signed thinking part
    pub fn signed_thinking(text: impl Into<String>, signature: impl Into<String>) -> Self {
        Self::Thinking {
            text: text.into(),
            signature: Some(signature.into()),
            redacted: false,
        }
    }

    /// Create a redacted thinking part from opaque ciphertext
    pub fn redacted_thinking(data: impl Into<String>) -> Self {
        Self::Thinking {
            text: data.into(),
            signature: None,
            redacted: true,
        }
    }

    /// Create a tool use part
    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Create a completed tool result
    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: content.into(),
            is_error,
            pending: false,
        }
    }

    /// Create a pending placeholder result
    pub fn pending_result(tool_use_id: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: String::new(),
            is_error: false,
            pending: true,
        }
    }

    /// Get text if this is a text part
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Check if this is a tool use part
    pub fn is_tool_use(&self) -> bool {
        matches!(self, Self::ToolUse { .. })
    }
}

/// A single conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Turn {
    /// Create a turn with the given role and parts
    pub fn new(role: Role, parts: Vec<Part>) -> Self {
        Self {
            role,
            parts,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Create a system turn with text content
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, vec![Part::text(text)])
    }

    /// Create a user turn with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![Part::text(text)])
    }

    /// Create an assistant turn from parts
    pub fn assistant(parts: Vec<Part>) -> Self {
        Self::new(Role::Assistant, parts)
    }

    /// Extract all tool use parts as (id, name, input)
    pub fn tool_uses(&self) -> Vec<(&str, &str, &serde_json::Value)> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::ToolUse { id, name, input } => Some((id.as_str(), name.as_str(), input)),
                _ => None,
            })
            .collect()
    }

    /// Check if this turn requests any tool invocations
    pub fn has_tool_uses(&self) -> bool {
        self.parts.iter().any(Part::is_tool_use)
    }

    /// Get combined text content
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::as_text)
            .collect::<Vec<_>>()
            .join("")
    }
}

/// An ordered sequence of turns plus the tool-result bookkeeping the
/// orchestration layer reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// The most recent assistant turn, if any
    pub fn last_assistant_turn(&self) -> Option<&Turn> {
        self.turns.iter().rev().find(|t| t.role == Role::Assistant)
    }

    /// Find the result part for a tool use id
    pub fn tool_result_for(&self, tool_use_id: &str) -> Option<&Part> {
        self.turns.iter().flat_map(|t| t.parts.iter()).find(|p| {
            matches!(p, Part::ToolResult { tool_use_id: id, .. } if id == tool_use_id)
        })
    }

    /// Check whether any turn contains a tool use with this id
    pub fn has_tool_use(&self, tool_use_id: &str) -> bool {
        self.turns.iter().flat_map(|t| t.parts.iter()).any(|p| {
            matches!(p, Part::ToolUse { id, .. } if id == tool_use_id)
        })
    }

    /// Look up the tool name for a tool use id
    pub fn tool_name_for(&self, tool_use_id: &str) -> Option<&str> {
        self.turns.iter().flat_map(|t| t.parts.iter()).find_map(|p| match p {
            Part::ToolUse { id, name, .. } if id == tool_use_id => Some(name.as_str()),
            _ => None,
        })
    }

    /// Stage pending placeholder results for every tool use in the last
    /// assistant turn that has no result yet. Returns how many were staged.
    pub fn stage_pending_results(&mut self) -> usize {
        let ids: Vec<String> = self
            .last_assistant_turn()
            .map(|t| t.tool_uses().iter().map(|(id, _, _)| id.to_string()).collect())
            .unwrap_or_default();

        let missing: Vec<String> = ids
            .into_iter()
            .filter(|id| self.tool_result_for(id).is_none())
            .collect();

        if missing.is_empty() {
            return 0;
        }
        let parts: Vec<Part> = missing.iter().map(Part::pending_result).collect();
        let staged = parts.len();
        self.append_result_parts(parts);
        staged
    }

    /// Fill in the result for a tool use. Replaces a pending placeholder in
    /// place, or appends a new result part when none was staged. Returns
    /// false if the id does not match any tool use in the conversation.
    pub fn resolve_tool_result(
        &mut self,
        tool_use_id: &str,
        content: impl Into<String>,
        is_error: bool,
    ) -> bool {
        if !self.has_tool_use(tool_use_id) {
            return false;
        }
        let content = content.into();
        if let Some((ti, pi)) = self.find_result_part(tool_use_id, false) {
            if let Part::ToolResult {
                content: slot,
                is_error: err,
                pending,
                ..
            } = &mut self.turns[ti].parts[pi]
            {
                *slot = content;
                *err = is_error;
                *pending = false;
            }
            return true;
        }
        self.append_result_parts(vec![Part::tool_result(tool_use_id, content, is_error)]);
        true
    }

    /// Write content into a pending placeholder without resolving it. This
    /// is how a human edit is recorded before approval completes. Returns
    /// false if no pending placeholder matches.
    pub fn edit_pending_result(&mut self, tool_use_id: &str, content: impl Into<String>) -> bool {
        if let Some((ti, pi)) = self.find_result_part(tool_use_id, true) {
            if let Part::ToolResult { content: slot, .. } = &mut self.turns[ti].parts[pi] {
                *slot = content.into();
            }
            return true;
        }
        false
    }

    fn find_result_part(&self, tool_use_id: &str, pending_only: bool) -> Option<(usize, usize)> {
        self.turns.iter().enumerate().find_map(|(ti, turn)| {
            turn.parts
                .iter()
                .position(|p| match p {
                    Part::ToolResult {
                        tool_use_id: id,
                        pending,
                        ..
                    } => id == tool_use_id && (*pending || !pending_only),
                    _ => false,
                })
                .map(|pi| (ti, pi))
        })
    }

    // Results ride on a trailing user turn; reuse it if one is already there.
    fn append_result_parts(&mut self, parts: Vec<Part>) {
        match self.turns.last_mut() {
            Some(turn) if turn.role == Role::User => turn.parts.extend(parts),
            _ => self.turns.push(Turn::new(Role::User, parts)),
        }
    }
}

/// Tool definition advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name (used in API calls)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    /// Create a new tool definition
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Options for an outbound request
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Unified thinking intensity
    pub thinking: ThinkingIntensity,
    /// Vendor-native overrides that win over the unified setting
    pub thinking_overrides: ThinkingOverrides,
    /// Available tools
    pub tools: Vec<ToolSpec>,
}

/// Token usage categories reported by vendors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Input,
    Output,
    Thoughts,
    CacheRead,
    CacheWrite,
}

/// Token usage for one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input: u32,
    pub output: u32,
    pub thoughts: u32,
    pub cache_read: u32,
    pub cache_write: u32,
}

impl Usage {
    /// Record a per-category report. Vendors re-report running totals, so
    /// the latest value wins.
    pub fn record(&mut self, kind: UsageKind, tokens: u32) {
        match kind {
            UsageKind::Input => self.input = tokens,
            UsageKind::Output => self.output = tokens,
            UsageKind::Thoughts => self.thoughts = tokens,
            UsageKind::CacheRead => self.cache_read = tokens,
            UsageKind::CacheWrite => self.cache_write = tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation_with_tool_calls() -> Conversation {
        let mut conv = Conversation::new();
        conv.push(Turn::user("list the files"));
        conv.push(Turn::assistant(vec![
            Part::text("Let me check."),
            Part::tool_use("call_1", "ls", json!({"path": "."})),
            Part::tool_use("call_2", "pwd", json!({})),
        ]));
        conv
    }

    #[test]
    fn test_stage_pending_results() {
        let mut conv = conversation_with_tool_calls();
        assert_eq!(conv.stage_pending_results(), 2);
        assert!(matches!(
            conv.tool_result_for("call_1"),
            Some(Part::ToolResult { pending: true, .. })
        ));
        // Staging again is a no-op.
        assert_eq!(conv.stage_pending_results(), 0);
    }

    #[test]
    fn test_resolve_replaces_placeholder_in_place() {
        let mut conv = conversation_with_tool_calls();
        conv.stage_pending_results();
        let turns_before = conv.turns.len();

        assert!(conv.resolve_tool_result("call_1", "a.txt\nb.txt", false));
        assert_eq!(conv.turns.len(), turns_before);
        match conv.tool_result_for("call_1") {
            Some(Part::ToolResult { content, pending, is_error, .. }) => {
                assert_eq!(content, "a.txt\nb.txt");
                assert!(!pending);
                assert!(!is_error);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_resolve_without_placeholder_appends() {
        let mut conv = conversation_with_tool_calls();
        assert!(conv.resolve_tool_result("call_2", "/home/user", false));
        assert!(matches!(
            conv.tool_result_for("call_2"),
            Some(Part::ToolResult { pending: false, .. })
        ));
    }

    #[test]
    fn test_resolve_unknown_id_rejected() {
        let mut conv = conversation_with_tool_calls();
        assert!(!conv.resolve_tool_result("call_99", "output", false));
        assert!(conv.tool_result_for("call_99").is_none());
    }

    #[test]
    fn test_edit_pending_keeps_placeholder_pending() {
        let mut conv = conversation_with_tool_calls();
        conv.stage_pending_results();
        assert!(conv.edit_pending_result("call_1", "ran it myself: a.txt"));
        match conv.tool_result_for("call_1") {
            Some(Part::ToolResult { content, pending, .. }) => {
                assert_eq!(content, "ran it myself: a.txt");
                assert!(*pending);
            }
            other => panic!("unexpected part: {other:?}"),
        }
    }

    #[test]
    fn test_edit_resolved_result_fails() {
        let mut conv = conversation_with_tool_calls();
        conv.resolve_tool_result("call_1", "done", false);
        assert!(!conv.edit_pending_result("call_1", "changed"));
    }

    #[test]
    fn test_tool_uses_extraction() {
        let conv = conversation_with_tool_calls();
        let turn = conv.last_assistant_turn().unwrap();
        let uses = turn.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].0, "call_1");
        assert_eq!(uses[1].1, "pwd");
        assert!(turn.has_tool_uses());
    }

    #[test]
    fn test_tool_name_lookup() {
        let conv = conversation_with_tool_calls();
        assert_eq!(conv.tool_name_for("call_2"), Some("pwd"));
        assert_eq!(conv.tool_name_for("call_99"), None);
    }

    #[test]
    fn test_usage_record_latest_wins() {
        let mut usage = Usage::default();
        usage.record(UsageKind::Output, 10);
        usage.record(UsageKind::Output, 42);
        usage.record(UsageKind::Input, 120);
        assert_eq!(usage.output, 42);
        assert_eq!(usage.input, 120);
        assert_eq!(usage.cache_read, 0);
    }
}
