//! Tool-call completion ledger
//!
//! When an assistant turn requests tool invocations, each call resolves
//! independently and in any order. The ledger snapshots the completion
//! state of every call in the latest assistant turn so the session state
//! machine can decide whether the loop may continue.
//!
//! A result delivered with `is_error` set still counts as resolved: a
//! denied or failed tool call is an answer the model can react to, not a
//! reason to stall the loop.

use skald_wire::{Conversation, Part};

/// Completion state of a single requested tool call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallStatus {
    /// No result part exists yet
    Missing,
    /// A placeholder result was staged and nobody touched it
    Pending,
    /// A placeholder result was staged and its content was edited
    PendingEdited,
    /// A real result (success or error) is recorded
    Resolved,
}

/// One requested tool call and where it stands
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub tool_use_id: String,
    pub name: String,
    pub status: ToolCallStatus,
}

/// What the ledger as a whole says about continuing the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerVerdict {
    /// At least one call has no result at all
    AwaitingExecution,
    /// Every call has a result but at least one is an untouched placeholder
    AwaitingApproval,
    /// Every call resolved (edits to placeholders count)
    ReadyToSend,
}

#[derive(Debug, Clone, Default)]
pub struct ToolLedger {
    pub entries: Vec<LedgerEntry>,
}

impl ToolLedger {
    /// Snapshot the completion state of the latest assistant turn's tool calls
    pub fn from_conversation(conversation: &Conversation) -> Self {
        let Some(turn) = conversation.last_assistant_turn() else {
            return Self::default();
        };

        let entries = turn
            .tool_uses()
            .iter()
            .map(|(id, name, _)| {
                let status = match conversation.tool_result_for(id) {
                    None => ToolCallStatus::Missing,
                    Some(Part::ToolResult {
                        pending: true,
                        content,
                        ..
                    }) if content.is_empty() => ToolCallStatus::Pending,
                    Some(Part::ToolResult { pending: true, .. }) => ToolCallStatus::PendingEdited,
                    Some(_) => ToolCallStatus::Resolved,
                };
                LedgerEntry {
                    tool_use_id: id.to_string(),
                    name: name.to_string(),
                    status,
                }
            })
            .collect();

        Self { entries }
    }

    pub fn evaluate(&self) -> LedgerVerdict {
        if self
            .entries
            .iter()
            .any(|e| e.status == ToolCallStatus::Missing)
        {
            LedgerVerdict::AwaitingExecution
        } else if self
            .entries
            .iter()
            .any(|e| e.status == ToolCallStatus::Pending)
        {
            LedgerVerdict::AwaitingApproval
        } else {
            LedgerVerdict::ReadyToSend
        }
    }
}
