//! Autopilot orchestration across conversations
//!
//! `Autopilot` maps conversation ids to their session state machines and
//! translates conversation-level signals into session transitions. It
//! never executes tools or submits requests itself: external code posts
//! tool results into the conversation, signals completion here, and acts
//! when the returned state is `Sending`.

use std::collections::HashMap;

use skald_wire::{Conversation, Turn};

use crate::config::Config;
use crate::ledger::ToolLedger;
use crate::session::{AutopilotSession, AutopilotState};

pub struct Autopilot {
    sessions: HashMap<String, AutopilotSession>,
    enabled: bool,
    max_turns: u32,
}

impl Autopilot {
    pub fn new(config: &Config) -> Self {
        Self {
            sessions: HashMap::new(),
            enabled: config.autopilot_enabled(),
            max_turns: config.max_turns(),
        }
    }

    /// Whether a config opts into autopilot at all
    pub fn is_enabled(config: &Config) -> bool {
        config.autopilot_enabled()
    }

    /// Current state for a conversation. Unknown conversations are idle.
    pub fn get_state(&self, id: &str) -> AutopilotState {
        self.sessions
            .get(id)
            .map(|s| s.state())
            .unwrap_or(AutopilotState::Idle)
    }

    /// Iterations consumed by the current loop
    pub fn iteration_count(&self, id: &str) -> u32 {
        self.sessions.get(id).map(|s| s.iteration_count()).unwrap_or(0)
    }

    /// Force a conversation into the armed state
    pub fn arm(&mut self, id: &str) {
        self.session_mut(id).arm();
    }

    /// Stop the loop for a conversation and reset its iteration budget
    pub fn disarm(&mut self, id: &str) {
        if let Some(session) = self.sessions.get_mut(id) {
            session.disarm();
        }
    }

    /// A response finished for this conversation. No-op while autopilot is
    /// disabled. Arms or stops per the latest assistant turn, then
    /// immediately re-checks the tool ledger: approved calls can execute
    /// synchronously and finish before arming completes, and that
    /// completion signal must not be lost to the armed-only guard.
    pub fn on_response_complete(
        &mut self,
        id: &str,
        conversation: &Conversation,
    ) -> AutopilotState {
        if !self.enabled {
            return self.get_state(id);
        }

        let has_tool_calls = conversation
            .last_assistant_turn()
            .is_some_and(Turn::has_tool_uses);

        let session = self.session_mut(id);
        let state = session.note_response(has_tool_calls);
        if state != AutopilotState::Armed {
            return state;
        }

        let verdict = ToolLedger::from_conversation(conversation).evaluate();
        session.note_tools(verdict)
    }

    /// Tool execution reported completion for this conversation. Only an
    /// armed session reacts; every other state absorbs the signal.
    pub fn on_tools_complete(&mut self, id: &str, conversation: &Conversation) -> AutopilotState {
        let Some(session) = self.sessions.get_mut(id) else {
            return AutopilotState::Idle;
        };

        let verdict = ToolLedger::from_conversation(conversation).evaluate();
        session.note_tools(verdict)
    }

    /// Drop all state for a conversation
    pub fn cleanup(&mut self, id: &str) {
        self.sessions.remove(id);
    }

    fn session_mut(&mut self, id: &str) -> &mut AutopilotSession {
        let max_turns = self.max_turns;
        self.sessions
            .entry(id.to_string())
            .or_insert_with(|| AutopilotSession::new(max_turns))
    }
}
