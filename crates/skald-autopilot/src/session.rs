//! Per-conversation autopilot session state
//!
//! Each conversation owns one session. The session is a synchronous state
//! machine: completion signals arrive as plain method calls, and the
//! no-op guard on `note_tools` absorbs signals that land in the wrong
//! state (stale, duplicated, or delivered before arming finished).

use serde::{Deserialize, Serialize};

use crate::ledger::LedgerVerdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutopilotState {
    /// At rest; the conversation is waiting on the human
    #[default]
    Idle,
    /// The latest model turn requested tools and the loop may proceed
    Armed,
    /// Every tool call resolved; the next request should be submitted
    Sending,
    /// Halted pending a human decision on at least one tool call
    Paused,
}

#[derive(Debug)]
pub struct AutopilotSession {
    state: AutopilotState,
    iteration_count: u32,
    max_turns: u32,
}

impl AutopilotSession {
    pub fn new(max_turns: u32) -> Self {
        Self {
            state: AutopilotState::Idle,
            iteration_count: 0,
            max_turns,
        }
    }

    pub fn state(&self) -> AutopilotState {
        self.state
    }

    pub fn iteration_count(&self) -> u32 {
        self.iteration_count
    }

    pub fn arm(&mut self) {
        self.state = AutopilotState::Armed;
    }

    /// Return to rest and reset the iteration budget
    pub fn disarm(&mut self) {
        self.state = AutopilotState::Idle;
        self.iteration_count = 0;
    }

    /// A response finished. Tool calls arm the loop and consume one
    /// iteration; exceeding the budget stops the loop instead of arming.
    /// The counter persists across the stop and only `disarm` clears it.
    pub fn note_response(&mut self, has_tool_calls: bool) -> AutopilotState {
        if !has_tool_calls {
            self.state = AutopilotState::Idle;
            return self.state;
        }

        self.iteration_count += 1;
        if self.iteration_count > self.max_turns {
            tracing::warn!(
                iterations = self.iteration_count,
                max_turns = self.max_turns,
                "autopilot iteration limit reached, stopping loop"
            );
            self.state = AutopilotState::Idle;
        } else {
            self.state = AutopilotState::Armed;
        }
        self.state
    }

    /// Tool execution reported completion. Only meaningful while armed.
    pub fn note_tools(&mut self, verdict: LedgerVerdict) -> AutopilotState {
        if self.state != AutopilotState::Armed {
            return self.state;
        }

        match verdict {
            LedgerVerdict::AwaitingExecution => {}
            LedgerVerdict::AwaitingApproval => {
                tracing::debug!("pending tool results need approval, pausing");
                self.state = AutopilotState::Paused;
            }
            LedgerVerdict::ReadyToSend => self.state = AutopilotState::Sending,
        }
        self.state
    }
}
