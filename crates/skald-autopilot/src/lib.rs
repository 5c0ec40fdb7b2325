//! Autonomous tool-loop orchestration
//!
//! When a model response requests tool calls, something has to decide
//! whether the conversation continues by itself or waits for a human.
//! This crate owns that decision: a per-conversation state machine fed by
//! two completion signals (response finished, tools finished) and a
//! read-only ledger over the conversation's tool results. Actual request
//! submission and tool execution stay outside; callers act when the
//! state machine says `Sending`.

pub mod autopilot;
pub mod config;
pub mod error;
pub mod ledger;
pub mod session;

pub use autopilot::Autopilot;
pub use config::{AutopilotConfig, Config, config_dir, config_path};
pub use error::{Error, Result};
pub use ledger::{LedgerEntry, LedgerVerdict, ToolCallStatus, ToolLedger};
pub use session::{AutopilotSession, AutopilotState};
