//! skald-wire: streaming LLM protocol normalization
//!
//! This crate converts each vendor's Server-Sent-Events wire format
//! (Anthropic, OpenAI, and Google) into one vendor-agnostic event model,
//! covering text, thinking content with signed and redacted variants, tool
//! invocations, and usage accounting.

pub mod accumulator;
pub mod adapters;
pub mod error;
pub mod events;
pub mod models;
pub mod thinking;
pub mod transport;
pub mod types;

pub use adapters::{ProviderAdapter, ResetScope, adapter_for};
pub use error::{Error, Result};
pub use events::{
    ContentEvent, StreamEvent, StreamEventStream, StreamHandler, ToolArguments, TurnAssembler,
    dispatch, dispatch_event,
};
pub use models::{Model, Vendor, builtin_models, default_model, find_model};
pub use thinking::{
    EffortLevel, ThinkingCapabilities, ThinkingDirective, ThinkingIntensity, ThinkingOverrides,
    resolve_thinking,
};
pub use transport::{HttpTransport, RetryConfig, Transport};
pub use types::*;
