//! Thinking/reasoning configuration resolution
//!
//! Vendors disagree on how reasoning is requested: some take a token
//! budget, some take a named effort level, some take nothing. This module
//! resolves a unified setting plus optional vendor-native overrides into
//! the directive one vendor can actually accept.

use serde::{Deserialize, Serialize};

/// Unified thinking intensity
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingIntensity {
    #[default]
    Off,
    Low,
    Medium,
    High,
    /// Explicit token budget
    #[serde(untagged)]
    Budget(f64),
}

/// Raw vendor-native overrides. An explicit override always wins over the
/// unified setting, including an explicit zero (which disables thinking).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThinkingOverrides {
    /// Token budget as the vendor would accept it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget_tokens: Option<f64>,
    /// Effort level as the vendor would accept it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
}

/// What one vendor supports for thinking configuration
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ThinkingCapabilities {
    #[serde(default)]
    pub supports_budget: bool,
    #[serde(default)]
    pub supports_effort: bool,
    /// Smallest budget the vendor accepts
    #[serde(default)]
    pub min_budget: u32,
}

impl ThinkingCapabilities {
    /// Vendor with no thinking support
    pub fn none() -> Self {
        Self::default()
    }

    /// Budget-based vendor with the given minimum
    pub fn budget(min_budget: u32) -> Self {
        Self {
            supports_budget: true,
            supports_effort: false,
            min_budget,
        }
    }

    /// Effort-level vendor
    pub fn effort() -> Self {
        Self {
            supports_budget: false,
            supports_effort: true,
            min_budget: 0,
        }
    }
}

/// Named effort levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffortLevel {
    Low,
    Medium,
    High,
}

impl EffortLevel {
    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EffortLevel::Low => "low",
            EffortLevel::Medium => "medium",
            EffortLevel::High => "high",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(EffortLevel::Low),
            "medium" => Some(EffortLevel::Medium),
            "high" => Some(EffortLevel::High),
            _ => None,
        }
    }

    /// Fixed budget each level maps to on budget-based vendors
    fn budget(self) -> u32 {
        match self {
            EffortLevel::Low => 1024,
            EffortLevel::Medium => 8192,
            EffortLevel::High => 32768,
        }
    }

    /// Nearest level for a numeric budget on effort-based vendors
    fn from_budget(budget: u32) -> Self {
        if budget < 4096 {
            EffortLevel::Low
        } else if budget < 16384 {
            EffortLevel::Medium
        } else {
            EffortLevel::High
        }
    }
}

/// Resolved, vendor-facing thinking directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingDirective {
    Disabled,
    Budget(u32),
    Effort(EffortLevel),
}

impl ThinkingDirective {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ThinkingDirective::Disabled)
    }
}

/// Resolve the effective thinking directive for one vendor.
pub fn resolve_thinking(
    intensity: ThinkingIntensity,
    overrides: &ThinkingOverrides,
    caps: &ThinkingCapabilities,
) -> ThinkingDirective {
    if !caps.supports_budget && !caps.supports_effort {
        return ThinkingDirective::Disabled;
    }

    if let Some(raw) = overrides.budget_tokens {
        return resolve_budget(raw, caps);
    }
    if let Some(effort) = overrides.effort.as_deref() {
        let trimmed = effort.trim();
        if !trimmed.is_empty() {
            match EffortLevel::parse(trimmed) {
                Some(level) => return resolve_level(level, caps),
                None => {
                    // Unrecognized strings fall through like absent ones.
                    tracing::warn!(effort = trimmed, "ignoring unrecognized effort override");
                }
            }
        }
    }

    match intensity {
        ThinkingIntensity::Off => ThinkingDirective::Disabled,
        ThinkingIntensity::Low => resolve_level(EffortLevel::Low, caps),
        ThinkingIntensity::Medium => resolve_level(EffortLevel::Medium, caps),
        ThinkingIntensity::High => resolve_level(EffortLevel::High, caps),
        ThinkingIntensity::Budget(raw) => resolve_budget(raw, caps),
    }
}

// Fractional budgets are floored; zero, negative, or NaN disables.
fn resolve_budget(raw: f64, caps: &ThinkingCapabilities) -> ThinkingDirective {
    let floored = raw.floor();
    if floored.is_nan() || floored <= 0.0 {
        return ThinkingDirective::Disabled;
    }
    let clamped = (floored as u32).max(caps.min_budget);
    if caps.supports_budget {
        ThinkingDirective::Budget(clamped)
    } else {
        ThinkingDirective::Effort(EffortLevel::from_budget(clamped))
    }
}

fn resolve_level(level: EffortLevel, caps: &ThinkingCapabilities) -> ThinkingDirective {
    if caps.supports_effort {
        ThinkingDirective::Effort(level)
    } else {
        ThinkingDirective::Budget(level.budget().max(caps.min_budget))
    }
}
