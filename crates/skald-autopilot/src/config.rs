//! Configuration file handling
//!
//! Settings live in a TOML file under the platform config directory. The
//! `[autopilot]` table opts a deployment into autonomous tool loops; while
//! the table is absent autopilot stays off entirely. `[vendors.<key>]`
//! tables override the built-in thinking capabilities per vendor.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use skald_wire::{ThinkingCapabilities, Vendor};

use crate::error::Result;

const DEFAULT_MAX_TURNS: u32 = 25;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Autonomous tool-loop settings. Absent means autopilot is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autopilot: Option<AutopilotConfig>,

    /// Per-vendor thinking capability overrides, keyed by vendor key
    /// (`anthropic`, `openai`, `google`).
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub vendors: HashMap<String, ThinkingCapabilities>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Whether autopilot may drive the loop. Defaults on once the table exists.
    pub enabled: bool,

    /// Consecutive tool-call iterations allowed before the loop is cut off
    pub max_turns: u32,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("skald")
}

/// Get the config file path, honoring the `SKALD_CONFIG_PATH` override
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("SKALD_CONFIG_PATH") {
        return PathBuf::from(path);
    }
    config_dir().join("config.toml")
}

impl Config {
    /// Load config from disk, falling back to defaults on any failure
    pub fn load() -> Self {
        let path = config_path();
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        let path = config_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;
        Ok(())
    }

    /// Create a default config file if one does not exist yet
    pub fn init() -> Result<PathBuf> {
        let path = config_path();
        if !path.exists() {
            Self::default().save()?;
        }
        Ok(path)
    }

    /// Whether autopilot is enabled: requires the table to be present and
    /// not explicitly switched off
    pub fn autopilot_enabled(&self) -> bool {
        self.autopilot.as_ref().is_some_and(|a| a.enabled)
    }

    /// Iteration limit for autonomous loops
    pub fn max_turns(&self) -> u32 {
        self.autopilot
            .as_ref()
            .map(|a| a.max_turns)
            .unwrap_or(DEFAULT_MAX_TURNS)
    }

    /// Thinking capability override for a vendor, if configured
    pub fn capabilities_for(&self, vendor: Vendor) -> Option<ThinkingCapabilities> {
        self.vendors.get(vendor.key()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_disables_autopilot() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.autopilot.is_none());
        assert!(!config.autopilot_enabled());
        assert_eq!(config.max_turns(), 25);
    }

    #[test]
    fn test_bare_table_enables_autopilot_with_defaults() {
        let config: Config = toml::from_str("[autopilot]").unwrap();
        assert!(config.autopilot_enabled());
        assert_eq!(config.max_turns(), 25);
    }

    #[test]
    fn test_explicit_disable_wins_over_table_presence() {
        let config: Config = toml::from_str("[autopilot]\nenabled = false").unwrap();
        assert!(config.autopilot.is_some());
        assert!(!config.autopilot_enabled());
    }

    #[test]
    fn test_max_turns_override() {
        let config: Config = toml::from_str("[autopilot]\nmax_turns = 5").unwrap();
        assert!(config.autopilot_enabled());
        assert_eq!(config.max_turns(), 5);
    }

    #[test]
    fn test_vendor_capability_override() {
        let config: Config = toml::from_str(
            r#"
[vendors.google]
supports_budget = true
min_budget = 512
"#,
        )
        .unwrap();

        let caps = config.capabilities_for(Vendor::Google).unwrap();
        assert!(caps.supports_budget);
        assert!(!caps.supports_effort);
        assert_eq!(caps.min_budget, 512);
        assert!(config.capabilities_for(Vendor::OpenAI).is_none());
    }

    #[test]
    fn test_default_config_round_trips() {
        let config = Config {
            autopilot: Some(AutopilotConfig::default()),
            vendors: HashMap::new(),
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert!(parsed.autopilot_enabled());
        assert_eq!(parsed.max_turns(), 25);
    }
}
