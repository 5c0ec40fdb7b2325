//! Error types for skald-autopilot

use thiserror::Error;

/// Result type alias using skald-autopilot Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while handling autopilot configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem access to the config file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized for writing
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
