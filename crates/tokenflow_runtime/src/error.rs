//! Error types for tokenflow_runtime

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or checking an [`EngineConfig`](crate::EngineConfig)
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("Config parsing failed: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config could not be written back out
    #[error("Config serialization failed: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is out of range
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
