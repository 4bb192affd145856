use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, parsing or validating the
/// server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly named config file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to write the default config template.
    #[error("failed to create default config: {0}")]
    CreateDefault(String),

    /// TOML parsing failed.
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A config value failed validation.
    #[error("validation error: {field}: {message}")]
    Validation {
        /// The dotted field path (e.g. `server.port`).
        field: String,
        message: String,
    },

    /// No config directory could be determined for this user.
    #[error("no config directory available")]
    NoConfigDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
