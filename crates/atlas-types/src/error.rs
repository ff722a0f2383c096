//! Error types for the Atlas shell.

use std::io;

/// Errors produced by the Atlas crates.
#[derive(Debug, thiserror::Error)]
pub enum AtlasError {
    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("module not found: {0}")]
    NotFound(String),

    #[error("load failure: {0}")]
    Load(#[from] LoadError),

    #[error("module cycle detected at {0}")]
    Cycle(String),

    #[error("command error: {0}")]
    Command(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Reasons a module load can fail.
///
/// A failed load never leaves a partially bound module behind.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The descriptor could not be retrieved.
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The descriptor is not valid JSON or does not have the descriptor shape.
    #[error("malformed descriptor: {0}")]
    Malformed(serde_json::Error),

    /// The descriptor parsed but breaks a structural rule.
    #[error("invalid descriptor: {0}")]
    Invalid(String),

    /// A module already occupies the descriptor's path.
    #[error("module {0} already exists")]
    Collision(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AtlasError>;
