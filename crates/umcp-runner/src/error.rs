//! Error types for the runner.

use thiserror::Error;
use umcp_link::{ConfigError, LinkError};

/// Errors surfaced by the `umcp` binary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// File or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file did not parse.
    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Report serialization failed.
    #[error("failed to write report: {0}")]
    Json(#[from] serde_json::Error),

    /// Link-level failure.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Link configuration rejected.
    #[error("invalid link configuration: {0}")]
    LinkConfig(#[from] ConfigError),

    /// Runner configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
