//! Error types for settings access and credential provisioning.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProvisionError>;

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("can't determine your home directory; make sure {0} is set")]
    MissingHome(&'static str),

    #[error("provisioning toolchain not found at {}", .0.display())]
    ToolchainMissing(std::path::PathBuf),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("staging toolchain scripts failed: {0}")]
    Staging(String),

    /// The toolchain ran but replied with a failure, or its reply channel
    /// carried bytes that do not parse as JSON. `raw_dump` preserves the
    /// raw reply text for diagnosis.
    #[error("toolchain failure: {reason}")]
    ReplyFailure { reason: String, raw_dump: String },

    #[error("no team is associated with this account, cannot proceed")]
    NoTeams,

    #[error("invalid team selection: {0}")]
    InvalidSelection(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
