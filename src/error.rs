//! Engine error type
//!
//! Only setup and session-lifecycle failures are errors. Per-frame data
//! problems (unusable landmarks, out-of-order frames, budget overruns) are
//! absorbed into `Unknown` statuses and diagnostics counters instead.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;
use crate::types::SessionId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Pose not defined in library: {0}")]
    PoseUndefined(String),

    #[error("Invalid rule '{rule}' in pose '{pose}': {reason}")]
    RuleConfigInvalid {
        pose: String,
        rule: String,
        reason: String,
    },

    #[error("Pose '{pose}' is contraindicated for condition '{condition}'")]
    PoseContraindicated { pose: String, condition: String },

    #[error("Session {0} is closed")]
    SessionClosed(SessionId),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Pose library I/O error ({}): {source}", path.display())]
    LibraryIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Pose library parse error ({}): {source}", path.display())]
    LibraryParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Session task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
