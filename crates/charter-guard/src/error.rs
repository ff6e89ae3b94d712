// error.rs: error types for the request guard.
//
// A blocked stage is not an error; it is a StageResult with `pass=false`.
// These variants only describe misuse by the caller.

use std::path::PathBuf;

use charter_core::CharterError;
use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Debug, Error)]
pub enum GuardError {
    /// Building the rule catalog or reading an artifact failed.
    #[error(transparent)]
    Core(#[from] CharterError),

    /// The pipeline context is malformed.
    #[error("malformed pipeline context: {reason}")]
    MalformedContext { reason: String },

    /// A stage was called out of order for one logical request.
    #[error("cannot run stage {attempted} while the request is at {current}")]
    InvalidTransition { current: Stage, attempted: Stage },

    /// The configuration file exists but could not be read.
    #[error("failed to read config at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for `CharterConfig`.
    #[error("invalid config at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
