//! Error types for projmark.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::output::OutputError;
use crate::walker::WalkError;

/// Top-level error type for projmark operations.
#[derive(Debug, thiserror::Error)]
pub enum ProjmarkError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(WalkError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("output error: {0}")]
    Output(#[from] OutputError),
}

impl From<WalkError> for ProjmarkError {
    fn from(error: WalkError) -> Self {
        match error {
            WalkError::NotFound { path } => ProjmarkError::PathNotFound(path),
            WalkError::NotADirectory { path } => ProjmarkError::NotADirectory(path),
            other => ProjmarkError::Walk(other),
        }
    }
}

/// Map an error to its exit code.
pub fn exit_code(error: &ProjmarkError) -> i32 {
    match error {
        ProjmarkError::PathNotFound(_) => 3,
        ProjmarkError::NotADirectory(_) => 3,
        ProjmarkError::Io(_) => 1,
        ProjmarkError::Walk(_) => 2,
        ProjmarkError::Config(_) => 2,
        ProjmarkError::Output(_) => 4,
    }
}
