//! Structured error types for gcscope
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SuperviseError {
    #[error("Target not found: {}", .0.display())]
    TargetNotFound(PathBuf),

    #[error("Failed to set up hook pipe: {0}")]
    PipeSetup(std::io::Error),

    #[error("Failed to launch {}: {}", .target.display(), .error)]
    SpawnFailed { target: PathBuf, error: std::io::Error },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to open log file {}: {}", .path.display(), .error)]
    LogFileOpen { path: PathBuf, error: std::io::Error },
}
