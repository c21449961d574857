use std::path::PathBuf;

use thiserror::Error;

use crate::manager::ExecuteError;
use crate::registry::RegistryError;

/// Errors surfaced by the scanner component.
///
/// Per-item failures inside a cycle are handled locally (logged, item
/// skipped); these variants cover cycle-level and lifecycle failures.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The watched root could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration model could not be consulted.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The execution collaborator rejected or failed a plan.
    #[error("plan execution failed: {0}")]
    Execution(#[from] ExecuteError),

    /// The configured deployment directory does not exist.
    #[error("deployment directory does not exist: {0}")]
    DirectoryDoesNotExist(PathBuf),

    /// The configured deployment directory is not a directory.
    #[error("deployment directory is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The configured deployment directory is not writable.
    #[error("deployment directory is not writable: {0}")]
    DirectoryNotWritable(PathBuf),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanError>;
