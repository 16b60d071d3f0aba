//! Error types for the storage layer.

use std::path::PathBuf;
use thiserror::Error;
use tracker_core::CoreError;

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Infrastructure failures of a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Workspace not found at the specified path.
    #[error("workspace not found at '{0}'")]
    WorkspaceNotFound(PathBuf),

    /// Workspace already exists.
    #[error("workspace already exists at '{0}'")]
    WorkspaceExists(PathBuf),

    /// A work item type file could not be registered.
    #[error("invalid work item type in '{path}': {reason}")]
    InvalidSchema { path: PathBuf, reason: String },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}
