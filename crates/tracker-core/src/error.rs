//! Error types for tracker-core.

use thiserror::Error;

/// Result type alias for tracker-core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by work item operations.
///
/// Every failure a caller can observe falls into one of these four kinds.
/// None of them is retried internally.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Unknown or unparsable identifier.
    #[error("{entity} with id '{id}' not found")]
    NotFound { entity: String, id: String },

    /// A caller-supplied value was rejected.
    #[error("bad value for parameter '{parameter}': '{value}'")]
    BadParameter { parameter: String, value: String },

    /// Claimed version is missing or does not match the stored one.
    #[error("version conflict: {0}")]
    VersionConflict(String),

    /// Failure unrelated to caller input.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a `BadParameter` error.
    ///
    /// The value is rendered the way it appeared on the wire so the caller
    /// can see exactly what was refused.
    #[must_use]
    pub fn bad_parameter(parameter: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self::BadParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Create a `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::VersionConflict(message.into())
    }

    /// Create an `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(err.to_string())
    }
}
