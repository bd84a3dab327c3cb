//! Repository error type
//!
//! Backends report failures through [`RepositoryError`]. The migration proxy
//! hands the authoritative backend's error back to the caller untouched, so
//! the variants carry everything existing error handling relies on.

use serde::{Deserialize, Serialize};

/// Errors raised by a repository backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum RepositoryError {
    /// Entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind name
        entity: String,
        /// Requested identifier
        id: String,
    },

    /// Write conflicts with existing state
    #[error("conflict: {0}")]
    Conflict(String),

    /// Input rejected by the backend
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Backend unreachable or overloaded
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Backend-specific failure with its native code
    #[error("backend error [{code}]: {message}")]
    Backend {
        /// Native error code as reported by the storage client
        code: String,
        /// Native error message
        message: String,
    },
}

impl RepositoryError {
    /// Create not-found error
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Create backend error with native code
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Stable short code, used as a metrics label
    #[inline]
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidInput(_) => "invalid_input",
            Self::Unavailable(_) => "unavailable",
            Self::Backend { code, .. } => code,
        }
    }
}

/// Result alias for repository operations
pub type RepoResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = RepositoryError::not_found("task", "t-1");
        assert_eq!(err.to_string(), "task not found: t-1");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn backend_error_keeps_native_code() {
        let err = RepositoryError::backend("PG-40001", "serialization failure");
        assert_eq!(err.code(), "PG-40001");
        assert!(err.to_string().contains("serialization failure"));
    }

    #[test]
    fn errors_compare_by_value() {
        assert_eq!(
            RepositoryError::Conflict("dup".into()),
            RepositoryError::Conflict("dup".into())
        );
    }
}
