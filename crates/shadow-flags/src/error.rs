//! Error types for flag loading

use std::path::PathBuf;

/// Errors while loading or validating feature flags
#[derive(Debug, thiserror::Error)]
pub enum FlagError {
    /// Flag store could not be reached
    #[error("flag store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error reading a flag file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Flag document could not be parsed
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// File extension has no known format
    #[error("unsupported flag file format: '{0}'")]
    UnsupportedFormat(String),

    /// A flag row violates its field constraints
    #[error("invalid flag '{key}': {reason}")]
    InvalidFlag { key: String, reason: String },
}

impl FlagError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create parse error for path
    pub fn parse_error(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create validation error for a flag key
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFlag {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_flag_display() {
        let err = FlagError::invalid("task.get", "rollout_percentage 140 exceeds 100");
        assert_eq!(
            err.to_string(),
            "invalid flag 'task.get': rollout_percentage 140 exceeds 100"
        );
    }

    #[test]
    fn unsupported_format_display() {
        let err = FlagError::UnsupportedFormat("ini".into());
        assert_eq!(err.to_string(), "unsupported flag file format: 'ini'");
    }
}
