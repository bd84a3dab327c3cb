//! Error types for the migration proxy
//!
//! Only [`MigrationError::AuthoritativeFailure`] describes something the
//! caller sees, and the caller sees it as the original [`RepositoryError`].
//! Every other kind is absorbed by the proxy and surfaces through telemetry.

use shadow_contract::{Backend, RepositoryError};
use std::path::PathBuf;
use ulid::Ulid;

/// Failure kinds observed while serving a proxied call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MigrationError {
    /// The backend serving the real answer failed
    #[error("authoritative {backend} backend failed: {source}")]
    AuthoritativeFailure {
        /// Authoritative backend
        backend: Backend,
        /// Original backend error, returned to the caller verbatim
        source: RepositoryError,
    },

    /// The non-authoritative backend failed
    #[error("shadow {backend} backend failed: {source}")]
    ShadowFailure {
        /// Shadow backend
        backend: Backend,
        /// Backend error
        source: RepositoryError,
    },

    /// The non-authoritative backend did not answer in time
    #[error("shadow {backend} backend timed out after {timeout_ms}ms")]
    ShadowTimeout {
        /// Shadow backend
        backend: Backend,
        /// Applied timeout
        timeout_ms: u64,
    },

    /// The comparator failed
    #[error("verification failed: {0}")]
    VerificationError(String),

    /// Flag refresh failed; cached flags stay in use
    #[error("flag lookup failed: {0}")]
    FlagLookupFailure(String),
}

impl MigrationError {
    /// Whether the caller observes this error
    #[inline]
    #[must_use]
    pub fn is_caller_visible(&self) -> bool {
        matches!(self, Self::AuthoritativeFailure { .. })
    }

    /// Whether this is a shadow failure (timeouts included)
    #[inline]
    #[must_use]
    pub fn is_shadow_failure(&self) -> bool {
        matches!(self, Self::ShadowFailure { .. } | Self::ShadowTimeout { .. })
    }

    /// Stable label for logs and metrics
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthoritativeFailure { .. } => "authoritative_failure",
            Self::ShadowFailure { .. } => "shadow_failure",
            Self::ShadowTimeout { .. } => "shadow_timeout",
            Self::VerificationError(_) => "verification_error",
            Self::FlagLookupFailure(_) => "flag_lookup_failure",
        }
    }
}

impl From<shadow_flags::FlagError> for MigrationError {
    fn from(err: shadow_flags::FlagError) -> Self {
        Self::FlagLookupFailure(err.to_string())
    }
}

/// Configuration loading and validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file unreadable
    #[error("failed to read config {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text malformed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config value out of range
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Global subscriber could not be installed
    #[error("logging setup failed: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create invalid value error
    #[inline]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Divergence alert lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    /// No alert with this id
    #[error("unknown alert {0}")]
    Unknown(Ulid),

    /// Alert already resolved
    #[error("alert {0} already resolved")]
    AlreadyResolved(Ulid),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_authoritative_failures_reach_callers() {
        let auth = MigrationError::AuthoritativeFailure {
            backend: Backend::Legacy,
            source: RepositoryError::not_found("task", "t1"),
        };
        let timeout = MigrationError::ShadowTimeout {
            backend: Backend::New,
            timeout_ms: 250,
        };
        assert!(auth.is_caller_visible());
        assert!(!timeout.is_caller_visible());
        assert!(timeout.is_shadow_failure());
        assert!(!MigrationError::VerificationError("x".into()).is_shadow_failure());
    }

    #[test]
    fn display_keeps_backend_message() {
        let err = MigrationError::ShadowFailure {
            backend: Backend::New,
            source: RepositoryError::backend("E42", "disk full"),
        };
        assert_eq!(
            err.to_string(),
            "shadow new backend failed: backend error [E42]: disk full"
        );
        assert_eq!(err.kind(), "shadow_failure");
    }

    #[test]
    fn flag_errors_convert() {
        let err: MigrationError =
            shadow_flags::FlagError::StoreUnavailable("db down".into()).into();
        assert_eq!(err.kind(), "flag_lookup_failure");
    }
}
