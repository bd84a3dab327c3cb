//! Lifecycle of a single dual call
//!
//! ```text
//! Started ──► AuthoritativeDone ──► NonAuthDone ──► Compared
//!    │                 └──────────► NonAuthFailed ──► Logged
//!    └──► AuthoritativeFailed
//! ```

use std::fmt;

/// State of one dual call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DualCallState {
    /// Nothing has returned yet
    Started,
    /// Authoritative result is in
    AuthoritativeDone,
    /// Authoritative backend failed (terminal)
    AuthoritativeFailed,
    /// Shadow result is in
    NonAuthDone,
    /// Shadow backend failed or timed out
    NonAuthFailed,
    /// Comparison record emitted (terminal)
    Compared,
    /// Shadow failure recorded (terminal)
    Logged,
}

impl DualCallState {
    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AuthoritativeFailed | Self::Compared | Self::Logged)
    }

    /// Whether `next` directly follows `self`
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Started, Self::AuthoritativeDone | Self::AuthoritativeFailed)
                | (Self::AuthoritativeDone, Self::NonAuthDone | Self::NonAuthFailed)
                | (Self::NonAuthDone, Self::Compared)
                | (Self::NonAuthFailed, Self::Logged)
        )
    }

    /// Lowercase name for logs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::AuthoritativeDone => "authoritative_done",
            Self::AuthoritativeFailed => "authoritative_failed",
            Self::NonAuthDone => "non_auth_done",
            Self::NonAuthFailed => "non_auth_failed",
            Self::Compared => "compared",
            Self::Logged => "logged",
        }
    }
}

impl fmt::Display for DualCallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one dual call through its states
#[derive(Debug)]
pub struct DualCall {
    operation: String,
    state: DualCallState,
}

impl DualCall {
    /// Begin tracking a call for `operation`
    #[must_use]
    pub fn start(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            state: DualCallState::Started,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> DualCallState {
        self.state
    }

    /// Move to `next`; an illegal transition is logged and ignored
    pub fn advance(&mut self, next: DualCallState) -> bool {
        if self.state.can_advance_to(next) {
            tracing::trace!(
                operation = %self.operation,
                from = %self.state,
                to = %next,
                "Dual call advanced"
            );
            self.state = next;
            true
        } else {
            tracing::warn!(
                operation = %self.operation,
                from = %self.state,
                to = %next,
                "Illegal dual call transition"
            );
            false
        }
    }
}
