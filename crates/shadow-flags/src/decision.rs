//! Rollout decisions handed to the migration proxy

use serde::{Deserialize, Serialize};
use shadow_contract::Backend;

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No flag configured for the operation
    NoFlag,
    /// Flag is OFF
    Off,
    /// SHADOW mode dual call
    Shadow,
    /// Actor listed in `forced_actor_ids`
    Forced,
    /// Actor listed in `excluded_actor_ids`
    Excluded,
    /// PARTIAL mode, actor's bucket inside the rollout
    InRollout {
        /// Actor's rollout bucket
        bucket: u8,
    },
    /// PARTIAL mode, actor's bucket outside the rollout
    OutOfRollout {
        /// Actor's rollout bucket
        bucket: u8,
    },
    /// PARTIAL mode call without an actor to bucket
    NoActor,
    /// FULL mode, new backend only
    Full,
    /// FULL mode with a sampled legacy shadow call
    FullSampled,
}

/// Which backends a call runs against, and whose answer the caller gets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutDecision {
    /// Invoke the legacy backend
    pub call_legacy: bool,
    /// Invoke the new backend
    pub call_new: bool,
    /// Backend whose outcome is returned to the caller
    pub authoritative: Backend,
    /// Explanation for logs
    pub reason: DecisionReason,
}

impl RolloutDecision {
    /// Legacy backend only
    #[inline]
    #[must_use]
    pub const fn legacy_only(reason: DecisionReason) -> Self {
        Self {
            call_legacy: true,
            call_new: false,
            authoritative: Backend::Legacy,
            reason,
        }
    }

    /// New backend only
    #[inline]
    #[must_use]
    pub const fn new_only(reason: DecisionReason) -> Self {
        Self {
            call_legacy: false,
            call_new: true,
            authoritative: Backend::New,
            reason,
        }
    }

    /// Both backends, `authoritative` answering the caller
    #[inline]
    #[must_use]
    pub const fn dual(authoritative: Backend, reason: DecisionReason) -> Self {
        Self {
            call_legacy: true,
            call_new: true,
            authoritative,
            reason,
        }
    }

    /// Whether both backends are invoked
    #[inline]
    #[must_use]
    pub const fn is_dual(&self) -> bool {
        self.call_legacy && self.call_new
    }

    /// Non-authoritative backend, if one is invoked
    #[inline]
    #[must_use]
    pub const fn shadow(&self) -> Option<Backend> {
        if self.is_dual() {
            Some(self.authoritative.other())
        } else {
            None
        }
    }
}
