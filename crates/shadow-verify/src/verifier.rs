//! Result verifier
//!
//! Holds one [`ComparisonProfile`] per entity kind and turns a pair of
//! results into a [`ComparisonRecord`]. Comparison never fails: anything
//! that goes wrong while comparing becomes a DIVERGED record with a note.

use crate::compare::Comparator;
use crate::diff::{DiffSummary, DEFAULT_MAX_VALUE_LEN};
use crate::profile::ComparisonProfile;
use crate::profiles;
use crate::record::{digest, ComparisonRecord};
use serde::Serialize;
use serde_json::Value;
use shadow_contract::{Backend, OperationDescriptor};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Compares legacy and new results under per-entity profiles
#[derive(Debug, Clone)]
pub struct ResultVerifier {
    profiles: HashMap<String, ComparisonProfile>,
    max_value_len: usize,
}

impl Default for ResultVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultVerifier {
    /// Create verifier without profiles (strict comparison everywhere)
    #[must_use]
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
            max_value_len: DEFAULT_MAX_VALUE_LEN,
        }
    }

    /// Create verifier with the profiles of the shipped entity kinds
    #[must_use]
    pub fn with_defaults() -> Self {
        profiles::defaults()
            .into_iter()
            .fold(Self::new(), Self::with_profile)
    }

    /// Add or replace a profile
    #[inline]
    #[must_use]
    pub fn with_profile(mut self, profile: ComparisonProfile) -> Self {
        self.register(profile);
        self
    }

    /// Set the rendered value cap for diff summaries
    #[inline]
    #[must_use]
    pub fn with_max_value_len(mut self, max_value_len: usize) -> Self {
        self.max_value_len = max_value_len;
        self
    }

    /// Add or replace a profile in place
    pub fn register(&mut self, profile: ComparisonProfile) {
        self.profiles.insert(profile.entity().to_string(), profile);
    }

    /// Profile registered for `entity`
    #[must_use]
    pub fn profile_for(&self, entity: &str) -> Option<&ComparisonProfile> {
        self.profiles.get(entity)
    }

    /// Compare two typed results of the call described by `operation`
    #[must_use]
    pub fn compare<T: Serialize + ?Sized>(
        &self,
        operation: &OperationDescriptor,
        authoritative: Backend,
        legacy: &T,
        new: &T,
    ) -> ComparisonRecord {
        match (serde_json::to_value(legacy), serde_json::to_value(new)) {
            (Ok(legacy), Ok(new)) => self.compare_values(operation, authoritative, &legacy, &new),
            (legacy, new) => {
                let error = legacy
                    .as_ref()
                    .err()
                    .or(new.as_ref().err())
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::warn!(
                    operation = %operation.operation_key(),
                    error = %error,
                    "Result serialization failed during verification"
                );
                self.verification_failure(
                    operation,
                    authoritative,
                    legacy.ok().as_ref(),
                    new.ok().as_ref(),
                    &format!("serialization failed: {error}"),
                )
            }
        }
    }

    /// DIVERGED record for a comparison that could not run
    ///
    /// Digests are filled in for whichever side is available; a missing side
    /// leaves its digest empty.
    #[must_use]
    pub fn verification_failure(
        &self,
        operation: &OperationDescriptor,
        authoritative: Backend,
        legacy: Option<&Value>,
        new: Option<&Value>,
        reason: &str,
    ) -> ComparisonRecord {
        ComparisonRecord::new(
            operation.clone(),
            authoritative,
            legacy.map(digest).unwrap_or_default(),
            new.map(digest).unwrap_or_default(),
            DiffSummary::with_note(format!("verification error: {reason}")),
        )
    }

    /// Compare two results already in JSON form
    #[must_use]
    pub fn compare_values(
        &self,
        operation: &OperationDescriptor,
        authoritative: Backend,
        legacy: &Value,
        new: &Value,
    ) -> ComparisonRecord {
        let fallback;
        let profile = if let Some(p) = self.profiles.get(&operation.entity) {
            p
        } else {
            fallback = ComparisonProfile::new(operation.entity.clone());
            &fallback
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            Comparator::new(profile, self.max_value_len).run(legacy, new)
        }));

        let diff = match outcome {
            Ok(entries) => DiffSummary {
                entries,
                note: None,
            },
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(
                    operation = %operation.operation_key(),
                    reason = %reason,
                    "Comparator panicked"
                );
                DiffSummary::with_note(format!("verification error: comparator panicked: {reason}"))
            }
        };

        let record = ComparisonRecord::new(
            operation.clone(),
            authoritative,
            digest(legacy),
            digest(new),
            diff,
        );

        tracing::trace!(
            operation = %record.operation_key(),
            verdict = %record.verdict,
            diffs = record.diff.entries.len(),
            "Results compared"
        );

        record
    }
}
