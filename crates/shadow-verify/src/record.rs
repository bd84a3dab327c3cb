//! Comparison records emitted for every dual call
//!
//! Records are write-once: built by the verifier, handed to telemetry,
//! never mutated afterwards.

use crate::diff::DiffSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shadow_contract::{Backend, OperationDescriptor};
use std::fmt;
use ulid::Ulid;

/// Outcome of comparing two results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// All significant fields agree
    Match,
    /// Only soft differences
    Tolerated,
    /// Significant disagreement or verification failure
    Diverged,
}

impl Verdict {
    /// Derive verdict from a diff summary
    #[must_use]
    pub fn from_summary(summary: &DiffSummary) -> Self {
        if summary.note.is_some() || summary.has_significant() {
            Self::Diverged
        } else if summary.entries.is_empty() {
            Self::Match
        } else {
            Self::Tolerated
        }
    }

    /// Uppercase name for logs and labels
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::Tolerated => "TOLERATED",
            Self::Diverged => "DIVERGED",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of comparing the legacy and new outcome of one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    /// Unique record id (sortable by creation time)
    pub id: Ulid,
    /// The compared call
    pub operation: OperationDescriptor,
    /// Backend whose result went to the caller
    pub authoritative: Backend,
    /// Digest of the legacy result
    pub legacy_digest: String,
    /// Digest of the new result
    pub new_digest: String,
    /// Classification
    pub verdict: Verdict,
    /// Every differing field
    pub diff: DiffSummary,
    /// When the comparison ran
    pub occurred_at: DateTime<Utc>,
}

impl ComparisonRecord {
    /// Create record stamped now
    #[must_use]
    pub fn new(
        operation: OperationDescriptor,
        authoritative: Backend,
        legacy_digest: String,
        new_digest: String,
        diff: DiffSummary,
    ) -> Self {
        Self {
            id: Ulid::new(),
            operation,
            authoritative,
            legacy_digest,
            new_digest,
            verdict: Verdict::from_summary(&diff),
            diff,
            occurred_at: Utc::now(),
        }
    }

    /// Flag and metrics key of the compared call
    #[inline]
    #[must_use]
    pub fn operation_key(&self) -> String {
        self.operation.operation_key()
    }

    /// Whether the backends disagreed
    #[inline]
    #[must_use]
    pub fn is_diverged(&self) -> bool {
        self.verdict == Verdict::Diverged
    }

    /// Whether both results hashed identically
    #[inline]
    #[must_use]
    pub fn digests_equal(&self) -> bool {
        self.legacy_digest == self.new_digest
    }
}

/// Content digest of a result: blake3 over its canonical JSON, hex encoded
///
/// Object keys are serialized in sorted order, so digests do not depend on
/// the field order a backend produced.
#[must_use]
pub fn digest(value: &Value) -> String {
    let mut hasher = blake3::Hasher::new();
    write_canonical(&mut hasher, value);
    hex::encode(hasher.finalize().as_bytes())
}

fn write_canonical(hasher: &mut blake3::Hasher, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            hasher.update(b"{");
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                hasher.update(Value::String(key.clone()).to_string().as_bytes());
                hasher.update(b":");
                write_canonical(hasher, &map[key]);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    hasher.update(b",");
                }
                write_canonical(hasher, item);
            }
            hasher.update(b"]");
        }
        scalar => {
            hasher.update(scalar.to_string().as_bytes());
        }
    }
}
