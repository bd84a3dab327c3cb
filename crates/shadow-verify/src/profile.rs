//! Per-entity comparison profiles
//!
//! A profile names how each field of an entity is compared. Paths are
//! dot-separated object keys; array positions are not part of a path, so
//! `"meals.recipe"` addresses the recipe of every meal and a profile applies
//! equally to a single record and to each element of a list result.

use std::collections::{BTreeMap, BTreeSet};

/// Path of the result root
pub const ROOT: &str = "";

/// Semantic equality rule for one field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tolerance {
    /// Numbers equal within an absolute epsilon
    Absolute(f64),
    /// Numbers equal within a ratio of the larger magnitude
    Relative(f64),
    /// RFC 3339 timestamps equal at whole-second granularity
    TimestampSeconds,
}

impl Tolerance {
    /// Whether two numbers are equal under this tolerance
    #[must_use]
    pub fn numbers_agree(&self, a: f64, b: f64) -> bool {
        // slack for epsilons that are not exactly representable
        const SLACK: f64 = 1e-12;
        let delta = (a - b).abs();
        match *self {
            Self::Absolute(eps) => delta <= eps + SLACK,
            Self::Relative(ratio) => delta <= ratio * a.abs().max(b.abs()) + SLACK,
            Self::TimestampSeconds => a.trunc() == b.trunc(),
        }
    }

    /// Whether two strings are equal under this tolerance
    ///
    /// Only timestamps have a string form; other tolerances require
    /// exact equality of strings.
    #[must_use]
    pub fn strings_agree(&self, a: &str, b: &str) -> bool {
        if a == b {
            return true;
        }
        match self {
            Self::TimestampSeconds => {
                match (
                    chrono::DateTime::parse_from_rfc3339(a),
                    chrono::DateTime::parse_from_rfc3339(b),
                ) {
                    (Ok(x), Ok(y)) => x.timestamp() == y.timestamp(),
                    _ => false,
                }
            }
            Self::Absolute(_) | Self::Relative(_) => false,
        }
    }
}

/// Comparison rules for one entity kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonProfile {
    entity: String,
    ignored: BTreeSet<String>,
    soft: BTreeSet<String>,
    tolerances: BTreeMap<String, Tolerance>,
    unordered: BTreeSet<String>,
}

impl ComparisonProfile {
    /// Create empty profile (strict equality everywhere)
    #[must_use]
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            ..Self::default()
        }
    }

    /// Never compare `path` (generated ids, backend-internal fields)
    #[must_use]
    pub fn ignore(mut self, path: impl Into<String>) -> Self {
        self.ignored.insert(path.into());
        self
    }

    /// Compare `path`, but a difference only yields TOLERATED
    #[must_use]
    pub fn soft(mut self, path: impl Into<String>) -> Self {
        self.soft.insert(path.into());
        self
    }

    /// Compare `path` with a semantic tolerance
    #[must_use]
    pub fn tolerance(mut self, path: impl Into<String>, tolerance: Tolerance) -> Self {
        self.tolerances.insert(path.into(), tolerance);
        self
    }

    /// Compare the array at `path` ignoring element order
    #[must_use]
    pub fn unordered(mut self, path: impl Into<String>) -> Self {
        self.unordered.insert(path.into());
        self
    }

    /// Compare collection results (list operations) ignoring row order
    #[must_use]
    pub fn unordered_results(self) -> Self {
        self.unordered(ROOT)
    }

    /// Entity kind this profile belongs to
    #[inline]
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Whether `path` is skipped
    #[inline]
    #[must_use]
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignored.contains(path)
    }

    /// Whether differences at `path` are tolerated
    #[inline]
    #[must_use]
    pub fn is_soft(&self, path: &str) -> bool {
        self.soft.contains(path)
    }

    /// Tolerance configured for `path`
    #[inline]
    #[must_use]
    pub fn tolerance_for(&self, path: &str) -> Option<Tolerance> {
        self.tolerances.get(path).copied()
    }

    /// Whether the array at `path` is order-independent
    #[inline]
    #[must_use]
    pub fn is_unordered(&self, path: &str) -> bool {
        self.unordered.contains(path)
    }
}

/// Child path of `parent` for object key `key`
#[inline]
#[must_use]
pub(crate) fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}
