//! Field-level differences between two results

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default cap on rendered value length
pub const DEFAULT_MAX_VALUE_LEN: usize = 120;

/// Kind of difference found at a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffKind {
    /// Same type, different value
    ValueMismatch,
    /// Different JSON types
    TypeMismatch,
    /// Present in the new result only
    MissingInLegacy,
    /// Present in the legacy result only
    MissingInNew,
    /// Ordered arrays of different length
    LengthMismatch,
    /// Unordered arrays whose elements could not all be paired
    UnmatchedElements,
    /// Difference on a soft field, or null versus absent
    Tolerated,
}

impl DiffKind {
    /// Whether this difference makes the verdict DIVERGED
    #[inline]
    #[must_use]
    pub const fn is_significant(&self) -> bool {
        !matches!(self, Self::Tolerated)
    }
}

/// One differing field with both values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    /// Dot-separated path (`""` for the result root)
    pub path: String,
    /// Classification
    pub kind: DiffKind,
    /// Legacy value, truncated
    pub legacy: String,
    /// New value, truncated
    pub new: String,
}

impl FieldDiff {
    /// Create diff rendering both values with at most `max_len` characters
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        kind: DiffKind,
        legacy: Option<&Value>,
        new: Option<&Value>,
        max_len: usize,
    ) -> Self {
        Self {
            path: path.into(),
            kind,
            legacy: render(legacy, max_len),
            new: render(new, max_len),
        }
    }
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "<root>" } else { self.path.as_str() };
        write!(
            f,
            "{path} ({:?}): legacy={} new={}",
            self.kind, self.legacy, self.new
        )
    }
}

/// Every difference found by one comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Differences in discovery order
    pub entries: Vec<FieldDiff>,
    /// Diagnostic note (verification errors)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DiffSummary {
    /// Summary carrying only a diagnostic note
    #[must_use]
    pub fn with_note(note: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            note: Some(note.into()),
        }
    }

    /// Whether nothing differed
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.note.is_none()
    }

    /// Whether any difference is significant
    #[inline]
    #[must_use]
    pub fn has_significant(&self) -> bool {
        self.entries.iter().any(|d| d.kind.is_significant())
    }

    /// Paths of all differing fields
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|d| d.path.as_str()).collect()
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(note) = &self.note {
            write!(f, "{note}")?;
            if !self.entries.is_empty() {
                f.write_str("; ")?;
            }
        }
        for (i, diff) in self.entries.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{diff}")?;
        }
        Ok(())
    }
}

/// Render a JSON value for a summary, cut at `max_len` characters
fn render(value: Option<&Value>, max_len: usize) -> String {
    let Some(value) = value else {
        return "<absent>".to_string();
    };
    let text = value.to_string();
    truncate(&text, max_len)
}

/// Cut `text` to `max_len` characters on a char boundary, marking the cut
#[must_use]
pub(crate) fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_len).collect();
    out.push('…');
    out
}

/// JSON type name for type mismatch summaries
#[must_use]
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
