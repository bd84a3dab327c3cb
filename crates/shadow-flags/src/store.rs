//! Flag stores polled by the flag manager
//!
//! The store is external and read-only from this crate's perspective: one
//! row per operation key. Two sources ship here:
//! - [`StaticFlagStore`]: in-memory rows, set by embedding code or tests
//! - [`FileFlagStore`]: a JSON, TOML or YAML document on disk

use crate::error::FlagError;
use crate::flag::FeatureFlag;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Source of feature flag rows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FlagStore: Send + Sync {
    /// Load every flag row
    ///
    /// # Errors
    /// Any failure to reach or parse the underlying source.
    async fn load(&self) -> Result<Vec<FeatureFlag>, FlagError>;
}

/// On-disk flag document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagDocument {
    /// Flag rows
    #[serde(default)]
    pub flags: Vec<FeatureFlag>,
}

/// Flag document before its rows are typed; one bad row must not hide the rest
#[derive(Debug, Deserialize)]
struct RowDocument<R> {
    #[serde(default = "Vec::new")]
    flags: Vec<R>,
}

/// In-memory flag rows
#[derive(Debug, Default)]
pub struct StaticFlagStore {
    flags: RwLock<Vec<FeatureFlag>>,
    unavailable: RwLock<Option<String>>,
}

impl StaticFlagStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create store holding `flags`
    #[must_use]
    pub fn with_flags(flags: Vec<FeatureFlag>) -> Self {
        Self {
            flags: RwLock::new(flags),
            unavailable: RwLock::new(None),
        }
    }

    /// Insert or replace the row for `flag.operation_key`
    pub fn upsert(&self, flag: FeatureFlag) {
        let mut flags = self.flags.write();
        match flags.iter_mut().find(|f| f.operation_key == flag.operation_key) {
            Some(existing) => *existing = flag,
            None => flags.push(flag),
        }
    }

    /// Remove the row for `operation_key`
    pub fn remove(&self, operation_key: &str) -> bool {
        let mut flags = self.flags.write();
        let before = flags.len();
        flags.retain(|f| f.operation_key != operation_key);
        flags.len() != before
    }

    /// Make subsequent loads fail (`Some`) or succeed again (`None`)
    pub fn set_unavailable(&self, reason: Option<&str>) {
        *self.unavailable.write() = reason.map(str::to_string);
    }
}

#[async_trait]
impl FlagStore for StaticFlagStore {
    async fn load(&self) -> Result<Vec<FeatureFlag>, FlagError> {
        if let Some(reason) = self.unavailable.read().clone() {
            return Err(FlagError::StoreUnavailable(reason));
        }
        Ok(self.flags.read().clone())
    }
}

/// Supported flag file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileFormat {
    Json,
    Toml,
    Yaml,
}

impl FileFormat {
    fn from_path(path: &Path) -> Result<Self, FlagError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match ext.as_str() {
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(FlagError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Flag document read from disk on every load
#[derive(Debug, Clone)]
pub struct FileFlagStore {
    path: PathBuf,
    format: FileFormat,
}

impl FileFlagStore {
    /// Create store for `path`; format follows the file extension
    ///
    /// # Errors
    /// `FlagError::UnsupportedFormat` for extensions other than
    /// `json`, `toml`, `yaml` and `yml`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, FlagError> {
        let path = path.into();
        let format = FileFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    /// Path being read
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the document; rows that fail to deserialize are logged and skipped
    fn parse(&self, text: &str) -> Result<FlagDocument, FlagError> {
        let flags = match self.format {
            FileFormat::Json => {
                let doc: RowDocument<serde_json::Value> =
                    serde_json::from_str(text).map_err(|e| FlagError::parse_error(&self.path, e))?;
                self.typed_rows(doc.flags, FeatureFlag::deserialize)
            }
            FileFormat::Toml => {
                let doc: RowDocument<toml::Value> =
                    toml::from_str(text).map_err(|e| FlagError::parse_error(&self.path, e))?;
                self.typed_rows(doc.flags, FeatureFlag::deserialize)
            }
            FileFormat::Yaml => {
                let doc: RowDocument<serde_yaml::Value> =
                    serde_yaml::from_str(text).map_err(|e| FlagError::parse_error(&self.path, e))?;
                self.typed_rows(doc.flags, FeatureFlag::deserialize)
            }
        };
        Ok(FlagDocument { flags })
    }

    fn typed_rows<R, E: Display>(
        &self,
        rows: Vec<R>,
        typed: impl Fn(R) -> Result<FeatureFlag, E>,
    ) -> Vec<FeatureFlag> {
        rows.into_iter()
            .enumerate()
            .filter_map(|(row, value)| match typed(value) {
                Ok(flag) => Some(flag),
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        row,
                        error = %e,
                        "skipping malformed feature flag row"
                    );
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl FlagStore for FileFlagStore {
    async fn load(&self) -> Result<Vec<FeatureFlag>, FlagError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| FlagError::io_error(&self.path, e))?;
        Ok(self.parse(&text)?.flags)
    }
}
