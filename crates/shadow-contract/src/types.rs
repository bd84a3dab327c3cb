//! Core types shared across the migration workspace
//!
//! - Entity and actor identifiers
//! - Per-call caller context
//! - Operation descriptors used as flag and metrics keys

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity identifier as produced by a storage backend
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create identifier from any string-like value
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identity of the user or service on whose behalf a call runs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    /// Create actor id
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Caller context passed to every repository method
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Acting user, if the request is authenticated
    pub actor: Option<ActorId>,
    /// Request correlation id for logs
    pub request_id: Option<String>,
}

impl CallContext {
    /// Context without an actor (system or anonymous calls)
    #[inline]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for an authenticated actor
    #[inline]
    #[must_use]
    pub fn for_actor(actor: impl Into<String>) -> Self {
        Self {
            actor: Some(ActorId::new(actor)),
            request_id: None,
        }
    }

    /// Attach request correlation id
    #[inline]
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Repository contract methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Fetch one entity by id
    Get,
    /// Fetch entities matching a filter
    List,
    /// Insert a new entity
    Create,
    /// Patch an existing entity
    Update,
    /// Remove an entity
    Delete,
}

impl Method {
    /// All contract methods
    pub const ALL: [Method; 5] = [
        Method::Get,
        Method::List,
        Method::Create,
        Method::Update,
        Method::Delete,
    ];

    /// Method name as used in operation keys
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::List => "list",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Whether the method mutates backend state
    #[inline]
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Create | Self::Update | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage backend taking part in a migration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Backend {
    /// Known-good backend being migrated away from
    Legacy,
    /// Backend being migrated to
    New,
}

impl Backend {
    /// The other backend
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Legacy => Self::New,
            Self::New => Self::Legacy,
        }
    }

    /// Lowercase name for logs and labels
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::New => "new",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a single logical repository call
///
/// Key for flag lookup and metrics aggregation. Built per call, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationDescriptor {
    /// Entity kind name (e.g. `"notification"`)
    pub entity: String,
    /// Contract method
    pub method: Method,
    /// Acting user, if any
    pub actor: Option<ActorId>,
}

impl OperationDescriptor {
    /// Create descriptor
    #[inline]
    #[must_use]
    pub fn new(entity: impl Into<String>, method: Method, actor: Option<ActorId>) -> Self {
        Self {
            entity: entity.into(),
            method,
            actor,
        }
    }

    /// Flag and metrics key: `"<entity>.<method>"`
    #[inline]
    #[must_use]
    pub fn operation_key(&self) -> String {
        format!("{}.{}", self.entity, self.method)
    }

    /// Entity-wide wildcard key: `"<entity>.*"`
    #[inline]
    #[must_use]
    pub fn wildcard_key(&self) -> String {
        format!("{}.*", self.entity)
    }

    /// Whether the described call mutates state
    #[inline]
    #[must_use]
    pub fn is_write(&self) -> bool {
        self.method.is_write()
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actor {
            Some(actor) => write!(f, "{}.{} (actor {})", self.entity, self.method, actor),
            None => write!(f, "{}.{}", self.entity, self.method),
        }
    }
}
