//! Repository contract
//!
//! Provides [`Repository`], the data-access trait each entity implements
//! identically against both backends, and [`EntityKind`], the marker that
//! binds an entity's record, filter, input and patch types together.

use crate::error::RepoResult;
use crate::types::{CallContext, EntityId};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt::Debug;
use std::sync::Arc;

/// A stored entity
///
/// Records are serializable so results from two backends can be compared
/// field by field.
pub trait Record: Clone + Debug + Serialize + Send + Sync + 'static {
    /// Backend-assigned identifier
    fn id(&self) -> &EntityId;
}

/// Marker tying together the types of one entity kind
pub trait EntityKind: Send + Sync + 'static {
    /// Entity name used in operation keys (e.g. `"task"`)
    const NAME: &'static str;

    /// Whether backends can store an externally generated id on create
    const ACCEPTS_PREASSIGNED_IDS: bool = true;

    /// Stored record
    type Entity: Record;

    /// `list` filter
    type Filter: Clone + Debug + Serialize + Send + Sync + 'static;

    /// `create` payload
    type Input: Clone + Debug + Serialize + Send + Sync + 'static;

    /// `update` payload
    type Patch: Clone + Debug + Serialize + Send + Sync + 'static;
}

/// Create payload with an optional identifier chosen by another backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateRequest<I> {
    /// Entity fields
    pub input: I,
    /// Identifier the backend must use instead of generating its own
    pub preassigned_id: Option<EntityId>,
}

impl<I> CreateRequest<I> {
    /// Create request letting the backend generate the id
    #[inline]
    #[must_use]
    pub fn new(input: I) -> Self {
        Self {
            input,
            preassigned_id: None,
        }
    }

    /// Pin the identifier the backend must use
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: EntityId) -> Self {
        self.preassigned_id = Some(id);
        self
    }
}

/// Data-access contract for one entity kind
///
/// Legacy adapters, new adapters and the migration proxy all implement this
/// trait, so callers cannot tell which one serves them.
#[async_trait]
pub trait Repository<K: EntityKind>: Send + Sync + 'static {
    /// Fetch one entity
    async fn get(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<K::Entity>;

    /// Fetch entities matching `filter`
    async fn list(&self, ctx: &CallContext, filter: &K::Filter) -> RepoResult<Vec<K::Entity>>;

    /// Insert a new entity
    async fn create(
        &self,
        ctx: &CallContext,
        request: CreateRequest<K::Input>,
    ) -> RepoResult<K::Entity>;

    /// Apply `patch` to an existing entity
    async fn update(
        &self,
        ctx: &CallContext,
        id: &EntityId,
        patch: &K::Patch,
    ) -> RepoResult<K::Entity>;

    /// Remove an entity
    async fn delete(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<()>;
}

#[async_trait]
impl<K, R> Repository<K> for Arc<R>
where
    K: EntityKind,
    R: Repository<K> + ?Sized,
{
    async fn get(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<K::Entity> {
        (**self).get(ctx, id).await
    }

    async fn list(&self, ctx: &CallContext, filter: &K::Filter) -> RepoResult<Vec<K::Entity>> {
        (**self).list(ctx, filter).await
    }

    async fn create(
        &self,
        ctx: &CallContext,
        request: CreateRequest<K::Input>,
    ) -> RepoResult<K::Entity> {
        (**self).create(ctx, request).await
    }

    async fn update(
        &self,
        ctx: &CallContext,
        id: &EntityId,
        patch: &K::Patch,
    ) -> RepoResult<K::Entity> {
        (**self).update(ctx, id, patch).await
    }

    async fn delete(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<()> {
        (**self).delete(ctx, id).await
    }
}
