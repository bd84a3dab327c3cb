//! In-memory repository backend with fault injection

use crate::fixture::Fixture;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use shadow_contract::{
    CallContext, CreateRequest, EntityId, Method, Record, RepoResult, Repository, RepositoryError,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
struct Faults {
    latency: Option<Duration>,
    hang: bool,
    fail_with: Option<RepositoryError>,
    only: Option<Method>,
}

impl Faults {
    fn applies_to(&self, method: Method) -> bool {
        self.only.map_or(true, |m| m == method)
    }
}

/// Repository keeping rows in memory, one per backend under test
///
/// Generated ids are `<prefix><n>`, so legacy and new backends produce
/// different ids for the same create unless an id is preassigned.
#[derive(Debug)]
pub struct InMemoryRepository<K: Fixture> {
    prefix: String,
    next_id: AtomicU64,
    rows: RwLock<BTreeMap<EntityId, K::Entity>>,
    faults: Mutex<Faults>,
    honor_preassigned: bool,
    started: DashMap<Method, u64>,
    completed: DashMap<Method, u64>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Fixture> InMemoryRepository<K> {
    /// Create empty backend generating ids with `prefix`
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next_id: AtomicU64::new(1),
            rows: RwLock::new(BTreeMap::new()),
            faults: Mutex::new(Faults::default()),
            honor_preassigned: true,
            started: DashMap::new(),
            completed: DashMap::new(),
            _kind: PhantomData,
        }
    }

    /// Backend with `"l-"` ids
    #[must_use]
    pub fn legacy() -> Arc<Self> {
        Arc::new(Self::new("l-"))
    }

    /// Backend with `"n-"` ids
    #[must_use]
    pub fn new_backend() -> Arc<Self> {
        Arc::new(Self::new("n-"))
    }

    /// Always generate ids, ignoring preassigned ones
    #[must_use]
    pub fn ignoring_preassigned_ids(mut self) -> Self {
        self.honor_preassigned = false;
        self
    }

    /// Store a record as is
    pub fn insert_raw(&self, entity: K::Entity) {
        self.rows.write().insert(entity.id().clone(), entity);
    }

    /// Stored record by id, bypassing faults and counters
    #[must_use]
    pub fn row(&self, id: &EntityId) -> Option<K::Entity> {
        self.rows.read().get(id).cloned()
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Whether no records are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.faults.lock().latency = latency;
    }

    /// Make calls never return
    pub fn hang(&self, hang: bool) {
        self.faults.lock().hang = hang;
    }

    /// Fail calls with `error` (`None` restores normal behavior)
    pub fn fail_with(&self, error: Option<RepositoryError>) {
        self.faults.lock().fail_with = error;
    }

    /// Restrict injected faults to one method (`None` for all methods)
    pub fn faults_only_for(&self, method: Option<Method>) {
        self.faults.lock().only = method;
    }

    /// Calls entered for `method`
    #[must_use]
    pub fn call_count(&self, method: Method) -> u64 {
        self.started.get(&method).map_or(0, |c| *c)
    }

    /// Calls that returned for `method`
    #[must_use]
    pub fn completed_count(&self, method: Method) -> u64 {
        self.completed.get(&method).map_or(0, |c| *c)
    }

    /// Calls entered across all methods
    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.started.iter().map(|e| *e.value()).sum()
    }

    async fn enter(&self, method: Method) -> RepoResult<()> {
        *self.started.entry(method).or_insert(0) += 1;
        let faults = self.faults.lock().clone();
        if !faults.applies_to(method) {
            return Ok(());
        }
        if let Some(latency) = faults.latency {
            tokio::time::sleep(latency).await;
        }
        if faults.hang {
            std::future::pending::<()>().await;
        }
        match faults.fail_with {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn leave<T>(&self, method: Method, result: RepoResult<T>) -> RepoResult<T> {
        *self.completed.entry(method).or_insert(0) += 1;
        result
    }

    fn generate_id(&self) -> EntityId {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        EntityId::new(format!("{}{n}", self.prefix))
    }
}

#[async_trait]
impl<K: Fixture> Repository<K> for InMemoryRepository<K> {
    async fn get(&self, _ctx: &CallContext, id: &EntityId) -> RepoResult<K::Entity> {
        self.enter(Method::Get).await?;
        let result = self
            .rows
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::not_found(K::NAME, id));
        self.leave(Method::Get, result)
    }

    async fn list(&self, _ctx: &CallContext, filter: &K::Filter) -> RepoResult<Vec<K::Entity>> {
        self.enter(Method::List).await?;
        let rows = self
            .rows
            .read()
            .values()
            .filter(|e| K::matches(filter, e))
            .cloned()
            .collect();
        self.leave(Method::List, Ok(rows))
    }

    async fn create(
        &self,
        _ctx: &CallContext,
        request: CreateRequest<K::Input>,
    ) -> RepoResult<K::Entity> {
        self.enter(Method::Create).await?;
        let id = match request.preassigned_id {
            Some(id) if self.honor_preassigned => id,
            _ => self.generate_id(),
        };
        let result = {
            let mut rows = self.rows.write();
            if rows.contains_key(&id) {
                Err(RepositoryError::Conflict(format!("{} {id} already exists", K::NAME)))
            } else {
                let entity = K::build(id.clone(), &request.input, Utc::now());
                rows.insert(id, entity.clone());
                Ok(entity)
            }
        };
        self.leave(Method::Create, result)
    }

    async fn update(
        &self,
        _ctx: &CallContext,
        id: &EntityId,
        patch: &K::Patch,
    ) -> RepoResult<K::Entity> {
        self.enter(Method::Update).await?;
        let result = match self.rows.write().get_mut(id) {
            Some(entity) => {
                K::apply(entity, patch, Utc::now());
                Ok(entity.clone())
            }
            None => Err(RepositoryError::not_found(K::NAME, id)),
        };
        self.leave(Method::Update, result)
    }

    async fn delete(&self, _ctx: &CallContext, id: &EntityId) -> RepoResult<()> {
        self.enter(Method::Delete).await?;
        let result = match self.rows.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(RepositoryError::not_found(K::NAME, id)),
        };
        self.leave(Method::Delete, result)
    }
}
