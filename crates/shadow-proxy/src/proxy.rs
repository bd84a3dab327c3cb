//! Migration proxy
//!
//! [`MigrationProxy`] wraps a legacy and a new backend of one entity kind
//! and is itself a [`Repository`], so route handlers keep calling the same
//! contract. Per call it asks the flag manager which backends to use,
//! returns the authoritative outcome unchanged, and verifies the other
//! backend's answer on the side.
//!
//! # Ordering
//!
//! The authoritative backend always runs first. Reads then hand the shadow
//! call to the background [`ShadowPool`] and return immediately; writes run
//! the shadow call inline under a timeout, carrying the authoritative
//! backend's generated id when the entity accepts preassigned ids.

use crate::config::{MigrationConfig, ProxyConfig};
use crate::error::MigrationError;
use crate::pool::ShadowPool;
use crate::state::{DualCall, DualCallState};
use crate::telemetry::{InfraErrorEvent, Telemetry, TelemetrySink};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use shadow_contract::{
    Backend, CallContext, CreateRequest, EntityId, EntityKind, Method, OperationDescriptor,
    Record, RepoResult, Repository,
};
use shadow_flags::FlagManager;
use shadow_verify::{ComparisonRecord, ResultVerifier};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::error::Elapsed;
use tracing::Instrument;

/// Shared collaborators of every proxy in the process
///
/// Built once at startup and handed to each [`MigrationProxy`] by `Arc`.
#[derive(Debug)]
pub struct ProxyServices {
    flags: Arc<FlagManager>,
    verifier: ResultVerifier,
    telemetry: Telemetry,
    pool: ShadowPool,
    config: ProxyConfig,
}

impl ProxyServices {
    /// Assemble services from explicit parts
    #[must_use]
    pub fn new(
        flags: Arc<FlagManager>,
        verifier: ResultVerifier,
        telemetry: Telemetry,
        config: ProxyConfig,
    ) -> Self {
        Self {
            flags,
            verifier,
            telemetry,
            pool: ShadowPool::new(config.shadow_pool_capacity),
            config,
        }
    }

    /// Assemble services from configuration with the default comparison
    /// profiles and the given sinks
    #[must_use]
    pub fn from_config(
        config: &MigrationConfig,
        flags: Arc<FlagManager>,
        sinks: Vec<Arc<dyn TelemetrySink>>,
    ) -> Self {
        let verifier =
            ResultVerifier::with_defaults().with_max_value_len(config.proxy.diff_value_max_len);
        let telemetry = sinks.into_iter().fold(
            Telemetry::new(config.proxy.max_divergence_records_per_minute),
            Telemetry::with_sink,
        );
        Self::new(flags, verifier, telemetry, config.proxy.clone())
    }

    /// Flag manager
    #[inline]
    #[must_use]
    pub fn flags(&self) -> &Arc<FlagManager> {
        &self.flags
    }

    /// Result verifier
    #[inline]
    #[must_use]
    pub fn verifier(&self) -> &ResultVerifier {
        &self.verifier
    }

    /// Counters and sinks
    #[inline]
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Background shadow pool
    #[inline]
    #[must_use]
    pub fn pool(&self) -> &ShadowPool {
        &self.pool
    }

    /// Proxy configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Reload flags now
    ///
    /// # Errors
    /// [`MigrationError::FlagLookupFailure`]; the previous flags stay active
    pub async fn refresh_flags(&self) -> Result<u64, MigrationError> {
        Ok(self.flags.invalidate().await?)
    }

    /// Wait for every background shadow read to finish
    pub async fn drain(&self) {
        self.pool.drain().await;
    }

    /// Verify a finished shadow call against the authoritative result
    fn settle<T: Serialize>(
        &self,
        op: &OperationDescriptor,
        authoritative: Backend,
        mut call: DualCall,
        expected: Result<Value, serde_json::Error>,
        outcome: Result<RepoResult<T>, Elapsed>,
        timeout: Duration,
    ) {
        let shadow = authoritative.other();
        match outcome {
            Ok(Ok(value)) => {
                call.advance(DualCallState::NonAuthDone);
                let record = self.compare(op, authoritative, expected, &value);
                call.advance(DualCallState::Compared);
                self.telemetry.comparison(&record);
            }
            Ok(Err(source)) => {
                call.advance(DualCallState::NonAuthFailed);
                let error = MigrationError::ShadowFailure {
                    backend: shadow,
                    source,
                };
                self.shadow_failed(op, shadow, error);
                call.advance(DualCallState::Logged);
            }
            Err(_) => {
                call.advance(DualCallState::NonAuthFailed);
                self.shadow_failed(op, shadow, timeout_error(shadow, timeout));
                call.advance(DualCallState::Logged);
            }
        }
    }

    /// Record the outcome of a shadow call made after the authoritative
    /// call failed; there is nothing to compare against
    fn settle_orphan<T>(
        &self,
        op: &OperationDescriptor,
        shadow: Backend,
        outcome: Result<RepoResult<T>, Elapsed>,
        timeout: Duration,
    ) {
        match outcome {
            Ok(Ok(_)) => tracing::debug!(
                operation = %op.operation_key(),
                backend = %shadow,
                "Shadow succeeded where authoritative failed"
            ),
            Ok(Err(source)) => {
                let error = MigrationError::ShadowFailure {
                    backend: shadow,
                    source,
                };
                self.shadow_failed(op, shadow, error);
            }
            Err(_) => self.shadow_failed(op, shadow, timeout_error(shadow, timeout)),
        }
    }

    fn shadow_failed(&self, op: &OperationDescriptor, backend: Backend, error: MigrationError) {
        self.telemetry
            .infra_error(&InfraErrorEvent::new(op.clone(), backend, error));
    }

    fn compare<T: Serialize>(
        &self,
        op: &OperationDescriptor,
        authoritative: Backend,
        expected: Result<Value, serde_json::Error>,
        shadow: &T,
    ) -> ComparisonRecord {
        match (expected, serde_json::to_value(shadow)) {
            (Ok(auth), Ok(other)) => {
                let (legacy, new) = match authoritative {
                    Backend::Legacy => (&auth, &other),
                    Backend::New => (&other, &auth),
                };
                self.verifier.compare_values(op, authoritative, legacy, new)
            }
            (auth, other) => {
                let reason = match (&auth, &other) {
                    (Err(e), _) | (_, Err(e)) => format!("serialization failed: {e}"),
                    _ => String::new(),
                };
                let error = MigrationError::VerificationError(reason.clone());
                tracing::warn!(
                    operation = %op.operation_key(),
                    error = %error,
                    "Verification failed"
                );
                let (auth, other) = (auth.ok(), other.ok());
                let (legacy, new) = match authoritative {
                    Backend::Legacy => (auth.as_ref(), other.as_ref()),
                    Backend::New => (other.as_ref(), auth.as_ref()),
                };
                self.verifier
                    .verification_failure(op, authoritative, legacy, new, &reason)
            }
        }
    }
}

fn timeout_error(backend: Backend, timeout: Duration) -> MigrationError {
    MigrationError::ShadowTimeout {
        backend,
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Repository that routes each call to the legacy backend, the new
/// backend, or both
pub struct MigrationProxy<K, L, N> {
    legacy: Arc<L>,
    new: Arc<N>,
    services: Arc<ProxyServices>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, L, N> std::fmt::Debug for MigrationProxy<K, L, N>
where
    K: EntityKind,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationProxy")
            .field("entity", &K::NAME)
            .finish_non_exhaustive()
    }
}

impl<K, L, N> MigrationProxy<K, L, N>
where
    K: EntityKind,
    L: Repository<K>,
    N: Repository<K>,
{
    /// Create proxy over two backends of entity kind `K`
    #[must_use]
    pub fn new(legacy: Arc<L>, new: Arc<N>, services: Arc<ProxyServices>) -> Self {
        Self {
            legacy,
            new,
            services,
            _kind: PhantomData,
        }
    }

    /// Shared services
    #[inline]
    #[must_use]
    pub fn services(&self) -> &Arc<ProxyServices> {
        &self.services
    }

    fn backend(&self, backend: Backend) -> Arc<dyn Repository<K>> {
        match backend {
            Backend::Legacy => Arc::clone(&self.legacy) as Arc<dyn Repository<K>>,
            Backend::New => Arc::clone(&self.new) as Arc<dyn Repository<K>>,
        }
    }

    fn descriptor(method: Method, ctx: &CallContext) -> OperationDescriptor {
        OperationDescriptor::new(K::NAME, method, ctx.actor.clone())
    }

    /// Read path: authoritative inline, shadow in the background
    async fn dispatch_read<T, F>(&self, method: Method, ctx: &CallContext, call: F) -> RepoResult<T>
    where
        T: Serialize + Send + Sync + 'static,
        F: Fn(Arc<dyn Repository<K>>, CallContext) -> BoxFuture<'static, RepoResult<T>>
            + Send
            + Sync,
    {
        let services = &self.services;
        let op = Self::descriptor(method, ctx);
        services.telemetry.call(&op);

        let decision = services.flags.decide(&op);
        let authoritative = decision.authoritative;
        let Some(shadow) = decision.shadow() else {
            return call(self.backend(authoritative), ctx.clone()).await;
        };

        services.telemetry.dual_call(&op);
        let mut dual = DualCall::start(op.operation_key());
        let result = call(self.backend(authoritative), ctx.clone()).await;

        let timeout = services.config.shadow_read_timeout();
        let shadow_call = call(self.backend(shadow), ctx.clone());
        let span = tracing::debug_span!(
            "shadow_read",
            operation = %op.operation_key(),
            backend = %shadow
        );

        let task = match &result {
            Ok(value) => {
                dual.advance(DualCallState::AuthoritativeDone);
                let expected = serde_json::to_value(value);
                let services = Arc::clone(services);
                let op = op.clone();
                Some(
                    async move {
                        let outcome = tokio::time::timeout(timeout, shadow_call).await;
                        services.settle(&op, authoritative, dual, expected, outcome, timeout);
                    }
                    .boxed(),
                )
            }
            Err(error) => {
                dual.advance(DualCallState::AuthoritativeFailed);
                log_authoritative_failure(&op, authoritative, error);
                services.config.shadow_on_authoritative_failure.then(|| {
                    let services = Arc::clone(services);
                    let op = op.clone();
                    async move {
                        let outcome = tokio::time::timeout(timeout, shadow_call).await;
                        services.settle_orphan(&op, shadow, outcome, timeout);
                    }
                    .boxed()
                })
            }
        };

        let Some(task) = task else {
            return result;
        };
        if services.pool.try_spawn(task.instrument(span)).is_err() {
            services.telemetry.shadow_dropped(&op);
        }
        result
    }

    /// Write path: authoritative, then shadow inline under a timeout
    ///
    /// `call` receives the authoritative result when building the shadow
    /// call so generated ids can be carried over.
    async fn dispatch_write<T, F>(
        &self,
        method: Method,
        ctx: &CallContext,
        call: F,
    ) -> RepoResult<T>
    where
        T: Serialize + Send + Sync + 'static,
        F: for<'a> Fn(
                Arc<dyn Repository<K>>,
                CallContext,
                Option<&'a T>,
            ) -> BoxFuture<'static, RepoResult<T>>
            + Send
            + Sync,
    {
        let services = &self.services;
        let op = Self::descriptor(method, ctx);
        services.telemetry.call(&op);

        let decision = services.flags.decide(&op);
        let authoritative = decision.authoritative;
        let Some(shadow) = decision.shadow() else {
            return call(self.backend(authoritative), ctx.clone(), None).await;
        };

        services.telemetry.dual_call(&op);
        let mut dual = DualCall::start(op.operation_key());
        let result = call(self.backend(authoritative), ctx.clone(), None).await;
        let timeout = services.config.shadow_write_timeout();

        match &result {
            Ok(value) => {
                dual.advance(DualCallState::AuthoritativeDone);
                let expected = serde_json::to_value(value);
                let shadow_call = call(self.backend(shadow), ctx.clone(), Some(value));
                let outcome = tokio::time::timeout(timeout, shadow_call)
                    .instrument(tracing::debug_span!(
                        "shadow_write",
                        operation = %op.operation_key(),
                        backend = %shadow
                    ))
                    .await;
                services.settle(&op, authoritative, dual, expected, outcome, timeout);
            }
            Err(error) => {
                dual.advance(DualCallState::AuthoritativeFailed);
                log_authoritative_failure(&op, authoritative, error);
                if services.config.shadow_on_authoritative_failure {
                    let shadow_call = call(self.backend(shadow), ctx.clone(), None);
                    let outcome = tokio::time::timeout(timeout, shadow_call).await;
                    services.settle_orphan(&op, shadow, outcome, timeout);
                }
            }
        }
        result
    }
}

fn log_authoritative_failure(
    op: &OperationDescriptor,
    backend: Backend,
    error: &shadow_contract::RepositoryError,
) {
    let failure = MigrationError::AuthoritativeFailure {
        backend,
        source: error.clone(),
    };
    tracing::debug!(
        operation = %op.operation_key(),
        code = error.code(),
        error = %failure,
        "Authoritative call failed"
    );
}

#[async_trait]
impl<K, L, N> Repository<K> for MigrationProxy<K, L, N>
where
    K: EntityKind,
    L: Repository<K>,
    N: Repository<K>,
{
    async fn get(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<K::Entity> {
        let id = id.clone();
        self.dispatch_read(Method::Get, ctx, move |repo, ctx| {
            let id = id.clone();
            async move { repo.get(&ctx, &id).await }.boxed()
        })
        .await
    }

    async fn list(&self, ctx: &CallContext, filter: &K::Filter) -> RepoResult<Vec<K::Entity>> {
        let filter = filter.clone();
        self.dispatch_read(Method::List, ctx, move |repo, ctx| {
            let filter = filter.clone();
            async move { repo.list(&ctx, &filter).await }.boxed()
        })
        .await
    }

    async fn create(
        &self,
        ctx: &CallContext,
        request: CreateRequest<K::Input>,
    ) -> RepoResult<K::Entity> {
        self.dispatch_write::<K::Entity, _>(Method::Create, ctx, move |repo, ctx, created| {
            let mut request = request.clone();
            if let Some(created) = created {
                if K::ACCEPTS_PREASSIGNED_IDS && request.preassigned_id.is_none() {
                    request = request.with_id(created.id().clone());
                }
            }
            async move { repo.create(&ctx, request).await }.boxed()
        })
        .await
    }

    async fn update(
        &self,
        ctx: &CallContext,
        id: &EntityId,
        patch: &K::Patch,
    ) -> RepoResult<K::Entity> {
        let id = id.clone();
        let patch = patch.clone();
        self.dispatch_write(Method::Update, ctx, move |repo, ctx, _| {
            let id = id.clone();
            let patch = patch.clone();
            async move { repo.update(&ctx, &id, &patch).await }.boxed()
        })
        .await
    }

    async fn delete(&self, ctx: &CallContext, id: &EntityId) -> RepoResult<()> {
        let id = id.clone();
        self.dispatch_write(Method::Delete, ctx, move |repo, ctx, _| {
            let id = id.clone();
            async move { repo.delete(&ctx, &id).await }.boxed()
        })
        .await
    }
}
