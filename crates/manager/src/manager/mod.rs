//! The orchestrating manager.
//!
//! `ConfigManager` composes the registry, the record cache, the event emitter
//! and the transaction service. Every operation is generic over the record
//! type and resolves that type's provider through the registry; nothing below
//! the manager is reachable from the outside.
//!
//! Writes run validate → pre-save hook → provider save → cache set → publish.
//! Reads hit the cache first and fall back to the provider plus the post-load
//! hook. The `*_in` variants of each operation take an optional
//! [`TransactionContext`]; with one, every completed step registers an undo
//! action that restores the touched file, the index and the cache entry.

mod batch;
mod read;
mod transfer;
mod write;

pub use batch::BatchOperation;

use crate::config::ManagerConfig;
use crate::registry::{RecordFactory, Registry};
use crate::transaction::{
    OperationType, TransactionContext, TransactionService, TransactionStatistics,
};
use cfgstore_cache::{CacheStatistics, RecordCache};
use cfgstore_core::{
    ChangeType, Error, EventEmitter, FieldCapability, Record, Result, SubscriberError,
    SubscriptionId,
};
use cfgstore_storage::{FileStorageProvider, ProviderOptions, StorageProvider};
use cfgstore_utils::FileSnapshot;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

struct ManagerInner {
    config: ManagerConfig,
    registry: Registry,
    cache: Arc<RecordCache>,
    events: EventEmitter,
    transactions: TransactionService,
}

/// Snapshot of the manager's counters
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerStatistics {
    pub cache: CacheStatistics,
    pub transactions: TransactionStatistics,
    pub events_published: u64,
    pub events_failed: u64,
}

/// Entry point for every record operation. Cheap to clone.
#[derive(Clone)]
pub struct ConfigManager {
    inner: Arc<ManagerInner>,
}

impl ConfigManager {
    pub fn new(config: ManagerConfig) -> Self {
        info!(base_dir = %config.base_dir.display(), "Config manager initialised");
        Self {
            inner: Arc::new(ManagerInner {
                config,
                registry: Registry::new(),
                cache: Arc::new(RecordCache::new()),
                events: EventEmitter::new(),
                transactions: TransactionService::new(),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Register the provider for `R`
    pub fn register_provider<R: Record>(&self, provider: Arc<dyn StorageProvider<R>>) -> Result<()> {
        self.inner.registry.register_provider(provider)
    }

    /// Register a file provider for `R` laid out by the manager's configuration
    pub fn register_file_provider<R: Record>(&self) -> Result<()> {
        self.register_file_provider_with::<R>(self.inner.config.provider_options::<R>())
    }

    /// Register a file provider for `R` with explicit options
    pub fn register_file_provider_with<R: Record>(&self, options: ProviderOptions) -> Result<()> {
        debug!(
            type_tag = R::TYPE_TAG,
            directory = %options.directory.display(),
            "Registering file provider"
        );
        let provider = FileStorageProvider::<R>::new(options)?;
        self.register_provider::<R>(Arc::new(provider))
    }

    /// Register or replace the factory `create_default` uses for `R`
    pub fn register_factory<R, F>(&self, factory: F)
    where
        R: Record,
        F: Fn(&str) -> Result<R> + Send + Sync + 'static,
    {
        let factory: RecordFactory<R> = Arc::new(factory);
        self.inner.registry.register_factory::<R>(factory);
    }

    /// Whether a provider is registered for `R`
    pub fn is_registered<R: Record>(&self) -> bool {
        self.inner.registry.has_provider(R::TYPE_TAG)
    }

    /// Subscribe to lifecycle changes of `R`
    pub fn subscribe<R, F>(&self, callback: F) -> SubscriptionId
    where
        R: Record,
        F: Fn(&R, ChangeType) -> std::result::Result<(), SubscriberError> + Send + Sync + 'static,
    {
        self.inner.events.subscribe::<R, F>(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }

    /// Update policy of `field` on record type `R`
    pub fn field_capability<R: Record>(&self, field: &str) -> Option<FieldCapability> {
        self.inner
            .registry
            .capabilities(R::TYPE_TAG)
            .and_then(|table| table.get(field).cloned())
    }

    pub fn statistics(&self) -> ManagerStatistics {
        use std::sync::atomic::Ordering;
        let events = self.inner.events.stats();
        ManagerStatistics {
            cache: self.inner.cache.statistics(),
            transactions: self.inner.transactions.statistics(),
            events_published: events.events_published.load(Ordering::Relaxed),
            events_failed: events.events_failed.load(Ordering::Relaxed),
        }
    }

    /// Start a transaction for a caller-driven sequence of `*_in` calls
    pub fn begin_transaction(&self) -> TransactionContext {
        self.inner.transactions.begin()
    }

    pub fn commit_transaction(&self, context: &mut TransactionContext) -> Result<()> {
        self.inner.transactions.commit(context)
    }

    /// Undo every step recorded in `context`. Failed undo steps are logged.
    pub async fn rollback_transaction(&self, context: &mut TransactionContext) -> Result<()> {
        self.inner.transactions.rollback(context).await.map(|_| ())
    }

    fn provider<R: Record>(&self) -> Result<Arc<dyn StorageProvider<R>>> {
        self.inner.registry.provider::<R>()
    }

    fn cache(&self) -> &RecordCache {
        &self.inner.cache
    }

    fn publish<R: Record>(&self, record: &R, change: ChangeType) {
        self.inner.events.publish(record, change);
    }

    /// State needed to undo a step on `id`; only captured inside a transaction
    async fn undo_point<R: Record>(
        &self,
        provider: &Arc<dyn StorageProvider<R>>,
        id: &str,
        in_transaction: bool,
    ) -> Result<Option<UndoPoint<R>>> {
        if !in_transaction {
            return Ok(None);
        }
        let snapshot = provider
            .snapshot_for(id)
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "snapshot", id, e))?;
        Ok(Some(UndoPoint {
            id: id.to_string(),
            snapshot,
            cached_before: self.cache().peek::<R>(id),
        }))
    }

    /// Register the undo action for a completed write or delete of `id`.
    ///
    /// The action restores the file bytes, makes the provider re-index and
    /// puts back whatever the cache held for `id` before the step.
    fn record_undo<R: Record>(
        &self,
        tx: Option<&mut TransactionContext>,
        point: Option<UndoPoint<R>>,
        operation: OperationType,
        provider: &Arc<dyn StorageProvider<R>>,
        original: Option<&R>,
    ) {
        let (Some(tx), Some(point)) = (tx, point) else {
            return;
        };
        let UndoPoint {
            id,
            snapshot,
            cached_before,
        } = point;
        let original = original.and_then(|record| serde_json::to_value(record).ok());
        let provider = Arc::clone(provider);
        let cache = Arc::clone(&self.inner.cache);
        tx.record(
            operation,
            format!("{}:{}", R::TYPE_TAG, id),
            original,
            Box::new(move || {
                async move {
                    provider
                        .restore(&snapshot)
                        .await
                        .map_err(|e| Error::provider(R::TYPE_TAG, "restore", &id, e))?;
                    match cached_before {
                        Some(record) => cache.set(&record),
                        None => {
                            cache.remove::<R>(&id);
                        }
                    }
                    Ok(())
                }
                .boxed()
            }),
        );
    }
}

struct UndoPoint<R> {
    id: String,
    snapshot: FileSnapshot,
    cached_before: Option<R>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("base_dir", &self.inner.config.base_dir)
            .field("registry", &self.inner.registry)
            .field("cache", &self.inner.cache)
            .finish()
    }
}
