//! Typed, file-backed configuration records.
//!
//! ```no_run
//! use cfgstore::{ConfigManager, ManagerConfig};
//! # use cfgstore::{Record, RecordMeta};
//! # #[derive(Clone, serde::Serialize, serde::Deserialize)]
//! # struct DeviceConfig { #[serde(flatten)] meta: RecordMeta, port: u16 }
//! # impl Record for DeviceConfig {
//! #     const TYPE_TAG: &'static str = "DeviceConfig";
//! #     fn meta(&self) -> &RecordMeta { &self.meta }
//! #     fn meta_mut(&mut self) -> &mut RecordMeta { &mut self.meta }
//! # }
//! # async fn run() -> cfgstore::Result<()> {
//! let manager = ConfigManager::new(ManagerConfig::builder().base_dir("/etc/app").build()?);
//! manager.register_file_provider::<DeviceConfig>()?;
//!
//! let mut device = manager
//!     .create("A1", |id| DeviceConfig {
//!         meta: RecordMeta::new(DeviceConfig::TYPE_TAG, id, "Foo"),
//!         port: 8080,
//!     })
//!     .await?;
//! device.port = 9090;
//! manager.update(&mut device).await?;
//! manager.delete::<DeviceConfig>("A1").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod manager;
pub mod registry;
pub mod transaction;

pub use config::{ConfigSource, ManagerConfig, ManagerConfigBuilder};
pub use manager::{BatchOperation, ConfigManager, ManagerStatistics};
pub use registry::RecordFactory;
pub use transaction::{
    OperationType, RollbackReport, TransactionContext, TransactionState, TransactionStatistics,
};

pub use cfgstore_cache::CacheStatistics;
pub use cfgstore_core::{
    BatchMode, BatchOperationResult, CapabilityTable, ChangeType, Error, ErrorCategory, ErrorCode,
    FieldCapability, IndexEntry, Operation, Record, RecordMeta, Result, StorageFormat,
    StorageMode, SubscriberError, SubscriptionId, UpdatePolicy, Validation,
};
pub use cfgstore_storage::{FileStorageProvider, ProviderOptions, SaveOutcome, StorageProvider};
pub use cfgstore_utils::tracing::init as init_tracing;
pub use cfgstore_utils::FileSnapshot;
