//! Type-tag keyed registry of storage providers, factories and capability
//! tables.
//!
//! Entries are stored type-erased and recovered with a downcast on the
//! concrete record type, so one registry serves every record type.

use cfgstore_core::{CapabilityTable, Error, Record, Result};
use cfgstore_storage::StorageProvider;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds a fresh record for an id
pub type RecordFactory<R> = Arc<dyn Fn(&str) -> Result<R> + Send + Sync>;

type Erased = Box<dyn Any + Send + Sync>;

struct ProviderEntry {
    provider: Erased,
    capabilities: CapabilityTable,
}

#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<&'static str, ProviderEntry>>,
    factories: RwLock<HashMap<&'static str, Erased>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the single provider for `R`. A second registration fails.
    pub fn register_provider<R: Record>(&self, provider: Arc<dyn StorageProvider<R>>) -> Result<()> {
        let mut providers = self.providers.write();
        if providers.contains_key(R::TYPE_TAG) {
            return Err(Error::ProviderInit {
                type_tag: R::TYPE_TAG.to_string(),
                message: "a provider is already registered for this type".to_string(),
            });
        }
        providers.insert(
            R::TYPE_TAG,
            ProviderEntry {
                provider: Box::new(provider),
                capabilities: R::capabilities(),
            },
        );
        info!(type_tag = R::TYPE_TAG, "Storage provider registered");
        Ok(())
    }

    /// Provider for `R`
    pub fn provider<R: Record>(&self) -> Result<Arc<dyn StorageProvider<R>>> {
        self.providers
            .read()
            .get(R::TYPE_TAG)
            .and_then(|entry| entry.provider.downcast_ref::<Arc<dyn StorageProvider<R>>>())
            .cloned()
            .ok_or_else(|| Error::ProviderNotRegistered {
                type_tag: R::TYPE_TAG.to_string(),
            })
    }

    pub fn has_provider(&self, type_tag: &str) -> bool {
        self.providers.read().contains_key(type_tag)
    }

    /// Remove the provider for `R`. Returns whether one was registered.
    pub fn unregister_provider<R: Record>(&self) -> bool {
        let removed = self.providers.write().remove(R::TYPE_TAG).is_some();
        if removed {
            debug!(type_tag = R::TYPE_TAG, "Storage provider removed");
        }
        removed
    }

    /// Register or replace the factory for `R`
    pub fn register_factory<R: Record>(&self, factory: RecordFactory<R>) {
        self.factories.write().insert(R::TYPE_TAG, Box::new(factory));
        debug!(type_tag = R::TYPE_TAG, "Record factory registered");
    }

    pub fn factory<R: Record>(&self) -> Result<RecordFactory<R>> {
        self.factories
            .read()
            .get(R::TYPE_TAG)
            .and_then(|entry| entry.downcast_ref::<RecordFactory<R>>())
            .cloned()
            .ok_or_else(|| Error::FactoryNotRegistered {
                type_tag: R::TYPE_TAG.to_string(),
            })
    }

    /// Capability table captured when the provider was registered
    pub fn capabilities(&self, type_tag: &str) -> Option<CapabilityTable> {
        self.providers
            .read()
            .get(type_tag)
            .map(|entry| entry.capabilities.clone())
    }

    /// Tags of every type with a provider, sorted
    pub fn registered_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.providers.read().keys().copied().collect();
        types.sort_unstable();
        types
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("providers", &self.registered_types())
            .field("factories", &self.factories.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgstore_core::{ErrorCode, RecordMeta, UpdatePolicy};
    use cfgstore_storage::{FileStorageProvider, ProviderOptions};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Gateway {
        #[serde(flatten)]
        meta: RecordMeta,
        #[serde(default)]
        address: String,
    }

    impl Record for Gateway {
        const TYPE_TAG: &'static str = "Gateway";
        fn meta(&self) -> &RecordMeta {
            &self.meta
        }
        fn meta_mut(&mut self) -> &mut RecordMeta {
            &mut self.meta
        }
        fn capabilities() -> CapabilityTable {
            CapabilityTable::default().with(
                "address",
                UpdatePolicy::RequiresRestart,
                "listener rebinds on restart",
            )
        }
    }

    fn file_provider(dir: &std::path::Path) -> Arc<dyn StorageProvider<Gateway>> {
        Arc::new(FileStorageProvider::<Gateway>::new(ProviderOptions::new(dir)).unwrap())
    }

    #[test]
    fn test_provider_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        assert_eq!(
            registry.provider::<Gateway>().err().map(|e| e.code()),
            Some(ErrorCode::ProviderNotRegistered)
        );

        registry.register_provider(file_provider(dir.path())).unwrap();
        assert!(registry.provider::<Gateway>().is_ok());
        assert_eq!(registry.registered_types(), vec!["Gateway"]);

        let err = registry
            .register_provider(file_provider(dir.path()))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ProviderInitFailed);

        assert!(registry.unregister_provider::<Gateway>());
        assert!(!registry.has_provider("Gateway"));
    }

    #[test]
    fn test_capabilities_captured_on_registration() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new();
        assert!(registry.capabilities("Gateway").is_none());
        registry.register_provider(file_provider(dir.path())).unwrap();
        let table = registry.capabilities("Gateway").unwrap();
        assert_eq!(table.policy("address"), UpdatePolicy::RequiresRestart);
        assert_eq!(table.restart_required(["name", "address"]), vec!["address"]);
    }

    #[test]
    fn test_factory_lookup() {
        let registry = Registry::new();
        assert_eq!(
            registry.factory::<Gateway>().err().map(|e| e.code()),
            Some(ErrorCode::FactoryNotRegistered)
        );
        registry.register_factory::<Gateway>(Arc::new(|id: &str| {
            Ok(Gateway {
                meta: RecordMeta::new(Gateway::TYPE_TAG, id, id),
                address: "0.0.0.0:80".into(),
            })
        }));
        let gateway = (registry.factory::<Gateway>().unwrap())("edge").unwrap();
        assert_eq!(gateway.id(), "edge");
        assert_eq!(gateway.address, "0.0.0.0:80");
    }
}
