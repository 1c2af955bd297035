//! Shared record types, providers and helpers for the manager integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cfgstore::{
    BatchMode, CapabilityTable, ConfigManager, Error, FileSnapshot, FileStorageProvider,
    IndexEntry, ManagerConfig, Operation, ProviderOptions, Record, RecordMeta, Result, SaveOutcome,
    StorageFormat, StorageProvider, UpdatePolicy, Validation,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// A device record; the pre-save hook rejects the name "reject"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Record for DeviceConfig {
    const TYPE_TAG: &'static str = "DeviceConfig";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn validate(&self) -> Validation {
        let mut validation = Validation::ok();
        if self.port == 0 {
            validation.push("port must be non-zero");
        }
        validation
    }

    fn before_save(&mut self) -> Result<()> {
        if self.meta.name == "reject" {
            return Err(Error::InvalidName {
                id: self.meta.id.clone(),
                message: "name is reserved".to_string(),
            });
        }
        self.tags.sort();
        self.tags.dedup();
        Ok(())
    }

    fn capabilities() -> CapabilityTable {
        CapabilityTable::new()
            .with("port", UpdatePolicy::RequiresRestart, "socket is bound at startup")
            .with("tags", UpdatePolicy::HotUpdate, "read on every request")
    }
}

/// A settings record; the post-load hook lowercases the theme and fails on
/// the theme "broken"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub theme: String,
}

impl Record for AppSettings {
    const TYPE_TAG: &'static str = "AppSettings";

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }

    fn after_load(&mut self) -> Result<()> {
        if self.theme == "broken" {
            return Err(Error::operation_failed(
                Operation::Update,
                &self.meta.id,
                "theme cannot be resolved",
            ));
        }
        self.theme = self.theme.to_lowercase();
        Ok(())
    }
}

pub fn device(id: &str, name: &str, port: u16) -> DeviceConfig {
    DeviceConfig {
        meta: RecordMeta::new(DeviceConfig::TYPE_TAG, id, name),
        port,
        tags: Vec::new(),
    }
}

pub fn settings(id: &str, theme: &str) -> AppSettings {
    AppSettings {
        meta: RecordMeta::new(AppSettings::TYPE_TAG, id, id),
        theme: theme.to_string(),
    }
}

/// Builder for a manager rooted in a fresh temporary directory
pub struct TestManagerBuilder {
    format: StorageFormat,
    scan_all: bool,
    mode: BatchMode,
}

impl TestManagerBuilder {
    pub fn new() -> Self {
        Self {
            format: StorageFormat::Array,
            scan_all: false,
            mode: BatchMode::Lenient,
        }
    }

    pub fn with_format(mut self, format: StorageFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_scan_all(mut self, scan_all: bool) -> Self {
        self.scan_all = scan_all;
        self
    }

    pub fn with_batch_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn config(&self, dir: &Path) -> ManagerConfig {
        ManagerConfig::builder()
            .ignore_environment()
            .base_dir(dir)
            .new_record_format(self.format)
            .scan_all_files(self.scan_all)
            .default_batch_mode(self.mode)
            .build()
            .expect("test config")
    }

    /// Manager with file providers for both test record types.
    /// The temp directory must outlive the manager.
    pub fn build(self) -> (ConfigManager, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let manager = ConfigManager::new(self.config(dir.path()));
        manager
            .register_file_provider::<DeviceConfig>()
            .expect("device provider");
        manager
            .register_file_provider::<AppSettings>()
            .expect("settings provider");
        (manager, dir)
    }

    /// Manager whose device provider is wrapped in an [`InstrumentedProvider`]
    pub fn build_instrumented(
        self,
    ) -> (ConfigManager, Arc<InstrumentedProvider<DeviceConfig>>, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let config = self.config(dir.path());
        let options = config.provider_options::<DeviceConfig>();
        let manager = ConfigManager::new(config);
        let provider = Arc::new(InstrumentedProvider::new(options));
        manager
            .register_provider::<DeviceConfig>(provider.clone())
            .expect("device provider");
        (manager, provider, dir)
    }
}

impl Default for TestManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wraps a file provider, counting loads and failing saves of chosen ids
pub struct InstrumentedProvider<R> {
    inner: FileStorageProvider<R>,
    loads: AtomicUsize,
    saves: AtomicUsize,
    failing: Mutex<HashSet<String>>,
}

impl<R: Record> InstrumentedProvider<R> {
    pub fn new(options: ProviderOptions) -> Self {
        Self {
            inner: FileStorageProvider::new(options).expect("file provider"),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn fail_saves_of(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }
}

#[async_trait]
impl<R: Record> StorageProvider<R> for InstrumentedProvider<R> {
    async fn load(&self, id: &str) -> Result<R> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load(id).await
    }

    async fn save(&self, record: &R) -> Result<SaveOutcome> {
        if self.failing.lock().unwrap().contains(record.id()) {
            return Err(Error::write(
                self.inner.directory().join("configs.json"),
                "write",
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save(record).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.inner.exists(id).await
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        self.inner.get_all().await
    }

    async fn rebuild_index(&self) -> Result<usize> {
        self.inner.rebuild_index().await
    }

    async fn index_entries(&self) -> Result<HashMap<String, IndexEntry>> {
        self.inner.index_entries().await
    }

    async fn snapshot_for(&self, id: &str) -> Result<FileSnapshot> {
        self.inner.snapshot_for(id).await
    }

    async fn restore(&self, snapshot: &FileSnapshot) -> Result<()> {
        self.inner.restore(snapshot).await
    }

    fn directory(&self) -> &Path {
        self.inner.directory()
    }
}

/// Storage directory of `DeviceConfig` records under `base`
pub fn device_dir(base: &Path) -> PathBuf {
    base.join("Device")
}

pub fn read_json(path: &Path) -> serde_json::Value {
    let content = std::fs::read_to_string(path).expect("readable file");
    serde_json::from_str(&content).expect("valid json")
}

/// Every file in `dir` with its content, for before/after comparisons
pub fn dir_contents(dir: &Path) -> Vec<(String, String)> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<(String, String)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let content = std::fs::read_to_string(entry.path()).unwrap_or_default();
            (name, content)
        })
        .collect();
    files.sort();
    files
}
