//! Lazily built id → file index

use cfgstore_core::{IndexEntry, Result, StorageFormat};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Everything a full directory scan produces
#[derive(Debug, Default)]
pub struct IndexBuild {
    pub entries: HashMap<String, IndexEntry>,
    /// Detected format per file name
    pub formats: HashMap<String, StorageFormat>,
    /// Format to use for the default file's first write
    pub default_format: StorageFormat,
}

/// Index of one provider's records.
///
/// The index is built at most once until rebuilt; concurrent callers of
/// [`RecordIndex::ensure_built`] wait on the same build. After the build the
/// `built` flag is read without touching the build lock. A rebuild scans
/// while the previous state stays readable and replaces it in one swap, so a
/// reader never observes a cleared index.
#[derive(Debug, Default)]
pub struct RecordIndex {
    state: RwLock<IndexBuild>,
    built: AtomicBool,
    build_lock: Mutex<()>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.built.load(Ordering::Acquire)
    }

    /// Run `build` unless the index is already built
    pub async fn ensure_built<F, Fut>(&self, build: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IndexBuild>>,
    {
        if self.is_built() {
            return Ok(());
        }

        let _guard = self.build_lock.lock().await;
        if self.is_built() {
            return Ok(());
        }
        self.install(build().await?);
        Ok(())
    }

    /// Scan again and swap the result in; returns the number of entries.
    ///
    /// Waits for any build in flight. On failure the previous entries stay
    /// readable and the next access retries the build.
    pub async fn rebuild<F, Fut>(&self, build: F) -> Result<usize>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<IndexBuild>>,
    {
        let _guard = self.build_lock.lock().await;
        match build().await {
            Ok(build) => {
                let count = build.entries.len();
                self.install(build);
                Ok(count)
            }
            Err(e) => {
                self.built.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn install(&self, build: IndexBuild) {
        *self.state.write() = build;
        self.built.store(true, Ordering::Release);
    }

    pub fn get(&self, id: &str) -> Option<IndexEntry> {
        self.state.read().entries.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.state.read().entries.contains_key(id)
    }

    pub fn insert(&self, id: impl Into<String>, entry: IndexEntry) {
        self.state.write().entries.insert(id.into(), entry);
    }

    pub fn remove(&self, id: &str) -> Option<IndexEntry> {
        self.state.write().entries.remove(id)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Copy of all entries
    pub fn entries(&self) -> HashMap<String, IndexEntry> {
        self.state.read().entries.clone()
    }

    pub fn file_format(&self, file_name: &str) -> Option<StorageFormat> {
        self.state.read().formats.get(file_name).copied()
    }

    pub fn set_file_format(&self, file_name: impl Into<String>, format: StorageFormat) {
        self.state.write().formats.insert(file_name.into(), format);
    }

    pub fn forget_file(&self, file_name: &str) {
        self.state.write().formats.remove(file_name);
    }

    pub fn default_format(&self) -> StorageFormat {
        self.state.read().default_format
    }
}
