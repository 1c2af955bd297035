//! Concurrent `(type, id)` → record map

use crate::statistics::{CacheStatistics, Counters};
use cfgstore_core::{Error, Record, Result};
use dashmap::DashMap;
use std::any::Any;
use std::sync::Arc;
use tracing::trace;

/// Cache key: record type tag plus record id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub type_tag: &'static str,
    pub id: String,
}

impl CacheKey {
    pub fn of<R: Record>(id: &str) -> Self {
        Self {
            type_tag: R::TYPE_TAG,
            id: id.to_string(),
        }
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

/// Process-wide record cache.
///
/// Each call is atomic on its own; a `get` followed by a `set` is not.
#[derive(Default)]
pub struct RecordCache {
    entries: DashMap<CacheKey, Entry>,
    counters: Counters,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached copy of `id`, counting a hit or a miss.
    ///
    /// An entry holding another concrete type counts as a miss.
    pub fn get<R: Record>(&self, id: &str) -> Option<R> {
        let found = self
            .entries
            .get(&CacheKey::of::<R>(id))
            .and_then(|entry| entry.value().downcast_ref::<R>().cloned());
        match &found {
            Some(_) => {
                self.counters.record_hit();
                trace!(type_tag = R::TYPE_TAG, id, "Cache hit");
            }
            None => {
                self.counters.record_miss();
                trace!(type_tag = R::TYPE_TAG, id, "Cache miss");
            }
        }
        found
    }

    /// Like [`RecordCache::get`], but a type mismatch is an error
    pub fn try_get<R: Record>(&self, id: &str) -> Result<Option<R>> {
        let Some(entry) = self.entries.get(&CacheKey::of::<R>(id)) else {
            self.counters.record_miss();
            return Ok(None);
        };
        match entry.value().downcast_ref::<R>() {
            Some(record) => {
                self.counters.record_hit();
                Ok(Some(record.clone()))
            }
            None => {
                self.counters.record_miss();
                Err(Error::cache(format!(
                    "entry '{}' under {} holds a different record type",
                    id,
                    R::TYPE_TAG
                )))
            }
        }
    }

    /// Cached copy without touching hit/miss counters
    pub fn peek<R: Record>(&self, id: &str) -> Option<R> {
        self.entries
            .get(&CacheKey::of::<R>(id))
            .and_then(|entry| entry.value().downcast_ref::<R>().cloned())
    }

    pub fn set<R: Record>(&self, record: &R) {
        self.entries
            .insert(CacheKey::of::<R>(record.id()), Arc::new(record.clone()));
    }

    /// Drop one entry. Returns whether it was present.
    pub fn remove<R: Record>(&self, id: &str) -> bool {
        self.entries.remove(&CacheKey::of::<R>(id)).is_some()
    }

    /// Whether `id` is cached; does not touch hit/miss counters
    pub fn contains<R: Record>(&self, id: &str) -> bool {
        self.entries.contains_key(&CacheKey::of::<R>(id))
    }

    /// Drop every entry of every type
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop every entry of one type
    pub fn clear_type(&self, type_tag: &str) {
        self.entries.retain(|key, _| key.type_tag != type_tag);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.counters.snapshot(self.entries.len())
    }

    pub fn reset_statistics(&self) {
        self.counters.reset();
    }

    /// Store an arbitrary value under a key; lets tests plant mismatched types
    #[cfg(test)]
    fn set_raw(&self, key: CacheKey, value: Entry) {
        self.entries.insert(key, value);
    }
}

impl std::fmt::Debug for RecordCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
