use super::ConfigManager;
use cfgstore_core::{ChangeType, Error, IndexEntry, Record, Result};
use std::collections::HashMap;
use tracing::{debug, instrument, warn};

impl ConfigManager {
    /// Record `id` of type `R`, from the cache when possible
    #[instrument(level = "debug", skip(self), fields(type_tag = R::TYPE_TAG))]
    pub async fn get<R: Record>(&self, id: &str) -> Result<R> {
        let provider = self.provider::<R>()?;
        if id.is_empty() {
            return Err(Error::not_found(R::TYPE_TAG, id));
        }
        if let Some(record) = self.cache().get::<R>(id) {
            return Ok(record);
        }

        let mut record = provider
            .load(id)
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "load", id, e))?;
        run_after_load(&mut record);
        self.cache().set(&record);
        Ok(record)
    }

    /// Whether `id` is stored
    pub async fn exists<R: Record>(&self, id: &str) -> Result<bool> {
        let provider = self.provider::<R>()?;
        if id.is_empty() {
            return Ok(false);
        }
        provider
            .exists(id)
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "exists", id, e))
    }

    /// Every stored record of `R`. Loaded records refresh the cache.
    pub async fn get_all<R: Record>(&self) -> Result<Vec<R>> {
        let provider = self.provider::<R>()?;
        let mut records = provider
            .get_all()
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "get_all", "*", e))?;
        for record in &mut records {
            run_after_load(record);
            self.cache().set(record);
        }
        debug!(type_tag = R::TYPE_TAG, count = records.len(), "Loaded all records");
        Ok(records)
    }

    /// Id to file mapping of `R`'s provider
    pub async fn index_entries<R: Record>(&self) -> Result<HashMap<String, IndexEntry>> {
        self.provider::<R>()?
            .index_entries()
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "index", "*", e))
    }

    /// Drop the cached copy of `id` and load it again from storage
    pub async fn reload<R: Record>(&self, id: &str) -> Result<R> {
        self.provider::<R>()?;
        self.cache().remove::<R>(id);
        let record = self.get::<R>(id).await?;
        self.publish(&record, ChangeType::Reloaded);
        Ok(record)
    }

    /// Re-scan `R`'s storage and drop every cached `R`.
    ///
    /// Returns the number of indexed records.
    pub async fn reload_all<R: Record>(&self) -> Result<usize> {
        let provider = self.provider::<R>()?;
        let count = provider
            .rebuild_index()
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "rebuild_index", "*", e))?;
        self.cache().clear_type(R::TYPE_TAG);
        debug!(type_tag = R::TYPE_TAG, count, "Storage re-indexed");
        Ok(count)
    }
}

/// Post-load hook; a failure leaves the record as loaded
pub(super) fn run_after_load<R: Record>(record: &mut R) {
    if let Err(e) = record.after_load() {
        warn!(
            type_tag = R::TYPE_TAG,
            id = record.id(),
            error = %e,
            "Post-load hook failed"
        );
    }
}
