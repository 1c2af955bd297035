//! Import from and export to standalone JSON files outside the store

use super::read::run_after_load;
use super::ConfigManager;
use crate::transaction::{OperationType, TransactionContext};
use cfgstore_core::{Error, Operation, Record, Result, ResultExt, StorageFormat};
use cfgstore_storage::{Document, FormatCodec};
use cfgstore_utils::{read_optional, write_atomic_string, FileSnapshot};
use futures::FutureExt;
use std::path::Path;
use tracing::info;

impl ConfigManager {
    /// Import the single record held in `path`.
    ///
    /// The file may use any storage format but must hold exactly one record.
    /// With `id` set the record is stored under that id as a fresh record;
    /// otherwise it keeps the id found in the file.
    pub async fn import_from_file<R: Record>(&self, path: &Path, id: Option<&str>) -> Result<R> {
        self.import_from_file_in(path, id, None).await
    }

    pub async fn import_from_file_in<R: Record>(
        &self,
        path: &Path,
        id: Option<&str>,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let label = match id {
            Some(id) => id.to_string(),
            None => path.display().to_string(),
        };
        self.import_inner(path, id, tx)
            .await
            .for_operation(Operation::Import, &label)
    }

    async fn import_inner<R: Record>(
        &self,
        path: &Path,
        id: Option<&str>,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        self.provider::<R>()?;
        let content = read_optional(path)
            .await?
            .ok_or_else(|| Error::FileNotFound {
                path: path.to_path_buf(),
            })?;
        let document = self.codec().decode::<R>(
            path,
            &content,
            StorageFormat::Auto,
            StorageFormat::SingleObject,
        )?;

        let mut records = document.records;
        let mut record = match records.len() {
            1 => records.remove(0),
            0 => return Err(Error::format_invalid(path, "file holds no record")),
            n => {
                return Err(Error::format_invalid(
                    path,
                    format!("file holds {n} records, import takes exactly one"),
                ))
            }
        };
        run_after_load(&mut record);

        let target = match id {
            Some(id) => {
                record.meta_mut().reassign(id);
                id.to_string()
            }
            None => record.id().to_string(),
        };
        let record = self
            .insert_new(record, &target, OperationType::Import, tx)
            .await?;
        info!(type_tag = R::TYPE_TAG, id = %target, path = %path.display(), "Record imported");
        Ok(record)
    }

    /// Write record `id` to `path` as a single JSON object
    pub async fn export_to_file<R: Record>(&self, id: &str, path: &Path) -> Result<()> {
        self.export_to_file_in::<R>(id, path, None).await
    }

    pub async fn export_to_file_in<R: Record>(
        &self,
        id: &str,
        path: &Path,
        tx: Option<&mut TransactionContext>,
    ) -> Result<()> {
        self.export_inner::<R>(id, path, tx)
            .await
            .for_operation(Operation::Export, id)
    }

    async fn export_inner<R: Record>(
        &self,
        id: &str,
        path: &Path,
        tx: Option<&mut TransactionContext>,
    ) -> Result<()> {
        let record = self.get::<R>(id).await?;
        let mut document = Document::empty(StorageFormat::SingleObject);
        document.upsert(record);
        let content = self.codec().encode(path, &document)?;

        let snapshot = if tx.is_some() {
            Some(FileSnapshot::capture(path).await?)
        } else {
            None
        };
        write_atomic_string(path, &content).await?;

        if let (Some(tx), Some(snapshot)) = (tx, snapshot) {
            tx.record(
                OperationType::Export,
                format!("export:{id}"),
                None,
                Box::new(move || async move { snapshot.restore().await }.boxed()),
            );
        }
        info!(type_tag = R::TYPE_TAG, id, path = %path.display(), "Record exported");
        Ok(())
    }

    fn codec(&self) -> FormatCodec {
        let config = self.config();
        FormatCodec::new(&config.container_field, &config.last_modified_field)
    }
}
