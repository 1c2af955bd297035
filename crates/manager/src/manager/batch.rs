use super::ConfigManager;
use crate::transaction::{OperationType, TransactionContext};
use cfgstore_core::{BatchMode, BatchOperationResult, Operation, Record, Result, ResultExt};
use cfgstore_utils::tracing::batch_span;
use futures::FutureExt;
use std::path::PathBuf;
use tracing::{info, Instrument};

/// One item of a batch over record type `R`
#[derive(Debug, Clone)]
pub enum BatchOperation<R> {
    /// Store a new record; fails if the id exists
    Create(R),
    Add { record: R, overwrite: bool },
    Update(R),
    Delete(String),
    /// Import a single-record file, optionally under a new id
    Import { path: PathBuf, id: Option<String> },
    Export { id: String, path: PathBuf },
}

impl<R: Record> BatchOperation<R> {
    /// Label used as the key of a failure in [`BatchOperationResult`]
    pub fn label(&self) -> String {
        match self {
            BatchOperation::Create(record) => format!("create:{}", record.id()),
            BatchOperation::Add { record, .. } => format!("add:{}", record.id()),
            BatchOperation::Update(record) => format!("update:{}", record.id()),
            BatchOperation::Delete(id) => format!("delete:{id}"),
            BatchOperation::Import { path, id } => match id {
                Some(id) => format!("import:{id}"),
                None => format!("import:{}", path.display()),
            },
            BatchOperation::Export { id, path } => format!("export:{id}:{}", path.display()),
        }
    }
}

impl ConfigManager {
    /// Run a batch of operations on `R`.
    ///
    /// `mode` falls back to the configured default. Lenient batches always
    /// return the per-item report; strict batches either apply every item or
    /// roll all of them back and fail with `BatchPartialFailure`.
    pub async fn execute_batch<R: Record>(
        &self,
        operations: Vec<BatchOperation<R>>,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let mode = mode.unwrap_or(self.config().default_batch_mode);
        self.provider::<R>()?;

        let span = batch_span(R::TYPE_TAG, operations.len(), mode == BatchMode::Strict);
        let items: Vec<(String, BatchOperation<R>)> = operations
            .into_iter()
            .map(|operation| (operation.label(), operation))
            .collect();

        let manager = self.clone();
        let result = self
            .inner
            .transactions
            .execute_batch(items, mode, move |operation, tx| {
                let manager = manager.clone();
                async move { manager.apply(operation, tx).await }.boxed()
            })
            .instrument(span)
            .await?;

        info!(
            type_tag = R::TYPE_TAG,
            ?mode,
            succeeded = result.success_count,
            failed = result.failure_count,
            "Batch finished"
        );
        Ok(result)
    }

    async fn apply<R: Record>(
        &self,
        operation: BatchOperation<R>,
        tx: Option<&mut TransactionContext>,
    ) -> Result<()> {
        match operation {
            BatchOperation::Create(record) => {
                let id = record.id().to_string();
                self.insert_new(record, &id, OperationType::Create, tx)
                    .await
                    .for_operation(Operation::Create, &id)
                    .map(drop)
            }
            BatchOperation::Add { record, overwrite } => {
                self.add_in(record, overwrite, tx).await.map(drop)
            }
            BatchOperation::Update(mut record) => self.update_in(&mut record, tx).await,
            BatchOperation::Delete(id) => self.delete_in::<R>(&id, tx).await,
            BatchOperation::Import { path, id } => self
                .import_from_file_in::<R>(&path, id.as_deref(), tx)
                .await
                .map(drop),
            BatchOperation::Export { id, path } => {
                self.export_to_file_in::<R>(&id, &path, tx).await
            }
        }
    }

    /// Store every record as new
    pub async fn create_batch<R: Record>(
        &self,
        records: Vec<R>,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let operations = records.into_iter().map(BatchOperation::Create).collect();
        self.execute_batch(operations, mode).await
    }

    pub async fn add_batch<R: Record>(
        &self,
        records: Vec<R>,
        overwrite: bool,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let operations = records
            .into_iter()
            .map(|record| BatchOperation::Add { record, overwrite })
            .collect();
        self.execute_batch(operations, mode).await
    }

    pub async fn delete_batch<R: Record>(
        &self,
        ids: Vec<String>,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let operations = ids.into_iter().map(BatchOperation::Delete).collect();
        self.execute_batch::<R>(operations, mode).await
    }

    /// Import one record per file, each keeping the id found in its file
    pub async fn import_batch<R: Record>(
        &self,
        paths: Vec<PathBuf>,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let operations = paths
            .into_iter()
            .map(|path| BatchOperation::Import { path, id: None })
            .collect();
        self.execute_batch::<R>(operations, mode).await
    }

    /// Export each `(id, path)` pair
    pub async fn export_batch<R: Record>(
        &self,
        items: Vec<(String, PathBuf)>,
        mode: Option<BatchMode>,
    ) -> Result<BatchOperationResult> {
        let operations = items
            .into_iter()
            .map(|(id, path)| BatchOperation::Export { id, path })
            .collect();
        self.execute_batch::<R>(operations, mode).await
    }
}
