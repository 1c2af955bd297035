use super::read::run_after_load;
use super::ConfigManager;
use crate::transaction::{OperationType, TransactionContext};
use cfgstore_core::{
    basic_validation, ChangeType, Error, ErrorCode, Operation, Record, Result, ResultExt,
};
use cfgstore_storage::StorageProvider;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

impl ConfigManager {
    /// Create a new record with `factory` and persist it under `id`
    pub async fn create<R, F>(&self, id: &str, factory: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(&str) -> R + Send,
    {
        self.create_in(id, factory, None).await
    }

    pub async fn create_in<R, F>(
        &self,
        id: &str,
        factory: F,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R>
    where
        R: Record,
        F: FnOnce(&str) -> R + Send,
    {
        let record = factory(id);
        self.insert_new(record, id, OperationType::Create, tx)
            .await
            .for_operation(Operation::Create, id)
    }

    /// Create `id` with the factory registered for `R`
    pub async fn create_default<R: Record>(&self, id: &str) -> Result<R> {
        self.create_default_in(id, None).await
    }

    pub async fn create_default_in<R: Record>(
        &self,
        id: &str,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let factory = self.inner.registry.factory::<R>()?;
        let record = factory(id).map_err(|e| Error::FactoryCreate {
            type_tag: R::TYPE_TAG.to_string(),
            id: id.to_string(),
            message: e.to_string(),
        })?;
        self.insert_new(record, id, OperationType::Create, tx)
            .await
            .for_operation(Operation::Create, id)
    }

    /// Copy `template_id` into a new record `id`
    pub async fn create_from_template<R: Record>(&self, id: &str, template_id: &str) -> Result<R> {
        self.create_from_template_in(id, template_id, None).await
    }

    pub async fn create_from_template_in<R: Record>(
        &self,
        id: &str,
        template_id: &str,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let template = self.get::<R>(template_id).await?;
        let mut record = template.duplicate();
        record.meta_mut().reassign(id);
        self.insert_new(record, id, OperationType::Create, tx)
            .await
            .for_operation(Operation::Create, id)
    }

    /// Copy `source_id` into a new record `new_id`
    pub async fn clone_record<R: Record>(&self, source_id: &str, new_id: &str) -> Result<R> {
        self.clone_record_in(source_id, new_id, None).await
    }

    pub async fn clone_record_in<R: Record>(
        &self,
        source_id: &str,
        new_id: &str,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let source = self
            .get::<R>(source_id)
            .await
            .for_operation(Operation::Clone, source_id)?;
        let mut copy = source.duplicate();
        copy.meta_mut().reassign(new_id);
        self.insert_new(copy, new_id, OperationType::Clone, tx)
            .await
            .for_operation(Operation::Clone, new_id)
    }

    /// Store a caller-built record.
    ///
    /// An existing id fails with `AlreadyExists` unless `overwrite` is set, in
    /// which case the stored record is replaced and its version bumped.
    pub async fn add<R: Record>(&self, record: R, overwrite: bool) -> Result<R> {
        self.add_in(record, overwrite, None).await
    }

    pub async fn add_in<R: Record>(
        &self,
        record: R,
        overwrite: bool,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let id = record.id().to_string();
        self.add_inner(record, overwrite, tx)
            .await
            .for_operation(Operation::Create, &id)
    }

    async fn add_inner<R: Record>(
        &self,
        mut record: R,
        overwrite: bool,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let provider = self.provider::<R>()?;
        let id = record.id().to_string();
        if id.is_empty() {
            return Err(missing_id::<R>());
        }
        record.meta_mut().type_tag = R::TYPE_TAG.to_string();

        if !self.stored(&provider, &id).await? {
            return self
                .persist(&provider, record, OperationType::Add, ChangeType::Added, None, tx)
                .await;
        }
        if !overwrite {
            return Err(Error::already_exists(R::TYPE_TAG, id));
        }

        let current = self.get::<R>(&id).await?;
        let meta = record.meta_mut();
        meta.created_at = current.meta().created_at;
        meta.version = current.version();
        meta.touch();
        self.persist(
            &provider,
            record,
            OperationType::Add,
            ChangeType::Updated,
            Some(&current),
            tx,
        )
        .await
    }

    /// Existing record `id`, or a new one built by `factory`
    pub async fn get_or_create<R, F>(&self, id: &str, factory: F) -> Result<R>
    where
        R: Record,
        F: FnOnce(&str) -> R + Send,
    {
        match self.get::<R>(id).await {
            Err(e) if e.is_not_found() => match self.create(id, factory).await {
                Err(e) if e.root_code() == ErrorCode::AlreadyExists => {
                    self.get::<R>(id).await
                }
                other => other,
            },
            other => other,
        }
    }

    /// Existing record with `record`'s id, or `record` itself once stored
    pub async fn get_or_add<R: Record>(&self, record: R) -> Result<R> {
        let id = record.id().to_string();
        match self.get::<R>(&id).await {
            Err(e) if e.is_not_found() => self.add(record, false).await,
            other => other,
        }
    }

    /// Persist changes to an existing record.
    ///
    /// On success `record` carries the bumped version and `updated_at`.
    /// A caller copy whose version differs from the stored one is rejected
    /// with `VersionConflict`.
    pub async fn update<R: Record>(&self, record: &mut R) -> Result<()> {
        self.update_in(record, None).await
    }

    pub async fn update_in<R: Record>(
        &self,
        record: &mut R,
        tx: Option<&mut TransactionContext>,
    ) -> Result<()> {
        let id = record.id().to_string();
        let saved = self
            .update_inner(record, tx)
            .await
            .for_operation(Operation::Update, &id)?;
        *record = saved;
        Ok(())
    }

    async fn update_inner<R: Record>(
        &self,
        record: &R,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let provider = self.provider::<R>()?;
        let id = record.id();
        if id.is_empty() {
            return Err(missing_id::<R>());
        }
        let current = self.get::<R>(id).await?;
        if current.version() != record.version() {
            return Err(Error::VersionConflict {
                id: id.to_string(),
                expected: record.version(),
                actual: current.version(),
            });
        }

        let mut next = record.clone();
        next.meta_mut().type_tag = R::TYPE_TAG.to_string();
        next.meta_mut().touch();
        self.persist(
            &provider,
            next,
            OperationType::Update,
            ChangeType::Updated,
            Some(&current),
            tx,
        )
        .await
    }

    /// Remove record `id`. Deleting an absent id succeeds.
    pub async fn delete<R: Record>(&self, id: &str) -> Result<()> {
        self.delete_in::<R>(id, None).await
    }

    #[instrument(level = "debug", skip(self, tx), fields(type_tag = R::TYPE_TAG))]
    pub async fn delete_in<R: Record>(
        &self,
        id: &str,
        tx: Option<&mut TransactionContext>,
    ) -> Result<()> {
        let provider = self.provider::<R>()?;
        if id.is_empty() {
            return Ok(());
        }
        if !self.stored(&provider, id).await.for_operation(Operation::Delete, id)? {
            self.cache().remove::<R>(id);
            debug!(type_tag = R::TYPE_TAG, id, "Delete of absent record is a no-op");
            return Ok(());
        }

        let point = self
            .undo_point(&provider, id, tx.is_some())
            .await
            .for_operation(Operation::Delete, id)?;
        let previous = match self.cache().peek::<R>(id) {
            Some(record) => Some(record),
            None => match provider.load(id).await {
                Ok(mut record) => {
                    run_after_load(&mut record);
                    Some(record)
                }
                Err(e) => {
                    warn!(type_tag = R::TYPE_TAG, id, error = %e, "Could not load record before delete");
                    None
                }
            },
        };

        match provider.delete(id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(type_tag = R::TYPE_TAG, id, "Record vanished before delete");
            }
            Err(e) => {
                return Err(Error::provider(R::TYPE_TAG, "delete", id, e))
                    .for_operation(Operation::Delete, id);
            }
        }
        self.cache().remove::<R>(id);
        self.record_undo(tx, point, OperationType::Delete, &provider, previous.as_ref());
        if let Some(previous) = &previous {
            self.publish(previous, ChangeType::Deleted);
        }
        Ok(())
    }

    /// Persist a record whose id must not be stored yet
    pub(super) async fn insert_new<R: Record>(
        &self,
        mut record: R,
        id: &str,
        step: OperationType,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let provider = self.provider::<R>()?;
        if id.is_empty() {
            return Err(missing_id::<R>());
        }
        let meta = record.meta_mut();
        meta.id = id.to_string();
        meta.type_tag = R::TYPE_TAG.to_string();

        if self.stored(&provider, id).await? {
            return Err(Error::already_exists(R::TYPE_TAG, id));
        }
        let change = match step {
            OperationType::Import => ChangeType::Imported,
            _ => ChangeType::Created,
        };
        self.persist(&provider, record, step, change, None, tx).await
    }

    /// The write path shared by every mutation: validate, pre-save hook,
    /// provider save, cache, undo registration and publish.
    #[instrument(level = "debug", skip_all, fields(type_tag = R::TYPE_TAG, id = record.id(), step = ?step))]
    async fn persist<R: Record>(
        &self,
        provider: &Arc<dyn StorageProvider<R>>,
        mut record: R,
        step: OperationType,
        change: ChangeType,
        original: Option<&R>,
        tx: Option<&mut TransactionContext>,
    ) -> Result<R> {
        let id = record.id().to_string();
        basic_validation(&record).into_result(&id)?;
        record.validate().into_result(&id)?;
        record.before_save().map_err(|e| Error::OperationFailed {
            operation: step.operation(),
            id: id.clone(),
            message: format!("pre-save hook rejected the record: {e}"),
            source: Some(Box::new(e)),
        })?;

        let point = self.undo_point(provider, &id, tx.is_some()).await?;
        provider
            .save(&record)
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "save", &id, e))?;
        self.cache().set(&record);
        self.record_undo(tx, point, step, provider, original);
        self.publish(&record, change);
        debug!(version = record.version(), ?change, "Record persisted");
        Ok(record)
    }

    async fn stored<R: Record>(
        &self,
        provider: &Arc<dyn StorageProvider<R>>,
        id: &str,
    ) -> Result<bool> {
        provider
            .exists(id)
            .await
            .map_err(|e| Error::provider(R::TYPE_TAG, "exists", id, e))
    }
}

fn missing_id<R: Record>() -> Error {
    Error::MissingId {
        type_tag: R::TYPE_TAG.to_string(),
    }
}
