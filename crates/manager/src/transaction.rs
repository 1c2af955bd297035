//! Compensating transactions for multi-step operations.
//!
//! A [`TransactionContext`] collects one rollback action per completed step.
//! Rolling back runs them newest first; committing discards them. Contexts
//! are passed explicitly as `Option<&mut TransactionContext>`, so a nested
//! call joins the caller's transaction simply by receiving the same context.

use cfgstore_core::{BatchMode, BatchOperationResult, Error, Operation, Result};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

/// Undo step registered by a completed operation
pub type RollbackAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Kind of step a rollback action undoes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Add,
    Update,
    Delete,
    Clone,
    Import,
    Export,
}

impl OperationType {
    /// Manager operation reported when this step fails
    pub fn operation(self) -> Operation {
        match self {
            OperationType::Create | OperationType::Add => Operation::Create,
            OperationType::Update => Operation::Update,
            OperationType::Delete => Operation::Delete,
            OperationType::Clone => Operation::Clone,
            OperationType::Import => Operation::Import,
            OperationType::Export => Operation::Export,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// One completed step and how to undo it
pub struct TransactionEntry {
    pub operation: OperationType,
    pub label: String,
    /// Record as it was before the step, when there was one
    pub original: Option<serde_json::Value>,
    rollback: RollbackAction,
}

impl std::fmt::Debug for TransactionEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEntry")
            .field("operation", &self.operation)
            .field("label", &self.label)
            .field("has_original", &self.original.is_some())
            .finish()
    }
}

/// Outcome of undoing a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub undone: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct TransactionContext {
    id: u64,
    state: TransactionState,
    entries: Vec<TransactionEntry>,
}

impl TransactionContext {
    fn new(id: u64) -> Self {
        Self {
            id,
            state: TransactionState::Active,
            entries: Vec::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[TransactionEntry] {
        &self.entries
    }

    /// Register the undo action of a step that just completed
    pub fn record(
        &mut self,
        operation: OperationType,
        label: impl Into<String>,
        original: Option<serde_json::Value>,
        rollback: RollbackAction,
    ) {
        let label = label.into();
        debug!(transaction = self.id, ?operation, label = %label, "Transaction step recorded");
        self.entries.push(TransactionEntry {
            operation,
            label,
            original,
            rollback,
        });
    }

    /// Undo every recorded step, newest first.
    ///
    /// A failing undo is logged and the remaining ones still run.
    async fn undo_all(&mut self) -> RollbackReport {
        let mut report = RollbackReport::default();
        while let Some(entry) = self.entries.pop() {
            match (entry.rollback)().await {
                Ok(()) => report.undone += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        transaction = self.id,
                        operation = ?entry.operation,
                        label = %entry.label,
                        error = %e,
                        "Rollback step failed"
                    );
                }
            }
        }
        self.state = TransactionState::RolledBack;
        report
    }
}

/// Transaction counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionStatistics {
    pub begun: u64,
    pub committed: u64,
    pub rolled_back: u64,
}

/// Hands out contexts and runs batches under lenient or strict semantics
#[derive(Debug, Default)]
pub struct TransactionService {
    next_id: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
}

impl TransactionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new transaction
    pub fn begin(&self) -> TransactionContext {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(transaction = id, "Transaction started");
        TransactionContext::new(id)
    }

    /// Discard the undo log of an active transaction
    pub fn commit(&self, context: &mut TransactionContext) -> Result<()> {
        if !context.is_active() {
            return Err(Error::TransactionCommit {
                transaction_id: context.id,
                message: format!("transaction is {:?}", context.state),
            });
        }
        let steps = context.entries.len();
        context.entries.clear();
        context.state = TransactionState::Committed;
        self.committed.fetch_add(1, Ordering::Relaxed);
        debug!(transaction = context.id, steps, "Transaction committed");
        Ok(())
    }

    /// Undo an active transaction
    pub async fn rollback(&self, context: &mut TransactionContext) -> Result<RollbackReport> {
        if !context.is_active() {
            return Err(Error::TransactionRollback {
                transaction_id: context.id,
                message: format!("transaction is {:?}", context.state),
            });
        }
        let report = context.undo_all().await;
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
        if report.failed > 0 {
            warn!(
                transaction = context.id,
                undone = report.undone,
                failed = report.failed,
                "Transaction rolled back with failures"
            );
        } else {
            info!(
                transaction = context.id,
                undone = report.undone,
                "Transaction rolled back"
            );
        }
        Ok(report)
    }

    pub fn statistics(&self) -> TransactionStatistics {
        TransactionStatistics {
            begun: self.next_id.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            rolled_back: self.rolled_back.load(Ordering::Relaxed),
        }
    }

    /// Run `operation` once per item.
    ///
    /// Lenient mode runs every item without a context and reports failures
    /// per label. Strict mode threads one context through all items; the first
    /// failure rolls back the completed ones and surfaces as
    /// [`Error::BatchPartialFailure`].
    pub async fn execute_batch<I, F>(
        &self,
        items: Vec<(String, I)>,
        mode: BatchMode,
        mut operation: F,
    ) -> Result<BatchOperationResult>
    where
        I: Send,
        F: for<'a> FnMut(I, Option<&'a mut TransactionContext>) -> BoxFuture<'a, Result<()>>
            + Send,
    {
        let mut result = BatchOperationResult::new();

        if mode == BatchMode::Lenient {
            for (label, item) in items {
                match operation(item, None).await {
                    Ok(()) => result.record_success(),
                    Err(e) => {
                        warn!(label = %label, error = %e, "Batch item failed");
                        result.record_failure(label, e.to_string());
                    }
                }
            }
            return Ok(result);
        }

        let mut context = self.begin();
        for (label, item) in items {
            if let Err(e) = operation(item, Some(&mut context)).await {
                warn!(
                    transaction = context.id,
                    label = %label,
                    error = %e,
                    "Strict batch item failed, rolling back"
                );
                let report = self.rollback(&mut context).await?;
                if report.failed > 0 {
                    error!(
                        transaction = context.id,
                        failed = report.failed,
                        "Strict batch could not undo every completed item"
                    );
                }
                return Err(Error::BatchPartialFailure {
                    operation: label,
                    completed: result.success_count,
                    source: Box::new(e),
                });
            }
            result.record_success();
        }
        self.commit(&mut context)?;
        Ok(result)
    }
}
