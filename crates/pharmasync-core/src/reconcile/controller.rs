//! Transaction boundary around a reconciliation pass.
//!
//! One pass is one transaction: `Open -> Committed` when the pass succeeds
//! in apply mode, `Open -> RolledBack` on any failure and always in dry-run
//! mode. Rolled-back inserts still consume AUTOINCREMENT ids, so a dry run
//! can leave gaps in the outlet id sequence.

use serde::{Deserialize, Serialize};

use super::engine::Reconciler;
use super::report::ReconcileReport;
use crate::error::StoreError;
use crate::model::SourceRecord;
use crate::store::{StoreTransaction, TransactionalStore};

/// Whether a successful pass is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Apply,
    /// Compute the report, then roll back.
    #[default]
    DryRun,
}

impl RunMode {
    pub fn from_apply_flag(apply: bool) -> Self {
        if apply {
            RunMode::Apply
        } else {
            RunMode::DryRun
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// Result of a completed pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub mode: RunMode,
    pub state: TransactionState,
    pub report: ReconcileReport,
}

impl RunOutcome {
    pub fn is_committed(&self) -> bool {
        self.state == TransactionState::Committed
    }
}

pub struct TransactionController<'p> {
    mode: RunMode,
    reconciler: Reconciler<'p>,
    state: TransactionState,
}

impl TransactionController<'static> {
    pub fn new(mode: RunMode) -> Self {
        Self::with_reconciler(mode, Reconciler::default())
    }
}

impl<'p> TransactionController<'p> {
    pub fn with_reconciler(mode: RunMode, reconciler: Reconciler<'p>) -> Self {
        Self {
            mode,
            reconciler,
            state: TransactionState::Open,
        }
    }

    /// Run one pass of `records` against `store` in a fresh transaction.
    ///
    /// # Errors
    /// Any error means the transaction was rolled back; the store is as it
    /// was before the call.
    pub fn run<S>(mut self, store: &mut S, records: &[SourceRecord]) -> Result<RunOutcome, StoreError>
    where
        S: TransactionalStore,
    {
        let session = store.begin()?;
        tracing::info!(mode = ?self.mode, records = records.len(), "reconciliation started");

        let report = match self.reconciler.reconcile(&session, records) {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(error = %err, "reconciliation failed, rolling back");
                if let Err(rollback_err) = session.rollback() {
                    tracing::error!(error = %rollback_err, "explicit rollback failed");
                }
                self.state = TransactionState::RolledBack;
                return Err(err);
            }
        };

        match self.mode {
            RunMode::Apply => {
                if let Err(err) = session.commit() {
                    self.state = TransactionState::RolledBack;
                    tracing::error!(error = %err, "commit failed");
                    return Err(err);
                }
                self.state = TransactionState::Committed;
                tracing::info!(run_id = %report.run_id, "changes committed");
            }
            RunMode::DryRun => {
                let rolled_back = session.rollback();
                self.state = TransactionState::RolledBack;
                if let Err(err) = rolled_back {
                    tracing::error!(error = %err, "dry run rollback failed");
                    return Err(err);
                }
                tracing::info!(run_id = %report.run_id, "dry run, changes rolled back");
            }
        }

        Ok(RunOutcome {
            mode: self.mode,
            state: self.state,
            report,
        })
    }
}
