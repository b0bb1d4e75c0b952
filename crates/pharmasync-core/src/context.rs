//! One reconciliation run, start to finish.
//!
//! The CLI builds an [`ExecutionContext`] once and hands it the source and
//! store it selected. Ordering: fetch the whole snapshot, run the
//! transaction, then export from a fresh read.

use std::path::PathBuf;

use crate::config::{Config, DatabaseConfig};
use crate::error::CoreError;
use crate::export;
use crate::reconcile::{ReconcileProgress, Reconciler, RunMode, RunOutcome, TransactionController};
use crate::source::{QueryWindow, Source};
use crate::store::{SqliteStore, TransactionalStore};

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub config: Config,
    pub window: QueryWindow,
    pub mode: RunMode,
    /// Write the active pharmacies here after the transaction decision.
    pub export_path: Option<PathBuf>,
}

impl ExecutionContext {
    pub fn new(config: Config, window: QueryWindow, mode: RunMode) -> Self {
        Self {
            config,
            window,
            mode,
            export_path: None,
        }
    }

    pub fn with_export(mut self, path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(path.into());
        self
    }

    /// Fetch, reconcile, decide, export.
    ///
    /// # Errors
    /// A source error is returned before the store is touched. A store
    /// error means the run was rolled back. An export error is returned
    /// after the transaction decision has already been made.
    pub fn execute<S>(
        &self,
        source: &dyn Source,
        store: &mut S,
        progress: &dyn ReconcileProgress,
    ) -> Result<RunOutcome, CoreError>
    where
        S: TransactionalStore,
    {
        tracing::info!(
            source = source.name(),
            tour_date = %self.window.tour_date,
            "fetching flagged pharmacies"
        );
        let records = source.fetch(&self.window)?;

        let controller =
            TransactionController::with_reconciler(self.mode, Reconciler::with_progress(progress));
        let outcome = controller.run(store, &records)?;

        if let Some(path) = &self.export_path {
            export::export_active(store, path)?;
        }
        Ok(outcome)
    }
}

/// Open the SQLite store described by `config`.
///
/// # Errors
/// Returns an error if the path cannot be resolved or the database cannot
/// be opened and migrated.
pub fn open_store(config: &DatabaseConfig) -> Result<SqliteStore, CoreError> {
    let path = config.resolved_path()?;
    let store = SqliteStore::open(&path)?
        .with_busy_timeout(config.busy_timeout())?
        .with_read_failure(config.read_failure);
    Ok(store)
}
