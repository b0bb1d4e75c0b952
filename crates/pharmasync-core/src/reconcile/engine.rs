//! Mark-sweep reconciliation of a source snapshot into the outlet store.
//!
//! The pass runs in two phases against one open transaction:
//!
//! 1. **Mark**: every managed outlet is set inactive.
//! 2. **Sweep**: each snapshot record is created if its natural key is
//!    unknown, then set active unconditionally.
//!
//! Rows are never deleted; a pharmacy that drops out of the snapshot simply
//! stays inactive. An empty snapshot is a real result (nothing is flagged)
//! and deactivates everything.

use std::collections::HashSet;

use chrono::Utc;

use super::report::{RecordOutcome, ReconcileReport};
use crate::error::{DatabaseError, StoreError, StoreOperation};
use crate::model::SourceRecord;
use crate::store::OutletStore;

/// Observer for per-record progress (e.g. a progress bar).
pub trait ReconcileProgress {
    fn start(&self, _total: usize) {}
    fn record_done(&self, _record: &SourceRecord, _outcome: RecordOutcome) {}
    fn finish(&self) {}
}

/// Progress observer that ignores every event.
pub struct NoProgress;

impl ReconcileProgress for NoProgress {}

pub struct Reconciler<'p> {
    progress: &'p dyn ReconcileProgress,
}

impl Default for Reconciler<'static> {
    fn default() -> Self {
        Self {
            progress: &NoProgress,
        }
    }
}

impl<'p> Reconciler<'p> {
    pub fn with_progress(progress: &'p dyn ReconcileProgress) -> Self {
        Self { progress }
    }

    /// Bring `store` into agreement with `records`.
    ///
    /// The caller owns the transaction `store` runs in; on error nothing
    /// here is undone locally, the caller must roll back.
    ///
    /// # Errors
    /// Returns the first store failure, tagged with the record's key where
    /// one applies. A key whose `set_active` touches no row is reported as
    /// [`DatabaseError::NoRowsAffected`].
    pub fn reconcile<S>(&self, store: &S, records: &[SourceRecord]) -> Result<ReconcileReport, StoreError>
    where
        S: OutletStore + ?Sized,
    {
        let mut report = ReconcileReport::start();
        report.total_records = records.len();

        let previously_active: Vec<String> = store
            .list_active()?
            .into_iter()
            .map(|e| e.masterdata.natural_key)
            .collect();

        report.marked_inactive = store.deactivate_managed()?;
        tracing::info!(rows = report.marked_inactive, "mark phase complete");

        self.progress.start(records.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());

        for record in records {
            let key = record.natural_key.as_str();
            if record.has_degraded_address() {
                report.degraded_addresses += 1;
            }

            let first_occurrence = seen.insert(key);
            let outcome = if store.exists(key)? {
                if first_occurrence {
                    RecordOutcome::Reactivated
                } else {
                    RecordOutcome::UnchangedActive
                }
            } else {
                let id = store.insert_outlet(record)?;
                store.insert_masterdata(record, id)?;
                RecordOutcome::Created
            };

            if store.set_active(key, true)? == 0 {
                return Err(StoreError::for_key(
                    StoreOperation::SetActive,
                    key,
                    DatabaseError::NoRowsAffected,
                ));
            }

            tracing::debug!(natural_key = key, ?outcome, "record reconciled");
            report.record(key, outcome);
            self.progress.record_done(record, outcome);
        }
        self.progress.finish();

        report.deactivated_keys = previously_active
            .into_iter()
            .filter(|k| !seen.contains(k.as_str()))
            .collect();
        report.deactivated = report.deactivated_keys.len();
        report.finished_at = Utc::now();

        tracing::info!(
            created = report.created,
            reactivated = report.reactivated,
            unchanged = report.unchanged_active,
            deactivated = report.deactivated,
            "sweep phase complete"
        );
        Ok(report)
    }
}
