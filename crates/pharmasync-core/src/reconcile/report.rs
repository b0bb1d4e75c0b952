//! Reconciliation report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happened to a single source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// New outlet/masterdata pair inserted and activated.
    Created,
    /// Pair already existed and was set active again.
    Reactivated,
    /// Key already handled earlier in this snapshot.
    UnchangedActive,
}

/// Counts and keys of one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records in the source snapshot, duplicates included.
    pub total_records: usize,
    pub created: usize,
    pub reactivated: usize,
    pub unchanged_active: usize,
    /// Keys active before the run that are absent from the snapshot.
    pub deactivated: usize,
    /// Outlet rows touched by the mark phase.
    pub marked_inactive: usize,
    /// Records whose address blob could not be parsed.
    pub degraded_addresses: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub created_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub deactivated_keys: Vec<String>,
}

impl ReconcileReport {
    pub(crate) fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            total_records: 0,
            created: 0,
            reactivated: 0,
            unchanged_active: 0,
            deactivated: 0,
            marked_inactive: 0,
            degraded_addresses: 0,
            created_keys: Vec::new(),
            deactivated_keys: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, key: &str, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Created => {
                self.created += 1;
                self.created_keys.push(key.to_string());
            }
            RecordOutcome::Reactivated => self.reactivated += 1,
            RecordOutcome::UnchangedActive => self.unchanged_active += 1,
        }
    }

    /// Distinct keys active once the pass has finished.
    pub fn active_after(&self) -> usize {
        self.created + self.reactivated
    }

    /// Get a human-readable summary message.
    pub fn message(&self) -> String {
        if self.total_records == 0 {
            format!(
                "Empty snapshot: {} managed pharmacies deactivated.",
                self.deactivated
            )
        } else {
            format!(
                "{} records: {} created, {} reactivated, {} duplicate, {} deactivated.",
                self.total_records,
                self.created,
                self.reactivated,
                self.unchanged_active,
                self.deactivated
            )
        }
    }
}
