//! Persisted outlet store.
//!
//! The reconciler only sees the [`OutletStore`] operations; a
//! [`TransactionalStore`] hands out sessions that implement them inside one
//! transaction and are closed with an explicit [`StoreTransaction`]
//! decision.

pub mod entity;
pub mod schema;
pub mod sqlite;

pub use entity::{Masterdata, Outlet, StoreEntity};
pub use sqlite::{SqliteSession, SqliteStore};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::SourceRecord;

/// Category tag marking outlets owned by reconciliation.
pub const MANAGED_CATEGORY: &str = "apotheke";

/// What the read path does when the database fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadFailurePolicy {
    /// Raise the error like any other store failure.
    #[default]
    Propagate,
    /// Log a warning and report "not found" / no rows.
    Degrade,
}

/// Operations the reconciler performs against the store.
///
/// All calls made through one value share a single transaction.
pub trait OutletStore {
    /// True iff a masterdata row carries `natural_key`.
    fn exists(&self, natural_key: &str) -> Result<bool, StoreError>;

    /// Set every managed outlet inactive. Returns the number of rows touched.
    fn deactivate_managed(&self) -> Result<usize, StoreError>;

    /// Insert the outlet half of a new pair and return its id.
    fn insert_outlet(&self, record: &SourceRecord) -> Result<i64, StoreError>;

    /// Insert the masterdata half for the outlet created by `insert_outlet`.
    fn insert_masterdata(&self, record: &SourceRecord, id: i64) -> Result<i64, StoreError>;

    /// Update the outlet joined to `natural_key`. Returns rows affected;
    /// zero is not an error at this layer.
    fn set_active(&self, natural_key: &str, active: bool) -> Result<usize, StoreError>;

    /// Active pairs ordered by city, then name.
    fn list_active(&self) -> Result<Vec<StoreEntity>, StoreError>;
}

/// Explicit end of a transaction-scoped session.
pub trait StoreTransaction {
    fn commit(self) -> Result<(), StoreError>;
    fn rollback(self) -> Result<(), StoreError>;
}

/// A store that can open transaction-scoped sessions.
///
/// Dropping a session without calling [`StoreTransaction::commit`] must roll
/// it back.
pub trait TransactionalStore {
    type Session<'s>: OutletStore + StoreTransaction
    where
        Self: 's;

    fn begin(&mut self) -> Result<Self::Session<'_>, StoreError>;
}
