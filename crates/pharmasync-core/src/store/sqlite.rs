//! SQLite-backed outlet store.
//!
//! Sessions run inside an `IMMEDIATE` transaction: the write lock is taken
//! at `begin` and held until commit or rollback, so a second reconciliation
//! against the same file waits (up to the busy timeout) instead of
//! interleaving its mark phase with ours.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use super::entity::{Masterdata, Outlet, StoreEntity};
use super::schema;
use super::{OutletStore, ReadFailurePolicy, StoreTransaction, TransactionalStore, MANAGED_CATEGORY};
use crate::error::{DatabaseError, StoreError, StoreOperation};
use crate::model::SourceRecord;

const LIST_ACTIVE_SQL: &str = "SELECT o.id, o.name, o.strasse, o.plz, o.ort, o.bundesland,
        o.email, o.telefon1, o.outletart, o.aktiv, o.create_time,
        am.byr_salesforce_id, am.byr_sap_id, am.byr_name, am.byr_status,
        am.byr_shelf_details, am.byr_contact_c, am.byr_is_deleted, am.byr_active,
        am.fwr_height, am.fwr_width, am.byr_shopper_termination,
        am.byr_shopper_termination_reason,
        (SELECT cm.firma1
            FROM outlet_gebietsleiter og
                JOIN stammdaten cm ON cm.id = og.gebietsleiter
            WHERE og.outlet = o.id
            ORDER BY og.gebietsleiter
            LIMIT 1) AS citymanager
    FROM apo_masterdata am
        JOIN outlet o ON o.id = am.id
    WHERE o.aktiv
    ORDER BY o.ort, o.name, o.id";

/// SQLite database holding outlets and their masterdata.
pub struct SqliteStore {
    conn: Connection,
    read_failure: ReadFailurePolicy,
}

impl SqliteStore {
    /// Get a reference to the underlying SQLite connection.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Open (or create) the store at `path` and bring the schema up to date.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|source| {
            StoreError::new(
                StoreOperation::Open,
                DatabaseError::OpenFailed {
                    path: path.to_path_buf(),
                    source,
                },
            )
        })?;
        tracing::debug!(path = %path.display(), "opened outlet store");
        Self::init(conn)
    }

    /// Open an in-memory store.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::new(StoreOperation::Open, e))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| StoreError::new(StoreOperation::Open, e))?;
        schema::migrate(&conn).map_err(|e| {
            StoreError::new(
                StoreOperation::Open,
                DatabaseError::MigrationFailed(e.to_string()),
            )
        })?;
        Ok(Self {
            conn,
            read_failure: ReadFailurePolicy::default(),
        })
    }

    /// How long `begin` waits for another writer before failing.
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self, StoreError> {
        self.conn
            .busy_timeout(timeout)
            .map_err(|e| StoreError::new(StoreOperation::Open, e))?;
        Ok(self)
    }

    pub fn with_read_failure(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure = policy;
        self
    }
}

impl TransactionalStore for SqliteStore {
    type Session<'s> = SqliteSession<'s>;

    fn begin(&mut self) -> Result<SqliteSession<'_>, StoreError> {
        let read_failure = self.read_failure;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::new(StoreOperation::Begin, e))?;
        tracing::debug!("transaction opened");
        Ok(SqliteSession { tx, read_failure })
    }
}

/// One transaction on a [`SqliteStore`].
///
/// Dropping the session rolls the transaction back.
pub struct SqliteSession<'conn> {
    tx: Transaction<'conn>,
    read_failure: ReadFailurePolicy,
}

impl SqliteSession<'_> {
    fn degrade<T: Default>(&self, result: Result<T, StoreError>) -> Result<T, StoreError> {
        match result {
            Err(err) if self.read_failure == ReadFailurePolicy::Degrade => {
                tracing::warn!(error = %err, "store read failed, treating as empty");
                Ok(T::default())
            }
            other => other,
        }
    }

    fn query_exists(&self, natural_key: &str) -> Result<bool, StoreError> {
        self.tx
            .query_row(
                "SELECT 1 FROM apo_masterdata WHERE byr_salesforce_id = ?1",
                params![natural_key],
                |_| Ok(()),
            )
            .optional()
            .map(|row| row.is_some())
            .map_err(|e| StoreError::for_key(StoreOperation::Exists, natural_key, e))
    }

    fn query_active(&self) -> Result<Vec<StoreEntity>, StoreError> {
        let wrap = |e: rusqlite::Error| StoreError::new(StoreOperation::ListActive, e);
        let mut stmt = self.tx.prepare(LIST_ACTIVE_SQL).map_err(wrap)?;
        let rows = stmt.query_map([], entity_from_row).map_err(wrap)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(wrap)
    }
}

impl OutletStore for SqliteSession<'_> {
    fn exists(&self, natural_key: &str) -> Result<bool, StoreError> {
        let found = self.degrade(self.query_exists(natural_key))?;
        tracing::debug!(natural_key, found, "exists");
        Ok(found)
    }

    fn deactivate_managed(&self) -> Result<usize, StoreError> {
        let rows = self
            .tx
            .execute(
                "UPDATE outlet SET aktiv = 0
                 WHERE id IN (SELECT id FROM apo_masterdata) OR outletart = ?1",
                params![MANAGED_CATEGORY],
            )
            .map_err(|e| StoreError::new(StoreOperation::DeactivateManaged, e))?;
        tracing::debug!(rows, "deactivated managed outlets");
        Ok(rows)
    }

    fn insert_outlet(&self, record: &SourceRecord) -> Result<i64, StoreError> {
        let addr = &record.address;
        self.tx
            .execute(
                "INSERT INTO outlet (name, strasse, plz, ort, bundesland, email, telefon1,
                                     outletart, aktiv, create_time)
                 VALUES (?1, ?2, ?3, ?4,
                         (SELECT code FROM bundeslaender WHERE name = ?5),
                         ?6, ?7, ?8, 1, ?9)",
                params![
                    addr.pharmacy,
                    addr.street,
                    addr.postal_code,
                    addr.city,
                    addr.country,
                    addr.email,
                    addr.phone,
                    MANAGED_CATEGORY,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| {
                StoreError::for_key(StoreOperation::InsertOutlet, &record.natural_key, e)
            })?;
        let id = self.tx.last_insert_rowid();
        tracing::debug!(natural_key = %record.natural_key, id, "inserted outlet");
        Ok(id)
    }

    fn insert_masterdata(&self, record: &SourceRecord, id: i64) -> Result<i64, StoreError> {
        self.tx
            .execute(
                "INSERT INTO apo_masterdata (id, byr_sap_id, byr_salesforce_id, byr_name,
                        byr_status, byr_shelf_details, byr_contact_c, byr_is_deleted,
                        byr_active, fwr_height, fwr_width, byr_shopper_termination,
                        byr_shopper_termination_reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    id,
                    record.address.sap_id,
                    record.natural_key,
                    record.name,
                    record.contract_status,
                    record.shelf_details,
                    record.contact,
                    record.is_deleted,
                    record.contract_active,
                    record.shelf_height,
                    record.shelf_width,
                    record.termination_flag,
                    record.termination_reason,
                ],
            )
            .map_err(|e| {
                StoreError::for_key(StoreOperation::InsertMasterdata, &record.natural_key, e)
            })?;
        tracing::debug!(natural_key = %record.natural_key, id, "inserted masterdata");
        Ok(id)
    }

    fn set_active(&self, natural_key: &str, active: bool) -> Result<usize, StoreError> {
        let rows = self
            .tx
            .execute(
                "UPDATE outlet SET aktiv = ?1
                 WHERE id = (SELECT id FROM apo_masterdata WHERE byr_salesforce_id = ?2)",
                params![active, natural_key],
            )
            .map_err(|e| StoreError::for_key(StoreOperation::SetActive, natural_key, e))?;
        tracing::debug!(natural_key, active, rows, "set active");
        Ok(rows)
    }

    fn list_active(&self) -> Result<Vec<StoreEntity>, StoreError> {
        self.degrade(self.query_active())
    }
}

impl StoreTransaction for SqliteSession<'_> {
    fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .map_err(|e| StoreError::new(StoreOperation::Commit, e))
    }

    fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .map_err(|e| StoreError::new(StoreOperation::Rollback, e))
    }
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<StoreEntity> {
    let id: i64 = row.get(0)?;
    let created_at = row
        .get::<_, Option<String>>(10)?
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(StoreEntity {
        outlet: Outlet {
            id,
            name: row.get(1)?,
            street: row.get(2)?,
            postal_code: row.get(3)?,
            city: row.get(4)?,
            region_code: row.get(5)?,
            email: row.get(6)?,
            phone: row.get(7)?,
            category: row.get(8)?,
            active: row.get(9)?,
            created_at,
        },
        masterdata: Masterdata {
            id,
            natural_key: row.get(11)?,
            sap_id: row.get(12)?,
            name: row.get(13)?,
            contract_status: row.get(14)?,
            shelf_details: row.get(15)?,
            contact: row.get(16)?,
            is_deleted: row.get(17)?,
            contract_active: row.get(18)?,
            shelf_height: row.get(19)?,
            shelf_width: row.get(20)?,
            termination_flag: row.get(21)?,
            termination_reason: row.get(22)?,
        },
        city_manager: row.get(23)?,
    })
}
