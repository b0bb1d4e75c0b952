//! Schema migrations for the outlet store.
//!
//! Migrations are versioned and applied automatically when the store is
//! opened. The `schema_version` table tracks the current migration version.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Region lookup rows seeded by migration v2 (code, name).
pub const REGIONS: &[(&str, &str)] = &[
    ("BW", "Baden-Württemberg"),
    ("BY", "Bayern"),
    ("BE", "Berlin"),
    ("BB", "Brandenburg"),
    ("HB", "Bremen"),
    ("HH", "Hamburg"),
    ("HE", "Hessen"),
    ("MV", "Mecklenburg-Vorpommern"),
    ("NI", "Niedersachsen"),
    ("NW", "Nordrhein-Westfalen"),
    ("RP", "Rheinland-Pfalz"),
    ("SL", "Saarland"),
    ("SN", "Sachsen"),
    ("ST", "Sachsen-Anhalt"),
    ("SH", "Schleswig-Holstein"),
    ("TH", "Thüringen"),
];

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    match conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    }) {
        Ok(v) => Ok(v),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: outlet, masterdata and region lookup tables.
///
/// `bundesland` is NOT NULL and references the lookup table, so an outlet
/// whose region name has no code is rejected instead of stored without one.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS bundeslaender (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS outlet (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            strasse     TEXT,
            plz         TEXT,
            ort         TEXT,
            bundesland  TEXT NOT NULL REFERENCES bundeslaender(code),
            email       TEXT,
            telefon1    TEXT,
            outletart   TEXT,
            aktiv       INTEGER NOT NULL DEFAULT 1,
            create_time TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS apo_masterdata (
            id                              INTEGER PRIMARY KEY REFERENCES outlet(id),
            byr_sap_id                      TEXT,
            byr_salesforce_id               TEXT NOT NULL UNIQUE,
            byr_name                        TEXT,
            byr_status                      TEXT,
            byr_shelf_details               TEXT,
            byr_contact_c                   TEXT,
            byr_is_deleted                  INTEGER,
            byr_active                      INTEGER,
            fwr_height                      REAL,
            fwr_width                       REAL,
            byr_shopper_termination         INTEGER,
            byr_shopper_termination_reason  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_outlet_outletart ON outlet(outletart);
        CREATE INDEX IF NOT EXISTS idx_outlet_ort_name ON outlet(ort, name);",
    )?;

    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// Migration v2: seed the region lookup table.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt =
            tx.prepare("INSERT OR IGNORE INTO bundeslaender (code, name) VALUES (?1, ?2)")?;
        for (code, name) in REGIONS {
            stmt.execute([code, name])?;
        }
    }
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: city managers and their outlet assignments.
///
/// Both tables are maintained outside reconciliation; the store only reads
/// them for the active-pharmacy listing.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS stammdaten (
            id      INTEGER PRIMARY KEY AUTOINCREMENT,
            firma1  TEXT
        );

        CREATE TABLE IF NOT EXISTS outlet_gebietsleiter (
            outlet          INTEGER NOT NULL REFERENCES outlet(id),
            gebietsleiter   INTEGER NOT NULL REFERENCES stammdaten(id),
            PRIMARY KEY (outlet, gebietsleiter)
        );",
    )?;

    set_schema_version(&tx, 3)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_fresh_database_reaches_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let regions: i64 = conn
            .query_row("SELECT COUNT(*) FROM bundeslaender", [], |r| r.get(0))
            .unwrap();
        assert_eq!(regions, REGIONS.len() as i64);
    }

    #[test]
    fn v2_database_gains_city_manager_tables() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        migrate_v2(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 2);

        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), 3);
        conn.execute("INSERT INTO stammdaten (firma1) VALUES ('Nord GmbH')", [])
            .unwrap();
    }

    #[test]
    fn migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);
    }
}
