//! CSV export of the active pharmacies.

use std::io::Write;
use std::path::Path;

use crate::error::{CoreError, StoreError};
use crate::store::{OutletStore, StoreEntity, StoreTransaction, TransactionalStore};

const HEADER: [&str; 14] = [
    "id",
    "natural_key",
    "name",
    "street",
    "postal_code",
    "city",
    "email",
    "phone",
    "category",
    "contract_status",
    "shelf_details",
    "contact",
    "city_manager",
    "created_at",
];

/// Write `entities` as CSV with a header row. Returns the number of data rows.
///
/// # Errors
/// Returns an error if writing to `out` fails.
pub fn write_active_csv<W: Write>(entities: &[StoreEntity], out: W) -> Result<usize, CoreError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(HEADER)?;

    for entity in entities {
        let outlet = &entity.outlet;
        let md = &entity.masterdata;
        let created_at = outlet.created_at.map(|t| t.to_rfc3339()).unwrap_or_default();
        writer.write_record([
            outlet.id.to_string().as_str(),
            md.natural_key.as_str(),
            outlet.name.as_str(),
            opt(&outlet.street),
            opt(&outlet.postal_code),
            opt(&outlet.city),
            opt(&outlet.email),
            opt(&outlet.phone),
            opt(&outlet.category),
            opt(&md.contract_status),
            opt(&md.shelf_details),
            opt(&md.contact),
            opt(&entity.city_manager),
            created_at.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(entities.len())
}

fn opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

/// Read the active pharmacies in a fresh read-only session.
///
/// The session is rolled back; nothing is ever written.
///
/// # Errors
/// Returns the store error of `begin`, `list_active` or `rollback`.
pub fn read_active<S: TransactionalStore>(store: &mut S) -> Result<Vec<StoreEntity>, StoreError> {
    let session = store.begin()?;
    let entities = session.list_active()?;
    session.rollback()?;
    Ok(entities)
}

/// Export the store's active pharmacies to a CSV file at `path`.
///
/// # Errors
/// Returns an error if the store read or the file write fails.
pub fn export_active<S: TransactionalStore>(store: &mut S, path: &Path) -> Result<usize, CoreError> {
    let entities = read_active(store)?;
    let file = std::fs::File::create(path)?;
    let rows = write_active_csv(&entities, file)?;
    tracing::info!(rows, path = %path.display(), "exported active pharmacies");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Address, SourceRecord};
    use crate::reconcile::{RunMode, TransactionController};
    use crate::store::SqliteStore;

    fn record(key: &str, name: &str, city: &str) -> SourceRecord {
        SourceRecord {
            natural_key: key.to_string(),
            address: Address {
                pharmacy: Some(name.into()),
                street: Some("Hauptstr. 1".into()),
                city: Some(city.into()),
                country: Some("Bayern".into()),
                ..Address::default()
            },
            contract_status: Some("Signed".into()),
            ..SourceRecord::default()
        }
    }

    #[test]
    fn csv_has_header_and_rows_in_city_order() {
        let mut store = SqliteStore::open_memory().unwrap();
        TransactionController::new(RunMode::Apply)
            .run(
                &mut store,
                &[
                    record("K2", "Stadt-Apotheke", "Passau"),
                    record("K1", "Löwen-Apotheke", "Augsburg"),
                ],
            )
            .unwrap();

        let entities = read_active(&mut store).unwrap();
        let mut buf = Vec::new();
        assert_eq!(write_active_csv(&entities, &mut buf).unwrap(), 2);

        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,natural_key,name,street"));
        assert!(lines[1].contains("K1,Löwen-Apotheke"));
        assert!(lines[2].contains("K2,Stadt-Apotheke"));
        assert!(lines[1].contains(",apotheke,Signed,"));
    }

    #[test]
    fn city_manager_column_follows_contact() {
        let mut store = SqliteStore::open_memory().unwrap();
        TransactionController::new(RunMode::Apply)
            .run(&mut store, &[record("K1", "Hof-Apotheke", "Bamberg")])
            .unwrap();
        store
            .conn()
            .execute_batch(
                "INSERT INTO stammdaten (id, firma1) VALUES (7, 'Franken GmbH');
                 INSERT INTO outlet_gebietsleiter (outlet, gebietsleiter) VALUES (1, 7);",
            )
            .unwrap();

        let entities = read_active(&mut store).unwrap();
        let mut buf = Vec::new();
        write_active_csv(&entities, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let header: Vec<_> = text.lines().next().unwrap().split(',').collect();
        let row: Vec<_> = text.lines().nth(1).unwrap().split(',').collect();
        let column = header.iter().position(|h| *h == "city_manager").unwrap();
        assert_eq!(header[column - 1], "contact");
        assert_eq!(row[column], "Franken GmbH");
    }

    #[test]
    fn empty_store_exports_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active.csv");
        let mut store = SqliteStore::open_memory().unwrap();

        assert_eq!(export_active(&mut store, &path).unwrap(), 0);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
