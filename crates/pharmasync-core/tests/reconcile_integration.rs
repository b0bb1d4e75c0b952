//! End-to-end reconciliation against an in-memory store.
//!
//! Records are built from raw CRM rows so that flattening and address
//! parsing run exactly as in production.

use std::collections::BTreeSet;

use pharmasync_core::model::flatten_record;
use pharmasync_core::reconcile::{RunMode, TransactionController, TransactionState};
use pharmasync_core::store::{OutletStore, SqliteStore, StoreEntity, TransactionalStore};
use pharmasync_core::{SourceRecord, StoreOperation};
use proptest::prelude::*;
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

fn blob(name: &str, city: &str) -> String {
    format!(
        "{name}<br>0001<br>Marktplatz 3<br>80331 {city}<br>BY Bayern<br><br>E-Mail: kontakt@example.org<br>Telefon: 089 1234"
    )
}

fn row(key: &str, account_information: &str) -> Value {
    json!({
        "attributes": { "type": "Shopper_Inspection__c" },
        "Id": format!("a1X{key}"),
        "Name": format!("INS-{key}"),
        "Shopper_Contract__c": key,
        "Shopper_Contract__r": {
            "attributes": { "type": "Shopper_Contract__c" },
            "Account_Information__c": account_information,
            "Status__c": "Signed",
            "Shelf_Details__c": "Gondel",
            "Shelf_Length__c": 120.0,
            "Shelf_Width__c": 40.5,
            "Contact__c": "003XYZ",
            "Active__c": true,
            "Shopper_Termination__c": false,
            "Shopper_Termination_Reason__c": null,
            "IsDeleted": false
        }
    })
}

fn record(key: &str) -> SourceRecord {
    flatten_record(&row(key, &blob(&format!("Apotheke {key}"), "München"))).unwrap()
}

fn apply(store: &mut SqliteStore, records: &[SourceRecord]) -> TransactionState {
    TransactionController::new(RunMode::Apply)
        .run(store, records)
        .unwrap()
        .state
}

fn active(store: &mut SqliteStore) -> Vec<StoreEntity> {
    let session = store.begin().unwrap();
    session.list_active().unwrap()
}

fn active_keys(store: &mut SqliteStore) -> BTreeSet<String> {
    active(store)
        .into_iter()
        .map(|e| e.masterdata.natural_key)
        .collect()
}

fn row_counts(store: &SqliteStore) -> (i64, i64) {
    let conn = store.conn();
    let outlets = conn
        .query_row("SELECT COUNT(*) FROM outlet", [], |r| r.get(0))
        .unwrap();
    let masterdata = conn
        .query_row("SELECT COUNT(*) FROM apo_masterdata", [], |r| r.get(0))
        .unwrap();
    (outlets, masterdata)
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn scenario_a_empty_store_two_records() {
    let mut store = SqliteStore::open_memory().unwrap();
    let outcome = TransactionController::new(RunMode::Apply)
        .run(&mut store, &[record("A"), record("B")])
        .unwrap();

    assert_eq!(outcome.report.created, 2);
    assert_eq!(row_counts(&store), (2, 2));

    let entities = active(&mut store);
    assert_eq!(entities.len(), 2);
    let a = entities.iter().find(|e| e.natural_key() == "A").unwrap();
    assert_eq!(a.outlet.name, "Apotheke A");
    assert_eq!(a.outlet.city.as_deref(), Some("München"));
    assert_eq!(a.outlet.region_code, "BY");
    assert_eq!(a.outlet.category.as_deref(), Some("apotheke"));
    assert_eq!(a.masterdata.contract_status.as_deref(), Some("Signed"));
    assert_eq!(a.masterdata.shelf_height, Some(120.0));
    assert_eq!(a.masterdata.sap_id.as_deref(), Some("0001"));
    assert_eq!(a.outlet.id, a.masterdata.id);
}

#[test]
fn scenario_b_empty_snapshot_deactivates_without_deleting() {
    let mut store = SqliteStore::open_memory().unwrap();
    apply(&mut store, &[record("X")]);

    let outcome = TransactionController::new(RunMode::Apply)
        .run(&mut store, &[])
        .unwrap();

    assert_eq!(outcome.report.deactivated_keys, ["X"]);
    assert!(active_keys(&mut store).is_empty());
    assert_eq!(row_counts(&store), (1, 1));
}

#[test]
fn scenario_c_existing_key_keeps_its_id() {
    let mut store = SqliteStore::open_memory().unwrap();
    apply(&mut store, &[record("X")]);
    let before = active(&mut store)[0].outlet.id;

    let outcome = TransactionController::new(RunMode::Apply)
        .run(&mut store, &[record("X")])
        .unwrap();

    assert_eq!(outcome.report.created, 0);
    assert_eq!(outcome.report.reactivated, 1);
    let after = active(&mut store);
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].outlet.id, before);
    assert_eq!(row_counts(&store), (1, 1));
}

#[test]
fn scenario_d_short_address_blob_rolls_back_whole_run() {
    let mut store = SqliteStore::open_memory().unwrap();
    apply(&mut store, &[record("KEEP")]);

    let degraded = flatten_record(&row("SHORT", "Apotheke<br>1<br>Weg 1<br>12345 Ort")).unwrap();
    assert!(degraded.has_degraded_address());
    assert_eq!(degraded.address.pharmacy, None);
    assert_eq!(degraded.contract_status.as_deref(), Some("Signed"));
    assert_eq!(degraded.shelf_width, Some(40.5));

    let err = TransactionController::new(RunMode::Apply)
        .run(&mut store, &[record("NEW"), degraded])
        .unwrap_err();

    assert_eq!(err.operation, StoreOperation::InsertOutlet);
    assert_eq!(err.natural_key.as_deref(), Some("SHORT"));
    assert!(err.is_constraint_violation());

    assert_eq!(active_keys(&mut store), BTreeSet::from(["KEEP".to_string()]));
    assert_eq!(row_counts(&store), (1, 1));
}

#[test]
fn dry_run_leaves_active_set_unchanged() {
    let mut store = SqliteStore::open_memory().unwrap();
    apply(&mut store, &[record("P"), record("Q"), record("R")]);
    let before = active_keys(&mut store);

    let outcome = TransactionController::new(RunMode::DryRun)
        .run(&mut store, &[record("Q"), record("S")])
        .unwrap();

    assert_eq!(outcome.state, TransactionState::RolledBack);
    assert_eq!(outcome.report.created, 1);
    assert_eq!(outcome.report.deactivated, 2);
    assert_eq!(active_keys(&mut store), before);
    assert_eq!(row_counts(&store), (3, 3));
}

#[test]
fn file_backed_store_persists_between_opens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("swdb.sqlite3");

    {
        let mut store = SqliteStore::open(&path).unwrap();
        apply(&mut store, &[record("A")]);
    }

    let mut reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(active_keys(&mut reopened), BTreeSet::from(["A".to_string()]));
}

// ============================================================================
// Properties
// ============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["K0", "K1", "K2", "K3", "K4", "K5", "K6", "K7"])
        .prop_map(str::to_string)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// After any sequence of runs, the active set equals the last snapshot
    /// and every key is stored exactly once.
    #[test]
    fn active_set_matches_last_snapshot(
        runs in prop::collection::vec(prop::collection::vec(key_strategy(), 0..10), 1..4)
    ) {
        let mut store = SqliteStore::open_memory().unwrap();
        let mut ever_seen = BTreeSet::new();

        for snapshot in &runs {
            let records: Vec<_> = snapshot.iter().map(|k| record(k)).collect();
            prop_assert_eq!(apply(&mut store, &records), TransactionState::Committed);
            ever_seen.extend(snapshot.iter().cloned());

            let expected: BTreeSet<String> = snapshot.iter().cloned().collect();
            prop_assert_eq!(active_keys(&mut store), expected);

            let (outlets, masterdata) = row_counts(&store);
            prop_assert_eq!(outlets as usize, ever_seen.len());
            prop_assert_eq!(masterdata as usize, ever_seen.len());
        }
    }

    /// Report counts add up for any snapshot.
    #[test]
    fn report_counts_are_consistent(
        seed in prop::collection::vec(key_strategy(), 0..6),
        snapshot in prop::collection::vec(key_strategy(), 0..10)
    ) {
        let mut store = SqliteStore::open_memory().unwrap();
        let seed_records: Vec<_> = seed.iter().map(|k| record(k)).collect();
        apply(&mut store, &seed_records);

        let records: Vec<_> = snapshot.iter().map(|k| record(k)).collect();
        let report = TransactionController::new(RunMode::DryRun)
            .run(&mut store, &records)
            .unwrap()
            .report;

        let distinct: BTreeSet<_> = snapshot.iter().collect();
        prop_assert_eq!(report.total_records, snapshot.len());
        prop_assert_eq!(report.created + report.reactivated + report.unchanged_active, snapshot.len());
        prop_assert_eq!(report.active_after(), distinct.len());
    }
}
