//! # Pharmasync Core Library
//!
//! Keeps the pharmacy outlets of a field-service store in line with the
//! set of pharmacies the CRM currently flags for a shopper tour. All logic
//! lives here; the `pharmasync` binary is a thin layer over it.
//!
//! ## Architecture
//!
//! - **Record Model**: CRM payload flattening and the `<br>`-delimited
//!   address parser
//! - **Sources**: the Salesforce REST client and a file replay source,
//!   both producing a fully materialized snapshot for a [`QueryWindow`]
//! - **Store**: SQLite outlet/masterdata tables behind the
//!   [`OutletStore`] trait
//! - **Reconciler**: the mark-sweep pass over one snapshot
//! - **Transaction Controller**: commit on success in apply mode, roll back
//!   otherwise
//!
//! ## Key Components
//!
//! - [`Reconciler`]: mark-sweep engine
//! - [`TransactionController`]: the single commit/rollback decision point
//! - [`SqliteStore`]: shipped store implementation
//! - [`Config`]: TOML configuration
//! - [`ExecutionContext`]: one run, built once by the CLI

pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod model;
pub mod reconcile;
pub mod source;
pub mod store;

pub use config::Config;
pub use context::{open_store, ExecutionContext};
pub use error::{ConfigError, CoreError, DatabaseError, SourceError, StoreError, StoreOperation};
pub use model::{Address, AddressParse, SourceRecord};
pub use reconcile::{
    NoProgress, ReconcileProgress, ReconcileReport, Reconciler, RecordOutcome, RunMode,
    RunOutcome, TransactionController, TransactionState,
};
pub use source::{parse_tour_date, JsonFileSource, QueryWindow, SalesforceSource, Source};
pub use store::{OutletStore, SqliteStore, StoreEntity, StoreTransaction, TransactionalStore};
