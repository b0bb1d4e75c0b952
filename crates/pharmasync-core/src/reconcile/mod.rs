pub mod controller;
pub mod engine;
pub mod report;

pub use controller::{RunMode, RunOutcome, TransactionController, TransactionState};
pub use engine::{NoProgress, ReconcileProgress, Reconciler};
pub use report::{RecordOutcome, ReconcileReport};
