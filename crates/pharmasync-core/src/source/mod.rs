//! Record sources.
//!
//! A source yields the complete snapshot of flagged pharmacies for one
//! [`QueryWindow`]. The snapshot is materialized before the store
//! transaction opens, so a source failure never leaves anything to roll
//! back.

pub mod salesforce;
pub mod window;

pub use salesforce::SalesforceSource;
pub use window::{parse_tour_date, Bound, QueryWindow};

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::SourceError;
use crate::model::{flatten_record, SourceRecord};

/// Every external record provider implements this trait.
pub trait Source {
    /// Short identifier used in logs (e.g. "salesforce").
    fn name(&self) -> &str;

    /// Fetch all records of the window, in the provider's order.
    fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceRecord>, SourceError>;
}

/// Replays a saved query response from disk.
///
/// The file holds the same `{"records": [...]}` body the CRM returns.
/// Rows carrying a `CreatedDate` outside the window are skipped; rows
/// without one are always included.
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Source for JsonFileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch(&self, window: &QueryWindow) -> Result<Vec<SourceRecord>, SourceError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| SourceError::Read {
            path: self.path.clone(),
            source,
        })?;
        let body: Value = serde_json::from_str(&content)
            .map_err(|e| SourceError::Payload(format!("{}: {e}", self.path.display())))?;

        let rows = body
            .get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Payload("missing records in response".into()))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(created) = created_date(row) {
                if !window.contains(created) {
                    tracing::debug!(%created, "skipping row outside window");
                    continue;
                }
            }
            records.push(flatten_record(row)?);
        }
        tracing::info!(count = records.len(), path = %self.path.display(), "loaded records from file");
        Ok(records)
    }
}

/// CRM timestamps look like `2018-04-04T09:15:00.000+0000`.
fn created_date(row: &Value) -> Option<DateTime<Utc>> {
    let raw = row.get("CreatedDate")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(key: &str, created: Option<&str>) -> Value {
        let mut v = json!({
            "Id": format!("I-{key}"),
            "Name": "INS",
            "Shopper_Contract__c": key,
            "Shopper_Contract__r": { "Account_Information__c": "short" }
        });
        if let Some(c) = created {
            v["CreatedDate"] = json!(c);
        }
        v
    }

    #[test]
    fn file_source_filters_by_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let body = json!({
            "totalSize": 3,
            "done": true,
            "records": [
                row("A", Some("2018-04-04T09:15:00.000+0000")),
                row("B", Some("2018-04-05T00:00:00.000+0000")),
                row("C", None)
            ]
        });
        std::fs::write(&path, body.to_string()).unwrap();

        let window = QueryWindow::around(parse_tour_date("04.04.2018").unwrap());
        let records = JsonFileSource::new(&path).fetch(&window).unwrap();
        let keys: Vec<_> = records.iter().map(|r| r.natural_key.as_str()).collect();
        assert_eq!(keys, ["A", "C"]);
    }

    #[test]
    fn missing_file_is_read_error() {
        let window = QueryWindow::around(parse_tour_date("04.04.2018").unwrap());
        let err = JsonFileSource::new("/nonexistent/snapshot.json")
            .fetch(&window)
            .unwrap_err();
        assert!(matches!(err, SourceError::Read { .. }));
    }

    #[test]
    fn parses_crm_timestamp_format() {
        let v = json!({ "CreatedDate": "2018-04-04T09:15:00.000+0000" });
        assert!(created_date(&v).is_some());
    }
}
