//! Flattening of CRM query results into [`SourceRecord`]s.
//!
//! An inspection row carries its contract as a nested relationship object.
//! Both levels are merged into one flat map (child fields win on a name
//! clash, `attributes` metadata is dropped) before the typed record is read
//! out of it.

use serde_json::{Map, Value};

use super::address::{parse_account_information, AddressParse};
use super::record::SourceRecord;
use crate::error::SourceError;

pub const FIELD_ATTRIBUTES: &str = "attributes";
pub const FIELD_CONTRACT: &str = "Shopper_Contract__c";
pub const FIELD_CONTRACT_REL: &str = "Shopper_Contract__r";
pub const FIELD_ACCOUNT_INFORMATION: &str = "Account_Information__c";

/// Merge an inspection object with its nested contract object.
pub fn flatten_payload(record: &Value) -> Result<Map<String, Value>, SourceError> {
    let obj = record
        .as_object()
        .ok_or_else(|| SourceError::Payload("record is not a JSON object".into()))?;

    let mut flat = Map::new();
    for (key, value) in obj {
        if key == FIELD_ATTRIBUTES || key == FIELD_CONTRACT_REL {
            continue;
        }
        flat.insert(key.clone(), value.clone());
    }

    match obj.get(FIELD_CONTRACT_REL) {
        Some(Value::Object(child)) => {
            for (key, value) in child {
                if key != FIELD_ATTRIBUTES {
                    flat.insert(key.clone(), value.clone());
                }
            }
        }
        Some(Value::Null) | None => {}
        Some(other) => {
            return Err(SourceError::Payload(format!(
                "{FIELD_CONTRACT_REL} is not an object: {other}"
            )))
        }
    }

    Ok(flat)
}

/// Build a typed record from one raw inspection row.
pub fn flatten_record(record: &Value) -> Result<SourceRecord, SourceError> {
    let flat = flatten_payload(record)?;

    let natural_key = string_field(&flat, FIELD_CONTRACT).ok_or_else(|| {
        SourceError::Payload(format!(
            "record {} has no {FIELD_CONTRACT}",
            string_field(&flat, "Id").unwrap_or_else(|| "<unknown>".into())
        ))
    })?;

    let mut out = SourceRecord::new(natural_key);
    out.inspection_id = string_field(&flat, "Id");
    out.name = string_field(&flat, "Name");
    out.contract_status = string_field(&flat, "Status__c");
    out.shelf_details = string_field(&flat, "Shelf_Details__c");
    out.shelf_height = number_field(&flat, "Shelf_Length__c");
    out.shelf_width = number_field(&flat, "Shelf_Width__c");
    out.contact = string_field(&flat, "Contact__c");
    out.contract_active = bool_field(&flat, "Active__c");
    out.termination_flag = bool_field(&flat, "Shopper_Termination__c");
    out.termination_reason = string_field(&flat, "Shopper_Termination_Reason__c");
    out.is_deleted = bool_field(&flat, "IsDeleted");

    match flat.get(FIELD_ACCOUNT_INFORMATION) {
        Some(Value::String(blob)) => match parse_account_information(blob) {
            AddressParse::Parsed(address) => out.address = address,
            AddressParse::Unparsed(raw) => {
                tracing::warn!(
                    natural_key = %out.natural_key,
                    "account information has too few segments, address left empty"
                );
                out.account_information = Some(raw);
            }
        },
        Some(Value::Null) | None => {
            tracing::warn!(natural_key = %out.natural_key, "record has no account information");
        }
        Some(other) => {
            tracing::warn!(natural_key = %out.natural_key, "account information is not text");
            out.account_information = Some(other.to_string());
        }
    }

    Ok(out)
}

/// Extract all records from a query response body (`{"records": [...]}`).
pub fn records_from_response(body: &Value) -> Result<Vec<SourceRecord>, SourceError> {
    let records = body
        .get("records")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Payload("missing records in response".into()))?;
    records.iter().map(flatten_record).collect()
}

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn number_field(map: &Map<String, Value>, key: &str) -> Option<f64> {
    match map.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_field(map: &Map<String, Value>, key: &str) -> Option<bool> {
    match map.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
