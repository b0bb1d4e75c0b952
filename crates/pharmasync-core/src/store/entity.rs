use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic location row shared with outlets that are not pharmacies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub id: i64,
    pub name: String,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub region_code: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: Option<String>,
    pub active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// CRM-specific extension row, 1:1 with an [`Outlet`] through `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Masterdata {
    pub id: i64,
    pub natural_key: String,
    pub sap_id: Option<String>,
    pub name: Option<String>,
    pub contract_status: Option<String>,
    pub shelf_details: Option<String>,
    pub contact: Option<String>,
    pub is_deleted: Option<bool>,
    pub contract_active: Option<bool>,
    pub shelf_height: Option<f64>,
    pub shelf_width: Option<f64>,
    pub termination_flag: Option<bool>,
    pub termination_reason: Option<String>,
}

/// A persisted pharmacy: the outlet row joined with its masterdata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntity {
    pub outlet: Outlet,
    pub masterdata: Masterdata,
    /// Company name of the outlet's first assigned city manager.
    pub city_manager: Option<String>,
}

impl StoreEntity {
    pub fn natural_key(&self) -> &str {
        &self.masterdata.natural_key
    }
}
