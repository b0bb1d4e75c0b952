use serde::{Deserialize, Serialize};

use super::address::Address;

/// One pharmacy flagged for inspection, flattened from the CRM payload.
///
/// `natural_key` is the contract id and the join key to the store's
/// masterdata row. Address fields are `None` when the account information
/// blob could not be parsed; the raw text is then kept in
/// `account_information`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub natural_key: String,
    pub inspection_id: Option<String>,
    pub name: Option<String>,

    #[serde(flatten)]
    pub address: Address,
    pub account_information: Option<String>,

    pub contract_status: Option<String>,
    pub shelf_details: Option<String>,
    pub shelf_height: Option<f64>,
    pub shelf_width: Option<f64>,
    pub contact: Option<String>,
    pub contract_active: Option<bool>,
    pub termination_flag: Option<bool>,
    pub termination_reason: Option<String>,
    pub is_deleted: Option<bool>,
}

impl SourceRecord {
    pub fn new(natural_key: impl Into<String>) -> Self {
        Self {
            natural_key: natural_key.into(),
            ..Self::default()
        }
    }

    /// Whether the account information blob was kept raw instead of parsed.
    ///
    /// A blob that parsed into empty segments is not degraded.
    pub fn has_degraded_address(&self) -> bool {
        self.account_information.is_some()
    }
}
