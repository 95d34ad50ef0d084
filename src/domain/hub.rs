use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `state` value the hub uses for success.
pub const HUB_STATE_SUCCESS: i32 = 0;

/// One entry of a GETTRANS listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubTransactionEntry {
    pub transaction_id: String,
    pub time: Option<String>,
}

/// Normalized hub response.
///
/// `state` is authoritative: every success/failure decision downstream keys
/// off it and nothing else.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HubResult {
    /// Name of the element the result was read from.
    pub root: String,
    pub state: i32,
    pub error_code: Option<String>,
    pub raw_token: Option<String>,
    pub invoice_number: Option<String>,
    pub vended_amount: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub balance: Option<Decimal>,
    pub username: Option<String>,
    pub transaction_id: Option<String>,
    pub count: Option<u32>,
    pub transactions: Vec<HubTransactionEntry>,
    /// Every attribute or property not mapped above.
    pub extra_fields: BTreeMap<String, String>,
}

impl HubResult {
    pub fn is_success(&self) -> bool {
        self.state == HUB_STATE_SUCCESS
    }

    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extra_fields.get(name).map(String::as_str)
    }
}
