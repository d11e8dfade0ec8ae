//! Raw models for the Schwab accounts payload.
//!
//! Every field is optional: the adapter substitutes documented defaults
//! rather than rejecting a record over a missing key. Accounts and positions
//! stay as `serde_json::Value` at the collection level so one malformed
//! record can be skipped with a warning while the rest of the payload is
//! still used.

use serde::{Deserialize, Serialize};

use crate::raw::RawNumber;

/// Top-level accounts response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSchwabPayload {
    #[serde(default)]
    pub accounts: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchwabAccount {
    pub account_id: Option<String>,
    pub account_name: Option<String>,
    pub account_type: Option<String>,
    pub currency: Option<String>,
    pub balances: Option<RawSchwabBalances>,
    #[serde(default)]
    pub positions: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchwabBalances {
    pub total_account_value: Option<RawNumber>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchwabPosition {
    pub security: Option<RawSchwabSecurity>,
    pub quantity: Option<RawNumber>,
    pub market_value: Option<RawNumber>,
    pub cost_basis: Option<RawNumber>,
    #[serde(rename = "unrealizedPL")]
    pub unrealized_pl: Option<RawNumber>,
    #[serde(rename = "unrealizedPLPercent")]
    pub unrealized_pl_percent: Option<RawNumber>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSchwabSecurity {
    pub symbol: Option<String>,
    pub description: Option<String>,
    /// e.g. "EQUITY", "ETF", "FIXED_INCOME", "CASH_EQUIVALENT".
    pub asset_type: Option<String>,
    pub exchange: Option<String>,
}
