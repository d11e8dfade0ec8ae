//! Raw models for the Client Portal gateway payloads.
//!
//! The gateway's schema has drifted across versions; everything here is
//! optional with aliases covering the spellings observed so far. Collections
//! that need per-record tolerance stay as `serde_json::Value` until the
//! adapter parses them one by one.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::raw::RawNumber;

/// `POST /iserver/auth/status` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAuthStatus {
    #[serde(default)]
    pub authenticated: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub competing: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// One account from `/portfolio/accounts` (or `/iserver/accounts`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGatewayAccount {
    #[serde(alias = "accountId")]
    pub id: Option<String>,
    pub account_title: Option<String>,
    pub display_name: Option<String>,
    pub account_alias: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub currency: Option<String>,
}

/// `/portfolio/{id}/summary` response: a map of summary fields whose key
/// spelling and value shape vary by gateway version. Values are parsed
/// per-key through [`RawSummaryValue`].
pub type RawAccountSummary = HashMap<String, serde_json::Value>;

/// One summary field value, `{"amount": ..., "currency": ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSummaryValue {
    #[serde(alias = "value")]
    pub amount: Option<RawNumber>,
    pub currency: Option<String>,
}

/// One record from `/portfolio/{id}/positions/{page}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGatewayPosition {
    pub conid: Option<i64>,
    pub contract_desc: Option<String>,
    /// Signed quantity.
    pub position: Option<RawNumber>,
    pub mkt_value: Option<RawNumber>,
    pub avg_cost: Option<RawNumber>,
    pub unrealized_pnl: Option<RawNumber>,
    pub currency: Option<String>,
    #[serde(alias = "secType")]
    pub asset_class: Option<String>,
    pub ticker: Option<String>,
    pub listing_exchange: Option<String>,
}

/// `/iserver/contract/{conid}/info` response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContractInfo {
    #[serde(alias = "company_name")]
    pub company_name: Option<String>,
    pub symbol: Option<String>,
    #[serde(alias = "instrument_type")]
    pub instrument_type: Option<String>,
    #[serde(alias = "listing_exchange")]
    pub exchange: Option<String>,
}

/// One entry from `/iserver/secdef/info?conid=`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSecurityDefinition {
    pub conid: Option<i64>,
    pub sec_type: Option<String>,
    /// "ETF" marks equity ETFs traded under a common stock type.
    pub stock_type: Option<String>,
    pub trading_class: Option<String>,
}

/// `/iserver/exchangerate?source=&target=` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExchangeRate {
    pub rate: Option<f64>,
}
