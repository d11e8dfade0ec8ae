//! Models for cached per-instrument metadata.

use serde::{Deserialize, Serialize};

/// Contract-level metadata for one instrument, keyed by its opaque
/// instrument id. A `None` field means the provider did not report it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSnapshot {
    /// Company or fund name, when the provider reports one.
    pub company_name: Option<String>,
    /// Primary listing exchange.
    pub exchange: Option<String>,
}

/// Data-source categories tracked for "last updated" display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataCategory {
    SchwabAccounts,
    GatewayAccounts,
    ContractMetadata,
    ExchangeRates,
}

impl DataCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataCategory::SchwabAccounts => "SCHWAB_ACCOUNTS",
            DataCategory::GatewayAccounts => "GATEWAY_ACCOUNTS",
            DataCategory::ContractMetadata => "CONTRACT_METADATA",
            DataCategory::ExchangeRates => "EXCHANGE_RATES",
        }
    }
}

impl std::fmt::Display for DataCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
