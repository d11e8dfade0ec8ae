//! Portfolio domain models.
//!
//! Both broker adapters normalize into these types. Native-currency fields
//! are authoritative; every `converted_*`/`base_*` field is derived during
//! aggregation and `None` when no exchange rate was available.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The two supported data providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Broker {
    Schwab,
    Ibkr,
}

impl Broker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Broker::Schwab => "SCHWAB",
            Broker::Ibkr => "IBKR",
        }
    }

    /// Human-readable name used in account display strings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Broker::Schwab => "Charles Schwab",
            Broker::Ibkr => "Interactive Brokers",
        }
    }
}

impl std::fmt::Display for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Asset classification used for allocation views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetClass {
    Stocks,
    Etfs,
    EquityEtfs,
    MoneyMarketFunds,
    Bonds,
    Cash,
    Other,
}

impl AssetClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetClass::Stocks => "Stocks",
            AssetClass::Etfs => "ETFs",
            AssetClass::EquityEtfs => "Equity ETFs",
            AssetClass::MoneyMarketFunds => "Money Market Funds",
            AssetClass::Bonds => "Bonds",
            AssetClass::Cash => "Cash",
            AssetClass::Other => "Other",
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One holding in one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub broker: Broker,
    pub account_id: String,
    pub symbol: String,
    pub description: String,
    pub quantity: Decimal,
    /// Market value in the position's native currency.
    pub market_value: Decimal,
    /// Cost basis in the position's native currency.
    pub cost_basis: Decimal,
    pub unrealized_pl: Decimal,
    /// Percentage points; 0 when the cost basis is 0.
    pub unrealized_pl_percent: Decimal,
    /// Native currency code, when the provider reports one.
    pub currency: Option<String>,
    pub asset_class: AssetClass,
    /// Opaque provider instrument id used for metadata lookups.
    pub instrument_id: Option<i64>,
    pub exchange: Option<String>,

    // Derived conversion fields, attached during aggregation. Never
    // authoritative; `None` when no rate is available.
    /// Market value in the display currency.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub converted_value: Option<Decimal>,
    /// Quote used for the display conversion: native units per one unit
    /// of the display currency.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fx_rate: Option<Decimal>,
    /// Market value in the reporting currency.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_value: Option<Decimal>,
    /// Unrealized P/L in the reporting currency.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub base_unrealized_pl: Option<Decimal>,
}

impl Position {
    /// Unrealized P/L percentage, defined as 0 when the cost basis is 0.
    pub fn pl_percent(unrealized_pl: Decimal, cost_basis: Decimal) -> Decimal {
        if cost_basis.is_zero() {
            Decimal::ZERO
        } else {
            unrealized_pl / cost_basis * Decimal::ONE_HUNDRED
        }
    }
}

/// One brokerage account.
///
/// `account_id` is unique within a broker but not across brokers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub broker: Broker,
    pub account_id: String,
    pub display_name: String,
    /// Free-text classification from the provider, e.g. "Individual",
    /// "Margin", "Stocks and Shares ISA". Used for view filtering.
    pub account_type: String,
    pub currency: Option<String>,
    /// Total account value in the account's native currency.
    pub value: Decimal,
}

/// Warning-grade conditions recorded during a fetch instead of aborting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum FetchWarning {
    /// A record could not be parsed; defaults were substituted.
    Parse { source: String, detail: String },
    /// A single call failed; its contribution is missing from the fragment.
    Network { source: String, detail: String },
    /// The position pagination loop hit its hard page cap; the fragment
    /// carries partial results.
    PaginationLimitReached {
        account_id: String,
        pages_fetched: usize,
    },
    /// A position references an account id absent from its broker's
    /// account list. Kept, not dropped.
    OrphanedPosition {
        broker: Broker,
        account_id: String,
        symbol: String,
    },
}

/// One provider's normalized portfolio slice, before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioFragment {
    pub broker: Broker,
    pub accounts: Vec<Account>,
    pub positions: Vec<Position>,
    /// Sum of native-currency account values. Not currency-normalized.
    pub total_value: Decimal,
    pub warnings: Vec<FetchWarning>,
}

impl PortfolioFragment {
    pub fn empty(broker: Broker) -> Self {
        PortfolioFragment {
            broker,
            accounts: Vec::new(),
            positions: Vec::new(),
            total_value: Decimal::ZERO,
            warnings: Vec::new(),
        }
    }
}

/// Per-symbol allocation rollup in native currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolAllocation {
    pub total_value: Decimal,
    pub total_quantity: Decimal,
    pub description: String,
}

/// The merged, analytics-ready portfolio state at one point in time.
///
/// Two totals coexist on purpose: `total_value_by_broker` trusts the
/// provider-reported account totals (native currencies, pre-conversion),
/// while `portfolio_value` is re-derived from per-position converted
/// values. They may diverge slightly; both are surfaced. The same split
/// applies to the allocations: per-symbol sums are native, per-asset-class
/// sums are in the reporting currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub accounts: Vec<Account>,
    pub positions: Vec<Position>,
    /// Provider-reported native totals per broker.
    pub total_value_by_broker: HashMap<Broker, Decimal>,
    /// Sum of per-position converted values in the display currency.
    /// Positions without a usable rate are excluded, not zeroed.
    pub portfolio_value: Decimal,
    pub display_currency: String,
    pub reporting_currency: String,
    /// Native-currency value and quantity summed per symbol.
    pub allocation_by_symbol: HashMap<String, SymbolAllocation>,
    /// Reporting-currency value summed per asset class. Positions without
    /// a usable rate are excluded here and from the matching percentage
    /// denominator.
    pub allocation_by_asset_class: HashMap<AssetClass, Decimal>,
    /// Positions that failed conversion; still present in `positions`.
    pub unconverted_positions: usize,
    pub warnings: Vec<FetchWarning>,
    pub timestamp: DateTime<Utc>,
}

impl PortfolioSnapshot {
    /// Age of this snapshot relative to `now`.
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.timestamp
    }

    /// Distinct native currency codes observed across positions.
    pub fn currencies(&self) -> Vec<String> {
        let mut currencies: Vec<String> = self
            .positions
            .iter()
            .filter_map(|p| p.currency.clone())
            .collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }
}
