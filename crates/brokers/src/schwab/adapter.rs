//! Normalizes raw Schwab payloads into portfolio fragments.

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use foliolens_core::metadata::{DataCategory, MetadataCache};
use foliolens_core::{Account, AssetClass, Broker, FetchWarning, PortfolioFragment, Position};

use super::client::SchwabApi;
use super::models::{RawSchwabAccount, RawSchwabPayload, RawSchwabPosition};
use crate::raw::{coerce_amount, coerce_optional};
use crate::refresh::FragmentProvider;

/// Default for missing identifiers and descriptions.
const UNKNOWN: &str = "Unknown";

/// Normalizes one raw Schwab accounts payload.
///
/// Tolerates missing keys at every nesting level. A record that fails to
/// parse is skipped with a warning; everything parsed before and after it
/// survives in the fragment.
pub fn normalize(raw: serde_json::Value) -> PortfolioFragment {
    let mut fragment = PortfolioFragment::empty(Broker::Schwab);

    let payload: RawSchwabPayload = match serde_json::from_value(raw) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Schwab payload has an unexpected shape: {}", e);
            fragment.warnings.push(FetchWarning::Parse {
                source: "schwab.accounts".to_string(),
                detail: e.to_string(),
            });
            return fragment;
        }
    };

    for account_value in payload.accounts {
        let raw_account: RawSchwabAccount = match serde_json::from_value(account_value) {
            Ok(account) => account,
            Err(e) => {
                warn!("Skipping malformed Schwab account record: {}", e);
                fragment.warnings.push(FetchWarning::Parse {
                    source: "schwab.accounts".to_string(),
                    detail: e.to_string(),
                });
                continue;
            }
        };
        fold_account(raw_account, &mut fragment);
    }

    fragment
}

fn fold_account(raw: RawSchwabAccount, fragment: &mut PortfolioFragment) {
    let account_id = raw.account_id.unwrap_or_else(|| UNKNOWN.to_string());
    let balances = raw.balances.unwrap_or_default();
    let value = coerce_amount(
        balances.total_account_value.as_ref(),
        "schwab.balances.totalAccountValue",
        &mut fragment.warnings,
    );
    let currency = raw.currency.or(balances.currency);

    fragment.total_value += value;
    fragment.accounts.push(Account {
        broker: Broker::Schwab,
        account_id: account_id.clone(),
        display_name: raw.account_name.unwrap_or_else(|| UNKNOWN.to_string()),
        account_type: raw.account_type.unwrap_or_else(|| UNKNOWN.to_string()),
        currency: currency.clone(),
        value,
    });

    for position_value in raw.positions {
        let raw_position: RawSchwabPosition = match serde_json::from_value(position_value) {
            Ok(position) => position,
            Err(e) => {
                warn!("Skipping malformed Schwab position record: {}", e);
                fragment.warnings.push(FetchWarning::Parse {
                    source: "schwab.positions".to_string(),
                    detail: e.to_string(),
                });
                continue;
            }
        };
        let position = fold_position(raw_position, &account_id, currency.as_deref(), fragment);
        fragment.positions.push(position);
    }
}

fn fold_position(
    raw: RawSchwabPosition,
    account_id: &str,
    account_currency: Option<&str>,
    fragment: &mut PortfolioFragment,
) -> Position {
    let security = raw.security.unwrap_or_default();
    let warnings = &mut fragment.warnings;

    let quantity = coerce_amount(raw.quantity.as_ref(), "schwab.positions.quantity", warnings);
    let market_value = coerce_amount(
        raw.market_value.as_ref(),
        "schwab.positions.marketValue",
        warnings,
    );
    let cost_basis = coerce_amount(
        raw.cost_basis.as_ref(),
        "schwab.positions.costBasis",
        warnings,
    );

    // Provider-reported P/L wins; compute locally only when it is absent.
    let unrealized_pl = coerce_optional(
        raw.unrealized_pl.as_ref(),
        "schwab.positions.unrealizedPL",
        warnings,
    )
    .unwrap_or(market_value - cost_basis);
    let unrealized_pl_percent = coerce_optional(
        raw.unrealized_pl_percent.as_ref(),
        "schwab.positions.unrealizedPLPercent",
        warnings,
    )
    .unwrap_or_else(|| Position::pl_percent(unrealized_pl, cost_basis));

    let currency = raw
        .currency
        .or_else(|| account_currency.map(|c| c.to_string()));

    Position {
        broker: Broker::Schwab,
        account_id: account_id.to_string(),
        symbol: security.symbol.unwrap_or_else(|| UNKNOWN.to_string()),
        description: security.description.unwrap_or_else(|| UNKNOWN.to_string()),
        quantity,
        market_value,
        cost_basis,
        unrealized_pl,
        unrealized_pl_percent,
        currency,
        asset_class: asset_class_from(security.asset_type.as_deref()),
        instrument_id: None,
        exchange: security.exchange,
        converted_value: None,
        fx_rate: None,
        base_value: None,
        base_unrealized_pl: None,
    }
}

/// Maps Schwab's security `assetType` onto the allocation classes.
fn asset_class_from(asset_type: Option<&str>) -> AssetClass {
    match asset_type.map(|t| t.trim().to_uppercase()).as_deref() {
        Some("EQUITY") | Some("STOCK") => AssetClass::Stocks,
        Some("ETF") => AssetClass::Etfs,
        Some("FIXED_INCOME") | Some("BOND") => AssetClass::Bonds,
        Some("CASH_EQUIVALENT") | Some("CASH") => AssetClass::Cash,
        Some("MONEY_MARKET") | Some("MONEY_MARKET_FUND") => AssetClass::MoneyMarketFunds,
        _ => AssetClass::Other,
    }
}

/// Fetches and normalizes the Schwab side of a refresh.
pub struct SchwabConnector {
    api: Arc<dyn SchwabApi>,
    cache: Arc<MetadataCache>,
}

impl SchwabConnector {
    pub fn new(api: Arc<dyn SchwabApi>, cache: Arc<MetadataCache>) -> Self {
        Self { api, cache }
    }
}

#[async_trait]
impl FragmentProvider for SchwabConnector {
    fn broker(&self) -> Broker {
        Broker::Schwab
    }

    async fn fetch_fragment(&self) -> foliolens_core::Result<PortfolioFragment> {
        let raw = match self.api.fetch_accounts().await {
            Ok(raw) => raw,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                // One failed call degrades to an empty contribution.
                warn!("Schwab accounts fetch failed: {}", e);
                let mut fragment = PortfolioFragment::empty(Broker::Schwab);
                fragment.warnings.push(FetchWarning::Network {
                    source: "schwab.accounts".to_string(),
                    detail: e.to_string(),
                });
                return Ok(fragment);
            }
        };

        let fragment = normalize(raw);
        self.cache.mark_updated(DataCategory::SchwabAccounts);
        info!(
            "Schwab fragment: {} accounts, {} positions",
            fragment.accounts.len(),
            fragment.positions.len()
        );
        Ok(fragment)
    }
}
