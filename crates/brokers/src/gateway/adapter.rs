//! Normalizes Client Portal gateway payloads into portfolio fragments.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use foliolens_core::errors::{Error, Result};
use foliolens_core::fx::RateSource;
use foliolens_core::metadata::{ContractSnapshot, DataCategory, MetadataCache};
use foliolens_core::{Account, AssetClass, Broker, FetchWarning, PortfolioFragment, Position};

use super::client::GatewayApi;
use super::models::{RawAccountSummary, RawGatewayAccount, RawGatewayPosition, RawSummaryValue};
use crate::config::GatewayConfig;
use crate::raw::{coerce_amount, coerce_optional, RawNumber};
use crate::refresh::FragmentProvider;

/// The positions endpoint serves at most this many records per page; a
/// shorter page means the listing is exhausted.
const PAGE_SIZE: usize = 100;

const UNKNOWN: &str = "Unknown";

/// Candidate summary keys for the account's total value, one spelling per
/// observed gateway schema revision (older builds report PascalCase tags,
/// newer ones lowercase). First key yielding a numeric amount wins.
const NET_LIQUIDATION_KEYS: [&str; 5] = [
    "NetLiquidation",
    "netliquidation",
    "netLiquidation",
    "equitywithloanvalue",
    "equityWithLoanValue",
];

/// Candidate summary keys for the account's cash balance.
const AVAILABLE_FUNDS_KEYS: [&str; 6] = [
    "AvailableFunds",
    "availablefunds",
    "availableFunds",
    "TotalCashValue",
    "totalcashvalue",
    "totalCashValue",
];

/// Walks a candidate-key chain over the summary map, returning the first
/// key that yields a numeric amount, with its currency.
fn summary_amount(
    summary: &RawAccountSummary,
    keys: &[&str],
) -> Option<(Decimal, Option<String>)> {
    for key in keys {
        if let Some(value) = summary.get(*key) {
            if let Ok(field) = serde_json::from_value::<RawSummaryValue>(value.clone()) {
                if let Some(amount) = field.amount.as_ref().and_then(RawNumber::as_decimal) {
                    return Some((amount, field.currency));
                }
            }
        }
    }
    None
}

/// Base classification from the position record's asset-class code.
fn asset_class_from(kind: Option<&str>) -> AssetClass {
    match kind.map(|k| k.trim().to_uppercase()).as_deref() {
        Some("STK") => AssetClass::Stocks,
        Some("ETF") => AssetClass::Etfs,
        Some("FUND") => AssetClass::MoneyMarketFunds,
        Some("BOND") => AssetClass::Bonds,
        Some("CASH") => AssetClass::Cash,
        _ => AssetClass::Other,
    }
}

/// Reclassification from the instrument's security definition: ETFs traded
/// under a common stock type become Equity ETFs, fund-type instruments
/// become Money Market Funds. Anything else keeps its base class.
fn classification_from(definition: &super::models::RawSecurityDefinition) -> Option<AssetClass> {
    let marks_etf = |field: &Option<String>| {
        field
            .as_deref()
            .map(|v| v.trim().eq_ignore_ascii_case("ETF"))
            .unwrap_or(false)
    };

    match definition
        .sec_type
        .as_deref()
        .map(|t| t.trim().to_uppercase())
        .as_deref()
    {
        Some("FUND") => Some(AssetClass::MoneyMarketFunds),
        Some("STK") if marks_etf(&definition.stock_type) || marks_etf(&definition.trading_class) => {
            Some(AssetClass::EquityEtfs)
        }
        _ => None,
    }
}

/// Rate source backed by the gateway's exchange-rate endpoint.
///
/// The gateway quotes how many `target` units one `source` unit buys; the
/// engine's convention is `from` units per one `to` unit. Asking with the
/// pair swapped (source = `to`) yields exactly that, so the swap lives here
/// and nowhere else.
pub struct GatewayRateSource {
    api: Arc<dyn GatewayApi>,
}

impl GatewayRateSource {
    pub fn new(api: Arc<dyn GatewayApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl RateSource for GatewayRateSource {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        self.api.exchange_rate(to, from).await
    }
}

/// Fetches and normalizes the Interactive Brokers side of a refresh.
///
/// One strictly ordered pass per refresh: session check, account listing,
/// then per account a summary, a paginated position listing, and metadata
/// lookups through the shared cache.
pub struct IbkrConnector {
    api: Arc<dyn GatewayApi>,
    cache: Arc<MetadataCache>,
    config: GatewayConfig,
}

impl IbkrConnector {
    pub fn new(api: Arc<dyn GatewayApi>, cache: Arc<MetadataCache>, config: GatewayConfig) -> Self {
        Self { api, cache, config }
    }

    async fn contract_snapshot(&self, conid: i64) -> Option<ContractSnapshot> {
        self.cache
            .contract(conid, || async {
                match self.api.contract_info(conid).await {
                    Ok(info) => {
                        self.cache.mark_updated(DataCategory::ContractMetadata);
                        Some(ContractSnapshot {
                            company_name: info.company_name,
                            exchange: info.exchange,
                        })
                    }
                    Err(e) => {
                        warn!("Contract lookup for conid {} failed: {}", conid, e);
                        None
                    }
                }
            })
            .await
    }

    async fn classification_override(&self, conid: i64) -> Option<AssetClass> {
        self.cache
            .classification(conid, || async {
                match self.api.security_definition(conid).await {
                    Ok(Some(definition)) => classification_from(&definition),
                    Ok(None) => None,
                    Err(e) => {
                        warn!("Security definition for conid {} failed: {}", conid, e);
                        None
                    }
                }
            })
            .await
    }

    /// Drains the paginated position listing for one account.
    ///
    /// Stops on an empty page, a short page, or a page that yields no new
    /// records; the page cap bounds the loop even when the gateway keeps
    /// serving full pages of unidentifiable records.
    async fn fetch_account_positions(
        &self,
        account_id: &str,
        warnings: &mut Vec<FetchWarning>,
    ) -> Vec<RawGatewayPosition> {
        let mut collected = Vec::new();
        let mut seen_conids: HashSet<i64> = HashSet::new();
        let mut page = 0usize;

        loop {
            if page >= self.config.max_position_pages {
                warn!(
                    "Position pagination for {} stopped at the {}-page cap",
                    account_id, page
                );
                warnings.push(FetchWarning::PaginationLimitReached {
                    account_id: account_id.to_string(),
                    pages_fetched: page,
                });
                break;
            }

            let records = match self.api.positions_page(account_id, page).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Positions page {} for {} failed: {}", page, account_id, e);
                    warnings.push(FetchWarning::Network {
                        source: format!("gateway.positions.{}", account_id),
                        detail: e.to_string(),
                    });
                    break;
                }
            };
            page += 1;

            if records.is_empty() {
                break;
            }
            let page_len = records.len();

            let mut new_in_page = 0usize;
            for record in records {
                let raw: RawGatewayPosition = match serde_json::from_value(record) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warnings.push(FetchWarning::Parse {
                            source: format!("gateway.positions.{}", account_id),
                            detail: e.to_string(),
                        });
                        continue;
                    }
                };
                if let Some(conid) = raw.conid {
                    if !seen_conids.insert(conid) {
                        continue;
                    }
                }
                new_in_page += 1;
                collected.push(raw);
            }

            if new_in_page == 0 {
                break;
            }
            if page_len < PAGE_SIZE {
                break;
            }
        }

        collected
    }

    async fn build_position(
        &self,
        raw: RawGatewayPosition,
        account_id: &str,
        account_currency: Option<&str>,
        warnings: &mut Vec<FetchWarning>,
    ) -> Position {
        let quantity = coerce_amount(raw.position.as_ref(), "gateway.positions.position", warnings);
        let avg_cost = coerce_amount(raw.avg_cost.as_ref(), "gateway.positions.avgCost", warnings);
        let cost_basis = quantity * avg_cost;
        let market_value = coerce_optional(
            raw.mkt_value.as_ref(),
            "gateway.positions.mktValue",
            warnings,
        )
        .unwrap_or(cost_basis);
        let unrealized_pl = coerce_optional(
            raw.unrealized_pnl.as_ref(),
            "gateway.positions.unrealizedPnl",
            warnings,
        )
        .unwrap_or(market_value - cost_basis);

        let symbol = raw
            .ticker
            .clone()
            .or_else(|| raw.contract_desc.clone())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let mut asset_class = asset_class_from(raw.asset_class.as_deref());
        let mut description = raw.contract_desc.clone();
        let mut exchange = raw.listing_exchange.clone();

        if let Some(conid) = raw.conid {
            if description.is_none() || exchange.is_none() {
                if let Some(snapshot) = self.contract_snapshot(conid).await {
                    if description.is_none() {
                        description = snapshot.company_name;
                    }
                    if exchange.is_none() {
                        exchange = snapshot.exchange;
                    }
                }
            }
            if let Some(reclassified) = self.classification_override(conid).await {
                asset_class = reclassified;
            }
        }

        let description = description.unwrap_or_else(|| {
            format!("{} ({})", symbol, raw.asset_class.as_deref().unwrap_or(UNKNOWN))
        });

        Position {
            broker: Broker::Ibkr,
            account_id: account_id.to_string(),
            symbol,
            description,
            quantity,
            market_value,
            cost_basis,
            unrealized_pl,
            unrealized_pl_percent: Position::pl_percent(unrealized_pl, cost_basis),
            currency: raw.currency.or_else(|| account_currency.map(|c| c.to_string())),
            asset_class,
            instrument_id: raw.conid,
            exchange,
            converted_value: None,
            fx_rate: None,
            base_value: None,
            base_unrealized_pl: None,
        }
    }

    async fn fold_account(&self, raw: RawGatewayAccount, fragment: &mut PortfolioFragment) {
        let account_id = match raw.id {
            Some(id) => id,
            None => {
                fragment.warnings.push(FetchWarning::Parse {
                    source: "gateway.accounts".to_string(),
                    detail: "account record without an id".to_string(),
                });
                return;
            }
        };

        let summary = match self.api.account_summary(&account_id).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summary for {} failed: {}", account_id, e);
                fragment.warnings.push(FetchWarning::Network {
                    source: format!("gateway.summary.{}", account_id),
                    detail: e.to_string(),
                });
                RawAccountSummary::new()
            }
        };

        let net_liquidation = summary_amount(&summary, &NET_LIQUIDATION_KEYS);
        let value = net_liquidation
            .as_ref()
            .map(|(amount, _)| *amount)
            .unwrap_or(Decimal::ZERO);
        let account_currency = net_liquidation
            .and_then(|(_, currency)| currency)
            .or_else(|| raw.currency.clone());

        fragment.total_value += value;
        fragment.accounts.push(Account {
            broker: Broker::Ibkr,
            account_id: account_id.clone(),
            display_name: raw
                .display_name
                .or(raw.account_title)
                .or(raw.account_alias)
                .unwrap_or_else(|| format!("IB {}", account_id)),
            account_type: raw
                .account_type
                .unwrap_or_else(|| "Investment".to_string()),
            currency: account_currency.clone(),
            value,
        });

        let raw_positions = self
            .fetch_account_positions(&account_id, &mut fragment.warnings)
            .await;
        let mut has_cash_position = false;
        for raw_position in raw_positions {
            let position = self
                .build_position(
                    raw_position,
                    &account_id,
                    account_currency.as_deref(),
                    &mut fragment.warnings,
                )
                .await;
            has_cash_position =
                has_cash_position || position.asset_class == AssetClass::Cash;
            fragment.positions.push(position);
        }

        // Cash is invisible in allocation views unless the account's
        // balance is surfaced as a position, so one is synthesized when the
        // provider exposes none. Always classified Cash, never overridden.
        if let Some((available, cash_currency)) = summary_amount(&summary, &AVAILABLE_FUNDS_KEYS) {
            if available > Decimal::ZERO && !has_cash_position {
                debug!(
                    "Synthesizing CASH position for {}: {}",
                    account_id, available
                );
                fragment.positions.push(Position {
                    broker: Broker::Ibkr,
                    account_id: account_id.clone(),
                    symbol: "CASH".to_string(),
                    description: "Cash balance".to_string(),
                    quantity: available,
                    market_value: available,
                    cost_basis: available,
                    unrealized_pl: Decimal::ZERO,
                    unrealized_pl_percent: Decimal::ZERO,
                    currency: cash_currency.or(account_currency),
                    asset_class: AssetClass::Cash,
                    instrument_id: None,
                    exchange: None,
                    converted_value: None,
                    fx_rate: None,
                    base_value: None,
                    base_unrealized_pl: None,
                });
            }
        }
    }
}

#[async_trait]
impl FragmentProvider for IbkrConnector {
    fn broker(&self) -> Broker {
        Broker::Ibkr
    }

    async fn fetch_fragment(&self) -> Result<PortfolioFragment> {
        let mut fragment = PortfolioFragment::empty(Broker::Ibkr);

        let status = match self.api.auth_status().await {
            Ok(status) => status,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                warn!("Gateway session check failed: {}", e);
                fragment.warnings.push(FetchWarning::Network {
                    source: "gateway.auth_status".to_string(),
                    detail: e.to_string(),
                });
                return Ok(fragment);
            }
        };
        if !status.authenticated {
            return Err(Error::Auth(status.message.unwrap_or_else(|| {
                "Gateway session is not authenticated".to_string()
            })));
        }

        if let Err(e) = self.api.validate_sso().await {
            if e.is_auth() {
                return Err(e);
            }
            warn!("SSO validation failed: {}", e);
            fragment.warnings.push(FetchWarning::Network {
                source: "gateway.sso".to_string(),
                detail: e.to_string(),
            });
        }

        let accounts = match self.api.list_accounts().await {
            Ok(accounts) => accounts,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                warn!("Gateway account listing failed: {}", e);
                fragment.warnings.push(FetchWarning::Network {
                    source: "gateway.accounts".to_string(),
                    detail: e.to_string(),
                });
                return Ok(fragment);
            }
        };
        self.cache.mark_updated(DataCategory::GatewayAccounts);

        for raw_account in accounts {
            self.fold_account(raw_account, &mut fragment).await;
        }

        info!(
            "Gateway fragment: {} accounts, {} positions",
            fragment.accounts.len(),
            fragment.positions.len()
        );
        Ok(fragment)
    }
}
