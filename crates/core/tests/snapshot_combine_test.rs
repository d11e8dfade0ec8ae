//! End-to-end combine scenario across both brokers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use foliolens_core::errors::{Error, Result};
use foliolens_core::fx::{CurrencyEngine, FxError, RateSource};
use foliolens_core::metadata::MetadataCache;
use foliolens_core::portfolio::combine;
use foliolens_core::{
    filter, Account, AssetClass, Broker, PortfolioFragment, PortfolioView, Position,
};

struct TableSource {
    rates: HashMap<(String, String), Decimal>,
}

#[async_trait]
impl RateSource for TableSource {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal> {
        self.rates
            .get(&(from.to_string(), to.to_string()))
            .copied()
            .ok_or_else(|| Error::Fx(FxError::RateNotFound(format!("{}/{}", from, to))))
    }
}

fn engine(rates: &[(&str, &str, Decimal)]) -> CurrencyEngine {
    let source = TableSource {
        rates: rates
            .iter()
            .map(|(f, t, r)| ((f.to_string(), t.to_string()), *r))
            .collect(),
    };
    CurrencyEngine::new(Arc::new(source), Arc::new(MetadataCache::new()))
}

fn position(
    broker: Broker,
    account_id: &str,
    symbol: &str,
    quantity: Decimal,
    market_value: Decimal,
    cost_basis: Decimal,
    currency: &str,
) -> Position {
    let unrealized_pl = market_value - cost_basis;
    Position {
        broker,
        account_id: account_id.to_string(),
        symbol: symbol.to_string(),
        description: format!("{} holding", symbol),
        quantity,
        market_value,
        cost_basis,
        unrealized_pl,
        unrealized_pl_percent: Position::pl_percent(unrealized_pl, cost_basis),
        currency: Some(currency.to_string()),
        asset_class: AssetClass::Stocks,
        instrument_id: None,
        exchange: None,
        converted_value: None,
        fx_rate: None,
        base_value: None,
        base_unrealized_pl: None,
    }
}

fn schwab_fragment() -> PortfolioFragment {
    PortfolioFragment {
        broker: Broker::Schwab,
        accounts: vec![Account {
            broker: Broker::Schwab,
            account_id: "12345".to_string(),
            display_name: "Schwab Brokerage".to_string(),
            account_type: "Individual".to_string(),
            currency: Some("USD".to_string()),
            value: dec!(98765.43),
        }],
        positions: vec![position(
            Broker::Schwab,
            "12345",
            "AAPL",
            dec!(50),
            dec!(8750.00),
            dec!(6500.00),
            "USD",
        )],
        total_value: dec!(98765.43),
        warnings: Vec::new(),
    }
}

fn ibkr_fragment() -> PortfolioFragment {
    PortfolioFragment {
        broker: Broker::Ibkr,
        accounts: vec![Account {
            broker: Broker::Ibkr,
            account_id: "U7654321".to_string(),
            display_name: "IB U7654321".to_string(),
            account_type: "Margin".to_string(),
            currency: Some("USD".to_string()),
            value: dec!(34660.24),
        }],
        positions: vec![position(
            Broker::Ibkr,
            "U7654321",
            "GOOGL",
            dec!(25),
            dec!(3750.00),
            dec!(3250.00),
            "USD",
        )],
        total_value: dec!(34660.24),
        warnings: Vec::new(),
    }
}

#[tokio::test]
async fn test_two_broker_snapshot_totals_and_allocation() {
    let engine = engine(&[]);
    let snapshot = combine(
        vec![schwab_fragment(), ibkr_fragment()],
        &engine,
        "USD",
        "USD",
    )
    .await;

    // Broker rollup trusts the provider-reported account totals.
    assert_eq!(
        snapshot.total_value_by_broker,
        HashMap::from([
            (Broker::Schwab, dec!(98765.43)),
            (Broker::Ibkr, dec!(34660.24)),
        ])
    );

    // The headline metric is re-derived from converted position values and
    // deliberately diverges from the broker rollup.
    assert_eq!(snapshot.portfolio_value, dec!(12500.00));

    let aapl = &snapshot.allocation_by_symbol["AAPL"];
    assert_eq!(aapl.total_value, dec!(8750.00));
    assert_eq!(aapl.total_quantity, dec!(50));
    let googl = &snapshot.allocation_by_symbol["GOOGL"];
    assert_eq!(googl.total_value, dec!(3750.00));
    assert_eq!(googl.total_quantity, dec!(25));

    // Native-currency identity between the symbol rollup and the raw
    // position set.
    let allocation_sum: Decimal = snapshot
        .allocation_by_symbol
        .values()
        .map(|a| a.total_value)
        .sum();
    let position_sum: Decimal = snapshot.positions.iter().map(|p| p.market_value).sum();
    assert_eq!(allocation_sum, position_sum);

    assert!(snapshot.warnings.is_empty());
    assert_eq!(snapshot.unconverted_positions, 0);
}

#[tokio::test]
async fn test_unconvertible_position_stays_visible_but_out_of_converted_totals() {
    // VOD is quoted in GBP and no GBP rate exists.
    let engine = engine(&[]);
    let mut ibkr = ibkr_fragment();
    ibkr.positions.push(position(
        Broker::Ibkr,
        "U7654321",
        "VOD",
        dec!(1000),
        dec!(5000.00),
        dec!(5500.00),
        "GBP",
    ));

    let snapshot = combine(vec![schwab_fragment(), ibkr], &engine, "USD", "USD").await;

    // Raw table and native symbol rollup keep the position.
    assert!(snapshot.positions.iter().any(|p| p.symbol == "VOD"));
    assert_eq!(snapshot.allocation_by_symbol["VOD"].total_value, dec!(5000.00));

    // Converted aggregates exclude it instead of zeroing it.
    assert_eq!(snapshot.portfolio_value, dec!(12500.00));
    assert_eq!(
        snapshot.allocation_by_asset_class[&AssetClass::Stocks],
        dec!(12500.00)
    );
    assert_eq!(snapshot.unconverted_positions, 1);
}

#[tokio::test]
async fn test_filtered_view_matches_direct_aggregation() {
    let engine = engine(&[]);
    let snapshot = combine(
        vec![schwab_fragment(), ibkr_fragment()],
        &engine,
        "USD",
        "USD",
    )
    .await;

    let filtered = filter(&snapshot, PortfolioView::SchwabOnly);

    assert_eq!(filtered.positions.len(), 1);
    assert_eq!(filtered.positions[0].symbol, "AAPL");
    assert_eq!(filtered.total_value, dec!(98765.43));
    assert_eq!(filtered.allocation_by_symbol["AAPL"].total_value, dec!(8750.00));
    assert!(!filtered.allocation_by_symbol.contains_key("GOOGL"));
}
