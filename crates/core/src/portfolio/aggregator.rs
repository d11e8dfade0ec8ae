//! Merges per-broker fragments into one portfolio snapshot.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use log::{debug, warn};
use rust_decimal::Decimal;

use super::portfolio_model::{
    AssetClass, Broker, FetchWarning, PortfolioFragment, PortfolioSnapshot, Position,
    SymbolAllocation,
};
use crate::fx::CurrencyEngine;

/// Combines fragments from every connected broker into a new snapshot.
///
/// Source fragments are consumed, never mutated in place: positions are
/// enriched with conversion fields as they are folded in, and all derived
/// maps are rebuilt from scratch on every run.
///
/// Two deliberately separate computations (see `PortfolioSnapshot` docs):
/// the broker rollup keeps the provider-reported native totals, while
/// `portfolio_value` re-derives the headline number from per-position
/// converted values. Likewise the per-symbol allocation stays in native
/// currency while the per-asset-class allocation is converted into the
/// reporting currency.
pub async fn combine(
    fragments: Vec<PortfolioFragment>,
    engine: &CurrencyEngine,
    display_currency: &str,
    reporting_currency: &str,
) -> PortfolioSnapshot {
    let mut accounts = Vec::new();
    let mut positions: Vec<Position> = Vec::new();
    let mut total_value_by_broker: HashMap<Broker, Decimal> = HashMap::new();
    let mut allocation_by_symbol: HashMap<String, SymbolAllocation> = HashMap::new();
    let mut allocation_by_asset_class: HashMap<AssetClass, Decimal> = HashMap::new();
    let mut warnings = Vec::new();
    let mut portfolio_value = Decimal::ZERO;
    let mut unconverted = 0usize;

    // Account ids per broker, for the orphan check below.
    let mut known_accounts: HashMap<Broker, HashSet<String>> = HashMap::new();

    for fragment in fragments {
        *total_value_by_broker
            .entry(fragment.broker)
            .or_insert(Decimal::ZERO) += fragment.total_value;
        warnings.extend(fragment.warnings);

        for account in &fragment.accounts {
            known_accounts
                .entry(account.broker)
                .or_default()
                .insert(account.account_id.clone());
        }
        accounts.extend(fragment.accounts);

        for mut position in fragment.positions {
            // Native-currency rollup per symbol, independent of conversion.
            let entry = allocation_by_symbol
                .entry(position.symbol.clone())
                .or_insert_with(|| SymbolAllocation {
                    total_value: Decimal::ZERO,
                    total_quantity: Decimal::ZERO,
                    description: position.description.clone(),
                });
            entry.total_value += position.market_value;
            entry.total_quantity += position.quantity;

            // Conversion enrichment. A missing rate leaves the position in
            // the table but out of every converted aggregate.
            let converted = engine
                .convert_dual(
                    position.market_value,
                    position.currency.as_deref(),
                    display_currency,
                    reporting_currency,
                )
                .await;

            position.converted_value = converted.display;
            position.fx_rate = converted.display_rate;
            position.base_value = converted.base;
            position.base_unrealized_pl = engine
                .convert(
                    position.unrealized_pl,
                    position.currency.as_deref(),
                    reporting_currency,
                )
                .await;

            match position.converted_value {
                Some(value) => portfolio_value += value,
                None => unconverted += 1,
            }

            if let Some(base) = position.base_value {
                *allocation_by_asset_class
                    .entry(position.asset_class)
                    .or_insert(Decimal::ZERO) += base;
            }

            positions.push(position);
        }
    }

    // Orphaned positions are tolerated but never dropped silently.
    for position in &positions {
        let known = known_accounts
            .get(&position.broker)
            .map(|ids| ids.contains(&position.account_id))
            .unwrap_or(false);
        if !known {
            warn!(
                "Position {} references unknown {} account {}",
                position.symbol, position.broker, position.account_id
            );
            warnings.push(FetchWarning::OrphanedPosition {
                broker: position.broker,
                account_id: position.account_id.clone(),
                symbol: position.symbol.clone(),
            });
        }
    }

    debug!(
        "Combined snapshot: {} accounts, {} positions, {} unconverted",
        accounts.len(),
        positions.len(),
        unconverted
    );

    PortfolioSnapshot {
        accounts,
        positions,
        total_value_by_broker,
        portfolio_value,
        display_currency: display_currency.to_string(),
        reporting_currency: reporting_currency.to_string(),
        allocation_by_symbol,
        allocation_by_asset_class,
        unconverted_positions: unconverted,
        warnings,
        timestamp: Utc::now(),
    }
}
