//! Derived account/position subsets of a snapshot.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::portfolio_model::{
    Account, Broker, PortfolioSnapshot, Position, SymbolAllocation,
};

/// Substring matched against `account_type` for the ISA view.
///
/// Case-sensitive on purpose: it reproduces what matched the providers'
/// real account-type strings, and nothing beyond that is known about the
/// naming scheme. See DESIGN.md.
const ISA_TYPE_MARKER: &str = "ISA";

/// The selectable portfolio views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PortfolioView {
    All,
    SchwabOnly,
    IbkrIsaOnly,
}

/// A filtered, self-contained slice of a snapshot.
///
/// Always a fresh structure; filtering never mutates the source snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredPortfolio {
    pub view: PortfolioView,
    pub accounts: Vec<Account>,
    pub positions: Vec<Position>,
    pub total_value: Decimal,
    pub total_value_by_broker: HashMap<Broker, Decimal>,
    pub allocation_by_symbol: HashMap<String, SymbolAllocation>,
}

/// Derives the requested view from a snapshot.
///
/// * `All` passes the full sets through without recomputation.
/// * `SchwabOnly` restricts to that broker and rebuilds the per-symbol
///   allocation from the restricted position set.
/// * `IbkrIsaOnly` restricts to IBKR accounts whose type contains
///   [`ISA_TYPE_MARKER`]; its total is the sum of the matching accounts'
///   native values, not a position-derived sum.
pub fn filter(snapshot: &PortfolioSnapshot, view: PortfolioView) -> FilteredPortfolio {
    match view {
        PortfolioView::All => FilteredPortfolio {
            view,
            accounts: snapshot.accounts.clone(),
            positions: snapshot.positions.clone(),
            total_value: snapshot.total_value_by_broker.values().copied().sum(),
            total_value_by_broker: snapshot.total_value_by_broker.clone(),
            allocation_by_symbol: snapshot.allocation_by_symbol.clone(),
        },
        PortfolioView::SchwabOnly => {
            let accounts: Vec<Account> = snapshot
                .accounts
                .iter()
                .filter(|a| a.broker == Broker::Schwab)
                .cloned()
                .collect();
            let positions: Vec<Position> = snapshot
                .positions
                .iter()
                .filter(|p| p.broker == Broker::Schwab)
                .cloned()
                .collect();

            let total_value = snapshot
                .total_value_by_broker
                .get(&Broker::Schwab)
                .copied()
                .unwrap_or(Decimal::ZERO);

            FilteredPortfolio {
                view,
                total_value,
                total_value_by_broker: HashMap::from([(Broker::Schwab, total_value)]),
                allocation_by_symbol: allocation_for(&positions),
                accounts,
                positions,
            }
        }
        PortfolioView::IbkrIsaOnly => {
            let accounts: Vec<Account> = snapshot
                .accounts
                .iter()
                .filter(|a| {
                    a.broker == Broker::Ibkr && a.account_type.contains(ISA_TYPE_MARKER)
                })
                .cloned()
                .collect();

            let account_ids: HashSet<&str> =
                accounts.iter().map(|a| a.account_id.as_str()).collect();

            let positions: Vec<Position> = snapshot
                .positions
                .iter()
                .filter(|p| {
                    p.broker == Broker::Ibkr && account_ids.contains(p.account_id.as_str())
                })
                .cloned()
                .collect();

            // Account-derived, not position-derived.
            let total_value: Decimal = accounts.iter().map(|a| a.value).sum();

            FilteredPortfolio {
                view,
                total_value,
                total_value_by_broker: HashMap::from([(Broker::Ibkr, total_value)]),
                allocation_by_symbol: allocation_for(&positions),
                accounts,
                positions,
            }
        }
    }
}

/// Rebuilds the native-currency per-symbol allocation for a position set.
pub fn allocation_for(positions: &[Position]) -> HashMap<String, SymbolAllocation> {
    let mut allocation: HashMap<String, SymbolAllocation> = HashMap::new();
    for position in positions {
        let entry = allocation
            .entry(position.symbol.clone())
            .or_insert_with(|| SymbolAllocation {
                total_value: Decimal::ZERO,
                total_quantity: Decimal::ZERO,
                description: position.description.clone(),
            });
        entry.total_value += position.market_value;
        entry.total_quantity += position.quantity;
    }
    allocation
}
