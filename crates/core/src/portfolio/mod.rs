pub mod aggregator;
pub mod portfolio_model;
pub mod views;


pub use aggregator::combine;
pub use portfolio_model::{
    Account, AssetClass, Broker, FetchWarning, PortfolioFragment, PortfolioSnapshot, Position,
    SymbolAllocation,
};
pub use views::{filter, FilteredPortfolio, PortfolioView};
