//! Foliolens Brokers - Provider clients and fragment adapters.
//!
//! One module per data provider: `schwab` talks to the Charles Schwab cloud
//! OAuth API, `gateway` to the local Interactive Brokers Client Portal
//! gateway. Each turns its provider's raw payloads into a
//! [`foliolens_core::PortfolioFragment`]; the `refresh` module drives both
//! and feeds the aggregator in `foliolens-core`.

pub mod config;
pub mod gateway;
pub mod raw;
pub mod refresh;
pub mod schwab;

pub use config::{GatewayConfig, SchwabConfig};
pub use gateway::{GatewayApi, GatewayApiClient, GatewayRateSource, IbkrConnector};
pub use refresh::{FragmentProvider, RefreshOrchestrator, RefreshStats};
pub use schwab::{SchwabApi, SchwabApiClient, SchwabConnector, SchwabToken};
