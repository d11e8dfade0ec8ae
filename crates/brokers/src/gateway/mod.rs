mod adapter;
mod client;
mod models;

pub use adapter::{GatewayRateSource, IbkrConnector};
pub use client::{GatewayApi, GatewayApiClient};
pub use models::*;
