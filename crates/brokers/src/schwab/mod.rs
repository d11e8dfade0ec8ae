mod adapter;
pub(crate) mod client;
mod models;

pub use adapter::{normalize, SchwabConnector};
pub use client::{SchwabApi, SchwabApiClient, SchwabToken};
pub use models::*;
