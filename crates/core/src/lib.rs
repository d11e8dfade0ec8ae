//! Foliolens Core - Domain entities, services, and traits.
//!
//! This crate contains the portfolio aggregation engine: the common
//! account/position schema both brokers normalize into, the currency
//! conversion engine, the metadata/FX cache, the fragment aggregator,
//! and the derived portfolio views. It knows nothing about HTTP; broker
//! clients live in the `foliolens-brokers` crate.

pub mod errors;
pub mod fx;
pub mod metadata;
pub mod portfolio;
pub mod settings;

// Re-export common types from the portfolio module
pub use portfolio::*;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
