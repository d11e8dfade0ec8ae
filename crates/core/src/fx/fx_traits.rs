use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::Result;

/// Source of spot exchange rates.
///
/// Rate direction convention, applied uniformly across the engine: a quote
/// for `(from, to)` is the number of units of `from` that buy one unit of
/// `to`. Conversion therefore divides the native amount by the quote.
/// Implementations whose upstream quotes the opposite direction must swap
/// the pair before returning.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the quote for one unit of `to`, expressed in `from` units.
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal>;
}
