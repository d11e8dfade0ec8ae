//! Currency conversion engine.
//!
//! Rates flow through the shared [`MetadataCache`]: the first lookup for a
//! pair goes to the [`RateSource`], later lookups are served from memory
//! until the cache is invalidated. Unavailable rates are cached as `None`
//! so one dead pair does not trigger a network call per position.

use std::sync::Arc;

use log::warn;
use rust_decimal::Decimal;

use super::fx_model::ConvertedAmount;
use super::fx_traits::RateSource;
use crate::metadata::{DataCategory, MetadataCache};

pub struct CurrencyEngine {
    source: Arc<dyn RateSource>,
    cache: Arc<MetadataCache>,
}

impl CurrencyEngine {
    pub fn new(source: Arc<dyn RateSource>, cache: Arc<MetadataCache>) -> Self {
        CurrencyEngine { source, cache }
    }

    /// Quote for the pair: units of `from` per one unit of `to`.
    ///
    /// The identity pair returns `1.0` without touching the cache or the
    /// source. A zero or failed quote is `None`.
    pub async fn rate(&self, from: &str, to: &str) -> Option<Decimal> {
        let from = from.trim().to_uppercase();
        let to = to.trim().to_uppercase();
        if from.is_empty() || to.is_empty() {
            return None;
        }
        if from == to {
            return Some(Decimal::ONE);
        }

        self.cache
            .fx_rate(&from, &to, || async {
                match self.source.fetch_rate(&from, &to).await {
                    Ok(rate) if rate > Decimal::ZERO => {
                        self.cache.mark_updated(DataCategory::ExchangeRates);
                        Some(rate)
                    }
                    Ok(rate) => {
                        warn!("Discarding non-positive rate {} for {}/{}", rate, from, to);
                        None
                    }
                    Err(e) => {
                        warn!("Exchange rate lookup failed for {}/{}: {}", from, to, e);
                        None
                    }
                }
            })
            .await
    }

    /// Converts `amount` from its native currency into `to`.
    ///
    /// Returns `None` when the native currency is unknown or no rate is
    /// available; callers exclude such amounts from converted sums and
    /// from the matching percentage denominators rather than zeroing them.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: Option<&str>,
        to: &str,
    ) -> Option<Decimal> {
        let from = from?;
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return Some(amount);
        }
        let rate = self.rate(from, to).await?;
        Some(amount / rate)
    }

    /// Converts one native amount into both target currencies at once: the
    /// user-selected display currency and the fixed reporting currency the
    /// allocation analytics are computed in. The two lookups are
    /// independent; one side failing does not blank the other.
    pub async fn convert_dual(
        &self,
        amount: Decimal,
        from: Option<&str>,
        display_currency: &str,
        reporting_currency: &str,
    ) -> ConvertedAmount {
        let from = match from {
            Some(c) if !c.trim().is_empty() => c,
            _ => return ConvertedAmount::unavailable(),
        };

        let display_rate = if from.trim().eq_ignore_ascii_case(display_currency.trim()) {
            Some(Decimal::ONE)
        } else {
            self.rate(from, display_currency).await
        };

        ConvertedAmount {
            display: display_rate.map(|rate| amount / rate),
            display_rate,
            base: self.convert(amount, Some(from), reporting_currency).await,
        }
    }
}
