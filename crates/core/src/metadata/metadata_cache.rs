//! Shared cache for per-instrument metadata and FX rates.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::debug;
use rust_decimal::Decimal;

use super::memo::Memo;
use super::metadata_model::{ContractSnapshot, DataCategory};
use crate::portfolio::AssetClass;

/// Memoizes the expensive per-instrument lookups (contract metadata,
/// asset-class overrides) and FX rates, and records when each data-source
/// category last completed a successful fetch.
///
/// Entries never expire on their own. Correctness depends on the caller
/// invalidating when staleness matters: the user-triggered refresh action
/// calls [`MetadataCache::invalidate_all`] before re-fetching.
pub struct MetadataCache {
    /// conid -> contract metadata; `None` caches a provider "not found".
    contracts: Memo<i64, Option<ContractSnapshot>>,
    /// conid -> asset-class override from security definitions.
    classifications: Memo<i64, Option<AssetClass>>,
    /// (from, to) -> spot quote; `None` caches an unavailable rate.
    fx_rates: Memo<(String, String), Option<Decimal>>,
    last_updated: RwLock<HashMap<DataCategory, DateTime<Utc>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        MetadataCache {
            contracts: Memo::new(),
            classifications: Memo::new(),
            fx_rates: Memo::new(),
            last_updated: RwLock::new(HashMap::new()),
        }
    }

    /// Contract metadata for `conid`, fetching on first miss.
    pub async fn contract<F, Fut>(&self, conid: i64, fetch: F) -> Option<ContractSnapshot>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<ContractSnapshot>>,
    {
        self.contracts.get_or_fetch(conid, fetch).await
    }

    /// Asset-class override for `conid`, fetching on first miss.
    pub async fn classification<F, Fut>(&self, conid: i64, fetch: F) -> Option<AssetClass>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AssetClass>>,
    {
        self.classifications.get_or_fetch(conid, fetch).await
    }

    /// Spot rate for the currency pair, fetching on first miss.
    pub async fn fx_rate<F, Fut>(&self, from: &str, to: &str, fetch: F) -> Option<Decimal>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<Decimal>>,
    {
        self.fx_rates
            .get_or_fetch((from.to_string(), to.to_string()), fetch)
            .await
    }

    /// Records a successful fetch for a data-source category.
    pub fn mark_updated(&self, category: DataCategory) {
        let mut map = self
            .last_updated
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        map.insert(category, Utc::now());
    }

    /// Last successful fetch time per data-source category, for display.
    pub fn last_updated(&self) -> HashMap<DataCategory, DateTime<Utc>> {
        self.last_updated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Clears every namespace as one user-triggered action. The
    /// last-updated timestamps survive; they describe the previous fetches
    /// until new ones complete.
    pub fn invalidate_all(&self) {
        debug!(
            "Invalidating metadata cache ({} contracts, {} classifications, {} fx pairs)",
            self.contracts.len(),
            self.classifications.len(),
            self.fx_rates.len()
        );
        self.contracts.clear();
        self.classifications.clear();
        self.fx_rates.clear();
    }

    /// Total number of cached entries across namespaces.
    pub fn entry_count(&self) -> usize {
        self.contracts.len() + self.classifications.len() + self.fx_rates.len()
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new()
    }
}
