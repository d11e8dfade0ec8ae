//! Refresh orchestration across both providers.
//!
//! A refresh is one strictly ordered pass: every provider fetches its
//! fragment, the fragments are combined into a snapshot, and the snapshot is
//! appended to the in-memory history. There is no mid-refresh cancellation
//! and no automatic retry; a failed cycle leaves the prior snapshot active.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use foliolens_core::errors::{Error, Result};
use foliolens_core::fx::CurrencyEngine;
use foliolens_core::metadata::{DataCategory, MetadataCache};
use foliolens_core::portfolio::combine;
use foliolens_core::settings::AppSettings;
use foliolens_core::{Broker, PortfolioFragment, PortfolioSnapshot};

/// One provider's contribution to a refresh cycle.
///
/// Implementations recover everything they can below this seam; an `Err`
/// from `fetch_fragment` is authentication-class by construction and blocks
/// only the owning broker's contribution.
#[async_trait]
pub trait FragmentProvider: Send + Sync {
    fn broker(&self) -> Broker;
    async fn fetch_fragment(&self) -> Result<PortfolioFragment>;
}

/// Counts from the most recent successful refresh, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStats {
    pub accounts: usize,
    pub positions: usize,
    /// Distinct native currency codes observed across positions.
    pub currencies: Vec<String>,
    pub unconverted_positions: usize,
}

/// Drives the providers and owns the snapshot history.
pub struct RefreshOrchestrator {
    providers: Vec<Arc<dyn FragmentProvider>>,
    cache: Arc<MetadataCache>,
    engine: CurrencyEngine,
    settings: AppSettings,
    history: Mutex<Vec<PortfolioSnapshot>>,
}

impl RefreshOrchestrator {
    pub fn new(
        providers: Vec<Arc<dyn FragmentProvider>>,
        engine: CurrencyEngine,
        cache: Arc<MetadataCache>,
        settings: AppSettings,
    ) -> Self {
        Self {
            providers,
            cache,
            engine,
            settings,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Runs one refresh cycle.
    ///
    /// A provider failure is logged and that broker sits the cycle out; the
    /// snapshot is built from whichever fragments arrived. Only when every
    /// provider fails is the cycle abandoned with the last error, leaving
    /// the prior snapshot as the active one.
    pub async fn refresh(&self) -> Result<PortfolioSnapshot> {
        info!("Starting portfolio refresh across {} providers", self.providers.len());

        let mut fragments: Vec<PortfolioFragment> = Vec::new();
        let mut last_error: Option<Error> = None;
        for provider in &self.providers {
            let broker = provider.broker();
            match provider.fetch_fragment().await {
                Ok(fragment) => fragments.push(fragment),
                Err(e) => {
                    error!("{} contribution blocked: {}", broker, e);
                    last_error = Some(e);
                }
            }
        }

        if fragments.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| Error::Unexpected("No providers configured".to_string())));
        }

        let snapshot = combine(
            fragments,
            &self.engine,
            &self.settings.display_currency,
            &self.settings.reporting_currency,
        )
        .await;

        info!(
            "Refresh complete: {} accounts, {} positions, {} warnings",
            snapshot.accounts.len(),
            snapshot.positions.len(),
            snapshot.warnings.len()
        );

        self.history_mut().push(snapshot.clone());
        Ok(snapshot)
    }

    /// The most recent snapshot, if any refresh has succeeded.
    pub fn latest(&self) -> Option<PortfolioSnapshot> {
        self.history_mut().last().cloned()
    }

    /// Number of snapshots taken so far.
    pub fn snapshots_taken(&self) -> usize {
        self.history_mut().len()
    }

    /// Whether the latest snapshot is older than the configured threshold.
    /// No snapshot at all counts as stale.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        let threshold = chrono::Duration::from_std(self.settings.staleness_threshold)
            .unwrap_or_else(|_| chrono::Duration::zero());
        match self.latest() {
            Some(snapshot) => snapshot.age(now) > threshold,
            None => true,
        }
    }

    /// Counts from the latest snapshot, for display.
    pub fn stats(&self) -> Option<RefreshStats> {
        self.latest().map(|snapshot| RefreshStats {
            accounts: snapshot.accounts.len(),
            positions: snapshot.positions.len(),
            currencies: snapshot.currencies(),
            unconverted_positions: snapshot.unconverted_positions,
        })
    }

    /// Last successful fetch time per data-source category.
    pub fn last_updated(&self) -> HashMap<DataCategory, DateTime<Utc>> {
        self.cache.last_updated()
    }

    /// Clears every cache namespace ahead of a user-triggered refresh.
    pub fn invalidate_caches(&self) {
        self.cache.invalidate_all();
    }

    fn history_mut(&self) -> std::sync::MutexGuard<'_, Vec<PortfolioSnapshot>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foliolens_core::fx::RateSource;
    use foliolens_core::{Account, AssetClass, Position};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct NoRates;

    #[async_trait]
    impl RateSource for NoRates {
        async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal> {
            Err(Error::Network(format!("no rate for {}/{}", from, to)))
        }
    }

    fn fragment(broker: Broker, value: Decimal) -> PortfolioFragment {
        let account = Account {
            broker,
            account_id: format!("{}-1", broker),
            display_name: format!("{} account", broker),
            account_type: "Individual".to_string(),
            currency: Some("USD".to_string()),
            value,
        };
        let position = Position {
            broker,
            account_id: account.account_id.clone(),
            symbol: format!("{}X", broker),
            description: "Test holding".to_string(),
            quantity: dec!(1),
            market_value: value,
            cost_basis: value,
            unrealized_pl: Decimal::ZERO,
            unrealized_pl_percent: Decimal::ZERO,
            currency: Some("USD".to_string()),
            asset_class: AssetClass::Stocks,
            instrument_id: None,
            exchange: None,
            converted_value: None,
            fx_rate: None,
            base_value: None,
            base_unrealized_pl: None,
        };
        PortfolioFragment {
            broker,
            accounts: vec![account],
            positions: vec![position],
            total_value: value,
            warnings: Vec::new(),
        }
    }

    /// Succeeds until `fail` is flipped.
    struct FlakyProvider {
        broker: Broker,
        value: Decimal,
        fail: AtomicBool,
    }

    impl FlakyProvider {
        fn new(broker: Broker, value: Decimal) -> Self {
            Self {
                broker,
                value,
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl FragmentProvider for FlakyProvider {
        fn broker(&self) -> Broker {
            self.broker
        }

        async fn fetch_fragment(&self) -> Result<PortfolioFragment> {
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::Auth("session expired".to_string()))
            } else {
                Ok(fragment(self.broker, self.value))
            }
        }
    }

    fn orchestrator(providers: Vec<Arc<dyn FragmentProvider>>) -> RefreshOrchestrator {
        let cache = Arc::new(MetadataCache::new());
        let engine = CurrencyEngine::new(Arc::new(NoRates), cache.clone());
        RefreshOrchestrator::new(providers, engine, cache, AppSettings::default())
    }

    #[tokio::test]
    async fn test_refresh_combines_every_provider() {
        let orchestrator = orchestrator(vec![
            Arc::new(FlakyProvider::new(Broker::Schwab, dec!(1000))),
            Arc::new(FlakyProvider::new(Broker::Ibkr, dec!(500))),
        ]);

        let snapshot = orchestrator.refresh().await.unwrap();

        assert_eq!(snapshot.total_value_by_broker[&Broker::Schwab], dec!(1000));
        assert_eq!(snapshot.total_value_by_broker[&Broker::Ibkr], dec!(500));
        assert_eq!(orchestrator.snapshots_taken(), 1);
    }

    #[tokio::test]
    async fn test_auth_failure_blocks_one_broker_only() {
        let schwab = Arc::new(FlakyProvider::new(Broker::Schwab, dec!(1000)));
        schwab.fail.store(true, Ordering::SeqCst);
        let ibkr = Arc::new(FlakyProvider::new(Broker::Ibkr, dec!(500)));

        let orchestrator = orchestrator(vec![schwab, ibkr]);
        let snapshot = orchestrator.refresh().await.unwrap();

        assert!(!snapshot.total_value_by_broker.contains_key(&Broker::Schwab));
        assert_eq!(snapshot.total_value_by_broker[&Broker::Ibkr], dec!(500));
    }

    #[tokio::test]
    async fn test_failed_cycle_keeps_prior_snapshot_active() {
        let provider = Arc::new(FlakyProvider::new(Broker::Schwab, dec!(1000)));
        let orchestrator = orchestrator(vec![provider.clone()]);

        let first = orchestrator.refresh().await.unwrap();

        provider.fail.store(true, Ordering::SeqCst);
        let result = orchestrator.refresh().await;

        assert!(matches!(result, Err(Error::Auth(_))));
        let latest = orchestrator.latest().unwrap();
        assert_eq!(latest.timestamp, first.timestamp);
        assert_eq!(orchestrator.snapshots_taken(), 1);
    }

    #[tokio::test]
    async fn test_staleness_threshold() {
        let orchestrator = orchestrator(vec![Arc::new(FlakyProvider::new(
            Broker::Ibkr,
            dec!(500),
        ))]);

        // No snapshot yet: always stale.
        assert!(orchestrator.is_stale(Utc::now()));

        let snapshot = orchestrator.refresh().await.unwrap();
        assert!(!orchestrator.is_stale(snapshot.timestamp));

        let threshold = AppSettings::default().staleness_threshold;
        let later = snapshot.timestamp
            + chrono::Duration::from_std(threshold + Duration::from_secs(1)).unwrap();
        assert!(orchestrator.is_stale(later));
    }

    #[tokio::test]
    async fn test_stats_reflect_latest_snapshot() {
        let orchestrator = orchestrator(vec![
            Arc::new(FlakyProvider::new(Broker::Schwab, dec!(1000))),
            Arc::new(FlakyProvider::new(Broker::Ibkr, dec!(500))),
        ]);

        assert!(orchestrator.stats().is_none());

        orchestrator.refresh().await.unwrap();
        let stats = orchestrator.stats().unwrap();

        assert_eq!(stats.accounts, 2);
        assert_eq!(stats.positions, 2);
        assert_eq!(stats.currencies, vec!["USD".to_string()]);
        assert_eq!(stats.unconverted_positions, 0);
    }

    #[tokio::test]
    async fn test_invalidate_caches_clears_every_namespace() {
        let cache = Arc::new(MetadataCache::new());
        let engine = CurrencyEngine::new(Arc::new(NoRates), cache.clone());
        let orchestrator = RefreshOrchestrator::new(
            Vec::new(),
            engine,
            cache.clone(),
            AppSettings::default(),
        );

        cache.contract(1, || async { None }).await;
        assert_eq!(cache.entry_count(), 1);

        orchestrator.invalidate_caches();
        assert_eq!(cache.entry_count(), 0);
    }
}
