//! Exchange-rate refresh daemon.
//!
//! Owns the live cache of current rates per subscribed currency pair, a
//! timer-driven refresh loop, and the historical-rate resolution path.
//! Exchange rates are advisory market data: cache entries are overwritten
//! wholesale per pair and last-writer-wins is acceptable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use driverpay_common::{is_today, today_utc, ExchangeRate, PairCodes};
use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::error::FxResult;
use crate::source::{RateFetchService, RateHistoryStore, RateSource};

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct ExchangeRateDaemonConfig {
    /// Fixed interval between refresh cycles.
    pub refresh_interval: Duration,
}

impl Default for ExchangeRateDaemonConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
        }
    }
}

/// Shared daemon state, referenced by the timer task.
struct DaemonState {
    refresh_interval: Duration,
    fetcher: Arc<dyn RateFetchService>,
    history: Arc<dyn RateHistoryStore>,
    /// Most recent fetched rate per pair name. No day granularity.
    cache: DashMap<String, ExchangeRate>,
    /// Subscribed pairs, keyed by pair name.
    pairs: DashMap<String, PairCodes>,
}

impl DaemonState {
    /// Refresh every subscribed pair. Fetches for independent pairs are
    /// issued concurrently so a slow pair does not starve the others, and a
    /// failure for one pair never aborts the rest of the cycle.
    async fn refresh_all(self: &Arc<Self>) {
        let pairs: Vec<PairCodes> = self.pairs.iter().map(|e| e.value().clone()).collect();

        let mut tasks = JoinSet::new();
        for pair in pairs {
            let state = Arc::clone(self);
            tasks.spawn(async move { state.refresh_pair(&pair).await });
        }
        while tasks.join_next().await.is_some() {}
    }

    async fn refresh_pair(&self, pair: &PairCodes) {
        match self.fetcher.fetch_current_rate(pair).await {
            Ok(rate) => {
                debug!(pair = %pair, rate = %rate.rate, "Updated exchange rate");
                self.cache.insert(pair.name(), rate);
            }
            Err(error) => {
                // Recovered locally: the stale entry stays in place and the
                // pair is retried on the next cycle.
                warn!(pair = %pair, error = %error, "Exchange rate refresh failed");
            }
        }
    }
}

/// Background exchange-rate daemon.
///
/// Lifecycle: Stopped → `start` → Running → `stop` → Stopped; `reset`
/// additionally clears the subscription set from any state.
pub struct ExchangeRateDaemon {
    state: Arc<DaemonState>,
    timer: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl ExchangeRateDaemon {
    /// Create a new daemon over the given collaborators.
    pub fn new(
        config: ExchangeRateDaemonConfig,
        fetcher: Arc<dyn RateFetchService>,
        history: Arc<dyn RateHistoryStore>,
    ) -> Self {
        Self {
            state: Arc::new(DaemonState {
                refresh_interval: config.refresh_interval,
                fetcher,
                history,
                cache: DashMap::new(),
                pairs: DashMap::new(),
            }),
            timer: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Whether the daemon is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Enter the Running state and arm the refresh timer if at least one
    /// pair is subscribed.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.arm_timer();
    }

    /// Disarm future timer firings and return to Stopped. Cache entries are
    /// retained; an in-flight refresh is not cancelled.
    pub fn stop(&self) {
        self.disarm_timer();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Subscribe a currency pair. Idempotent. A newly added pair is
    /// refreshed immediately; the timer is armed when the daemon is running.
    pub async fn add_pair(&self, pair: PairCodes) {
        if self.state.pairs.insert(pair.name(), pair.clone()).is_some() {
            return;
        }

        self.state.refresh_pair(&pair).await;
        debug!(pair = %pair, "Subscribed currency pair");

        if self.is_running() {
            self.arm_timer();
        }
    }

    /// Unsubscribe a currency pair. Idempotent. The timer is disarmed when
    /// the subscription set empties.
    pub fn remove_pair(&self, pair: &PairCodes) {
        if self.state.pairs.remove(&pair.name()).is_none() {
            return;
        }

        debug!(pair = %pair, "Unsubscribed currency pair");

        if self.state.pairs.is_empty() {
            self.disarm_timer();
        }
    }

    /// Disarm the timer, clear all subscriptions and return to Stopped.
    /// Cache entries are left in place; without a subscription nothing
    /// references them.
    pub fn reset(&self) {
        self.disarm_timer();
        self.state.pairs.clear();
        self.running.store(false, Ordering::SeqCst);
        debug!("Reset exchange rate daemon");
    }

    /// Currently subscribed pairs.
    pub fn subscribed_pairs(&self) -> Vec<PairCodes> {
        self.state.pairs.iter().map(|e| e.value().clone()).collect()
    }

    /// Run one refresh cycle over all subscribed pairs.
    pub async fn refresh_all(&self) {
        self.state.refresh_all().await;
    }

    /// Resolve a rate for a pair.
    ///
    /// Without a date (or for today) this answers from the live cache,
    /// which may be empty if the pair was never fetched. For a past day the
    /// persisted history is consulted, backfilling missing days through the
    /// rate-history collaborator first if needed. The result can still be
    /// absent when the requested day predates available history.
    pub async fn get_exchange_rate(
        &self,
        pair: &PairCodes,
        on: Option<NaiveDate>,
    ) -> FxResult<Option<ExchangeRate>> {
        match on {
            Some(day) if !is_today(day) => {
                if let Some(rate) = self.state.history.get(pair, day).await? {
                    return Ok(Some(rate));
                }

                self.backfill_history(pair, day).await?;
                self.state.history.get(pair, day).await
            }
            _ => Ok(self.state.cache.get(&pair.name()).map(|e| e.clone())),
        }
    }

    /// Fetch and persist the daily history for a pair up to (excluding)
    /// today. Today's value is provisional (the trading day is incomplete)
    /// and is intentionally never persisted.
    async fn backfill_history(&self, pair: &PairCodes, since: NaiveDate) -> FxResult<()> {
        let today = today_utc();

        let start = match self.state.history.newest(pair).await? {
            // The store already covers days on/after the requested one;
            // resume from the day after the newest stored rate.
            Some(newest) if newest.date >= since => newest.date.succ_opt().unwrap_or(today),
            _ => since,
        };

        if start >= today {
            return Ok(());
        }

        let rates = self.state.fetcher.fetch_rate_history(pair, start).await?;

        for rate in rates {
            if rate.date == today {
                continue;
            }

            // A duplicate day means the cache and store diverged; surface it.
            self.state.history.create(rate).await?;
        }

        Ok(())
    }

    fn arm_timer(&self) {
        let mut guard = self.timer.lock();
        if guard.is_some() || self.state.pairs.is_empty() {
            return;
        }

        let state = Arc::clone(&self.state);
        let interval = state.refresh_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately; the
            // subscription path already refreshed, so skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // Detach the cycle so disarming the timer never cancels an
                // in-flight refresh.
                let state = Arc::clone(&state);
                tokio::spawn(async move { state.refresh_all().await });
            }
        });
        *guard = Some(handle);
        debug!(interval = ?interval, "Armed exchange rate refresh timer");
    }

    fn disarm_timer(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
            debug!("Disarmed exchange rate refresh timer");
        }
    }
}

impl Drop for ExchangeRateDaemon {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl RateSource for ExchangeRateDaemon {
    async fn exchange_rate(
        &self,
        pair: &PairCodes,
        on: Option<NaiveDate>,
    ) -> FxResult<Option<ExchangeRate>> {
        self.get_exchange_rate(pair, on).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FxError;
    use crate::source::{InMemoryRateHistory, MockRateFetcher};
    use chrono::Duration as ChronoDuration;
    use driverpay_common::CurrencyCode;
    use rust_decimal_macros::dec;

    fn eth_eur() -> PairCodes {
        PairCodes::new(CurrencyCode::new("ETH"), CurrencyCode::new("EUR"))
    }

    fn btc_usd() -> PairCodes {
        PairCodes::new(CurrencyCode::new("BTC"), CurrencyCode::new("USD"))
    }

    fn setup() -> (Arc<MockRateFetcher>, Arc<InMemoryRateHistory>, ExchangeRateDaemon) {
        let fetcher = Arc::new(MockRateFetcher::new());
        let history = Arc::new(InMemoryRateHistory::new());
        let daemon = ExchangeRateDaemon::new(
            ExchangeRateDaemonConfig::default(),
            fetcher.clone(),
            history.clone(),
        );
        (fetcher, history, daemon)
    }

    #[tokio::test]
    async fn test_add_pair_is_idempotent() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.add_pair(eth_eur()).await;
        daemon.add_pair(eth_eur()).await;

        assert_eq!(daemon.subscribed_pairs().len(), 1);
        // Only the first add triggers an immediate refresh.
        assert_eq!(fetcher.current_calls(), 1);
    }

    #[tokio::test]
    async fn test_add_pair_populates_cache() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.add_pair(eth_eur()).await;

        let rate = daemon
            .get_exchange_rate(&eth_eur(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rate.rate, dec!(234));
    }

    #[tokio::test]
    async fn test_unfetched_pair_is_a_cache_miss() {
        let (_, _, daemon) = setup();

        let rate = daemon.get_exchange_rate(&eth_eur(), None).await.unwrap();
        assert!(rate.is_none());
    }

    #[tokio::test]
    async fn test_refresh_failure_is_isolated_per_pair() {
        let (fetcher, _, daemon) = setup();
        fetcher.fail_pair(&eth_eur());
        fetcher.set_rate(&btc_usd(), dec!(52000));

        daemon.add_pair(eth_eur()).await;
        daemon.add_pair(btc_usd()).await;
        daemon.refresh_all().await;

        assert!(daemon
            .get_exchange_rate(&eth_eur(), None)
            .await
            .unwrap()
            .is_none());
        assert_eq!(
            daemon
                .get_exchange_rate(&btc_usd(), None)
                .await
                .unwrap()
                .unwrap()
                .rate,
            dec!(52000)
        );
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_stale_entry() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));
        daemon.add_pair(eth_eur()).await;

        fetcher.fail_pair(&eth_eur());
        daemon.refresh_all().await;

        let rate = daemon
            .get_exchange_rate(&eth_eur(), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rate.rate, dec!(234));
    }

    #[tokio::test]
    async fn test_backfill_from_empty_history() {
        let (fetcher, history, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(230));

        let requested = today_utc() - ChronoDuration::days(5);
        let rate = daemon
            .get_exchange_rate(&eth_eur(), Some(requested))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rate.date, requested);
        // Fetch spans from the requested day through today.
        assert_eq!(fetcher.history_calls(), vec![(eth_eur(), requested)]);
        // Exactly the last 5 days are persisted; today's provisional value
        // is excluded.
        assert_eq!(history.len(), 5);
        assert!(history
            .get(&eth_eur(), today_utc())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_backfill_resumes_after_newest_stored_rate() {
        let (fetcher, history, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(230));

        // Store already covers a day after the requested one.
        let covered = today_utc() - ChronoDuration::days(2);
        history
            .create(ExchangeRate::new(eth_eur(), covered, dec!(228)))
            .await
            .unwrap();

        let requested = today_utc() - ChronoDuration::days(5);
        let result = daemon
            .get_exchange_rate(&eth_eur(), Some(requested))
            .await
            .unwrap();

        // Resumed from the day after the newest stored rate, so the
        // requested day is still unresolvable.
        assert!(result.is_none());
        assert_eq!(
            fetcher.history_calls(),
            vec![(eth_eur(), covered + ChronoDuration::days(1))]
        );
    }

    #[tokio::test]
    async fn test_backfill_skips_fetch_when_nothing_to_backfill() {
        let (fetcher, history, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(230));

        let yesterday = today_utc() - ChronoDuration::days(1);
        history
            .create(ExchangeRate::new(eth_eur(), yesterday, dec!(228)))
            .await
            .unwrap();

        let requested = today_utc() - ChronoDuration::days(3);
        let result = daemon
            .get_exchange_rate(&eth_eur(), Some(requested))
            .await
            .unwrap();

        // Start date computes to today: no fetch is needed.
        assert!(result.is_none());
        assert!(fetcher.history_calls().is_empty());
    }

    #[tokio::test]
    async fn test_stored_history_answers_without_fetch() {
        let (fetcher, history, daemon) = setup();

        let day = today_utc() - ChronoDuration::days(4);
        history
            .create(ExchangeRate::new(eth_eur(), day, dec!(229)))
            .await
            .unwrap();

        let rate = daemon
            .get_exchange_rate(&eth_eur(), Some(day))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rate.rate, dec!(229));
        assert!(fetcher.history_calls().is_empty());
    }

    #[tokio::test]
    async fn test_todays_date_uses_cache() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));
        daemon.add_pair(eth_eur()).await;

        let rate = daemon
            .get_exchange_rate(&eth_eur(), Some(today_utc()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(rate.rate, dec!(234));
        assert!(fetcher.history_calls().is_empty());
    }

    /// History store whose `newest` answer lags what it actually holds,
    /// so a backfill re-fetches a day that is already persisted.
    struct LaggingHistory {
        inner: InMemoryRateHistory,
    }

    #[async_trait]
    impl RateHistoryStore for LaggingHistory {
        async fn get(&self, pair: &PairCodes, day: NaiveDate) -> FxResult<Option<ExchangeRate>> {
            self.inner.get(pair, day).await
        }

        async fn newest(&self, _pair: &PairCodes) -> FxResult<Option<ExchangeRate>> {
            Ok(None)
        }

        async fn create(&self, rate: ExchangeRate) -> FxResult<ExchangeRate> {
            self.inner.create(rate).await
        }
    }

    #[tokio::test]
    async fn test_backfill_conflict_surfaces_store_divergence() {
        let fetcher = Arc::new(MockRateFetcher::new());
        let history = Arc::new(LaggingHistory {
            inner: InMemoryRateHistory::new(),
        });
        let daemon = ExchangeRateDaemon::new(
            ExchangeRateDaemonConfig::default(),
            fetcher.clone(),
            history.clone(),
        );
        fetcher.set_rate(&eth_eur(), dec!(230));

        // A day the backfill window will fetch again is already stored.
        let covered = today_utc() - ChronoDuration::days(2);
        history
            .inner
            .create(ExchangeRate::new(eth_eur(), covered, dec!(228)))
            .await
            .unwrap();

        let requested = today_utc() - ChronoDuration::days(5);
        let result = daemon.get_exchange_rate(&eth_eur(), Some(requested)).await;

        assert!(matches!(result, Err(FxError::DuplicateRate { .. })));
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_from_backfill() {
        let (fetcher, _, daemon) = setup();
        fetcher.fail_pair(&eth_eur());

        let requested = today_utc() - ChronoDuration::days(2);
        let result = daemon.get_exchange_rate(&eth_eur(), Some(requested)).await;

        assert!(matches!(result, Err(FxError::Fetch(_))));
    }

    #[tokio::test]
    async fn test_reset_clears_subscriptions_and_stops() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.start();
        daemon.add_pair(eth_eur()).await;
        daemon.reset();

        assert!(!daemon.is_running());
        assert!(daemon.subscribed_pairs().is_empty());

        let calls = fetcher.current_calls();
        daemon.refresh_all().await;
        assert_eq!(fetcher.current_calls(), calls);
    }

    #[tokio::test]
    async fn test_remove_pair_is_idempotent() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.add_pair(eth_eur()).await;
        daemon.remove_pair(&eth_eur());
        daemon.remove_pair(&eth_eur());

        assert!(daemon.subscribed_pairs().is_empty());
    }

    #[tokio::test]
    async fn test_stop_retains_cache() {
        let (fetcher, _, daemon) = setup();
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.start();
        daemon.add_pair(eth_eur()).await;
        daemon.stop();

        assert!(!daemon.is_running());
        let rate = daemon.get_exchange_rate(&eth_eur(), None).await.unwrap();
        assert!(rate.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_periodic_refresh() {
        let fetcher = Arc::new(MockRateFetcher::new());
        let history = Arc::new(InMemoryRateHistory::new());
        let daemon = ExchangeRateDaemon::new(
            ExchangeRateDaemonConfig {
                refresh_interval: Duration::from_secs(60),
            },
            fetcher.clone(),
            history,
        );
        fetcher.set_rate(&eth_eur(), dec!(234));

        daemon.start();
        daemon.add_pair(eth_eur()).await;
        assert_eq!(fetcher.current_calls(), 1);

        // One timer firing within 90 seconds.
        tokio::time::sleep(Duration::from_secs(90)).await;
        tokio::task::yield_now().await;
        assert_eq!(fetcher.current_calls(), 2);

        daemon.stop();
        tokio::time::sleep(Duration::from_secs(180)).await;
        tokio::task::yield_now().await;
        assert_eq!(fetcher.current_calls(), 2);
    }
}
