//! Rate collaborator traits and implementations.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use driverpay_common::{ExchangeRate, PairCodes};

use crate::error::{FxError, FxResult};

/// Fetches market rates from an external exchange.
#[async_trait]
pub trait RateFetchService: Send + Sync {
    /// Fetch the current rate for a currency pair.
    async fn fetch_current_rate(&self, pair: &PairCodes) -> FxResult<ExchangeRate>;

    /// Fetch the daily rate history for a pair, one entry per calendar day
    /// from `since` through today (inclusive).
    async fn fetch_rate_history(
        &self,
        pair: &PairCodes,
        since: NaiveDate,
    ) -> FxResult<Vec<ExchangeRate>>;
}

/// Persisted per-day rate history. At most one rate per (pair, day).
#[async_trait]
pub trait RateHistoryStore: Send + Sync {
    /// Exact (pair, day) match.
    async fn get(&self, pair: &PairCodes, day: NaiveDate) -> FxResult<Option<ExchangeRate>>;

    /// The most recent stored rate for a pair.
    async fn newest(&self, pair: &PairCodes) -> FxResult<Option<ExchangeRate>>;

    /// Persist a rate. Fails with [`FxError::DuplicateRate`] if the
    /// (pair, day) slot is already taken.
    async fn create(&self, rate: ExchangeRate) -> FxResult<ExchangeRate>;
}

/// Resolves rates for conversions: the current rate when `on` is absent,
/// the historical rate otherwise. `None` means no rate is resolvable.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn exchange_rate(
        &self,
        pair: &PairCodes,
        on: Option<NaiveDate>,
    ) -> FxResult<Option<ExchangeRate>>;
}

/// Thread-safe in-memory rate history.
#[derive(Default)]
pub struct InMemoryRateHistory {
    rates: DashMap<(String, NaiveDate), ExchangeRate>,
}

impl InMemoryRateHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rates.
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Check if the history is empty.
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

#[async_trait]
impl RateHistoryStore for InMemoryRateHistory {
    async fn get(&self, pair: &PairCodes, day: NaiveDate) -> FxResult<Option<ExchangeRate>> {
        Ok(self
            .rates
            .get(&(pair.name(), day))
            .map(|entry| entry.clone()))
    }

    async fn newest(&self, pair: &PairCodes) -> FxResult<Option<ExchangeRate>> {
        let name = pair.name();
        Ok(self
            .rates
            .iter()
            .filter(|entry| entry.key().0 == name)
            .max_by_key(|entry| entry.key().1)
            .map(|entry| entry.value().clone()))
    }

    async fn create(&self, rate: ExchangeRate) -> FxResult<ExchangeRate> {
        let key = (rate.pair.name(), rate.date);

        if self.rates.contains_key(&key) {
            return Err(FxError::DuplicateRate {
                pair: rate.pair,
                date: rate.date,
            });
        }

        self.rates.insert(key, rate.clone());
        Ok(rate)
    }
}

/// Mock rate fetcher for testing.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockRateFetcher {
    rates: DashMap<String, rust_decimal::Decimal>,
    failing: DashMap<String, ()>,
    current_calls: std::sync::atomic::AtomicUsize,
    history_calls: parking_lot::Mutex<Vec<(PairCodes, NaiveDate)>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockRateFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self {
            rates: DashMap::new(),
            failing: DashMap::new(),
            current_calls: std::sync::atomic::AtomicUsize::new(0),
            history_calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set the rate returned for a pair.
    pub fn set_rate(&self, pair: &PairCodes, rate: rust_decimal::Decimal) {
        self.failing.remove(&pair.name());
        self.rates.insert(pair.name(), rate);
    }

    /// Make fetches for a pair fail.
    pub fn fail_pair(&self, pair: &PairCodes) {
        self.failing.insert(pair.name(), ());
    }

    /// Number of current-rate fetches issued.
    pub fn current_calls(&self) -> usize {
        self.current_calls.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// History fetches issued, as (pair, since) tuples.
    pub fn history_calls(&self) -> Vec<(PairCodes, NaiveDate)> {
        self.history_calls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockRateFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl RateFetchService for MockRateFetcher {
    async fn fetch_current_rate(&self, pair: &PairCodes) -> FxResult<ExchangeRate> {
        self.current_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        if self.failing.contains_key(&pair.name()) {
            return Err(FxError::Fetch(format!("injected failure for {pair}")));
        }

        let rate = self
            .rates
            .get(&pair.name())
            .map(|r| *r)
            .ok_or_else(|| FxError::RateUnavailable(pair.clone()))?;

        Ok(ExchangeRate::new(
            pair.clone(),
            driverpay_common::today_utc(),
            rate,
        ))
    }

    async fn fetch_rate_history(
        &self,
        pair: &PairCodes,
        since: NaiveDate,
    ) -> FxResult<Vec<ExchangeRate>> {
        self.history_calls.lock().push((pair.clone(), since));

        if self.failing.contains_key(&pair.name()) {
            return Err(FxError::Fetch(format!("injected failure for {pair}")));
        }

        let rate = self
            .rates
            .get(&pair.name())
            .map(|r| *r)
            .ok_or_else(|| FxError::RateUnavailable(pair.clone()))?;

        let today = driverpay_common::today_utc();
        let mut day = since;
        let mut rates = Vec::new();
        while day <= today {
            rates.push(ExchangeRate::new(pair.clone(), day, rate));
            day = day.succ_opt().expect("calendar overflow");
        }

        Ok(rates)
    }
}
