//! Exchange-rate value type.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::currency::PairCodes;

/// An exchange rate for one calendar day.
///
/// `rate` expresses 1 unit of the base currency in units of the quote
/// currency and must be positive. Persisted history holds at most one rate
/// per (pair, day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub pair: PairCodes,
    pub date: NaiveDate,
    pub rate: Decimal,
}

impl ExchangeRate {
    /// Create a new exchange rate.
    pub fn new(pair: PairCodes, date: NaiveDate, rate: Decimal) -> Self {
        debug_assert!(rate > Decimal::ZERO, "exchange rate must be positive");
        Self { pair, date, rate }
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} ({})", self.pair, self.rate, self.date)
    }
}
