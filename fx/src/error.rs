//! FX engine error types.

use chrono::NaiveDate;
use driverpay_common::PairCodes;
use thiserror::Error;

/// Errors that can occur in the FX engine.
#[derive(Debug, Error)]
pub enum FxError {
    /// No current or historical rate resolvable for the pair.
    #[error("Rate not available for {0}")]
    RateUnavailable(PairCodes),

    /// Persisted history already holds a rate for this (pair, day).
    /// Signals a cache/store divergence and is surfaced, never swallowed.
    #[error("Duplicate rate for {pair} on {date}")]
    DuplicateRate { pair: PairCodes, date: NaiveDate },

    /// The rate-fetch collaborator failed.
    #[error("Rate fetch failed: {0}")]
    Fetch(String),

    /// The rate-history store failed.
    #[error("Rate store error: {0}")]
    Store(String),
}

/// Result type for FX operations.
pub type FxResult<T> = Result<T, FxError>;
