//! DriverPay FX Engine
//!
//! Exchange-rate management and currency conversion.
//!
//! # Features
//!
//! - Background refresh of current rates per subscribed currency pair
//! - On-demand historical-rate resolution with backfill
//! - Precision-correct base-unit and cross-currency conversion
//!   (half-to-even rounding, arbitrary-precision decimals)

pub mod convert;
pub mod daemon;
pub mod error;
pub mod source;

pub use convert::{
    convert_base_to_quote, convert_quote_to_base, to_base_units, to_standard_units,
    ConversionResult,
};
pub use daemon::{ExchangeRateDaemon, ExchangeRateDaemonConfig};
pub use error::{FxError, FxResult};
pub use source::{InMemoryRateHistory, RateFetchService, RateHistoryStore, RateSource};

#[cfg(any(test, feature = "test-utils"))]
pub use source::MockRateFetcher;
