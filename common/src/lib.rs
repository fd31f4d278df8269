//! DriverPay Common Types
//!
//! This crate contains shared types used across the DriverPay engine:
//! the currency catalog, currency pairs, and exchange-rate value types.

pub mod currency;
pub mod rate;
pub mod time;

pub use currency::*;
pub use rate::*;
pub use time::*;
