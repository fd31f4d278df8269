//! Currency conversion engine.
//!
//! All amounts are arbitrary-precision decimals and every rounding step uses
//! half-to-even (banker's rounding) to avoid cumulative bias under repeated
//! conversion.

use chrono::NaiveDate;
use driverpay_common::{CurrencyDescriptor, CurrencyPair, ExchangeRate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{FxError, FxResult};
use crate::source::RateSource;

/// A conversion outcome. Always carries the rate that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub amount: Decimal,
    pub rate: ExchangeRate,
}

/// Convert a base-unit amount (Wei, Cent, ...) to standard units.
///
/// Identity when the currency has no base-unit subdivision.
pub fn to_standard_units(base_unit_amount: Decimal, currency: &CurrencyDescriptor) -> Decimal {
    if currency.base_unit.is_none() {
        return base_unit_amount;
    }

    (base_unit_amount / scale_factor(currency.decimal_digits)).round_dp_with_strategy(
        currency.decimal_digits,
        RoundingStrategy::MidpointNearestEven,
    )
}

/// Convert a standard-unit amount to base units. Base units are integral.
pub fn to_base_units(standard_unit_amount: Decimal, currency: &CurrencyDescriptor) -> Decimal {
    if currency.base_unit.is_none() {
        return standard_unit_amount;
    }

    (standard_unit_amount * scale_factor(currency.decimal_digits))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

/// Convert a standard-unit base-currency amount to the quote currency.
///
/// The rate is resolved through `source` (current when `on` is absent,
/// historical otherwise). The result is rounded to the quote currency's
/// decimal digits.
#[instrument(skip(source), fields(pair = %pair))]
pub async fn convert_base_to_quote(
    standard_unit_base_amount: Decimal,
    pair: &CurrencyPair,
    source: &dyn RateSource,
    on: Option<NaiveDate>,
) -> FxResult<ConversionResult> {
    let rate = resolve_rate(pair, source, on).await?;

    let amount = (standard_unit_base_amount * rate.rate).round_dp_with_strategy(
        pair.quote.decimal_digits,
        RoundingStrategy::MidpointNearestEven,
    );

    Ok(ConversionResult { amount, rate })
}

/// Convert a standard-unit quote-currency amount to the base currency.
///
/// Same rate resolution as [`convert_base_to_quote`]; the result is rounded
/// to the base currency's decimal digits.
#[instrument(skip(source), fields(pair = %pair))]
pub async fn convert_quote_to_base(
    standard_unit_quote_amount: Decimal,
    pair: &CurrencyPair,
    source: &dyn RateSource,
    on: Option<NaiveDate>,
) -> FxResult<ConversionResult> {
    let rate = resolve_rate(pair, source, on).await?;

    let amount = (standard_unit_quote_amount / rate.rate).round_dp_with_strategy(
        pair.base.decimal_digits,
        RoundingStrategy::MidpointNearestEven,
    );

    Ok(ConversionResult { amount, rate })
}

async fn resolve_rate(
    pair: &CurrencyPair,
    source: &dyn RateSource,
    on: Option<NaiveDate>,
) -> FxResult<ExchangeRate> {
    let codes = pair.codes();
    let rate = source
        .exchange_rate(&codes, on)
        .await?
        .ok_or_else(|| FxError::RateUnavailable(codes.clone()))?;

    // A non-positive rate is unusable for conversion in either direction.
    if rate.rate <= Decimal::ZERO {
        return Err(FxError::RateUnavailable(codes));
    }

    Ok(rate)
}

fn scale_factor(decimal_digits: u32) -> Decimal {
    // decimal_digits <= MAX_DECIMAL_DIGITS, enforced at descriptor
    // construction, so the pow cannot overflow.
    Decimal::from_i128_with_scale(10i128.pow(decimal_digits), 0)
}
