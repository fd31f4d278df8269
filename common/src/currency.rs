//! Currency descriptors, pairs, and the currency catalog.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Uppercase currency code, e.g. `ETH` or `EUR`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a new currency code. Codes are normalized to uppercase.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CurrencyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Classification of a currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurrencyKind {
    Fiat,
    Crypto,
}

/// The smallest indivisible denomination of a currency (Cent, Wei, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseUnit {
    /// Denomination name, e.g. "Wei".
    pub name: String,
    /// Optional symbol, e.g. "¢".
    pub symbol: Option<String>,
}

impl BaseUnit {
    /// Create a new base unit description.
    pub fn new(name: impl Into<String>, symbol: Option<&str>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.map(str::to_string),
        }
    }
}

/// Highest supported `decimal_digits`: decimal arithmetic caps at this scale.
pub const MAX_DECIMAL_DIGITS: u32 = 28;

/// Immutable description of a currency.
///
/// `decimal_digits` is the power-of-ten scale factor between the base unit
/// and the standard unit and governs all rounding for the currency. It must
/// not exceed [`MAX_DECIMAL_DIGITS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDescriptor {
    pub code: CurrencyCode,
    pub display_name: String,
    pub symbol: String,
    pub kind: CurrencyKind,
    pub decimal_digits: u32,
    /// Absent when the currency has no base-unit subdivision.
    pub base_unit: Option<BaseUnit>,
}

impl CurrencyDescriptor {
    /// Describe a fiat currency.
    pub fn fiat(
        code: &str,
        display_name: &str,
        symbol: &str,
        decimal_digits: u32,
        base_unit: Option<BaseUnit>,
    ) -> Self {
        debug_assert!(
            decimal_digits <= MAX_DECIMAL_DIGITS,
            "decimal_digits exceeds the supported scale"
        );
        Self {
            code: CurrencyCode::new(code),
            display_name: display_name.to_string(),
            symbol: symbol.to_string(),
            kind: CurrencyKind::Fiat,
            decimal_digits,
            base_unit,
        }
    }

    /// Describe a crypto currency.
    pub fn crypto(
        code: &str,
        display_name: &str,
        symbol: &str,
        decimal_digits: u32,
        base_unit: Option<BaseUnit>,
    ) -> Self {
        debug_assert!(
            decimal_digits <= MAX_DECIMAL_DIGITS,
            "decimal_digits exceeds the supported scale"
        );
        Self {
            code: CurrencyCode::new(code),
            display_name: display_name.to_string(),
            symbol: symbol.to_string(),
            kind: CurrencyKind::Crypto,
            decimal_digits,
            base_unit,
        }
    }

    /// Euro (2 digits, Cent).
    pub fn eur() -> Self {
        Self::fiat("EUR", "Euro", "€", 2, Some(BaseUnit::new("Cent", Some("¢"))))
    }

    /// US Dollar (2 digits, Cent).
    pub fn usd() -> Self {
        Self::fiat("USD", "US Dollar", "$", 2, Some(BaseUnit::new("Cent", Some("¢"))))
    }

    /// Ether (18 digits, Wei).
    pub fn eth() -> Self {
        Self::crypto("ETH", "Ether", "Ξ", 18, Some(BaseUnit::new("Wei", None)))
    }

    /// Bitcoin (8 digits, Satoshi).
    pub fn btc() -> Self {
        Self::crypto("BTC", "Bitcoin", "₿", 8, Some(BaseUnit::new("Satoshi", None)))
    }
}

impl fmt::Display for CurrencyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)
    }
}

/// An ordered (base, quote) currency combination with full descriptors.
///
/// Equality is by code pair, not by descriptor identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: CurrencyDescriptor,
    pub quote: CurrencyDescriptor,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: CurrencyDescriptor, quote: CurrencyDescriptor) -> Self {
        Self { base, quote }
    }

    /// Derived pair name, e.g. `ETHEUR`.
    pub fn name(&self) -> String {
        format!("{}{}", self.base.code, self.quote.code)
    }

    /// Project down to the code-only pair used by exchange rates.
    pub fn codes(&self) -> PairCodes {
        PairCodes::new(self.base.code.clone(), self.quote.code.clone())
    }
}

impl PartialEq for CurrencyPair {
    fn eq(&self, other: &Self) -> bool {
        self.base.code == other.base.code && self.quote.code == other.quote.code
    }
}

impl Eq for CurrencyPair {}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base.code, self.quote.code)
    }
}

/// A currency pair reduced to its codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairCodes {
    pub base: CurrencyCode,
    pub quote: CurrencyCode,
}

impl PairCodes {
    /// Create a new code pair.
    pub fn new(base: CurrencyCode, quote: CurrencyCode) -> Self {
        Self { base, quote }
    }

    /// Derived pair name, e.g. `ETHEUR`.
    pub fn name(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for PairCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}

/// Registry of known currencies.
///
/// Descriptors are registered once at construction and never mutated.
/// `list` yields descriptors in registration order.
#[derive(Debug, Clone, Default)]
pub struct CurrencyCatalog {
    descriptors: Vec<CurrencyDescriptor>,
}

impl CurrencyCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the standard platform currencies.
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        catalog.register(CurrencyDescriptor::eur());
        catalog.register(CurrencyDescriptor::usd());
        catalog.register(CurrencyDescriptor::eth());
        catalog.register(CurrencyDescriptor::btc());
        catalog
    }

    /// Register a descriptor. Replaces nothing; a duplicate code is ignored.
    pub fn register(&mut self, descriptor: CurrencyDescriptor) {
        if self.lookup(&descriptor.code).is_none() {
            self.descriptors.push(descriptor);
        }
    }

    /// Look up a currency by code.
    pub fn lookup(&self, code: &CurrencyCode) -> Option<&CurrencyDescriptor> {
        self.descriptors.iter().find(|d| &d.code == code)
    }

    /// All currencies of a kind, in registration order.
    pub fn list(&self, kind: CurrencyKind) -> impl Iterator<Item = &CurrencyDescriptor> {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    /// Resolve a currency pair from two codes.
    pub fn pair(&self, base: &CurrencyCode, quote: &CurrencyCode) -> Option<CurrencyPair> {
        let base = self.lookup(base)?.clone();
        let quote = self.lookup(quote)?.clone();
        Some(CurrencyPair::new(base, quote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_currency() {
        let catalog = CurrencyCatalog::standard();

        let eth = catalog.lookup(&CurrencyCode::new("eth")).unwrap();
        assert_eq!(eth.code.as_str(), "ETH");
        assert_eq!(eth.decimal_digits, 18);
        assert_eq!(eth.base_unit.as_ref().unwrap().name, "Wei");
        assert_eq!(eth.kind, CurrencyKind::Crypto);
    }

    #[test]
    fn test_lookup_unknown_currency() {
        let catalog = CurrencyCatalog::standard();
        assert!(catalog.lookup(&CurrencyCode::new("XYZ")).is_none());
    }

    #[test]
    fn test_list_preserves_registration_order() {
        let catalog = CurrencyCatalog::standard();

        let fiat: Vec<&str> = catalog
            .list(CurrencyKind::Fiat)
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(fiat, vec!["EUR", "USD"]);

        let crypto: Vec<&str> = catalog
            .list(CurrencyKind::Crypto)
            .map(|d| d.code.as_str())
            .collect();
        assert_eq!(crypto, vec!["ETH", "BTC"]);
    }

    #[test]
    fn test_duplicate_registration_ignored() {
        let mut catalog = CurrencyCatalog::standard();
        catalog.register(CurrencyDescriptor::eur());

        assert_eq!(catalog.list(CurrencyKind::Fiat).count(), 2);
    }

    #[test]
    fn test_pair_equality_by_codes() {
        let catalog = CurrencyCatalog::standard();
        let a = catalog
            .pair(&CurrencyCode::new("ETH"), &CurrencyCode::new("EUR"))
            .unwrap();
        let b = CurrencyPair::new(CurrencyDescriptor::eth(), CurrencyDescriptor::eur());

        assert_eq!(a, b);
        assert_eq!(a.name(), "ETHEUR");
        assert_eq!(a.codes().name(), "ETHEUR");
    }

    #[test]
    #[should_panic(expected = "decimal_digits exceeds the supported scale")]
    fn test_excessive_decimal_digits_rejected() {
        CurrencyDescriptor::crypto(
            "BIG",
            "Big",
            "B",
            MAX_DECIMAL_DIGITS + 1,
            Some(BaseUnit::new("Dust", None)),
        );
    }

    #[test]
    fn test_pair_unknown_code() {
        let catalog = CurrencyCatalog::standard();
        assert!(catalog
            .pair(&CurrencyCode::new("ETH"), &CurrencyCode::new("XYZ"))
            .is_none());
    }
}
