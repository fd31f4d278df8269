//! Wallet and driver value types.

use driverpay_common::CurrencyCode;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a wallet row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(Uuid);

impl WalletId {
    /// Create a new wallet ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WalletId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DriverId(Uuid);

impl DriverId {
    /// Create a new driver ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DriverId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A driver-held wallet row.
///
/// Invariant: a managed wallet always carries encrypted key material, and
/// an address claimed by one wallet may not be claimed by another (enforced
/// by the coordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    /// True when this system custodies the signing key.
    pub is_managed: bool,
    pub base_currency: CurrencyCode,
    pub quote_currency: CurrencyCode,
    pub network_id: String,
    /// Address linked by the driver, for external wallets.
    pub external_address: Option<String>,
    /// Address of the generated managed key, kept across mode switches.
    pub managed_address: Option<String>,
    /// Encrypted key material; present whenever `managed_address` is.
    pub managed_encrypted_key: Option<String>,
}

impl Wallet {
    /// New wallet row with neither mode linked yet.
    pub fn new(base_currency: CurrencyCode, quote_currency: CurrencyCode, network_id: &str) -> Self {
        Self {
            id: WalletId::new(),
            is_managed: false,
            base_currency,
            quote_currency,
            network_id: network_id.to_string(),
            external_address: None,
            managed_address: None,
            managed_encrypted_key: None,
        }
    }

    /// The wallet's effective address given its current mode.
    pub fn address(&self) -> Option<&str> {
        if self.is_managed {
            self.managed_address.as_deref()
        } else {
            self.external_address.as_deref()
        }
    }

    /// Whether a managed key was ever generated for this wallet. Derived
    /// from the managed address, not from the current mode.
    pub fn has_created_managed_wallet(&self) -> bool {
        self.managed_address.is_some()
    }
}

/// Request to create or update a driver's wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrUpdateWalletRequest {
    pub quote_currency: CurrencyCode,
    /// External address to link; absent to use a managed wallet.
    pub address: Option<String>,
    /// Password for encrypting a newly generated managed key.
    pub password: Option<String>,
}

/// Result of a create-or-update operation. `created` reports whether a new
/// row was created, not whether the managed/external mode changed.
#[derive(Debug, Clone)]
pub struct WalletUpsert {
    pub created: bool,
    pub wallet: Wallet,
}

/// A validated fund-transfer request. Amounts are standard units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    pub password: String,
    pub receiver_address: String,
    pub amount: Decimal,
    pub currency: CurrencyCode,
}

/// A driver record, holding at most one wallet reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub wallet_id: Option<WalletId>,
}

impl Driver {
    /// New driver without a wallet.
    pub fn new() -> Self {
        Self {
            id: DriverId::new(),
            wallet_id: None,
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
