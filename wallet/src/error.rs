//! Wallet domain error taxonomy.

use driverpay_common::CurrencyCode;
use driverpay_fx::FxError;
use thiserror::Error;

/// Errors surfaced by wallet operations.
///
/// Everything here is a domain error for the boundary layer to map to a
/// user-facing response. Collaborator I/O failures are wrapped with a
/// message only; cryptographic failure detail is never carried.
#[derive(Debug, Error)]
pub enum WalletError {
    /// The driver has no wallet, or the referenced wallet row is absent.
    #[error("Wallet not found")]
    WalletNotFound,

    /// A password is required to create a managed wallet.
    #[error("Password required")]
    PasswordRequired,

    /// The address is already claimed by a different wallet.
    #[error("Address already occupied")]
    AddressOccupied,

    /// The system never signs on behalf of externally-held keys.
    #[error("Cannot transfer funds from an external wallet")]
    ExternalWalletTransfer,

    /// On-chain balance does not cover the transaction value plus fee.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// The receiver address equals the wallet's own address.
    #[error("Cannot transfer funds to the wallet's own address")]
    TransferToSelf,

    /// The wallet has no effective address in its current mode.
    #[error("Wallet has no address")]
    MissingAddress,

    /// A managed wallet row is missing its encrypted key material.
    #[error("Managed wallet key material is missing")]
    MissingKeyMaterial,

    /// Key decryption failed. Deliberately detail-free: raw cryptographic
    /// errors are logged internally, never exposed.
    #[error("Wallet decryption failed")]
    WalletDecryptionFailed,

    /// Malformed blockchain address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Currency code unknown to the catalog.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(CurrencyCode),

    /// Transfer requests must name the wallet's base or quote currency.
    #[error("Currency {0} is not accepted by this wallet")]
    UnsupportedTransferCurrency(CurrencyCode),

    /// Transfer amounts must be positive.
    #[error("Amount must be positive")]
    NonPositiveAmount,

    /// Rate resolution or conversion failed.
    #[error(transparent)]
    Rate(#[from] FxError),

    /// Wallet/driver store failure.
    #[error("Store error: {0}")]
    Store(String),

    /// Blockchain gateway failure.
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Key store failure other than decryption.
    #[error("Key store error: {0}")]
    KeyStore(String),
}

/// Result type for wallet operations.
pub type WalletResult<T> = Result<T, WalletError>;
