//! DriverPay Cryptographic Primitives
//!
//! Key generation and signing for managed wallets, plus password-based
//! sealing of key material at rest.

pub mod keys;
pub mod vault;

pub use keys::{Signature, WalletKey};
pub use vault::{open, seal, SealedKey};

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
