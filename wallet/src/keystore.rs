//! Managed key custody.

use driverpay_crypto::{keys::WalletKey, vault, CryptoError};
use thiserror::Error;

use crate::gateway::{SignedTransaction, UnsignedTransaction};

/// Errors from a managed key store.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Password mismatch or corrupt key material.
    #[error("Decryption failed")]
    Decryption,

    #[error("Key store failure: {0}")]
    Other(String),
}

/// A decrypted managed key, held only for the duration of one operation.
pub struct ManagedKey {
    key: WalletKey,
}

impl ManagedKey {
    /// The address controlled by this key.
    pub fn address(&self) -> &str {
        self.key.address()
    }
}

impl std::fmt::Debug for ManagedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedKey")
            .field("address", &self.address())
            .finish()
    }
}

/// Generates, encrypts, decrypts and signs with managed keys.
///
/// CPU-bound; modeled as blocking calls.
pub trait ManagedKeyStore: Send + Sync {
    /// Generate a fresh key pair.
    fn generate_key(&self) -> Result<ManagedKey, KeyStoreError>;

    /// Encrypt a key under a password, yielding storable ciphertext.
    fn encrypt(&self, key: &ManagedKey, password: &str) -> Result<String, KeyStoreError>;

    /// Decrypt stored ciphertext. Fails with [`KeyStoreError::Decryption`]
    /// on password mismatch or corrupt material.
    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<ManagedKey, KeyStoreError>;

    /// Sign an unsigned transaction.
    fn sign(
        &self,
        key: &ManagedKey,
        transaction: &UnsignedTransaction,
    ) -> Result<SignedTransaction, KeyStoreError>;
}

/// Key store backed by in-process cryptography: Ed25519 keys sealed with
/// password-derived AES-256-GCM.
#[derive(Debug, Default)]
pub struct SoftwareKeyStore;

impl SoftwareKeyStore {
    /// Create a new software key store.
    pub fn new() -> Self {
        Self
    }
}

impl ManagedKeyStore for SoftwareKeyStore {
    fn generate_key(&self) -> Result<ManagedKey, KeyStoreError> {
        Ok(ManagedKey {
            key: WalletKey::generate(),
        })
    }

    fn encrypt(&self, key: &ManagedKey, password: &str) -> Result<String, KeyStoreError> {
        let sealed = vault::seal(&key.key.to_bytes(), password)
            .map_err(|e| KeyStoreError::Other(e.to_string()))?;
        sealed
            .encode()
            .map_err(|e| KeyStoreError::Other(e.to_string()))
    }

    fn decrypt(&self, ciphertext: &str, password: &str) -> Result<ManagedKey, KeyStoreError> {
        let sealed = vault::SealedKey::decode(ciphertext).map_err(map_decrypt_error)?;
        let secret = vault::open(&sealed, password).map_err(map_decrypt_error)?;
        let key = WalletKey::from_bytes(&secret).map_err(map_decrypt_error)?;

        Ok(ManagedKey { key })
    }

    fn sign(
        &self,
        key: &ManagedKey,
        transaction: &UnsignedTransaction,
    ) -> Result<SignedTransaction, KeyStoreError> {
        let signature = key.key.sign(&transaction.signing_bytes());

        Ok(SignedTransaction {
            payload: transaction.signing_bytes(),
            signature: signature.bytes,
        })
    }
}

fn map_decrypt_error(_: CryptoError) -> KeyStoreError {
    KeyStoreError::Decryption
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn unsigned() -> UnsignedTransaction {
        UnsignedTransaction {
            sender: "0xaaa".to_string(),
            to: "0xbbb".to_string(),
            value: dec!(1000),
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_generate_encrypt_decrypt_round_trip() {
        let store = SoftwareKeyStore::new();

        let key = store.generate_key().unwrap();
        let ciphertext = store.encrypt(&key, "hunter2").unwrap();
        let recovered = store.decrypt(&ciphertext, "hunter2").unwrap();

        assert_eq!(key.address(), recovered.address());
    }

    #[test]
    fn test_wrong_password_is_a_decryption_error() {
        let store = SoftwareKeyStore::new();
        let key = store.generate_key().unwrap();
        let ciphertext = store.encrypt(&key, "correct").unwrap();

        let result = store.decrypt(&ciphertext, "wrong");

        assert!(matches!(result, Err(KeyStoreError::Decryption)));
    }

    #[test]
    fn test_corrupt_material_is_a_decryption_error() {
        let store = SoftwareKeyStore::new();

        let result = store.decrypt("not a sealed key", "pw");

        assert!(matches!(result, Err(KeyStoreError::Decryption)));
    }

    #[test]
    fn test_sign_produces_signature_over_transaction() {
        let store = SoftwareKeyStore::new();
        let key = store.generate_key().unwrap();

        let signed = store.sign(&key, &unsigned()).unwrap();

        assert_eq!(signed.payload, unsigned().signing_bytes());
        assert!(!signed.signature.is_empty());
    }
}
