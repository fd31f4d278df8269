//! Wallet signing keys using Ed25519.

use ed25519_dalek::{Signer, SigningKey as Ed25519SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{CryptoError, Result};

/// A managed wallet signing key.
pub struct WalletKey {
    inner: Ed25519SigningKey,
    address: String,
}

impl WalletKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        let inner = Ed25519SigningKey::generate(&mut csprng);
        let address = derive_address(&inner);
        Self { inner, address }
    }

    /// Restore a key from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidKey("Invalid key length".to_string()))?;

        let inner = Ed25519SigningKey::from_bytes(&bytes);
        let address = derive_address(&inner);
        Ok(Self { inner, address })
    }

    /// The on-chain address derived from the verifying key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.inner.sign(message);
        Signature {
            bytes: sig.to_bytes().to_vec(),
            algorithm: "Ed25519".to_string(),
        }
    }

    /// Get raw key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.inner.to_bytes()
    }
}

impl std::fmt::Debug for WalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret scalar.
        f.debug_struct("WalletKey")
            .field("address", &self.address)
            .finish()
    }
}

/// Address = `0x` + first 20 bytes of SHA-256 of the verifying key.
fn derive_address(key: &Ed25519SigningKey) -> String {
    let digest = Sha256::digest(key.verifying_key().as_bytes());
    format!("0x{}", hex::encode(&digest[..20]))
}

/// A detached signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub bytes: Vec<u8>,
    pub algorithm: String,
}
