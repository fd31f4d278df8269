//! Password-based sealing of key material using AES-256-GCM.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{CryptoError, Result};

const ALGORITHM: &str = "AES-256-GCM";
const KDF_INFO: &[u8] = b"driverpay-wallet-key";

/// Sealed key material with the metadata needed to open it again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedKey {
    /// Algorithm identifier.
    pub algorithm: String,
    /// HKDF salt (16 bytes).
    pub salt: Vec<u8>,
    /// Nonce (12 bytes for AES-GCM).
    pub nonce: Vec<u8>,
    /// Ciphertext.
    pub ciphertext: Vec<u8>,
}

impl SealedKey {
    /// Encode as a storable string.
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
    }

    /// Decode from a stored string.
    pub fn decode(encoded: &str) -> Result<Self> {
        serde_json::from_str(encoded).map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
    }
}

/// Seal secret bytes under a password.
pub fn seal(secret: &[u8], password: &str) -> Result<SealedKey> {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let mut nonce_bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, secret)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedKey {
        algorithm: ALGORITHM.to_string(),
        salt: salt.to_vec(),
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Open sealed key material with a password.
pub fn open(sealed: &SealedKey, password: &str) -> Result<Vec<u8>> {
    if sealed.algorithm != ALGORITHM {
        return Err(CryptoError::DecryptionFailed(format!(
            "Unsupported algorithm: {}",
            sealed.algorithm
        )));
    }

    let key = derive_key(password, &sealed.salt)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let nonce_bytes: [u8; 12] = sealed
        .nonce
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::DecryptionFailed("Invalid nonce length".to_string()))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    cipher
        .decrypt(nonce, sealed.ciphertext.as_slice())
        .map_err(|_| CryptoError::DecryptionFailed("Decryption failed".to_string()))
}

/// Derive a 32-byte encryption key from a password using HKDF-SHA256.
fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    use hkdf::Hkdf;
    use sha2::Sha256;

    let hk = Hkdf::<Sha256>::new(Some(salt), password.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(KDF_INFO, &mut key)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open() {
        let secret = b"wallet signing key bytes";

        let sealed = seal(secret, "hunter2").unwrap();
        let opened = open(&sealed, "hunter2").unwrap();

        assert_eq!(opened, secret);
    }

    #[test]
    fn test_wrong_password() {
        let sealed = seal(b"secret", "correct").unwrap();
        assert!(open(&sealed, "incorrect").is_err());
    }

    #[test]
    fn test_distinct_salts_and_nonces() {
        let sealed1 = seal(b"same secret", "pw").unwrap();
        let sealed2 = seal(b"same secret", "pw").unwrap();

        assert_ne!(sealed1.salt, sealed2.salt);
        assert_ne!(sealed1.nonce, sealed2.nonce);
        assert_ne!(sealed1.ciphertext, sealed2.ciphertext);
    }

    #[test]
    fn test_encode_decode() {
        let sealed = seal(b"secret", "pw").unwrap();
        let encoded = sealed.encode().unwrap();
        let decoded = SealedKey::decode(&encoded).unwrap();

        assert_eq!(open(&decoded, "pw").unwrap(), b"secret");
    }

    #[test]
    fn test_tampered_ciphertext() {
        let mut sealed = seal(b"secret", "pw").unwrap();
        sealed.ciphertext[0] ^= 0xff;

        assert!(open(&sealed, "pw").is_err());
    }
}
