//! Field-level encryption for sensitive profile data
//!
//! Values are sealed with AES-256-GCM and stored as
//! `ENC:` + base64(nonce || ciphertext || tag). The 256-bit key is the
//! SHA-256 digest of the configured secret.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Prefix identifying encrypted values
pub const ENCRYPTED_PREFIX: &str = "ENC:";

const NONCE_LENGTH: usize = 12;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Value is not encrypted")]
    MissingPrefix,

    #[error("Encrypted value is not valid base64")]
    Encoding,

    #[error("Encrypted value is too short")]
    Truncated,

    #[error("Encryption failed")]
    Encrypt,

    #[error("Decryption failed (wrong key or corrupted data)")]
    Decrypt,
}

/// Symmetric cipher for individual column values
#[derive(Clone)]
pub struct FieldCipher {
    cipher: Aes256Gcm,
}

impl FieldCipher {
    pub fn from_secret(secret: &str) -> Self {
        let key = Sha256::digest(secret.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENCRYPTED_PREFIX, BASE64.encode(combined)))
    }

    pub fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        let encoded = value
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or(CryptoError::MissingPrefix)?;
        let combined = BASE64.decode(encoded).map_err(|_| CryptoError::Encoding)?;

        if combined.len() <= NONCE_LENGTH {
            return Err(CryptoError::Truncated);
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_LENGTH);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}
