//! AES-256-GCM authenticated encryption (C4/C5). Output layout is
//! `nonce(12) || ciphertext || tag(16)`, base64-encoded — `aes-gcm` appends
//! the tag to the ciphertext itself, so only the nonce needs prepending.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;

use crate::error::CryptoError;

const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;

/// A 256-bit symmetric key. Implements neither `Debug` nor `Display` output of
/// its bytes so accidental logging fails to compile rather than leaking
/// material; callers needing to move it around use `as_bytes`/`from_bytes`.
#[derive(Clone)]
pub struct DataKey(pub [u8; KEY_LEN]);

impl DataKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for DataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DataKey(REDACTED)")
    }
}

pub fn encrypt(key: &DataKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::Tampered)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(out))
}

pub fn decrypt(key: &DataKey, encoded: &str) -> Result<Vec<u8>, CryptoError> {
    let raw = BASE64
        .decode(encoded)
        .map_err(|_| CryptoError::Encoding("invalid base64".into()))?;

    if raw.len() < NONCE_LEN {
        return Err(CryptoError::Tampered);
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0));
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::Tampered)
}

/// Pass-through helpers for optional fields (`encryptField`/`decryptField`):
/// `None` in, `None` out, identical semantics otherwise.
pub fn encrypt_field(key: &DataKey, value: Option<&str>) -> Result<Option<String>, CryptoError> {
    match value {
        None => Ok(None),
        Some(v) => Ok(Some(encrypt(key, v.as_bytes())?)),
    }
}

pub fn decrypt_field(key: &DataKey, value: Option<&str>) -> Result<Option<String>, CryptoError> {
    match value {
        None => Ok(None),
        Some(v) => {
            let bytes = decrypt(key, v)?;
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| CryptoError::Tampered)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_identity() {
        let key = DataKey::generate();
        let ciphertext = encrypt(&key, b"top secret plaintext").unwrap();
        let recovered = decrypt(&key, &ciphertext).unwrap();
        assert_eq!(recovered, b"top secret plaintext");
    }

    #[test]
    fn single_bit_mutation_is_tampered() {
        let key = DataKey::generate();
        let ciphertext = encrypt(&key, b"top secret plaintext").unwrap();
        let mut raw = BASE64.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let mutated = BASE64.encode(raw);

        assert_eq!(decrypt(&key, &mutated), Err(CryptoError::Tampered));
    }

    #[test]
    fn wrong_key_is_tampered() {
        let key = DataKey::generate();
        let other = DataKey::generate();
        let ciphertext = encrypt(&key, b"payload").unwrap();
        assert_eq!(decrypt(&other, &ciphertext), Err(CryptoError::Tampered));
    }

    #[test]
    fn field_helpers_pass_through_none() {
        let key = DataKey::generate();
        assert_eq!(encrypt_field(&key, None).unwrap(), None);
        assert_eq!(decrypt_field(&key, None).unwrap(), None);
    }
}
