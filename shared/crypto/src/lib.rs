//! Crypto primitives (C4): AEAD encrypt/decrypt, HMAC-SHA256, integrity
//! hashing, secure RNG, TOTP/HOTP, and base32 — the building blocks C5
//! (credential encryption), C6 (token hashing), C7 (MFA), and C8 (audit
//! chain) are built from.

pub mod aead;
pub mod base32;
pub mod error;
pub mod hash;
pub mod rng;
pub mod totp;

pub use aead::{decrypt, decrypt_field, encrypt, encrypt_field, DataKey};
pub use error::CryptoError;
pub use hash::{hmac_sha256_hex, sha256_hex, verify_hash};
pub use rng::{random_bytes, random_id_128, random_token};
pub use totp::{generate as totp_generate, provisioning_uri, verify as totp_verify};
