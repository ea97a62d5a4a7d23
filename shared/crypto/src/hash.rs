use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

/// Deterministic lowercase-hex SHA-256 digest, used both for integrity-only
/// hashing (C4 `generateHash`) and as the audit chain's link function (C8).
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    hex::encode(digest)
}

/// Timing-safe comparison between a computed hash and an expected one
/// (`verifyHash`). Both are hex strings; comparison is over the raw bytes,
/// not the hex text, so differing case never causes a false negative.
pub fn verify_hash(data: &[u8], expected_hex: &str) -> bool {
    let actual = sha256_hex(data);
    constant_time_eq(actual.as_bytes(), expected_hex.to_ascii_lowercase().as_bytes())
}

/// HMAC-SHA256 over `data` keyed by `key`, returned as lowercase hex. Used for
/// token hashing (refresh/verification tokens are stored by hash, never
/// plaintext) and as a generic MAC primitive.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}
