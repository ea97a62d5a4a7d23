use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

/// Cryptographically secure random bytes (rand 0.8's `thread_rng` is backed
/// by ChaCha12 and reseeds from the OS, suitable for session ids, nonces, and
/// token material).
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// 128-bit unguessable identifier, lowercase hex — used for session ids and
/// bearer token material per spec.md's "unguessable 128-bit" requirement.
pub fn random_id_128() -> String {
    hex::encode(random_bytes(16))
}

/// A URL-safe opaque token (verification tokens, backup codes before
/// hashing). Length is in characters, not bytes.
pub fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_is_32_hex_chars() {
        let id = random_id_128();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn random_ids_are_distinct() {
        assert_ne!(random_id_128(), random_id_128());
    }
}
