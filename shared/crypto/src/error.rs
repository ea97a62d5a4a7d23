use thiserror::Error;

/// Error taxonomy for C4/C5 — deliberately coarse. A decrypt failure must
/// never reveal whether the nonce or the authentication tag was at fault, so
/// `Tampered` carries no further detail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("ciphertext failed authentication")]
    Tampered,
    #[error("key material has the wrong length")]
    InvalidKeyLength,
    #[error("malformed encoding: {0}")]
    Encoding(String),
    #[error("key management dependency unavailable")]
    KeyUnavailable,
}
