use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use uuid::Uuid;

/// The two kinds of bearer credential this core issues (spec.md §3 "Token
/// pair"). Kept as a closed enum rather than a free string so a caller can
/// never typo `"access"`/`"refresh"` past the type system.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Signed token envelope (C6). HMAC-SHA256 keyed by configuration; the `kid`
/// field exists so a future key rotation has somewhere to record which key
/// signed a given token, even though rotation itself is out of scope
/// (spec.md §4.4).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject: user id, or service identity for service-API-key tokens.
    pub sub: Uuid,
    pub tenant_id: Uuid,
    pub role: String,
    pub kind: TokenKind,

    /// Issued-at / expiry, Unix seconds.
    pub iat: i64,
    pub exp: i64,

    /// Unique token id — the revocation set's key.
    pub jti: String,

    /// SHA-256 of the device fingerprint the token was issued for.
    pub device_fingerprint_hash: String,

    /// Identifies which signing key produced this token.
    pub kid: String,
}

impl Claims {
    pub fn new(
        kind: TokenKind,
        user_id: Uuid,
        tenant_id: Uuid,
        role: String,
        device_fingerprint_hash: String,
        kid: String,
        ttl_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id,
            tenant_id,
            role,
            kind,
            iat: now,
            exp: now + ttl_seconds,
            jti: shared_crypto_jti(),
            device_fingerprint_hash,
            kid,
        }
    }
}

/// `jti` generation lives here (not in `shared_crypto`) to avoid a circular
/// dependency between the two crates; it is a thin wrapper so call sites
/// never generate ids ad hoc.
fn shared_crypto_jti() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn encode_jwt(claims: &Claims, secret: &str) -> Result<String, AppError> {
    let key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| AppError::Internal(format!("failed to encode jwt: {}", e)))
}

/// Decode and validate signature + expiry (±30s clock skew). Does not check
/// revocation or device-fingerprint binding — those are the token service's
/// (C6) responsibility, since they require access to the revocation set and
/// the caller's current fingerprint respectively.
pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 30;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
            _ => AppError::TokenMalformed,
        })
}
