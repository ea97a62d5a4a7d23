//! Token service (C6, spec.md §4.4): issuance, verification, refresh, and
//! revocation of the access/refresh token pair.

use async_trait::async_trait;
use uuid::Uuid;

use shared_error::AppError;
use shared_jwt::{decode_jwt, encode_jwt, Claims, TokenKind};

use super::errors::TokenError;
use super::repository::RevocationStore;

pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
        device_fingerprint: &str,
    ) -> Result<TokenPair, AppError>;

    async fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError>;

    async fn refresh(&self, refresh_token: &str, current_device_fingerprint: &str) -> Result<TokenPair, AppError>;

    async fn revoke(&self, token: &str) -> Result<(), AppError>;
}

pub struct TokenServiceImpl<V: RevocationStore> {
    revocation: std::sync::Arc<V>,
    secret: String,
    kid: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl<V: RevocationStore> TokenServiceImpl<V> {
    pub fn new(
        revocation: std::sync::Arc<V>,
        secret: impl Into<String>,
        kid: impl Into<String>,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
    ) -> Self {
        Self {
            revocation,
            secret: secret.into(),
            kid: kid.into(),
            access_ttl_seconds,
            refresh_ttl_seconds,
        }
    }

    fn fingerprint_hash(device_fingerprint: &str) -> String {
        shared_crypto::sha256_hex(device_fingerprint.as_bytes())
    }

    fn ttl_for(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.access_ttl_seconds,
            TokenKind::Refresh => self.refresh_ttl_seconds,
        }
    }

    fn mint(&self, user_id: Uuid, tenant_id: Uuid, role: &str, device_fingerprint: &str, kind: TokenKind) -> Result<String, AppError> {
        let claims = Claims::new(
            kind,
            user_id,
            tenant_id,
            role.to_string(),
            Self::fingerprint_hash(device_fingerprint),
            self.kid.clone(),
            self.ttl_for(kind),
        );
        encode_jwt(&claims, &self.secret)
    }
}

#[async_trait]
impl<V: RevocationStore> TokenService for TokenServiceImpl<V> {
    async fn issue(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        role: &str,
        device_fingerprint: &str,
    ) -> Result<TokenPair, AppError> {
        let access_token = self.mint(user_id, tenant_id, role, device_fingerprint, TokenKind::Access)?;
        let refresh_token = self.mint(user_id, tenant_id, role, device_fingerprint, TokenKind::Refresh)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl_seconds,
        })
    }

    async fn validate(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let claims = decode_jwt(token, &self.secret)?;
        if claims.kind != kind {
            return Err(TokenError::WrongKind.into());
        }
        if self.revocation.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked.into());
        }
        if let Some(floor) = self.revocation.user_token_floor(claims.sub).await? {
            if claims.iat < floor {
                return Err(TokenError::Revoked.into());
            }
        }
        Ok(claims)
    }

    async fn refresh(&self, refresh_token: &str, current_device_fingerprint: &str) -> Result<TokenPair, AppError> {
        let claims = self.validate(refresh_token, TokenKind::Refresh).await?;

        if claims.device_fingerprint_hash != Self::fingerprint_hash(current_device_fingerprint) {
            return Err(TokenError::DeviceMismatch.into());
        }

        let remaining = (claims.exp - chrono::Utc::now().timestamp()).max(0) as u64;
        let newly_revoked = self
            .revocation
            .revoke(&claims.jti, std::time::Duration::from_secs(remaining))
            .await?;

        // `revoke` is the atomic single-use gate: if another concurrent
        // `refresh` call already claimed this jti, this call must not mint
        // a second token pair from the same parent token.
        if !newly_revoked {
            return Err(TokenError::Revoked.into());
        }

        self.issue(claims.sub, claims.tenant_id, &claims.role, current_device_fingerprint).await
    }

    async fn revoke(&self, token: &str) -> Result<(), AppError> {
        // Revocation must succeed even for an already-expired token, so we
        // decode without the revocation-set check rather than calling
        // `validate`.
        let claims = decode_jwt(token, &self.secret)?;
        let remaining = (claims.exp - chrono::Utc::now().timestamp()).max(0) as u64;
        self.revocation
            .revoke(&claims.jti, std::time::Duration::from_secs(remaining))
            .await?;
        Ok(())
    }
}
