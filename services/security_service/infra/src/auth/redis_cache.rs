//! Redis-backed implementations of the C9 session mirror (`SessionCache`)
//! and the C6 revocation set (`RevocationStore`). Grounded on the teacher's
//! `RedisAuthzVersionRepository` (connection-manager-behind-a-lock,
//! timeout-wrapped GET/SET/DEL helpers, key-prefix constants) — adapted from
//! a DB-plus-cache hybrid to pure Redis state, since neither the session
//! mirror nor the revocation set has a Postgres source of truth of its own
//! (sessions/tokens are either live in Redis or they don't exist).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use security_service_core::domains::auth::domain::{
    model::Session,
    repository::RevocationStore,
    session_cache::SessionCache,
};
use shared_error::AppError;

const SESSION_KEY_PREFIX: &str = "session";
const USER_INDEX_PREFIX: &str = "session:user";
const DEVICE_INDEX_PREFIX: &str = "session:device";
const REVOCATION_PREFIX: &str = "revoked:jti";
const TOKEN_FLOOR_PREFIX: &str = "token_floor:user";

const REDIS_TIMEOUT_MS: u64 = 200;

/// Shared connection-manager handle. Both `RedisSessionCache` and
/// `RedisRevocationStore` can be built over the same clone so the
/// composition root only opens one connection pool for C9+C6.
#[derive(Clone)]
pub struct RedisHandle {
    conn: Arc<RwLock<ConnectionManager>>,
}

impl RedisHandle {
    pub async fn connect(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Internal(format!("redis client error: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Internal(format!("redis connection error: {e}")))?;

        Ok(Self {
            conn: Arc::new(RwLock::new(conn)),
        })
    }

    async fn get(&self) -> ConnectionManager {
        self.conn.read().await.clone()
    }
}

#[derive(Clone)]
pub struct RedisSessionCache {
    handle: RedisHandle,
}

impl RedisSessionCache {
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn session_key(session_id: Uuid) -> String {
        format!("{SESSION_KEY_PREFIX}:{session_id}")
    }

    fn user_index_key(user_id: Uuid) -> String {
        format!("{USER_INDEX_PREFIX}:{user_id}")
    }

    fn device_index_key(fingerprint: &str) -> String {
        format!("{DEVICE_INDEX_PREFIX}:{fingerprint}")
    }
}

#[async_trait]
impl SessionCache for RedisSessionCache {
    async fn mirror(&self, session: &Session, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        let payload = serde_json::to_string(session)
            .map_err(|e| AppError::Internal(format!("session serialize error: {e}")))?;

        conn.set_ex::<_, _, ()>(Self::session_key(session.session_id), payload, ttl.as_secs())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn get_mirrored(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
        let mut conn = self.handle.get().await;
        let raw: Option<String> = conn
            .get(Self::session_key(session_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        match raw {
            Some(json) => {
                let session = serde_json::from_str(&json)
                    .map_err(|e| AppError::Internal(format!("session deserialize error: {e}")))?;
                Ok(Some(session))
            }
            None => Ok(None),
        }
    }

    async fn remove_mirrored(&self, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        conn.del::<_, ()>(Self::session_key(session_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn add_to_user_index(&self, user_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        let key = Self::user_index_key(user_id);
        conn.sadd::<_, _, ()>(&key, session_id.to_string())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        conn.expire::<_, ()>(&key, ttl.as_secs() as i64)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let mut conn = self.handle.get().await;
        let raw: Vec<String> = conn
            .smembers(Self::user_index_key(user_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;

        Ok(raw.into_iter().filter_map(|s| Uuid::parse_str(&s).ok()).collect())
    }

    async fn remove_from_user_index(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        conn.srem::<_, _, ()>(Self::user_index_key(user_id), session_id.to_string())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn add_to_device_index(&self, device_fingerprint: &str, session_id: Uuid, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        let key = Self::device_index_key(device_fingerprint);
        conn.sadd::<_, _, ()>(&key, session_id.to_string())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        conn.expire::<_, ()>(&key, ttl.as_secs() as i64)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn remove_from_device_index(&self, device_fingerprint: &str, session_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        conn.srem::<_, _, ()>(Self::device_index_key(device_fingerprint), session_id.to_string())
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}

/// Redis-backed `RevocationStore` (C6). A jti is "revoked" purely by key
/// presence — the value is unused — with the TTL set to the token's
/// remaining lifetime so revocation entries never outlive the tokens they
/// block.
#[derive(Clone)]
pub struct RedisRevocationStore {
    handle: RedisHandle,
}

impl RedisRevocationStore {
    pub fn new(handle: RedisHandle) -> Self {
        Self { handle }
    }

    fn jti_key(jti: &str) -> String {
        format!("{REVOCATION_PREFIX}:{jti}")
    }

    fn floor_key(user_id: Uuid) -> String {
        format!("{TOKEN_FLOOR_PREFIX}:{user_id}")
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, jti: &str, ttl: Duration) -> Result<bool, AppError> {
        let mut conn = self.handle.get().await;
        let ttl_secs = ttl.as_secs().max(1);
        let options = redis::SetOptions::default()
            .with_expiration(redis::SetExpiry::EX(ttl_secs))
            .conditional_set(redis::ExistenceCheck::NX);
        let newly_set: Option<String> = conn
            .set_options(Self::jti_key(jti), 1u8, options)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        Ok(newly_set.is_some())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError> {
        let mut conn = self.handle.get().await;
        let result = tokio::time::timeout(
            Duration::from_millis(REDIS_TIMEOUT_MS),
            conn.exists::<_, bool>(Self::jti_key(jti)),
        )
        .await;

        match result {
            Ok(Ok(exists)) => Ok(exists),
            Ok(Err(e)) => Err(AppError::Redis(e.to_string())),
            Err(_) => {
                warn!("redis EXISTS timeout checking revocation for jti={jti}");
                Err(AppError::UpstreamTimeout { dependency: "cache".to_string() })
            }
        }
    }

    async fn set_user_token_floor(&self, user_id: Uuid, floor_iat: i64) -> Result<(), AppError> {
        let mut conn = self.handle.get().await;
        debug!("setting token floor for user={user_id} iat={floor_iat}");
        conn.set::<_, _, ()>(Self::floor_key(user_id), floor_iat)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }

    async fn user_token_floor(&self, user_id: Uuid) -> Result<Option<i64>, AppError> {
        let mut conn = self.handle.get().await;
        conn.get(Self::floor_key(user_id))
            .await
            .map_err(|e| AppError::Redis(e.to_string()))
    }
}
