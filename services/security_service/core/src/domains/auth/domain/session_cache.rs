//! The Redis-mirror half of C9's storage model (spec.md §4.7). Kept as its
//! own trait so the session manager in `core` never depends on a concrete
//! cache client — `infra` implements this against `redis::aio::ConnectionManager`.

use async_trait::async_trait;
use shared_error::AppError;
use std::time::Duration;
use uuid::Uuid;

use super::model::Session;

#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn mirror(&self, session: &Session, ttl: Duration) -> Result<(), AppError>;
    async fn get_mirrored(&self, session_id: Uuid) -> Result<Option<Session>, AppError>;
    async fn remove_mirrored(&self, session_id: Uuid) -> Result<(), AppError>;

    async fn add_to_user_index(&self, user_id: Uuid, session_id: Uuid, ttl: Duration) -> Result<(), AppError>;
    async fn user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError>;
    async fn remove_from_user_index(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError>;

    async fn add_to_device_index(&self, device_fingerprint: &str, session_id: Uuid, ttl: Duration) -> Result<(), AppError>;
    async fn remove_from_device_index(&self, device_fingerprint: &str, session_id: Uuid) -> Result<(), AppError>;
}

/// Geo-IP lookup (C3-wrapped at the call site). A failure must never
/// surface — `infra`'s implementation maps any error to `"Unknown"` before
/// it reaches the session manager, per spec.md §4.7 step 4 and §7 "Local
/// recovery".
#[async_trait]
pub trait GeoLocationLookup: Send + Sync {
    async fn locate(&self, ip_address: &str) -> String;
}
