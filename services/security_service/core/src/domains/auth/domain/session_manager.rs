//! Session manager (C9, spec.md §4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use shared_error::AppError;

use super::http_context::HttpContext;
use super::model::Session;
use super::repository::SessionRepository;
use super::session_cache::{GeoLocationLookup, SessionCache};

#[async_trait]
pub trait SessionManager: Send + Sync {
    async fn create(&self, user_id: Uuid, tenant_id: Uuid, ctx: &HttpContext) -> Result<Session, AppError>;
    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, AppError>;
    async fn touch(&self, session_id: Uuid, ip_address: Option<&str>) -> Result<(), AppError>;
    async fn terminate(&self, session_id: Uuid) -> Result<(), AppError>;
    async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;
    /// The 5-minute sweep (spec.md §4.7 "Cleanup").
    async fn cleanup_expired(&self) -> Result<u64, AppError>;
}

pub struct SessionManagerImpl<R: SessionRepository, C: SessionCache, G: GeoLocationLookup> {
    repository: Arc<R>,
    cache: Arc<C>,
    geo: Arc<G>,
    max_concurrent_sessions: u32,
    session_timeout_minutes: i64,
    extend_on_activity: bool,
    /// Per-user locks so the concurrent-limit check and the resulting
    /// eviction are atomic with respect to other `create` calls for the
    /// same user (spec.md §4.7 "Concurrency contract"). Sessions for
    /// different users remain fully independent.
    user_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl<R: SessionRepository, C: SessionCache, G: GeoLocationLookup> SessionManagerImpl<R, C, G> {
    pub fn new(
        repository: Arc<R>,
        cache: Arc<C>,
        geo: Arc<G>,
        max_concurrent_sessions: u32,
        session_timeout_minutes: i64,
        extend_on_activity: bool,
    ) -> Self {
        Self {
            repository,
            cache,
            geo,
            max_concurrent_sessions,
            session_timeout_minutes,
            extend_on_activity,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for_user(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.user_locks
            .lock()
            .await
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn ttl(&self) -> StdDuration {
        StdDuration::from_secs((self.session_timeout_minutes * 60).max(0) as u64)
    }
}

#[async_trait]
impl<R: SessionRepository, C: SessionCache, G: GeoLocationLookup> SessionManager for SessionManagerImpl<R, C, G> {
    async fn create(&self, user_id: Uuid, tenant_id: Uuid, ctx: &HttpContext) -> Result<Session, AppError> {
        let lock = self.lock_for_user(user_id).await;
        let _guard = lock.lock().await;

        let mut active = self.repository.find_active_by_user(user_id).await?;
        active.sort_by_key(|s| (s.last_activity, s.session_id));

        if active.len() as u32 >= self.max_concurrent_sessions {
            if let Some(oldest) = active.first() {
                self.terminate(oldest.session_id).await?;
            }
        }

        let location = self
            .geo
            .locate(ctx.ip_address.as_deref().unwrap_or(""))
            .await;

        let now = Utc::now();
        let session = Session {
            session_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            device_fingerprint: ctx.device_fingerprint.clone(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            location,
            created_at: now,
            last_activity: now,
            expires_at: now + Duration::minutes(self.session_timeout_minutes),
            active: true,
        };

        let persisted = self.repository.create(&session).await?;
        self.cache.mirror(&persisted, self.ttl()).await?;
        self.cache.add_to_user_index(user_id, persisted.session_id, self.ttl()).await?;
        self.cache
            .add_to_device_index(&ctx.device_fingerprint, persisted.session_id, self.ttl())
            .await?;

        Ok(persisted)
    }

    async fn get(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
        if let Some(session) = self.cache.get_mirrored(session_id).await? {
            if session.is_live(Utc::now()) {
                return Ok(Some(session));
            }
            return Ok(None);
        }

        match self.repository.find_by_id(session_id).await? {
            Some(session) if session.is_live(Utc::now()) => {
                self.cache.mirror(&session, self.ttl()).await?;
                Ok(Some(session))
            }
            _ => Ok(None),
        }
    }

    async fn touch(&self, session_id: Uuid, _ip_address: Option<&str>) -> Result<(), AppError> {
        let Some(session) = self.get(session_id).await? else {
            return Err(AppError::NotFound("session not found".into()));
        };

        let expires_at = if self.extend_on_activity {
            Utc::now() + Duration::minutes(self.session_timeout_minutes)
        } else {
            session.expires_at
        };

        self.repository.touch(session_id, expires_at).await?;
        let mut mirrored = session;
        mirrored.last_activity = Utc::now();
        mirrored.expires_at = expires_at;
        self.cache.mirror(&mirrored, self.ttl()).await?;
        Ok(())
    }

    async fn terminate(&self, session_id: Uuid) -> Result<(), AppError> {
        if let Some(session) = self.repository.find_by_id(session_id).await? {
            self.repository.terminate(session_id).await?;
            self.cache.remove_mirrored(session_id).await?;
            self.cache.remove_from_user_index(session.user_id, session_id).await?;
            self.cache
                .remove_from_device_index(&session.device_fingerprint, session_id)
                .await?;
        }
        Ok(())
    }

    async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let sessions = self.repository.find_active_by_user(user_id).await?;
        let count = self.repository.terminate_all_for_user(user_id).await?;
        for session in sessions {
            self.cache.remove_mirrored(session.session_id).await?;
            self.cache.remove_from_user_index(user_id, session.session_id).await?;
            self.cache
                .remove_from_device_index(&session.device_fingerprint, session.session_id)
                .await?;
        }
        Ok(count)
    }

    async fn cleanup_expired(&self) -> Result<u64, AppError> {
        let older_than = Utc::now() - Duration::days(7);
        self.repository.delete_expired_before(older_than).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct InMemorySessionRepository {
        sessions: AsyncMutex<HashMap<Uuid, Session>>,
    }

    #[async_trait]
    impl SessionRepository for InMemorySessionRepository {
        async fn create(&self, session: &Session) -> Result<Session, AppError> {
            self.sessions.lock().await.insert(session.session_id, session.clone());
            Ok(session.clone())
        }

        async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
            Ok(self.sessions.lock().await.get(&session_id).cloned())
        }

        async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, AppError> {
            Ok(self
                .sessions
                .lock()
                .await
                .values()
                .filter(|s| s.user_id == user_id && s.active)
                .cloned()
                .collect())
        }

        async fn touch(&self, session_id: Uuid, expires_at: chrono::DateTime<Utc>) -> Result<(), AppError> {
            if let Some(s) = self.sessions.lock().await.get_mut(&session_id) {
                s.last_activity = Utc::now();
                s.expires_at = expires_at;
            }
            Ok(())
        }

        async fn terminate(&self, session_id: Uuid) -> Result<(), AppError> {
            if let Some(s) = self.sessions.lock().await.get_mut(&session_id) {
                s.active = false;
            }
            Ok(())
        }

        async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
            let mut count = 0u64;
            for s in self.sessions.lock().await.values_mut() {
                if s.user_id == user_id && s.active {
                    s.active = false;
                    count += 1;
                }
            }
            Ok(count)
        }

        async fn delete_expired_before(&self, older_than: chrono::DateTime<Utc>) -> Result<u64, AppError> {
            let mut guard = self.sessions.lock().await;
            let before = guard.len();
            guard.retain(|_, s| s.expires_at > older_than);
            Ok((before - guard.len()) as u64)
        }
    }

    #[derive(Default)]
    struct InMemorySessionCache {
        mirrored: AsyncMutex<HashMap<Uuid, Session>>,
        user_index: AsyncMutex<HashMap<Uuid, Vec<Uuid>>>,
        device_index: AsyncMutex<HashMap<String, Vec<Uuid>>>,
    }

    #[async_trait]
    impl SessionCache for InMemorySessionCache {
        async fn mirror(&self, session: &Session, _ttl: StdDuration) -> Result<(), AppError> {
            self.mirrored.lock().await.insert(session.session_id, session.clone());
            Ok(())
        }
        async fn get_mirrored(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
            Ok(self.mirrored.lock().await.get(&session_id).cloned())
        }
        async fn remove_mirrored(&self, session_id: Uuid) -> Result<(), AppError> {
            self.mirrored.lock().await.remove(&session_id);
            Ok(())
        }
        async fn add_to_user_index(&self, user_id: Uuid, session_id: Uuid, _ttl: StdDuration) -> Result<(), AppError> {
            self.user_index.lock().await.entry(user_id).or_default().push(session_id);
            Ok(())
        }
        async fn user_session_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            Ok(self.user_index.lock().await.get(&user_id).cloned().unwrap_or_default())
        }
        async fn remove_from_user_index(&self, user_id: Uuid, session_id: Uuid) -> Result<(), AppError> {
            if let Some(v) = self.user_index.lock().await.get_mut(&user_id) {
                v.retain(|id| *id != session_id);
            }
            Ok(())
        }
        async fn add_to_device_index(&self, fp: &str, session_id: Uuid, _ttl: StdDuration) -> Result<(), AppError> {
            self.device_index.lock().await.entry(fp.to_string()).or_default().push(session_id);
            Ok(())
        }
        async fn remove_from_device_index(&self, fp: &str, session_id: Uuid) -> Result<(), AppError> {
            if let Some(v) = self.device_index.lock().await.get_mut(fp) {
                v.retain(|id| *id != session_id);
            }
            Ok(())
        }
    }

    struct AlwaysUnknownGeo;

    #[async_trait]
    impl GeoLocationLookup for AlwaysUnknownGeo {
        async fn locate(&self, _ip_address: &str) -> String {
            "Unknown".to_string()
        }
    }

    fn manager(max_concurrent: u32) -> SessionManagerImpl<InMemorySessionRepository, InMemorySessionCache, AlwaysUnknownGeo> {
        SessionManagerImpl::new(
            Arc::new(InMemorySessionRepository::default()),
            Arc::new(InMemorySessionCache::default()),
            Arc::new(AlwaysUnknownGeo),
            max_concurrent,
            30,
            true,
        )
    }

    fn ctx(device_fingerprint: &str) -> HttpContext {
        HttpContext {
            ip_address: Some("203.0.113.5".to_string()),
            user_agent: Some("test-agent".to_string()),
            device_fingerprint: device_fingerprint.to_string(),
            correlation_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let mgr = manager(3);
        let user_id = Uuid::new_v4();
        let session = mgr.create(user_id, Uuid::new_v4(), &ctx("fp-1")).await.unwrap();
        let fetched = mgr.get(session.session_id).await.unwrap().unwrap();
        assert_eq!(fetched.session_id, session.session_id);
        assert_eq!(fetched.location, "Unknown");
    }

    #[tokio::test]
    async fn exceeding_concurrent_limit_evicts_oldest() {
        let mgr = manager(2);
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let first = mgr.create(user_id, tenant_id, &ctx("fp-1")).await.unwrap();
        let _second = mgr.create(user_id, tenant_id, &ctx("fp-2")).await.unwrap();
        let _third = mgr.create(user_id, tenant_id, &ctx("fp-3")).await.unwrap();

        assert!(mgr.get(first.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn terminate_all_for_user_is_idempotent() {
        let mgr = manager(3);
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        mgr.create(user_id, tenant_id, &ctx("fp-1")).await.unwrap();
        mgr.create(user_id, tenant_id, &ctx("fp-2")).await.unwrap();

        let first_count = mgr.terminate_all_for_user(user_id).await.unwrap();
        assert_eq!(first_count, 2);
        let second_count = mgr.terminate_all_for_user(user_id).await.unwrap();
        assert_eq!(second_count, 0);
    }
}
