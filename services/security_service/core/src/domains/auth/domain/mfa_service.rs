//! MFA service (C7, spec.md §4.5): TOTP enrollment/verification and
//! single-use backup codes.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use uuid::Uuid;

use shared_error::AppError;

use super::audit_log_service::AuditLogService;
use super::credential_encryption_service::CredentialEncryptionService;
use super::model::{AuditEventType, EventStatus, GeneratedBackupCodes, MfaConfig, NewAuditEvent};
use super::repository::MfaRepository;

const TOTP_DIGITS: u32 = 6;
const BACKUP_CODE_COUNT: usize = 10;

#[async_trait]
pub trait MfaService: Send + Sync {
    /// Generates a new TOTP secret + backup codes, encrypts the secret at
    /// rest, and persists the (disabled) config — `enabled` flips to `true`
    /// only once the caller confirms a first code (`confirm_enrollment`).
    async fn enroll(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        account_email: &str,
        issuer: &str,
    ) -> Result<(String, String, Vec<String>), AppError>;

    async fn confirm_enrollment(&self, user_id: Uuid, tenant_id: Uuid, code: &str) -> Result<(), AppError>;

    /// Verifies a TOTP code or a backup code, whichever the input matches.
    /// Replay-defended: a `(user, step)` pair that already verified is
    /// rejected for `2 * window` steps.
    async fn verify(&self, user_id: Uuid, tenant_id: Uuid, code: &str) -> Result<bool, AppError>;

    async fn is_enabled(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, AppError>;
}

pub struct MfaServiceImpl<R: MfaRepository, C: CredentialEncryptionService, A: AuditLogService> {
    repository: std::sync::Arc<R>,
    crypto: std::sync::Arc<C>,
    audit: std::sync::Arc<A>,
    window_seconds: u64,
    /// In-memory replay guard: `(user_id, step) -> expires at unix seconds`.
    replay_guard: Mutex<HashMap<(Uuid, i64), u64>>,
}

impl<R: MfaRepository, C: CredentialEncryptionService, A: AuditLogService> MfaServiceImpl<R, C, A> {
    pub fn new(repository: std::sync::Arc<R>, crypto: std::sync::Arc<C>, audit: std::sync::Arc<A>, window_seconds: u64) -> Self {
        Self {
            repository,
            crypto,
            audit,
            window_seconds,
            replay_guard: Mutex::new(HashMap::new()),
        }
    }

    fn now_unix() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn window_steps(&self) -> i64 {
        1
    }

    /// `true` if this `(user, step)` pair already verified within the last
    /// `2 * window` steps; otherwise records it and returns `false`.
    fn check_and_record_replay(&self, user_id: Uuid, step: i64) -> bool {
        let now = Self::now_unix();
        let mut guard = self.replay_guard.lock().unwrap();
        guard.retain(|_, expires_at| *expires_at > now);

        if guard.contains_key(&(user_id, step)) {
            return true;
        }
        let ttl = 2 * self.window_steps() as u64 * self.window_seconds;
        guard.insert((user_id, step), now + ttl);
        false
    }

    fn generate_backup_codes(&self) -> GeneratedBackupCodes {
        let mut plaintext_codes = Vec::with_capacity(BACKUP_CODE_COUNT);
        let mut hashes = std::collections::HashSet::with_capacity(BACKUP_CODE_COUNT);
        for _ in 0..BACKUP_CODE_COUNT {
            let code = shared_crypto::random_token(10);
            let hash = bcrypt::hash(&code, bcrypt::DEFAULT_COST).expect("bcrypt hash of fixed-length code");
            plaintext_codes.push(code);
            hashes.insert(hash);
        }
        GeneratedBackupCodes { plaintext_codes, hashes }
    }
}

#[async_trait]
impl<R: MfaRepository, C: CredentialEncryptionService, A: AuditLogService> MfaService for MfaServiceImpl<R, C, A> {
    async fn enroll(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        account_email: &str,
        issuer: &str,
    ) -> Result<(String, String, Vec<String>), AppError> {
        let secret_bytes = shared_crypto::random_bytes(20);
        let secret_base32 = shared_crypto::base32::encode(&secret_bytes);
        let secret_encrypted = self.crypto.encrypt(&secret_base32).await?;

        let backup = self.generate_backup_codes();
        let config = MfaConfig {
            user_id,
            tenant_id,
            mfa_type: "TOTP".to_string(),
            secret_key_encrypted: secret_encrypted,
            backup_code_hashes: sqlx::types::Json(backup.hashes.into_iter().collect()),
            enabled: false,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.repository.upsert(&config).await?;

        let uri = shared_crypto::provisioning_uri(issuer, account_email, &secret_base32);
        Ok((secret_base32, uri, backup.plaintext_codes))
    }

    async fn confirm_enrollment(&self, user_id: Uuid, tenant_id: Uuid, code: &str) -> Result<(), AppError> {
        let mut config = self
            .repository
            .find_by_user(user_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("mfa config not found".into()))?;

        let secret_base32 = self.crypto.decrypt(&config.secret_key_encrypted).await?;
        let secret_bytes = shared_crypto::base32::decode(&secret_base32)
            .ok_or(AppError::CryptoTampered)?;

        let matched = shared_crypto::totp_verify(
            &secret_bytes,
            code,
            Self::now_unix(),
            self.window_seconds,
            TOTP_DIGITS,
            self.window_steps(),
        );
        if matched.is_none() {
            return Err(AppError::BadMfa);
        }

        config.enabled = true;
        self.repository.upsert(&config).await?;
        Ok(())
    }

    async fn verify(&self, user_id: Uuid, tenant_id: Uuid, code: &str) -> Result<bool, AppError> {
        let config = self
            .repository
            .find_by_user(user_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("mfa config not found".into()))?;

        if !config.enabled {
            return Err(AppError::BadMfa);
        }

        let secret_base32 = self.crypto.decrypt(&config.secret_key_encrypted).await?;
        let secret_bytes = shared_crypto::base32::decode(&secret_base32)
            .ok_or(AppError::CryptoTampered)?;

        if let Some(step) = shared_crypto::totp_verify(
            &secret_bytes,
            code,
            Self::now_unix(),
            self.window_seconds,
            TOTP_DIGITS,
            self.window_steps(),
        ) {
            if self.check_and_record_replay(user_id, step) {
                return Ok(false);
            }
            return Ok(true);
        }

        // Fall back to backup codes; redemption is atomic at the repository.
        for hash in config.backup_code_hashes.0.iter() {
            if bcrypt::verify(code, hash).unwrap_or(false) {
                let redeemed = self.repository.redeem_backup_code(user_id, tenant_id, hash).await?;
                if redeemed && config.backup_code_hashes.0.len() <= 1 {
                    let _ = self
                        .audit
                        .append(NewAuditEvent {
                            tenant_id,
                            user_id: Some(user_id),
                            event_type: AuditEventType::MfaBackupCodesExhausted,
                            event_status: EventStatus::Success,
                            ip_address: None,
                            user_agent: None,
                            device_fingerprint: None,
                            details: serde_json::json!({}),
                            session_id: None,
                            correlation_id: None,
                        })
                        .await;
                }
                return Ok(redeemed);
            }
        }

        Ok(false)
    }

    async fn is_enabled(&self, user_id: Uuid, tenant_id: Uuid) -> Result<bool, AppError> {
        Ok(self
            .repository
            .find_by_user(user_id, tenant_id)
            .await?
            .map(|c| c.enabled)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::domain::credential_encryption_service::{
        CredentialEncryptionServiceImpl, LocalKeyManagementClient,
    };
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct InMemoryMfaRepository {
        configs: AsyncMutex<HashMap<Uuid, MfaConfig>>,
    }

    impl InMemoryMfaRepository {
        fn new() -> Self {
            Self { configs: AsyncMutex::new(HashMap::new()) }
        }
    }

    #[async_trait]
    impl MfaRepository for InMemoryMfaRepository {
        async fn find_by_user(&self, user_id: Uuid, _tenant_id: Uuid) -> Result<Option<MfaConfig>, AppError> {
            Ok(self.configs.lock().await.get(&user_id).cloned())
        }

        async fn upsert(&self, config: &MfaConfig) -> Result<MfaConfig, AppError> {
            self.configs.lock().await.insert(config.user_id, config.clone());
            Ok(config.clone())
        }

        async fn delete(&self, user_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
            self.configs.lock().await.remove(&user_id);
            Ok(())
        }

        async fn redeem_backup_code(
            &self,
            user_id: Uuid,
            _tenant_id: Uuid,
            code_hash: &str,
        ) -> Result<bool, AppError> {
            let mut guard = self.configs.lock().await;
            if let Some(config) = guard.get_mut(&user_id) {
                let before = config.backup_code_hashes.0.len();
                config.backup_code_hashes.0.retain(|h| h != code_hash);
                return Ok(config.backup_code_hashes.0.len() < before);
            }
            Ok(false)
        }
    }

    #[derive(Default)]
    struct InMemoryAuditLog {
        appended: std::sync::atomic::AtomicU64,
    }

    #[async_trait]
    impl AuditLogService for InMemoryAuditLog {
        async fn append(&self, event: NewAuditEvent) -> Result<super::super::model::AuditRecord, AppError> {
            self.appended.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(super::super::model::AuditRecord {
                id: Uuid::new_v4(),
                tenant_id: event.tenant_id,
                user_id: event.user_id,
                event_type: event.event_type.to_string(),
                event_status: format!("{:?}", event.event_status),
                ip_address: event.ip_address,
                user_agent: event.user_agent,
                device_fingerprint: event.device_fingerprint,
                details: sqlx::types::Json(event.details),
                risk_score: 0,
                session_id: event.session_id,
                correlation_id: event.correlation_id,
                created_at: chrono::Utc::now(),
                previous_hash: super::super::model::AUDIT_GENESIS_HASH.to_string(),
                integrity_hash: "test-hash".to_string(),
            })
        }

        async fn verify_chain(
            &self,
            _tenant_id: Uuid,
            _from: chrono::DateTime<chrono::Utc>,
            _to: chrono::DateTime<chrono::Utc>,
        ) -> Result<Option<Uuid>, AppError> {
            Ok(None)
        }
    }

    impl Clone for MfaConfig {
        fn clone(&self) -> Self {
            Self {
                user_id: self.user_id,
                tenant_id: self.tenant_id,
                mfa_type: self.mfa_type.clone(),
                secret_key_encrypted: self.secret_key_encrypted.clone(),
                backup_code_hashes: sqlx::types::Json(self.backup_code_hashes.0.clone()),
                enabled: self.enabled,
                created_at: self.created_at,
                updated_at: self.updated_at,
            }
        }
    }

    type TestMfaService = MfaServiceImpl<InMemoryMfaRepository, CredentialEncryptionServiceImpl<LocalKeyManagementClient>, InMemoryAuditLog>;

    fn build_service() -> TestMfaService {
        let crypto = CredentialEncryptionServiceImpl::new(
            LocalKeyManagementClient,
            Arc::new(shared_breaker::BreakerRegistry::new(shared_breaker::BreakerConfig::default())),
            "test-key",
            60,
            100,
        );
        MfaServiceImpl::new(Arc::new(InMemoryMfaRepository::new()), Arc::new(crypto), Arc::new(InMemoryAuditLog::default()), 30)
    }

    fn build_service_with_audit() -> (TestMfaService, Arc<InMemoryAuditLog>) {
        let crypto = CredentialEncryptionServiceImpl::new(
            LocalKeyManagementClient,
            Arc::new(shared_breaker::BreakerRegistry::new(shared_breaker::BreakerConfig::default())),
            "test-key",
            60,
            100,
        );
        let audit = Arc::new(InMemoryAuditLog::default());
        let svc = MfaServiceImpl::new(Arc::new(InMemoryMfaRepository::new()), Arc::new(crypto), audit.clone(), 30);
        (svc, audit)
    }

    #[tokio::test]
    async fn enroll_confirm_and_verify_round_trip() {
        let svc = build_service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();

        let (secret_base32, uri, backup_codes) =
            svc.enroll(user_id, tenant_id, "alice@example.com", "TradingCore").await.unwrap();
        assert!(uri.starts_with("otpauth://totp/"));
        assert_eq!(backup_codes.len(), BACKUP_CODE_COUNT);

        let secret_bytes = shared_crypto::base32::decode(&secret_base32).unwrap();
        let code = shared_crypto::totp_generate(&secret_bytes, TestMfaService::now_unix(), 30, TOTP_DIGITS);

        svc.confirm_enrollment(user_id, tenant_id, &code).await.unwrap();
        assert!(svc.is_enabled(user_id, tenant_id).await.unwrap());
    }

    #[tokio::test]
    async fn backup_code_is_single_use() {
        let svc = build_service();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let (secret_base32, _uri, backup_codes) =
            svc.enroll(user_id, tenant_id, "bob@example.com", "TradingCore").await.unwrap();

        let secret_bytes = shared_crypto::base32::decode(&secret_base32).unwrap();
        let code = shared_crypto::totp_generate(&secret_bytes, TestMfaService::now_unix(), 30, TOTP_DIGITS);
        svc.confirm_enrollment(user_id, tenant_id, &code).await.unwrap();

        let first = svc.verify(user_id, tenant_id, &backup_codes[0]).await.unwrap();
        assert!(first);
        let second = svc.verify(user_id, tenant_id, &backup_codes[0]).await.unwrap();
        assert!(!second);
    }

    #[tokio::test]
    async fn exhausting_backup_codes_audits_once() {
        let (svc, audit) = build_service_with_audit();
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let (secret_base32, _uri, backup_codes) =
            svc.enroll(user_id, tenant_id, "carol@example.com", "TradingCore").await.unwrap();

        let secret_bytes = shared_crypto::base32::decode(&secret_base32).unwrap();
        let code = shared_crypto::totp_generate(&secret_bytes, TestMfaService::now_unix(), 30, TOTP_DIGITS);
        svc.confirm_enrollment(user_id, tenant_id, &code).await.unwrap();

        for backup_code in &backup_codes[..backup_codes.len() - 1] {
            assert!(svc.verify(user_id, tenant_id, backup_code).await.unwrap());
        }
        assert_eq!(audit.appended.load(std::sync::atomic::Ordering::SeqCst), 0);

        let last = svc.verify(user_id, tenant_id, &backup_codes[backup_codes.len() - 1]).await.unwrap();
        assert!(last);
        assert_eq!(audit.appended.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
