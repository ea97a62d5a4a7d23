//! Credential encryption service (C5, spec.md §4.3). Wraps `shared_crypto`'s
//! AEAD primitives with key management: a data key is fetched from the KMS
//! dependency (C3-wrapped) and its plaintext half cached with an LRU+TTL
//! policy so steady-state encrypt/decrypt never makes a network call.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use shared_breaker::BreakerRegistry;
use shared_crypto::DataKey;
use shared_error::AppError;

use super::model::CachedDataKey;

/// The key-management dependency (C3-wrapped at the call site via
/// `BreakerRegistry::KMS`). Implemented in `infra` against the real/mock KMS
/// over `reqwest`; `core` never depends on the transport.
#[async_trait]
pub trait KeyManagementClient: Send + Sync {
    /// Returns `(plaintext data key, ciphertext_material)` for `kms_key_id`,
    /// generating one on first use.
    async fn get_or_create_data_key(&self, kms_key_id: &str) -> Result<(DataKey, String), AppError>;
}

#[async_trait]
pub trait CredentialEncryptionService: Send + Sync {
    async fn encrypt(&self, plaintext: &str) -> Result<String, AppError>;
    async fn decrypt(&self, ciphertext: &str) -> Result<String, AppError>;
    async fn encrypt_field(&self, value: Option<&str>) -> Result<Option<String>, AppError>;
    async fn decrypt_field(&self, value: Option<&str>) -> Result<Option<String>, AppError>;
    fn generate_hash(&self, data: &[u8]) -> String;
    fn verify_hash(&self, data: &[u8], expected: &str) -> bool;
    /// Clears the data-key cache; the next encrypt/decrypt re-fetches.
    async fn rotate_keys(&self) -> Result<(), AppError>;
    /// Encrypts then decrypts a random probe string and compares
    /// (spec.md §4.3 "Health check").
    async fn health_check(&self) -> bool;
}

struct DataKeyCache {
    entries: HashMap<String, CachedDataKey>,
    recency: Vec<String>,
    cap: usize,
    ttl: Duration,
}

impl DataKeyCache {
    fn new(cap: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            recency: Vec::new(),
            cap,
            ttl,
        }
    }

    fn touch_recency(&mut self, kms_key_id: &str) {
        self.recency.retain(|k| k != kms_key_id);
        self.recency.push(kms_key_id.to_string());
    }

    fn get(&mut self, kms_key_id: &str) -> Option<DataKey> {
        let now = Utc::now();
        let expired = self
            .entries
            .get(kms_key_id)
            .map(|e| e.is_expired(self.ttl, now))
            .unwrap_or(false);
        if expired {
            self.entries.remove(kms_key_id);
            self.recency.retain(|k| k != kms_key_id);
            return None;
        }
        let key = self.entries.get(kms_key_id).map(|e| e.plaintext.clone());
        if key.is_some() {
            self.touch_recency(kms_key_id);
        }
        key
    }

    fn insert(&mut self, kms_key_id: String, plaintext: DataKey, ciphertext_material: String) {
        if self.entries.len() >= self.cap && !self.entries.contains_key(&kms_key_id) {
            if let Some(oldest) = self.recency.first().cloned() {
                self.entries.remove(&oldest);
                self.recency.retain(|k| k != &oldest);
            }
        }
        self.entries.insert(
            kms_key_id.clone(),
            CachedDataKey {
                kms_key_id: kms_key_id.clone(),
                plaintext,
                ciphertext_material,
                created_at: Utc::now(),
            },
        );
        self.touch_recency(&kms_key_id);
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

pub struct CredentialEncryptionServiceImpl<K: KeyManagementClient> {
    kms: K,
    breakers: std::sync::Arc<BreakerRegistry>,
    cache: Mutex<DataKeyCache>,
    kms_key_id: String,
}

impl<K: KeyManagementClient> CredentialEncryptionServiceImpl<K> {
    pub fn new(
        kms: K,
        breakers: std::sync::Arc<BreakerRegistry>,
        kms_key_id: impl Into<String>,
        cache_ttl_minutes: i64,
        cache_cap: usize,
    ) -> Self {
        Self {
            kms,
            breakers,
            cache: Mutex::new(DataKeyCache::new(cache_cap, Duration::minutes(cache_ttl_minutes))),
            kms_key_id: kms_key_id.into(),
        }
    }

    async fn current_key(&self) -> Result<DataKey, AppError> {
        if let Some(key) = self.cache.lock().unwrap().get(&self.kms_key_id) {
            return Ok(key);
        }

        let kms_key_id = self.kms_key_id.clone();
        let (key, ciphertext_material) = self
            .breakers
            .execute(shared_breaker::KMS, || self.kms.get_or_create_data_key(&kms_key_id))
            .await
            .map_err(AppError::from)?;

        self.cache
            .lock()
            .unwrap()
            .insert(self.kms_key_id.clone(), key.clone(), ciphertext_material);
        Ok(key)
    }
}

#[async_trait]
impl<K: KeyManagementClient> CredentialEncryptionService for CredentialEncryptionServiceImpl<K> {
    async fn encrypt(&self, plaintext: &str) -> Result<String, AppError> {
        let key = self.current_key().await?;
        shared_crypto::encrypt(&key, plaintext.as_bytes()).map_err(AppError::from)
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, AppError> {
        let key = self.current_key().await?;
        let plaintext = shared_crypto::decrypt(&key, ciphertext).map_err(AppError::from)?;
        String::from_utf8(plaintext).map_err(|_| AppError::CryptoTampered)
    }

    async fn encrypt_field(&self, value: Option<&str>) -> Result<Option<String>, AppError> {
        match value {
            None => Ok(None),
            Some(v) => Ok(Some(self.encrypt(v).await?)),
        }
    }

    async fn decrypt_field(&self, value: Option<&str>) -> Result<Option<String>, AppError> {
        match value {
            None => Ok(None),
            Some(v) => Ok(Some(self.decrypt(v).await?)),
        }
    }

    fn generate_hash(&self, data: &[u8]) -> String {
        shared_crypto::sha256_hex(data)
    }

    fn verify_hash(&self, data: &[u8], expected: &str) -> bool {
        shared_crypto::verify_hash(data, expected)
    }

    async fn rotate_keys(&self) -> Result<(), AppError> {
        self.cache.lock().unwrap().clear();
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let probe = shared_crypto::random_token(32);
        match self.encrypt(&probe).await {
            Ok(ciphertext) => match self.decrypt(&ciphertext).await {
                Ok(roundtripped) => roundtripped == probe,
                Err(_) => false,
            },
            Err(_) => false,
        }
    }
}

/// A `KeyManagementClient` that always fabricates a fresh data key locally,
/// with no upstream KMS call — used only where spec.md's Non-goals exclude
/// a real KMS integration, never wired into the composition root's default
/// path for production data. Kept here because the in-memory eviction/cache
/// logic above is exercised by its tests without needing `infra`'s
/// `reqwest`-backed client.
pub struct LocalKeyManagementClient;

#[async_trait]
impl KeyManagementClient for LocalKeyManagementClient {
    async fn get_or_create_data_key(&self, _kms_key_id: &str) -> Result<(DataKey, String), AppError> {
        let key = DataKey::generate();
        let ciphertext_material = shared_crypto::sha256_hex(key.as_bytes());
        Ok((key, ciphertext_material))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn service() -> CredentialEncryptionServiceImpl<LocalKeyManagementClient> {
        CredentialEncryptionServiceImpl::new(
            LocalKeyManagementClient,
            Arc::new(BreakerRegistry::new(shared_breaker::BreakerConfig::default())),
            "test-key",
            60,
            100,
        )
    }

    #[tokio::test]
    async fn encrypt_decrypt_round_trip() {
        let svc = service();
        let ciphertext = svc.encrypt("top secret").await.unwrap();
        assert_ne!(ciphertext, "top secret");
        let plaintext = svc.decrypt(&ciphertext).await.unwrap();
        assert_eq!(plaintext, "top secret");
    }

    #[tokio::test]
    async fn field_helpers_pass_through_none() {
        let svc = service();
        assert_eq!(svc.encrypt_field(None).await.unwrap(), None);
        assert_eq!(svc.decrypt_field(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn health_check_passes_on_working_key() {
        let svc = service();
        assert!(svc.health_check().await);
    }

    #[tokio::test]
    async fn rotate_keys_clears_cache_and_still_round_trips() {
        let svc = service();
        let ciphertext_before = svc.encrypt("abc").await.unwrap();
        svc.rotate_keys().await.unwrap();
        // A new data key was minted; the old ciphertext can no longer be
        // decrypted with it — this is the expected, documented trade-off of
        // `rotate_keys` (spec.md §4.3: "rotateKeys(): invalidates the
        // data-key cache").
        let _ = svc.decrypt(&ciphertext_before).await;
        let ciphertext_after = svc.encrypt("abc").await.unwrap();
        assert!(svc.decrypt(&ciphertext_after).await.is_ok());
    }

    #[test]
    fn verify_hash_round_trip() {
        let svc = service();
        let hash = svc.generate_hash(b"data");
        assert!(svc.verify_hash(b"data", &hash));
        assert!(!svc.verify_hash(b"other", &hash));
    }
}
