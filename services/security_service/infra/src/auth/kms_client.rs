//! HTTP-backed `KeyManagementClient` (C5's KMS dependency, C3-wrapped at the
//! call site in `core::credential_encryption_service`). Grounded on the
//! teacher's `KanidmClient` (`reqwest::Client` field, JSON request/response
//! DTOs, error mapping into the shared error type) — rewired against a
//! generate-or-fetch data-key endpoint instead of an OAuth2 token exchange.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use security_service_core::domains::auth::domain::credential_encryption_service::KeyManagementClient;
use shared_crypto::DataKey;
use shared_error::AppError;

#[derive(Debug, Clone, Serialize)]
struct GetOrCreateDataKeyRequest<'a> {
    key_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct GetOrCreateDataKeyResponse {
    /// Hex-encoded plaintext data key.
    plaintext_hex: String,
    /// Opaque ciphertext material the KMS will later decrypt back into
    /// `plaintext_hex` given the same `key_id` — persisted alongside
    /// encrypted fields, never the plaintext itself.
    ciphertext_material: String,
}

#[derive(Debug, Clone)]
pub struct HttpKmsConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Clone)]
pub struct HttpKmsClient {
    http: reqwest::Client,
    config: HttpKmsConfig,
}

impl HttpKmsClient {
    pub fn new(config: HttpKmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl KeyManagementClient for HttpKmsClient {
    async fn get_or_create_data_key(&self, kms_key_id: &str) -> Result<(DataKey, String), AppError> {
        let url = format!("{}/v1/datakeys/get-or-create", self.config.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&GetOrCreateDataKeyRequest { key_id: kms_key_id })
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable { dependency: format!("kms: {e}") })?;

        if !response.status().is_success() {
            return Err(AppError::UpstreamUnavailable {
                dependency: format!("kms returned status {}", response.status()),
            });
        }

        let body: GetOrCreateDataKeyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("kms response decode error: {e}")))?;

        let bytes = hex::decode(&body.plaintext_hex)
            .map_err(|e| AppError::Internal(format!("kms plaintext hex decode error: {e}")))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::Internal("kms plaintext key has wrong length".to_string()))?;

        Ok((DataKey::from_bytes(array), body.ciphertext_material))
    }
}

/// Self-contained mock suitable for local/dev composition without a real
/// KMS endpoint: generates a fresh key per `kms_key_id` the first time it
/// is asked and "wraps" it by hex-encoding the plaintext, so decrypting it
/// back is just the inverse hex-decode. Never use this against data that
/// must survive a process restart — the wrap is not real envelope
/// encryption, it only exists to stand in for a provider during local runs.
#[derive(Default)]
pub struct MockKmsClient;

#[async_trait]
impl KeyManagementClient for MockKmsClient {
    async fn get_or_create_data_key(&self, _kms_key_id: &str) -> Result<(DataKey, String), AppError> {
        let key = DataKey::generate();
        let ciphertext_material = hex::encode(key.as_bytes());
        Ok((key, ciphertext_material))
    }
}
