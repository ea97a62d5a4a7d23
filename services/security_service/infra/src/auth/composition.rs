//! Enum-dispatch wrappers so the composition root can pick between a real
//! adapter and a stubbed one at startup (config-driven) without needing a
//! trait object where the core's generic services store the adapter type
//! by value (`KeyManagementClient`/`GeoLocationLookup` are not object-safe
//! call sites in `CredentialEncryptionServiceImpl`/`SessionManagerImpl`,
//! which hold `K`/`G` directly rather than behind an `Arc<dyn _>`).

use async_trait::async_trait;

use security_service_core::domains::auth::domain::credential_encryption_service::KeyManagementClient;
use security_service_core::domains::auth::domain::session_cache::GeoLocationLookup;
use shared_crypto::DataKey;
use shared_error::AppError;

use super::geo_lookup::{HttpGeoLocationLookup, UnknownGeoLocationLookup};
use super::kms_client::{HttpKmsClient, MockKmsClient};

pub enum AnyKmsClient {
    Http(HttpKmsClient),
    Mock(MockKmsClient),
}

#[async_trait]
impl KeyManagementClient for AnyKmsClient {
    async fn get_or_create_data_key(&self, kms_key_id: &str) -> Result<(DataKey, String), AppError> {
        match self {
            AnyKmsClient::Http(c) => c.get_or_create_data_key(kms_key_id).await,
            AnyKmsClient::Mock(c) => c.get_or_create_data_key(kms_key_id).await,
        }
    }
}

pub enum AnyGeoLocationLookup {
    Http(HttpGeoLocationLookup),
    Unknown(UnknownGeoLocationLookup),
}

#[async_trait]
impl GeoLocationLookup for AnyGeoLocationLookup {
    async fn locate(&self, ip_address: &str) -> String {
        match self {
            AnyGeoLocationLookup::Http(g) => g.locate(ip_address).await,
            AnyGeoLocationLookup::Unknown(g) => g.locate(ip_address).await,
        }
    }
}
