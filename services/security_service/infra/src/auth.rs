// Auth infrastructure implementations (C5-C10 adapters behind core's traits)
pub mod audit_log_repository;
pub mod composition;
pub mod geo_lookup;
pub mod kms_client;
pub mod mfa_repository;
pub mod redis_cache;
pub mod repository;
pub mod service_identity_resolver;
pub mod session_repository;
pub mod smtp_sender;
pub mod verification_token_repository;

pub use audit_log_repository::PgAuditLogRepository;
pub use composition::{AnyGeoLocationLookup, AnyKmsClient};
pub use geo_lookup::{HttpGeoLocationLookup, UnknownGeoLocationLookup};
pub use kms_client::{HttpKmsClient, MockKmsClient};
pub use mfa_repository::PgMfaRepository;
pub use redis_cache::{RedisHandle, RedisRevocationStore, RedisSessionCache};
pub use repository::{PgTenantRepository, PgUserRepository};
pub use service_identity_resolver::PgServiceIdentityResolver;
pub use session_repository::PgSessionRepository;
pub use smtp_sender::{SmtpConfig, SmtpEmailSender};
pub use verification_token_repository::PgVerificationTokenRepository;
