// Library exports for integration tests
pub mod extractors;
pub mod handlers;
pub mod mfa_handlers;
pub mod openapi;
pub mod password_reset_handlers;
pub mod verification_handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use security_service_core::domains::auth::domain::audit_log_service::AuditLogServiceImpl;
use security_service_core::domains::auth::domain::credential_encryption_service::CredentialEncryptionServiceImpl;
use security_service_core::domains::auth::domain::mfa_service::MfaServiceImpl;
use security_service_core::domains::auth::domain::security_facade::SecurityFacade;
use security_service_core::domains::auth::domain::service::AuthServiceImpl;
use security_service_core::domains::auth::domain::session_manager::SessionManagerImpl;
use security_service_core::domains::auth::domain::tenant_resolver::TenantResolver;
use security_service_core::domains::auth::domain::token_service::TokenServiceImpl;
use security_service_core::worker_pool::WorkerPool;
use security_service_infra::auth::{
    AnyGeoLocationLookup, AnyKmsClient, PgAuditLogRepository, PgMfaRepository, PgSessionRepository,
    PgTenantRepository, PgUserRepository, PgVerificationTokenRepository, RedisRevocationStore,
    RedisSessionCache, SmtpEmailSender,
};
use shared_breaker::BreakerRegistry;
use shared_rate_limit::{RateLimitEndpoint, RateLimitLayer, RateLimitState};

/// The concrete type graph every generic core service is instantiated
/// against once the composition root (`main.rs`) has picked the real
/// Postgres/Redis/SMTP/KMS/geo-IP adapters. Kept as named aliases so
/// handler signatures stay readable instead of spelling out seven type
/// parameters at every call site.
pub type ConcreteAuditLogService = AuditLogServiceImpl<PgAuditLogRepository>;
pub type ConcreteTokenService = TokenServiceImpl<RedisRevocationStore>;
pub type ConcreteSessionManager = SessionManagerImpl<PgSessionRepository, RedisSessionCache, AnyGeoLocationLookup>;
pub type ConcreteCredentialEncryptionService = CredentialEncryptionServiceImpl<AnyKmsClient>;
pub type ConcreteMfaService = MfaServiceImpl<PgMfaRepository, ConcreteCredentialEncryptionService, ConcreteAuditLogService>;
pub type ConcreteSecurityFacade = SecurityFacade<ConcreteTokenService, ConcreteAuditLogService>;
pub type ConcreteAuthService = AuthServiceImpl<
    PgUserRepository,
    PgVerificationTokenRepository,
    SmtpEmailSender,
    ConcreteSessionManager,
    RedisRevocationStore,
    ConcreteAuditLogService,
    ConcreteTokenService,
>;

/// Non-generic application state. Every handler reaches its dependencies
/// through this struct rather than taking generic parameters of its own —
/// `api` never needs to know which concrete adapters back a service, only
/// that the composition root wired one.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<ConcreteAuthService>,
    pub mfa: Arc<ConcreteMfaService>,
    pub tenants: Arc<TenantResolver<PgTenantRepository>>,
    pub breakers: Arc<BreakerRegistry>,
    pub worker_pool: Arc<WorkerPool>,
    pub facade: Arc<ConcreteSecurityFacade>,
}

/// Assembles the full HTTP surface (spec.md §6). Kept separate from
/// `main.rs` so integration tests can build a router against a state built
/// from a test database without going through `main`. `rate_limit` is the
/// ambient per-endpoint IP/email limiter the teacher ships in front of
/// every auth-adjacent route (not one of spec.md's numbered components,
/// but present in every service the teacher ships — see DESIGN.md).
pub fn router(state: AppState, rate_limit: RateLimitState) -> Router {
    let register_route = Router::new()
        .route("/auth/register", post(handlers::register))
        .layer(RateLimitLayer::new(rate_limit.clone(), RateLimitEndpoint::Register));

    let login_route = Router::new()
        .route("/auth/login", post(handlers::login))
        .layer(RateLimitLayer::new(rate_limit.clone(), RateLimitEndpoint::Login));

    let refresh_route = Router::new()
        .route("/auth/refresh", post(handlers::refresh_token))
        .layer(RateLimitLayer::new(rate_limit.clone(), RateLimitEndpoint::Refresh));

    let forgot_password_route = Router::new()
        .route("/auth/password/forgot", post(password_reset_handlers::initiate_reset))
        .layer(RateLimitLayer::new(rate_limit, RateLimitEndpoint::ForgotPassword));

    let public_routes = Router::new()
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/verify/email/{token}", get(verification_handlers::verify_email))
        .route("/auth/password/reset", post(password_reset_handlers::complete_reset))
        .route("/auth/mfa/verify", post(mfa_handlers::verify));

    let protected_routes = Router::new()
        .route("/auth/password/change", post(password_reset_handlers::change_password))
        .route("/auth/mfa/enroll", post(mfa_handlers::enroll))
        .route("/auth/mfa/confirm", post(mfa_handlers::confirm))
        .route("/users", get(handlers::list_users))
        .route("/users/{user_id}", get(handlers::get_user));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(register_route)
        .merge(login_route)
        .merge(refresh_route)
        .merge(forgot_password_route)
        .merge(public_routes)
        .merge(protected_routes)
        .merge(Router::from(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi())))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
