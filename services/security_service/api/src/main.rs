use std::net::SocketAddr;
use std::sync::Arc;

use security_service_core::domains::auth::domain::audit_log_service::AuditLogServiceImpl;
use security_service_core::domains::auth::domain::credential_encryption_service::CredentialEncryptionServiceImpl;
use security_service_core::domains::auth::domain::events::EventBus;
use security_service_core::domains::auth::domain::mfa_service::MfaServiceImpl;
use security_service_core::domains::auth::domain::password_management::PasswordManager;
use security_service_core::domains::auth::domain::registration::RegistrationPipeline;
use security_service_core::domains::auth::domain::security_facade::SecurityFacade;
use security_service_core::domains::auth::domain::service::AuthServiceImpl;
use security_service_core::domains::auth::domain::session_manager::{SessionManager, SessionManagerImpl};
use security_service_core::domains::auth::domain::strategies::{
    AuthStrategy, MfaStrategy, PasswordStrategy, RefusingSocialProvider, ServiceApiKeyStrategy, SocialStrategy,
    StrategyRegistry,
};
use security_service_core::domains::auth::domain::tenant_resolver::TenantResolver;
use security_service_core::domains::auth::domain::token_service::TokenServiceImpl;
use security_service_core::worker_pool::WorkerPool;
use security_service_infra::auth::{
    AnyGeoLocationLookup, AnyKmsClient, HttpGeoLocationLookup, HttpKmsClient, HttpKmsConfig, MockKmsClient,
    PgAuditLogRepository, PgMfaRepository, PgServiceIdentityResolver, PgSessionRepository, PgTenantRepository,
    PgUserRepository, PgVerificationTokenRepository, RedisHandle, RedisRevocationStore, RedisSessionCache,
    SmtpConfig, SmtpEmailSender, UnknownGeoLocationLookup,
};
use security_service_api::AppState;
use shared_breaker::{BreakerConfig, BreakerRegistry};
use shared_rate_limit::{RateLimitConfig, RateLimitState};

#[tokio::main]
async fn main() {
    #[cfg(feature = "export-spec")]
    {
        security_service_api::openapi::export_spec().expect("failed to export OpenAPI spec");
        tracing::info!("OpenAPI spec exported to shared/openapi/security.yaml");
    }

    tracing_subscriber::fmt::init();

    tracing::info!("security service starting");

    let config = shared_config::Config::from_env().expect("failed to load configuration");

    let db_pool = shared_db::init_pool(&config.database_url, 10)
        .await
        .expect("failed to connect to database");
    tracing::info!("database connected");

    let redis_handle = RedisHandle::connect(&config.redis_url)
        .await
        .expect("failed to connect to redis");
    tracing::info!("redis connected");

    let default_breaker_config = BreakerConfig::builder()
        .failure_rate_threshold_percent(config.breaker_failure_rate_threshold_percent)
        .sliding_window_size(config.breaker_sliding_window_size)
        .minimum_calls(config.breaker_minimum_calls)
        .open_duration(std::time::Duration::from_secs(config.breaker_open_duration_seconds))
        .half_open_permitted_calls(config.breaker_half_open_permitted_calls)
        .build();
    let breakers = Arc::new(BreakerRegistry::new(default_breaker_config));

    // --- infra adapters (C5-C10) ---
    let user_repo = Arc::new(PgUserRepository::new(db_pool.clone()));
    let tenant_repo = Arc::new(PgTenantRepository::new(db_pool.clone()));
    let session_repo = Arc::new(PgSessionRepository::new(db_pool.clone()));
    let mfa_repo = Arc::new(PgMfaRepository::new(db_pool.clone()));
    let audit_repo = Arc::new(PgAuditLogRepository::new(db_pool.clone()));
    let verification_repo = Arc::new(PgVerificationTokenRepository::new(db_pool.clone()));
    let service_identity_resolver = Arc::new(PgServiceIdentityResolver::new(db_pool.clone()));

    let session_cache = Arc::new(RedisSessionCache::new(redis_handle.clone()));
    let revocation = Arc::new(RedisRevocationStore::new(redis_handle.clone()));

    let kms: AnyKmsClient = if config.kms_base_url.is_empty() {
        tracing::warn!("kms_base_url unset, using in-process mock key management client");
        AnyKmsClient::Mock(MockKmsClient)
    } else {
        AnyKmsClient::Http(HttpKmsClient::new(HttpKmsConfig {
            base_url: config.kms_base_url.clone(),
            api_key: config.kms_api_token.clone(),
        }))
    };

    let geo: AnyGeoLocationLookup = if config.geoip_base_url.is_empty() {
        AnyGeoLocationLookup::Unknown(UnknownGeoLocationLookup)
    } else {
        AnyGeoLocationLookup::Http(HttpGeoLocationLookup::new(config.geoip_base_url.clone()))
    };

    let email_sender = Arc::new(
        SmtpEmailSender::new(SmtpConfig {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: (!config.smtp_username.is_empty()).then(|| config.smtp_username.clone()),
            password: (!config.smtp_password.is_empty()).then(|| config.smtp_password.clone()),
            from_email: config.smtp_from.clone(),
            from_name: "Security Service".to_string(),
            use_tls: true,
            app_base_url: config.app_base_url.clone(),
            verification_expiry_hours: config.verification_token_ttl_hours,
            reset_expiry_minutes: config.reset_token_ttl_hours * 60,
        })
        .expect("failed to build SMTP email sender"),
    );

    tracing::info!("infra adapters initialized");

    // --- core services (C4-C9) ---
    let crypto = Arc::new(CredentialEncryptionServiceImpl::new(
        kms,
        breakers.clone(),
        config.kms_key_id.clone(),
        config.data_key_cache_ttl_minutes,
        config.data_key_cache_capacity,
    ));

    let tokens = Arc::new(TokenServiceImpl::new(
        revocation.clone(),
        config.jwt_secret.clone(),
        config.jwt_kid.clone(),
        config.access_token_ttl_seconds,
        config.refresh_token_ttl_seconds,
    ));

    let sessions = Arc::new(SessionManagerImpl::new(
        session_repo,
        session_cache,
        Arc::new(geo),
        config.max_concurrent_sessions,
        config.session_timeout_minutes,
        config.extend_on_activity,
    ));

    let event_bus = Arc::new(EventBus::new(1024));
    let audit = Arc::new(AuditLogServiceImpl::new(audit_repo, event_bus));

    let mfa = Arc::new(MfaServiceImpl::new(mfa_repo, crypto, audit.clone(), config.totp_window_seconds));

    let registration = Arc::new(RegistrationPipeline::new(
        user_repo.clone(),
        verification_repo.clone(),
        email_sender.clone(),
        audit.clone(),
        breakers.clone(),
    ));

    let password_manager = Arc::new(PasswordManager::new(
        user_repo.clone(),
        verification_repo,
        email_sender,
        sessions.clone(),
        revocation,
        audit.clone(),
        breakers.clone(),
        config.reset_token_ttl_hours,
    ));

    // --- authentication strategies (C11), highest priority first ---
    let password_strategy = Arc::new(PasswordStrategy::new(
        user_repo.clone(),
        tokens.clone(),
        sessions.clone(),
        audit.clone(),
        config.max_failed_attempts as i32,
        config.account_lock_duration_minutes,
    ));
    let mfa_strategy = Arc::new(MfaStrategy::new(
        user_repo.clone(),
        tokens.clone(),
        sessions.clone(),
        mfa.clone(),
        audit.clone(),
    ));
    let social_strategy = Arc::new(SocialStrategy::new(
        Arc::new(RefusingSocialProvider),
        user_repo.clone(),
        tokens.clone(),
        sessions.clone(),
        audit.clone(),
        breakers.clone(),
        Vec::new(),
    ));
    let service_api_key_strategy = Arc::new(ServiceApiKeyStrategy::new(
        service_identity_resolver,
        config.jwt_secret.clone(),
        config.jwt_kid.clone(),
        config.service_token_ttl_seconds,
    ));

    let strategy_registry = Arc::new(StrategyRegistry::new(vec![
        password_strategy as Arc<dyn AuthStrategy>,
        mfa_strategy as Arc<dyn AuthStrategy>,
        social_strategy as Arc<dyn AuthStrategy>,
        service_api_key_strategy as Arc<dyn AuthStrategy>,
    ]));

    let facade = Arc::new(SecurityFacade::new(tokens.clone(), audit.clone()));

    let auth = Arc::new(AuthServiceImpl::new(
        strategy_registry,
        registration,
        password_manager,
        user_repo,
        tokens,
        sessions.clone(),
        audit,
    ));

    let tenants = Arc::new(TenantResolver::new(tenant_repo));
    let worker_pool = Arc::new(WorkerPool::new(16));

    tracing::info!("core services initialized");

    // Idle-session sweep (C9, spec.md §4.7 "cleanup"). Runs independently of
    // request traffic so expired sessions don't linger in Redis/Postgres
    // between logins. The recurring interval loop itself is unbounded
    // tokio::spawn (it owns the process for its lifetime); each sweep tick's
    // actual cleanup work is dispatched through the worker pool (C16) so a
    // slow Postgres/Redis round trip can't stack up unbounded concurrent
    // sweeps if `cleanup_expired` ever starts running long.
    {
        let sessions = sessions.clone();
        let worker_pool = worker_pool.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                let sessions = sessions.clone();
                worker_pool.spawn(async move {
                    match sessions.cleanup_expired().await {
                        Ok(count) if count > 0 => tracing::info!(count, "expired sessions swept"),
                        Ok(_) => {}
                        Err(e) => tracing::warn!(error = %e, "session cleanup sweep failed"),
                    }
                });
            }
        });
    }

    let state = AppState { auth, mfa, tenants, breakers, worker_pool, facade };

    let rate_limit = RateLimitState::from_config(RateLimitConfig {
        redis_url: Some(config.redis_url.clone()),
        ..Default::default()
    })
    .await;

    let app = security_service_api::router(state, rate_limit);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "security service listening");
    tracing::info!(%addr, "swagger UI available at /docs");

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind listener");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("server error");
}
