use security_service_core::domains::auth::dto::auth_dto::*;
use security_service_core::domains::auth::dto::email_verification_dto::*;
use security_service_core::domains::auth::dto::mfa_dto::*;
use security_service_core::domains::auth::dto::password_reset_dto::*;
use utoipa::OpenApi;

/// OpenAPI documentation for the security service (spec.md §6).
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health_check,
        crate::handlers::register,
        crate::handlers::login,
        crate::handlers::refresh_token,
        crate::handlers::logout,
        crate::handlers::list_users,
        crate::handlers::get_user,
        crate::verification_handlers::verify_email,
        crate::password_reset_handlers::initiate_reset,
        crate::password_reset_handlers::complete_reset,
        crate::password_reset_handlers::change_password,
        crate::mfa_handlers::enroll,
        crate::mfa_handlers::confirm,
        crate::mfa_handlers::verify,
    ),
    components(
        schemas(
            HealthResp,
            RegisterReq,
            LoginReq,
            RefreshReq,
            LogoutReq,
            AuthResp,
            UserInfo,
            UserListResp,
            ErrorResp,
            VerifyEmailResp,
            InitiatePasswordResetReq,
            CompletePasswordResetReq,
            ChangePasswordReq,
            EnrollMfaResp,
            ConfirmMfaReq,
            VerifyMfaReq,
            VerifyMfaResp,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication, session, and credential-management endpoints"),
        (name = "users", description = "User lookup endpoints"),
        (name = "mfa", description = "Multi-factor authentication enrollment and verification"),
    ),
    info(
        title = "Security Service API",
        version = "0.1.0",
        description = "Authentication, session, and credential-management core of a multi-tenant trading platform",
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server"),
    ),
)]
pub struct ApiDoc;

/// Export OpenAPI spec to YAML file (only with --features export-spec)
#[cfg(feature = "export-spec")]
#[allow(dead_code)]
pub fn export_spec() -> std::io::Result<()> {
    use std::path::Path;

    let openapi = ApiDoc::openapi();
    let yaml = serde_yaml::to_string(&openapi).expect("Failed to serialize OpenAPI to YAML");

    let path = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../../../shared/openapi/security.yaml"));

    std::fs::create_dir_all(path.parent().unwrap())?;
    std::fs::write(path, yaml)?;

    println!("cargo:warning=OpenAPI spec exported to {:?}", path);
    Ok(())
}
