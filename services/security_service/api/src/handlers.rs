use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use security_service_core::domains::auth::domain::model::AuditEventType;
use security_service_core::domains::auth::domain::security_facade::OperationContext;
use security_service_core::domains::auth::domain::service::AuthService;
use security_service_core::domains::auth::dto::auth_dto::*;
use shared_error::AppError;
use validator::Validate;

use crate::extractors::{AuthenticatedUser, BearerToken, RequestContext, TenantHeader};
use crate::AppState;

/// Health check endpoint (spec.md §6 "Health endpoint"). Reports the
/// liveness of every outbound dependency the circuit breaker registry
/// (C3) knows about, alongside a flat `ok`/`degraded` summary.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    operation_id = "security_health_check",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResp),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResp> {
    let snapshot = state.breakers.health_snapshot().await;
    let status = if snapshot.values().any(|s| !matches!(s, shared_breaker::State::Closed)) {
        "degraded"
    } else {
        "ok"
    };
    Json(HealthResp {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    })
}

/// Registers a new user, optionally joining or creating a tenant
/// (spec.md §4.9, §6 `POST /auth/register`).
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    operation_id = "security_register",
    request_body = RegisterReq,
    responses(
        (status = 201, description = "User registered successfully", body = AuthResp),
        (status = 400, description = "Invalid request", body = ErrorResp),
        (status = 409, description = "User already exists", body = ErrorResp),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    TenantHeader(tenant_header): TenantHeader,
    RequestContext(ctx): RequestContext,
    Json(payload): Json<RegisterReq>,
) -> Result<(StatusCode, Json<AuthResp>), AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let tenant_id = state
        .tenants
        .resolve_for_registration(tenant_header, payload.tenant_name.as_deref())
        .await?;

    let resp = state.auth.register(tenant_id, payload, &ctx).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// Authenticates a user via whichever strategy (C11) `LoginReq` selects —
/// password, MFA step-up, social, or service API key — and returns a
/// token pair (spec.md §6 `POST /auth/login`).
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    operation_id = "security_login",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Login successful", body = AuthResp),
        (status = 401, description = "Invalid credentials", body = ErrorResp),
        (status = 423, description = "Account locked", body = ErrorResp),
    )
)]
pub async fn login(
    State(state): State<AppState>,
    TenantHeader(tenant_header): TenantHeader,
    RequestContext(ctx): RequestContext,
    Json(payload): Json<LoginReq>,
) -> Result<Json<AuthResp>, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let tenant_id = state.tenants.resolve_existing(tenant_header).await?;
    let resp = state.auth.login(tenant_id, payload, &ctx).await?;
    Ok(Json(resp))
}

/// Exchanges a refresh token for a fresh token pair (spec.md §6
/// `POST /auth/refresh`). The device fingerprint of the refreshing
/// request must match the one the refresh token was issued for.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "auth",
    operation_id = "security_refresh_token",
    request_body = RefreshReq,
    responses(
        (status = 200, description = "Token refreshed", body = AuthResp),
        (status = 401, description = "Invalid refresh token", body = ErrorResp),
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(payload): Json<RefreshReq>,
) -> Result<Json<AuthResp>, AppError> {
    payload.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let resp = state.auth.refresh_token(payload, &ctx).await?;
    Ok(Json(resp))
}

/// Revokes the bearer access token and, if supplied, the refresh token
/// (spec.md §6 `POST /auth/logout`).
#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    operation_id = "security_logout",
    request_body = LogoutReq,
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Invalid access token", body = ErrorResp),
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    headers: axum::http::HeaderMap,
    body: Option<Json<LogoutReq>>,
) -> Result<StatusCode, AppError> {
    let access_token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AppError::TokenMalformed)?;

    let refresh_token = body.and_then(|Json(req)| req.refresh_token);
    state.auth.logout(access_token, refresh_token.as_deref(), &ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i32>,
    pub page_size: Option<i32>,
}

/// Lists users within the caller's tenant, paginated (spec.md §6
/// `GET /users`). Requires a valid access token. Routed through
/// `SecurityFacade` (C14) rather than calling `state.auth` directly, since
/// directory access has no audit coverage of its own at the service layer.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    operation_id = "security_list_users",
    params(
        ("page" = Option<i32>, Query, description = "Page number (default: 1)"),
        ("page_size" = Option<i32>, Query, description = "Page size (default: 20)"),
    ),
    responses(
        (status = 200, description = "List of users", body = UserListResp),
        (status = 401, description = "Unauthorized", body = ErrorResp),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    BearerToken(token): BearerToken,
    RequestContext(ctx): RequestContext,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<UserListResp>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);
    let tenant_id = claims.tenant_id;

    let op = OperationContext {
        operation: "list_users",
        required_role: None,
        event_type: AuditEventType::AdminUserAccess,
    };
    let resp = state
        .facade
        .invoke(op, &token, &ctx, (), |_| Ok(()), state.auth.list_users(tenant_id, page, page_size))
        .await?;
    Ok(Json(resp))
}

/// Fetches a single user by id within the caller's tenant (spec.md §6
/// `GET /users/{user_id}`). Routed through `SecurityFacade` (C14) for the
/// same reason as `list_users`.
#[utoipa::path(
    get,
    path = "/users/{user_id}",
    tag = "users",
    operation_id = "security_get_user",
    params(("user_id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserInfo),
        (status = 401, description = "Unauthorized", body = ErrorResp),
        (status = 404, description = "User not found", body = ErrorResp),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    BearerToken(token): BearerToken,
    RequestContext(ctx): RequestContext,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserInfo>, AppError> {
    let tenant_id = claims.tenant_id;

    let op = OperationContext {
        operation: "get_user",
        required_role: None,
        event_type: AuditEventType::AdminUserAccess,
    };
    let resp = state
        .facade
        .invoke(op, &token, &ctx, (), |_| Ok(()), state.auth.get_user(user_id, tenant_id))
        .await?;
    Ok(Json(resp))
}
