use axum::{
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap},
};
use security_service_core::domains::auth::domain::http_context::{
    compute_device_fingerprint, HttpContext,
};
use shared_error::AppError;
use shared_jwt::{Claims, TokenKind};
use std::net::SocketAddr;
use uuid::Uuid;

use crate::AppState;

/// Extract client IP address from request
/// 
/// Tries in order:
/// 1. X-Forwarded-For header (if behind proxy)
/// 2. X-Real-IP header
/// 3. ConnectInfo socket address
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Option<String> {
    // Try X-Forwarded-For first (common when behind proxy/load balancer)
    if let Some(forwarded_for) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded_for.to_str() {
            // X-Forwarded-For can be comma-separated: "client, proxy1, proxy2"
            // Take the first (leftmost) IP which is the original client
            if let Some(client_ip) = value.split(',').next() {
                return Some(client_ip.trim().to_string());
            }
        }
    }
    
    // Try X-Real-IP (set by some proxies)
    if let Some(real_ip) = headers.get("x-real-ip") {
        if let Ok(value) = real_ip.to_str() {
            return Some(value.to_string());
        }
    }
    
    // Fallback to direct connection info
    connect_info.map(|info| info.0.ip().to_string())
}

/// Extract User-Agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(|s| s.to_string())
}

/// Custom extractor for client metadata (IP and User-Agent)
/// 
/// This can be used directly in handler parameters.
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;
    
    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        // Extract ConnectInfo if available
        let connect_info = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok();
        
        let ip_address = extract_client_ip(&parts.headers, connect_info);
        let user_agent = extract_user_agent(&parts.headers);
        
        Ok(ClientInfo {
            ip_address,
            user_agent,
        })
    }
}

/// `X-Tenant-Id` header, parsed if present. Absent or malformed is `None` —
/// callers decide whether the operation they're serving requires one
/// (see `TenantResolver`).
pub struct TenantHeader(pub Option<Uuid>);

impl<S> FromRequestParts<S> for TenantHeader
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = parts
            .headers
            .get("x-tenant-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok());
        Ok(TenantHeader(tenant_id))
    }
}

/// Assembles the full [`HttpContext`] threaded into core auth operations:
/// client IP, user agent, device fingerprint (spec.md §6), and a fresh
/// correlation id for this request.
pub struct RequestContext(pub HttpContext);

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let connect_info = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .ok();
        let ip_address = extract_client_ip(&parts.headers, connect_info);
        let user_agent = extract_user_agent(&parts.headers);

        let header_str = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let accept_language = header_str("accept-language");
        let sec_ch_ua = header_str("sec-ch-ua");
        let x_device_id = header_str("x-device-id");

        let device_fingerprint = compute_device_fingerprint(
            user_agent.as_deref(),
            accept_language.as_deref(),
            sec_ch_ua.as_deref(),
            x_device_id.as_deref(),
        );

        Ok(RequestContext(HttpContext {
            ip_address,
            user_agent,
            device_fingerprint,
            correlation_id: Uuid::new_v4(),
        }))
    }
}

/// Bearer access token, validated into `Claims` (C6). Rejects with the
/// same `AppError` the token service itself returns — expired, revoked, or
/// malformed tokens all surface as the façade's normal 401 response.
pub struct AuthenticatedUser(pub Claims);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let State(state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::TokenMalformed)?;

        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::TokenMalformed)?;

        let claims = state.auth.tokens().validate(token, TokenKind::Access).await?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Raw bearer token, unvalidated. Used by handlers that delegate
/// authentication to `SecurityFacade::invoke` (C14) instead of validating
/// up front the way `AuthenticatedUser` does — the façade needs the token
/// string itself, not just the `Claims` it decodes to.
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::TokenMalformed)?;
        Ok(BearerToken(token.to_string()))
    }
}
