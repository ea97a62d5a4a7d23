use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Standard error response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResp {
    /// Error message
    #[schema(example = "bad_credentials")]
    pub error: String,

    /// Error code for client-side handling
    #[schema(example = "BAD_CREDENTIALS")]
    pub code: Option<String>,
}

/// Health check response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HealthResp {
    /// Service status
    #[schema(example = "ok")]
    pub status: String,

    /// Service version
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// User registration request (spec.md §6 `POST /auth/register`)
#[derive(Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterReq {
    #[validate(email)]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 8))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,

    #[validate(length(min = 1))]
    #[serde(rename = "firstName")]
    #[schema(example = "Jane")]
    pub first_name: String,

    #[validate(length(min = 1))]
    #[serde(rename = "lastName")]
    #[schema(example = "Doe")]
    pub last_name: String,

    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: Option<chrono::NaiveDate>,

    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,

    pub address: Option<String>,

    /// Tenant name - creates new tenant if it doesn't exist, joins if it does.
    #[serde(rename = "tenantName")]
    pub tenant_name: Option<String>,
}

/// Login request (spec.md §6 `POST /auth/login`)
#[derive(Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginReq {
    #[validate(email)]
    #[schema(example = "user@example.com")]
    pub email: String,

    #[validate(length(min = 1))]
    #[schema(example = "SecurePass123!")]
    pub password: String,

    #[serde(rename = "mfaCode")]
    pub mfa_code: Option<String>,

    #[serde(rename = "socialProvider")]
    pub social_provider: Option<String>,

    #[serde(rename = "socialToken")]
    pub social_token: Option<String>,
}

/// Authentication response with JWT tokens (spec.md §6 `POST /auth/login`)
#[derive(Serialize, Deserialize, ToSchema)]
pub struct AuthResp {
    #[serde(rename = "accessToken")]
    pub access_token: String,

    #[serde(rename = "refreshToken")]
    pub refresh_token: String,

    #[serde(rename = "tokenType")]
    #[schema(example = "Bearer")]
    pub token_type: String,

    #[serde(rename = "expiresIn")]
    #[schema(example = 900)]
    pub expires_in: i64,

    pub user: UserInfo,

    #[serde(rename = "deviceFingerprint")]
    pub device_fingerprint: String,

    #[serde(rename = "requiresMfa", skip_serializing_if = "Option::is_none")]
    pub requires_mfa: Option<bool>,
}

/// User information returned in auth responses
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserInfo {
    pub id: Uuid,

    #[schema(example = "user@example.com")]
    pub email: String,

    #[serde(rename = "firstName")]
    pub first_name: String,

    #[serde(rename = "lastName")]
    pub last_name: String,

    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,

    /// User role (owner/admin/trader/user), assigned at registration.
    #[schema(example = "user")]
    pub role: String,

    /// Account status (active/locked/suspended/deactivated).
    #[schema(example = "active")]
    pub status: String,

    #[serde(rename = "emailVerified")]
    pub email_verified: bool,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Refresh token request (spec.md §6 `POST /auth/refresh`)
#[derive(Serialize, Deserialize, ToSchema, Validate)]
pub struct RefreshReq {
    #[validate(length(min = 1))]
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Logout request (spec.md §6 `POST /auth/logout`). The access token comes
/// from the `Authorization` header; the body is optional since the spec
/// only requires the header, but a client that still holds its refresh
/// token may include it so that is revoked too.
#[derive(Serialize, Deserialize, ToSchema, Default)]
pub struct LogoutReq {
    #[serde(rename = "refreshToken", default)]
    pub refresh_token: Option<String>,
}

/// List of users (paginated)
#[derive(Serialize, Deserialize, ToSchema)]
pub struct UserListResp {
    pub users: Vec<UserInfo>,
    pub total: i64,
    #[schema(example = 1)]
    pub page: i32,
    #[serde(rename = "pageSize")]
    #[schema(example = 20)]
    pub page_size: i32,
}
