use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// `POST /auth/mfa/enroll` response (spec.md §6). `backupCodes` are
/// returned in plaintext exactly once — only their bcrypt hashes are
/// persisted (C7).
#[derive(Debug, Serialize, ToSchema)]
pub struct EnrollMfaResp {
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(rename = "provisioningUri")]
    pub provisioning_uri: String,
    #[serde(rename = "backupCodes")]
    pub backup_codes: Vec<String>,
}

/// `POST /auth/mfa/confirm` (enrollment confirmation — the first TOTP code
/// proving the authenticator app is wired correctly before MFA is enabled).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmMfaReq {
    #[validate(length(min = 6, max = 6))]
    pub code: String,
}

/// `POST /auth/mfa/verify` (spec.md §6). Unauthenticated step-up check used
/// mid-login-flow or wherever a caller already knows the user id.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyMfaReq {
    #[serde(rename = "userId")]
    pub user_id: uuid::Uuid,
    #[validate(length(min = 6))]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyMfaResp {
    pub verified: bool,
}
