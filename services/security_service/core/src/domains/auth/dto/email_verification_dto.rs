use serde::Serialize;
use uuid::Uuid;
use utoipa::ToSchema;

/// Response for `GET /auth/verify/email/{token}` (spec.md §6).
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyEmailResp {
    pub user_id: Uuid,
    pub email: String,
    pub verified: bool,
}
