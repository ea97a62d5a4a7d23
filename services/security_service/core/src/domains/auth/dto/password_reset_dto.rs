use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// `POST /auth/password/reset/initiate` (spec.md §6). Always responds 202,
/// whether or not the email exists, to prevent enumeration.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct InitiatePasswordResetReq {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// `POST /auth/password/reset/complete` (spec.md §6).
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CompletePasswordResetReq {
    #[validate(length(min = 1))]
    #[schema(example = "a1b2c3...")]
    pub token: String,

    #[validate(length(min = 8, max = 128))]
    #[serde(rename = "newPassword")]
    #[schema(example = "NewSecurePassword123!")]
    pub new_password: String,
}

/// `POST /auth/password/change` (spec.md §6). Authenticated — requires
/// current-password proof rather than a verification token.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordReq {
    #[validate(length(min = 1))]
    #[serde(rename = "currentPassword")]
    pub current_password: String,

    #[validate(length(min = 8, max = 128))]
    #[serde(rename = "newPassword")]
    #[schema(example = "NewSecurePassword123!")]
    pub new_password: String,
}

/// Helper to mask an email for log/audit lines that must not leak the full
/// address (e.g. `EMAIL_SEND_PENDING` audit details).
pub fn mask_email(email: &str) -> String {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return "***@***.***".to_string();
    }

    let local = parts[0];
    let domain = parts[1];

    let masked_local = if local.len() <= 1 {
        "*".to_string()
    } else {
        format!("{}***", &local[..1])
    };

    let domain_parts: Vec<&str> = domain.split('.').collect();
    let masked_domain = if domain_parts.len() >= 2 {
        let name = domain_parts[0];
        let ext = domain_parts[domain_parts.len() - 1];
        let masked_name = if name.len() <= 1 {
            "*".to_string()
        } else {
            format!("{}*****", &name[..1])
        };
        format!("{}.{}", masked_name, ext)
    } else {
        "*****".to_string()
    };

    format!("{}@{}", masked_local, masked_domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_typical_email() {
        assert_eq!(mask_email("user@example.com"), "u***@e*****.com");
    }

    #[test]
    fn masks_single_char_local_and_domain() {
        assert_eq!(mask_email("a@b.co"), "*@*.co");
    }

    #[test]
    fn falls_back_on_malformed_input() {
        assert_eq!(mask_email("invalid"), "***@***.***");
    }
}
