//! SMTP-backed `EmailSender` (C12/C13 notification side-channel,
//! spec.md §4.9/§4.10). Grounded on the teacher's `SmtpEmailSender`
//! (lettre transport construction, HTML/text templates) — rewired against
//! `core`'s `EmailSender` trait (`send_verification_email`/
//! `send_password_reset_email`, a token rather than a pre-built URL) and
//! with the C3 circuit-breaker wrapping left to the call site in `core`
//! (`registration.rs`/`password_management.rs` already wrap these calls
//! with `shared_breaker::EMAIL`), so this type does not double-wrap.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use shared_error::AppError;

use security_service_core::domains::auth::domain::verification_token_repository::EmailSender;

/// SMTP configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub use_tls: bool,
    /// Base URL the verification/reset links are built against, e.g.
    /// `https://app.example.com`.
    pub app_base_url: String,
    pub verification_expiry_hours: i64,
    pub reset_expiry_minutes: i64,
}

impl SmtpConfig {
    /// Check if SMTP is properly configured
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

/// Email content with both HTML and plain text versions
#[derive(Debug, Clone)]
struct EmailContent {
    to: String,
    subject: String,
    html_body: String,
    text_body: String,
}

/// SMTP Email Sender implementation
pub struct SmtpEmailSender {
    config: SmtpConfig,
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl SmtpEmailSender {
    /// Create a new SMTP email sender
    pub fn new(config: SmtpConfig) -> Result<Self, AppError> {
        if !config.is_configured() {
            tracing::warn!("SMTP not configured - email sending will be disabled");
            return Ok(Self {
                config,
                transport: None,
            });
        }

        let transport = Self::build_transport(&config)?;

        tracing::info!(
            host = %config.host,
            port = %config.port,
            tls = %config.use_tls,
            "SMTP email sender initialized"
        );

        Ok(Self {
            config,
            transport: Some(transport),
        })
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, AppError> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host).map_err(|e| {
                AppError::Internal(format!("Failed to create SMTP transport: {}", e))
            })?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port);

        // Add credentials if provided
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            let creds = Credentials::new(username.clone(), password.clone());
            builder = builder.credentials(creds);
        }

        Ok(builder.build())
    }

    fn build_message(&self, content: &EmailContent) -> Result<Message, AppError> {
        let from_mailbox: Mailbox =
            format!("{} <{}>", self.config.from_name, self.config.from_email)
                .parse()
                .map_err(|e| AppError::ValidationError(format!("Invalid from address: {}", e)))?;

        let to_mailbox: Mailbox = content
            .to
            .parse()
            .map_err(|e| AppError::ValidationError(format!("Invalid to address: {}", e)))?;

        let message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(&content.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(content.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(content.html_body.clone()),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        Ok(message)
    }
}

impl SmtpEmailSender {
    async fn dispatch(&self, content: EmailContent) -> Result<(), AppError> {
        let transport = match &self.transport {
            Some(t) => t,
            None => {
                tracing::info!(
                    to = %content.to,
                    subject = %content.subject,
                    "[DEV] Email would be sent (SMTP not configured)"
                );
                return Ok(());
            },
        };

        let message = self.build_message(&content)?;

        match transport.send(message).await {
            Ok(response) => {
                tracing::info!(
                    to = %content.to,
                    subject = %content.subject,
                    code = ?response.code(),
                    "Email sent successfully"
                );
                Ok(())
            },
            Err(e) => {
                tracing::error!(
                    to = %content.to,
                    subject = %content.subject,
                    error = %e,
                    "Failed to send email"
                );
                Err(AppError::Internal(format!("Failed to send email: {}", e)))
            },
        }
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_verification_email(&self, to: &str, token_plaintext: &str) -> Result<(), AppError> {
        let verification_url = format!("{}/verify-email?token={}", self.config.app_base_url, token_plaintext);
        self.dispatch(EmailContent {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            html_body: templates::verification_email_html(&verification_url, self.config.verification_expiry_hours),
            text_body: templates::verification_email_text(&verification_url, self.config.verification_expiry_hours),
        })
        .await
    }

    async fn send_password_reset_email(&self, to: &str, token_plaintext: &str) -> Result<(), AppError> {
        let reset_url = format!("{}/reset-password?token={}", self.config.app_base_url, token_plaintext);
        self.dispatch(EmailContent {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            html_body: templates::password_reset_email_html(&reset_url, self.config.reset_expiry_minutes),
            text_body: templates::password_reset_email_text(&reset_url, self.config.reset_expiry_minutes),
        })
        .await
    }
}

/// Email templates for verification emails
pub mod templates {
    /// Generate HTML email template for email verification
    pub fn verification_email_html(verification_url: &str, expiry_hours: i64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Verify Your Email</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 600px;
            margin: 0 auto;
            padding: 20px;
        }}
        .header {{
            text-align: center;
            padding: 20px 0;
            border-bottom: 1px solid #eee;
        }}
        .content {{
            padding: 30px 0;
        }}
        .button {{
            display: inline-block;
            background-color: #4F46E5;
            color: white !important;
            text-decoration: none;
            padding: 12px 30px;
            border-radius: 6px;
            font-weight: 600;
            margin: 20px 0;
        }}
        .button:hover {{
            background-color: #4338CA;
        }}
        .footer {{
            text-align: center;
            padding: 20px 0;
            border-top: 1px solid #eee;
            color: #666;
            font-size: 14px;
        }}
        .link {{
            word-break: break-all;
            color: #4F46E5;
        }}
    </style>
</head>
<body>
    <div class="header">
        <h1>Anthill</h1>
    </div>
    <div class="content">
        <h2>Verify Your Email Address</h2>
        <p>Thank you for registering! Please click the button below to verify your email address:</p>
        <p style="text-align: center;">
            <a href="{verification_url}" class="button">Verify Email</a>
        </p>
        <p>Or copy and paste this link into your browser:</p>
        <p class="link">{verification_url}</p>
        <p><strong>This link will expire in {expiry_hours} hours.</strong></p>
        <p>If you did not create an account, please ignore this email.</p>
    </div>
    <div class="footer">
        <p>&copy; 2026 Anthill. All rights reserved.</p>
        <p>This is an automated message, please do not reply.</p>
    </div>
</body>
</html>"#,
            verification_url = verification_url,
            expiry_hours = expiry_hours
        )
    }

    /// Generate plain text email template for email verification
    pub fn verification_email_text(verification_url: &str, expiry_hours: i64) -> String {
        format!(
            r#"Verify Your Email Address

Thank you for registering with Anthill!

Please click the link below to verify your email address:

{verification_url}

This link will expire in {expiry_hours} hours.

If you did not create an account, please ignore this email.

---
Anthill
This is an automated message, please do not reply."#,
            verification_url = verification_url,
            expiry_hours = expiry_hours
        )
    }

    /// Generate HTML email template for password reset
    pub fn password_reset_email_html(reset_url: &str, expiry_minutes: i64) -> String {
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Reset Your Password</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, sans-serif;
            line-height: 1.6;
            color: #333;
            max-width: 600px;
            margin: 0 auto;
            padding: 20px;
        }}
        .header {{
            text-align: center;
            padding: 20px 0;
            border-bottom: 1px solid #eee;
        }}
        .content {{
            padding: 30px 0;
        }}
        .button {{
            display: inline-block;
            background-color: #DC2626;
            color: white !important;
            text-decoration: none;
            padding: 12px 30px;
            border-radius: 6px;
            font-weight: 600;
            margin: 20px 0;
        }}
        .button:hover {{
            background-color: #B91C1C;
        }}
        .footer {{
            text-align: center;
            padding: 20px 0;
            border-top: 1px solid #eee;
            color: #666;
            font-size: 14px;
        }}
        .link {{
            word-break: break-all;
            color: #DC2626;
        }}
        .warning {{
            background-color: #FEF2F2;
            border: 1px solid #FECACA;
            border-radius: 6px;
            padding: 15px;
            margin: 20px 0;
        }}
    </style>
</head>
<body>
    <div class="header">
        <h1>Anthill</h1>
    </div>
    <div class="content">
        <h2>Reset Your Password</h2>
        <p>We received a request to reset your password. Click the button below to create a new password:</p>
        <p style="text-align: center;">
            <a href="{reset_url}" class="button">Reset Password</a>
        </p>
        <p>Or copy and paste this link into your browser:</p>
        <p class="link">{reset_url}</p>
        <p><strong>This link will expire in {expiry_minutes} minutes.</strong></p>
        <div class="warning">
            <strong>Security Notice:</strong> If you did not request a password reset, please ignore this email. Your password will remain unchanged.
        </div>
    </div>
    <div class="footer">
        <p>&copy; 2026 Anthill. All rights reserved.</p>
        <p>This is an automated message, please do not reply.</p>
    </div>
</body>
</html>"#,
            reset_url = reset_url,
            expiry_minutes = expiry_minutes
        )
    }

    /// Generate plain text email template for password reset
    pub fn password_reset_email_text(reset_url: &str, expiry_minutes: i64) -> String {
        format!(
            r#"Reset Your Password

We received a request to reset your password for your Anthill account.

Click the link below to create a new password:

{reset_url}

This link will expire in {expiry_minutes} minutes.

SECURITY NOTICE: If you did not request a password reset, please ignore this email. Your password will remain unchanged.

---
Anthill
This is an automated message, please do not reply."#,
            reset_url = reset_url,
            expiry_minutes = expiry_minutes
        )
    }
}
