use serde::Deserialize;

/// Application configuration loaded from environment variables. Every knob
/// in spec.md §6 "Configuration" lands here with the spec's documented
/// default, following the teacher's `serde(default = "fn_name")` pattern so
/// a bare `.env` with just the secrets still boots.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Postgres connection URL — the authoritative store (C10).
    pub database_url: String,

    /// Redis connection URL — session mirror, revocation set, data-key cache.
    pub redis_url: String,

    /// HMAC-SHA256 signing secret for access/refresh tokens (C6).
    pub jwt_secret: String,

    /// Key id embedded in issued tokens' header, for rotation bookkeeping.
    #[serde(default = "default_jwt_kid")]
    pub jwt_kid: String,

    /// Access token TTL in seconds (default: 900 = 15 minutes).
    #[serde(default = "default_access_token_ttl_seconds")]
    pub access_token_ttl_seconds: i64,

    /// Refresh token TTL in seconds (default: 14 days).
    #[serde(default = "default_refresh_token_ttl_seconds")]
    pub refresh_token_ttl_seconds: i64,

    /// Server bind host.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    // --- Session manager (C9) ---
    /// Maximum concurrent active sessions per user; oldest is evicted first.
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: u32,

    /// Idle session timeout in minutes.
    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: i64,

    /// Whether session activity extends `expires_at`.
    #[serde(default = "default_extend_on_activity")]
    pub extend_on_activity: bool,

    // --- Credential lockout (C10) ---
    /// Failed login attempts before the account is locked.
    #[serde(default = "default_max_failed_attempts")]
    pub max_failed_attempts: u32,

    /// Account lock duration in minutes once the threshold is hit.
    #[serde(default = "default_account_lock_duration_minutes")]
    pub account_lock_duration_minutes: i64,

    /// Password age after which a change is required, in days.
    #[serde(default = "default_password_expiry_days")]
    pub password_expiry_days: i64,

    // --- MFA (C7) ---
    /// TOTP time-step size in seconds.
    #[serde(default = "default_totp_window_seconds")]
    pub totp_window_seconds: u64,

    // --- Credential encryption (C4/C5) ---
    /// How long a decrypted data key is cached in memory before re-fetch.
    #[serde(default = "default_data_key_cache_ttl_minutes")]
    pub data_key_cache_ttl_minutes: i64,

    // --- Circuit breaker (C3) ---
    #[serde(default = "default_breaker_failure_rate_threshold_percent")]
    pub breaker_failure_rate_threshold_percent: u8,
    #[serde(default = "default_breaker_sliding_window_size")]
    pub breaker_sliding_window_size: usize,
    #[serde(default = "default_breaker_minimum_calls")]
    pub breaker_minimum_calls: usize,
    #[serde(default = "default_breaker_open_duration_seconds")]
    pub breaker_open_duration_seconds: u64,
    #[serde(default = "default_breaker_half_open_permitted_calls")]
    pub breaker_half_open_permitted_calls: usize,

    // --- Verification tokens / notifications (C12/C13) ---
    /// Public base URL embedded in verification/reset email links.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,

    /// Email-verification token lifetime in hours.
    #[serde(default = "default_verification_token_ttl_hours")]
    pub verification_token_ttl_hours: i64,

    /// Password-reset token lifetime in hours.
    #[serde(default = "default_reset_token_ttl_hours")]
    pub reset_token_ttl_hours: i64,

    /// SMTP relay host. Empty disables real delivery (dev-mode log-only).
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub smtp_username: String,
    #[serde(default)]
    pub smtp_password: String,
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,

    // --- Key management (C4/C5) ---
    /// KMS endpoint base URL. Empty selects the non-durable in-process mock.
    #[serde(default)]
    pub kms_base_url: String,
    #[serde(default)]
    pub kms_api_token: String,
    #[serde(default = "default_kms_key_id")]
    pub kms_key_id: String,
    #[serde(default = "default_data_key_cache_capacity")]
    pub data_key_cache_capacity: usize,

    // --- Service API-key strategy (C11) ---
    #[serde(default = "default_service_token_ttl_seconds")]
    pub service_token_ttl_seconds: i64,

    // --- Geo-IP lookup (C9) ---
    /// Geo-IP provider base URL. Empty selects the `"Unknown"` stub.
    #[serde(default)]
    pub geoip_base_url: String,
}

fn default_access_token_ttl_seconds() -> i64 {
    900
}

fn default_refresh_token_ttl_seconds() -> i64 {
    14 * 24 * 60 * 60
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_concurrent_sessions() -> u32 {
    3
}

fn default_session_timeout_minutes() -> i64 {
    30
}

fn default_extend_on_activity() -> bool {
    true
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_account_lock_duration_minutes() -> i64 {
    30
}

fn default_password_expiry_days() -> i64 {
    90
}

fn default_totp_window_seconds() -> u64 {
    30
}

fn default_data_key_cache_ttl_minutes() -> i64 {
    60
}

fn default_breaker_failure_rate_threshold_percent() -> u8 {
    50
}

fn default_breaker_sliding_window_size() -> usize {
    20
}

fn default_breaker_minimum_calls() -> usize {
    10
}

fn default_breaker_open_duration_seconds() -> u64 {
    30
}

fn default_breaker_half_open_permitted_calls() -> usize {
    3
}

fn default_jwt_kid() -> String {
    "security-service-1".to_string()
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_verification_token_ttl_hours() -> i64 {
    24
}

fn default_reset_token_ttl_hours() -> i64 {
    1
}

fn default_smtp_port() -> u16 {
    587
}

fn default_smtp_from() -> String {
    "no-reply@example.com".to_string()
}

fn default_kms_key_id() -> String {
    "security-service/credentials".to_string()
}

fn default_data_key_cache_capacity() -> usize {
    8
}

fn default_service_token_ttl_seconds() -> i64 {
    300
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// spec-documented defaults for anything unset.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("no .env file loaded: {}", e);
        }

        let builder = config::Config::builder()
            .set_default("database_url", "")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("jwt_secret", "")?
            .set_default("jwt_kid", default_jwt_kid())?
            .set_default("access_token_ttl_seconds", 900)?
            .set_default("refresh_token_ttl_seconds", 14 * 24 * 60 * 60)?
            .set_default("host", "0.0.0.0")?
            .set_default("port", 3000)?
            .set_default("max_concurrent_sessions", 3)?
            .set_default("session_timeout_minutes", 30)?
            .set_default("extend_on_activity", true)?
            .set_default("max_failed_attempts", 5)?
            .set_default("account_lock_duration_minutes", 30)?
            .set_default("password_expiry_days", 90)?
            .set_default("totp_window_seconds", 30)?
            .set_default("data_key_cache_ttl_minutes", 60)?
            .set_default("breaker_failure_rate_threshold_percent", 50)?
            .set_default("breaker_sliding_window_size", 20)?
            .set_default("breaker_minimum_calls", 10)?
            .set_default("breaker_open_duration_seconds", 30)?
            .set_default("breaker_half_open_permitted_calls", 3)?
            .set_default("app_base_url", default_app_base_url())?
            .set_default("verification_token_ttl_hours", 24)?
            .set_default("reset_token_ttl_hours", 1)?
            .set_default("smtp_host", "")?
            .set_default("smtp_port", 587)?
            .set_default("smtp_username", "")?
            .set_default("smtp_password", "")?
            .set_default("smtp_from", default_smtp_from())?
            .set_default("kms_base_url", "")?
            .set_default("kms_api_token", "")?
            .set_default("kms_key_id", default_kms_key_id())?
            .set_default("data_key_cache_capacity", 8)?
            .set_default("service_token_ttl_seconds", 300)?
            .set_default("geoip_base_url", "")?
            .add_source(config::Environment::default());

        let built = builder.build()?;
        let deserialized = built.try_deserialize::<Config>()?;
        tracing::debug!(host = %deserialized.host, port = deserialized.port, "configuration loaded");

        Ok(deserialized)
    }
}
