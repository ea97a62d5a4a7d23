//! Per-request context threaded through the strategies, session manager,
//! and audit log service. Device fingerprinting follows spec.md §6:
//! stable client-provided headers concatenated and SHA-256-hashed; the hash
//! (not the raw input) is what ends up in tokens/sessions.

#[derive(Debug, Clone)]
pub struct HttpContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: String,
    pub correlation_id: uuid::Uuid,
}

/// Computes the device fingerprint from the stable headers named in
/// spec.md §6 "Device fingerprint". Callers pass whichever of these were
/// present on the request; absent ones are simply omitted from the
/// concatenation rather than substituted with a placeholder, so two
/// requests differing only in which optional headers were sent still
/// produce different fingerprints (intentional — that is itself signal).
pub fn compute_device_fingerprint(
    user_agent: Option<&str>,
    accept_language: Option<&str>,
    sec_ch_ua: Option<&str>,
    x_device_id: Option<&str>,
) -> String {
    let mut raw = String::new();
    for part in [user_agent, accept_language, sec_ch_ua, x_device_id].into_iter().flatten() {
        raw.push_str(part);
        raw.push('|');
    }
    shared_crypto::sha256_hex(raw.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = compute_device_fingerprint(Some("ua"), Some("en-US"), None, Some("dev-1"));
        let b = compute_device_fingerprint(Some("ua"), Some("en-US"), None, Some("dev-1"));
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_changes_with_inputs() {
        let a = compute_device_fingerprint(Some("ua"), Some("en-US"), None, Some("dev-1"));
        let b = compute_device_fingerprint(Some("ua"), Some("en-GB"), None, Some("dev-1"));
        assert_ne!(a, b);
    }
}
