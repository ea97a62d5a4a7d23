//! TOTP (RFC 6238) over HMAC-SHA1, and the HOTP counter primitive it builds
//! on (RFC 4226). Digits and period are fixed at the values spec.md's C7
//! mandates (6 digits, 30s) but are left as parameters so callers are
//! explicit about them rather than relying on a hidden default.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

fn hotp(secret: &[u8], counter: u64, digits: u32) -> String {
    let mut mac = HmacSha1::new_from_slice(secret).expect("HMAC accepts keys of any length");
    mac.update(&counter.to_be_bytes());
    let hash = mac.finalize().into_bytes();

    let offset = (hash[hash.len() - 1] & 0x0f) as usize;
    let binary = ((u32::from(hash[offset]) & 0x7f) << 24)
        | (u32::from(hash[offset + 1]) << 16)
        | (u32::from(hash[offset + 2]) << 8)
        | u32::from(hash[offset + 3]);

    let modulus = 10u32.pow(digits);
    format!("{:0width$}", binary % modulus, width = digits as usize)
}

/// Generate the TOTP code for the step containing `unix_time`.
pub fn generate(secret: &[u8], unix_time: u64, period_seconds: u64, digits: u32) -> String {
    let counter = unix_time / period_seconds;
    hotp(secret, counter, digits)
}

/// Verify `code` against the steps within `window` of `unix_time` (inclusive
/// on both sides, so `window=1` checks the current step plus one step either
/// side). Returns the matched step index on success, for replay tracking —
/// the same `(user, step)` pair must not verify twice within `2 * window`
/// steps, per spec.md's replay-defence requirement.
pub fn verify(
    secret: &[u8],
    code: &str,
    unix_time: u64,
    period_seconds: u64,
    digits: u32,
    window: i64,
) -> Option<i64> {
    let current_step = (unix_time / period_seconds) as i64;
    for delta in -window..=window {
        let step = current_step + delta;
        if step < 0 {
            continue;
        }
        if hotp(secret, step as u64, digits) == code {
            return Some(step);
        }
    }
    None
}

/// Build the `otpauth://` provisioning URI per spec.md §6.
pub fn provisioning_uri(issuer: &str, account_email: &str, secret_base32: &str) -> String {
    format!(
        "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits=6&period=30",
        issuer = urlencode(issuer),
        account = urlencode(account_email),
        secret = secret_base32,
    )
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
