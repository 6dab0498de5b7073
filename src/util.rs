//! Shared utility functions.

use axum::http::HeaderMap;
use chrono::Utc;
use rand::Rng;
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// Alphabet for license key groups. No 0/O or 1/I so keys survive being read aloud.
const KEY_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const KEY_GROUPS: usize = 4;
const KEY_GROUP_LEN: usize = 4;
const MAX_PREFIX_LEN: usize = 16;

/// Current Unix timestamp in seconds.
pub fn now() -> i64 {
    Utc::now().timestamp()
}

/// Timestamp `days` days after `from`, or None if it doesn't fit in an i64.
pub fn expires_after_days(from: i64, days: i64) -> Option<i64> {
    days.checked_mul(86_400)
        .and_then(|secs| from.checked_add(secs))
}

pub fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a license key in the format PREFIX-XXXX-XXXX-XXXX-XXXX.
pub fn generate_license_key(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let mut part = || -> String {
        (0..KEY_GROUP_LEN)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect()
    };

    let groups: Vec<String> = (0..KEY_GROUPS).map(|_| part()).collect();
    format!("{}-{}", prefix, groups.join("-"))
}

/// Check that a key has the shape of something [`generate_license_key`] produces.
///
/// This is a shape check only; it says nothing about whether the key exists.
pub fn is_valid_key_format(key: &str) -> bool {
    let mut parts = key.split('-');

    let prefix_ok = parts.next().is_some_and(|p| {
        !p.is_empty()
            && p.len() <= MAX_PREFIX_LEN
            && p.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    });
    if !prefix_ok {
        return false;
    }

    let groups: Vec<&str> = parts.collect();
    groups.len() == KEY_GROUPS
        && groups
            .iter()
            .all(|g| g.len() == KEY_GROUP_LEN && g.bytes().all(|b| KEY_ALPHABET.contains(&b)))
}

/// Whether a license key prefix is usable with [`generate_license_key`].
pub fn is_valid_key_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= MAX_PREFIX_LEN
        && prefix
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

/// Compare two secrets without leaking where they differ.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Extract the client IP address from proxy headers.
///
/// Tries `x-forwarded-for` first (first hop only), then `x-real-ip`.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Extract a Bearer token from the Authorization header.
///
/// Returns the token string without the "Bearer " prefix, or None if
/// the header is missing, malformed, or empty after the prefix.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}
