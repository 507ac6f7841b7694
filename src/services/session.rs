//! Session refresh policy and token-value generation.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};

/// Length of a bearer token value. 200 alphanumeric characters is far beyond
/// the 128 bits of entropy required of an opaque bearer secret.
pub const BEARER_TOKEN_LENGTH: usize = 200;

/// Generate an opaque bearer token value.
pub fn generate_bearer_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(BEARER_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Generate a single-use token value (email verification, password reset).
pub fn generate_single_use_token() -> String {
    let token_bytes: [u8; 32] = rand::thread_rng().gen();
    token_bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Sliding-window renewal, applied on every authenticated request after a
/// successful token lookup.
///
/// A non-persistent session (non-null expiry) is re-armed to `now +
/// lifetime`; the new expiry depends only on the time of the latest use. A
/// persistent session (null expiry) stays persistent forever.
pub fn renewed_expiry(
    current_expiry: Option<DateTime<Utc>>,
    lifetime: Duration,
) -> Option<DateTime<Utc>> {
    current_expiry.map(|_| Utc::now() + lifetime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_long_and_unique() {
        let a = generate_bearer_token();
        let b = generate_bearer_token();
        assert_eq!(a.len(), BEARER_TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn single_use_tokens_are_hex() {
        let t = generate_single_use_token();
        assert_eq!(t.len(), 64);
        assert!(t.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn persistent_sessions_are_never_renewed() {
        assert_eq!(renewed_expiry(None, Duration::hours(1)), None);
    }

    #[test]
    fn non_persistent_sessions_slide_forward() {
        let old = Utc::now() + Duration::minutes(5);
        let renewed = renewed_expiry(Some(old), Duration::hours(1)).unwrap();
        assert!(renewed > old);
        // Derived from now, not from the previous expiry.
        assert!(renewed - Utc::now() <= Duration::hours(1));
        assert!(renewed - Utc::now() > Duration::minutes(59));
    }
}
