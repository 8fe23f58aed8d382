//! Cryptographically secure random generation.
//!
//! Authorization codes, client secrets, registration access tokens,
//! and token identifiers all come from here.

use rand::Rng;
use rand::distr::{Alphanumeric, SampleString};

/// Generates cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a cryptographically secure alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates an authorization code.
///
/// 32 alphanumeric characters, roughly 190 bits of entropy; comfortably
/// above the 128-bit floor RFC 6749 recommends.
#[must_use]
pub fn generate_auth_code() -> String {
    random_alphanumeric(32)
}

/// Generates a client secret for confidential clients.
#[must_use]
pub fn generate_client_secret() -> String {
    random_alphanumeric(32)
}

/// Generates a registration access token.
#[must_use]
pub fn generate_registration_token() -> String {
    random_alphanumeric(32)
}

/// Generates a token identifier (JWT `jti` or opaque refresh token).
#[must_use]
pub fn generate_token_id() -> String {
    random_alphanumeric(40)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn random_bytes_length() {
        assert_eq!(random_bytes(16).len(), 16);
        assert_eq!(random_bytes(64).len(), 64);
    }

    #[test]
    fn random_values_differ() {
        assert_ne!(random_bytes(32), random_bytes(32));
        assert_ne!(generate_auth_code(), generate_auth_code());
    }

    #[test]
    fn auth_code_format() {
        let code = generate_auth_code();
        assert_eq!(code.len(), 32);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<String> = (0..1000).map(|_| generate_auth_code()).collect();
        assert_eq!(codes.len(), 1000);
    }
}
