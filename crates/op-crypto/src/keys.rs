//! Signing-key material.
//!
//! A [`KeySet`] is loaded once at startup and treated as immutable;
//! rotation happens by building a new set and handing it to the token
//! issuer's reload hook, never by mutating a shared singleton.

use std::collections::HashMap;

use jsonwebtoken::{DecodingKey, EncodingKey};
use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;

/// Key-material errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The supplied key bytes could not be parsed for the algorithm.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// No key is registered under the requested key id.
    #[error("unknown key id: {0}")]
    UnknownKeyId(String),

    /// The key set has no active key configured.
    #[error("no active signing key")]
    NoActiveKey,
}

/// A signing key pair under a key id.
#[derive(Clone)]
pub struct SigningKey {
    /// Key id (`kid` header value).
    pub kid: String,
    /// Signature algorithm this key signs with.
    pub algorithm: SignatureAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("key_material", &"[REDACTED]")
            .finish()
    }
}

impl SigningKey {
    /// Creates an HMAC signing key from a shared secret.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm is not an HMAC algorithm.
    pub fn from_secret(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        secret: &[u8],
    ) -> Result<Self, CryptoError> {
        if algorithm != SignatureAlgorithm::Hs256 {
            return Err(CryptoError::InvalidKey(format!(
                "{algorithm} does not take a shared secret"
            )));
        }
        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        })
    }

    /// Creates an asymmetric signing key from PEM-encoded key material.
    ///
    /// # Errors
    ///
    /// Returns an error if either PEM blob does not parse for the
    /// algorithm family.
    pub fn from_pem(
        kid: impl Into<String>,
        algorithm: SignatureAlgorithm,
        private_key_pem: &[u8],
        public_key_pem: &[u8],
    ) -> Result<Self, CryptoError> {
        let (encoding_key, decoding_key) = match algorithm {
            SignatureAlgorithm::Hs256 => {
                return Err(CryptoError::InvalidKey(
                    "HS256 takes a shared secret, not PEM".to_string(),
                ));
            }
            SignatureAlgorithm::Es256 => (
                EncodingKey::from_ec_pem(private_key_pem)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
                DecodingKey::from_ec_pem(public_key_pem)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            ),
            SignatureAlgorithm::Rs256 | SignatureAlgorithm::Rs384 | SignatureAlgorithm::Rs512 => (
                EncodingKey::from_rsa_pem(private_key_pem)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
                DecodingKey::from_rsa_pem(public_key_pem)
                    .map_err(|e| CryptoError::InvalidKey(e.to_string()))?,
            ),
        };

        Ok(Self {
            kid: kid.into(),
            algorithm,
            encoding_key,
            decoding_key,
        })
    }

    /// The key used for signing.
    #[must_use]
    pub const fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    /// The key used for verification.
    #[must_use]
    pub const fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

/// Signing keys indexed by key id, with one active key for issuance.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, SigningKey>,
    active_kid: Option<String>,
}

impl KeySet {
    /// Creates an empty key set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key. The first key added becomes the active key.
    pub fn add(&mut self, key: SigningKey) {
        if self.active_kid.is_none() {
            self.active_kid = Some(key.kid.clone());
        }
        self.keys.insert(key.kid.clone(), key);
    }

    /// Sets the active signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is registered under `kid`.
    pub fn set_active(&mut self, kid: &str) -> Result<(), CryptoError> {
        if self.keys.contains_key(kid) {
            self.active_kid = Some(kid.to_string());
            Ok(())
        } else {
            Err(CryptoError::UnknownKeyId(kid.to_string()))
        }
    }

    /// Returns the active signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the set is empty or the active kid is gone.
    pub fn active(&self) -> Result<&SigningKey, CryptoError> {
        let kid = self.active_kid.as_ref().ok_or(CryptoError::NoActiveKey)?;
        self.keys
            .get(kid)
            .ok_or_else(|| CryptoError::UnknownKeyId(kid.clone()))
    }

    /// Looks up a key by id.
    ///
    /// # Errors
    ///
    /// Returns an error if no key is registered under `kid`.
    pub fn get(&self, kid: &str) -> Result<&SigningKey, CryptoError> {
        self.keys
            .get(kid)
            .ok_or_else(|| CryptoError::UnknownKeyId(kid.to_string()))
    }

    /// Returns true if the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(kid: &str) -> SigningKey {
        SigningKey::from_secret(kid, SignatureAlgorithm::Hs256, b"0123456789abcdef").unwrap()
    }

    #[test]
    fn first_key_becomes_active() {
        let mut set = KeySet::new();
        set.add(test_key("a"));
        set.add(test_key("b"));

        assert_eq!(set.active().unwrap().kid, "a");
    }

    #[test]
    fn set_active_switches_key() {
        let mut set = KeySet::new();
        set.add(test_key("a"));
        set.add(test_key("b"));

        set.set_active("b").unwrap();
        assert_eq!(set.active().unwrap().kid, "b");
        assert!(set.set_active("missing").is_err());
    }

    #[test]
    fn empty_set_has_no_active_key() {
        let set = KeySet::new();
        assert!(matches!(set.active(), Err(CryptoError::NoActiveKey)));
    }

    #[test]
    fn hmac_key_rejects_rsa_algorithm() {
        assert!(SigningKey::from_secret("k", SignatureAlgorithm::Rs256, b"secret").is_err());
    }
}
