//! Signature and hash algorithm identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Hash algorithms used for token binding hashes (`at_hash`/`c_hash`)
/// and stored-credential digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

/// JWS signature algorithms supported for ID tokens and access tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// HMAC with SHA-256 (client-secret or shared-secret keys).
    #[serde(rename = "HS256")]
    Hs256,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    #[serde(rename = "RS256")]
    Rs256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    #[serde(rename = "RS384")]
    Rs384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    #[serde(rename = "RS512")]
    Rs512,
    /// ECDSA P-256 with SHA-256.
    #[serde(rename = "ES256")]
    Es256,
}

impl SignatureAlgorithm {
    /// The hash algorithm paired with this signature algorithm.
    ///
    /// Binding hashes (`at_hash`, `c_hash`) use the left half of this
    /// hash per OpenID Connect Core 3.1.3.6.
    #[must_use]
    pub const fn hash_algorithm(self) -> HashAlgorithm {
        match self {
            Self::Hs256 | Self::Rs256 | Self::Es256 => HashAlgorithm::Sha256,
            Self::Rs384 => HashAlgorithm::Sha384,
            Self::Rs512 => HashAlgorithm::Sha512,
        }
    }

    /// The corresponding `jsonwebtoken` algorithm.
    #[must_use]
    pub const fn jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::Hs256 => jsonwebtoken::Algorithm::HS256,
            Self::Rs256 => jsonwebtoken::Algorithm::RS256,
            Self::Rs384 => jsonwebtoken::Algorithm::RS384,
            Self::Rs512 => jsonwebtoken::Algorithm::RS512,
            Self::Es256 => jsonwebtoken::Algorithm::ES256,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hs256 => "HS256",
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
            Self::Es256 => "ES256",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HS256" => Ok(Self::Hs256),
            "RS256" => Ok(Self::Rs256),
            "RS384" => Ok(Self::Rs384),
            "RS512" => Ok(Self::Rs512),
            "ES256" => Ok(Self::Es256),
            _ => Err(format!("unknown signature algorithm: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_pairing() {
        assert_eq!(SignatureAlgorithm::Rs256.hash_algorithm(), HashAlgorithm::Sha256);
        assert_eq!(SignatureAlgorithm::Rs384.hash_algorithm(), HashAlgorithm::Sha384);
        assert_eq!(SignatureAlgorithm::Rs512.hash_algorithm(), HashAlgorithm::Sha512);
    }

    #[test]
    fn algorithm_round_trip() {
        for alg in [
            SignatureAlgorithm::Hs256,
            SignatureAlgorithm::Rs256,
            SignatureAlgorithm::Es256,
        ] {
            assert_eq!(SignatureAlgorithm::from_str(&alg.to_string()).unwrap(), alg);
        }
    }
}
