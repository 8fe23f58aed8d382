//! Cryptographic primitives for the OP core.
//!
//! Digest helpers, secure random generation, and signing-key material
//! (keyed by `kid`, loaded once at startup with an explicit reload
//! hook on the consumer side).

mod algorithm;
mod hash;
mod keys;
mod random;

pub use algorithm::{HashAlgorithm, SignatureAlgorithm};
pub use hash::{hash, sha256, sha384, sha512, to_hex};
pub use keys::{CryptoError, KeySet, SigningKey};
pub use random::{
    generate_auth_code, generate_client_secret, generate_registration_token, generate_token_id,
    random_alphanumeric, random_bytes,
};
