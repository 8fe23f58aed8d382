//! Resource-owner credential verification.

use std::collections::HashMap;

use async_trait::async_trait;
use op_crypto::{sha256, to_hex};
use parking_lot::Mutex;

use crate::error::OidcResult;

/// Verifies resource-owner credentials against an identity backend.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Checks a username/password pair.
    ///
    /// Returns the subject identifier on success, `None` on bad
    /// credentials or an unknown user.
    ///
    /// ## Errors
    ///
    /// Returns an error if the backend is unreachable.
    async fn verify(&self, username: &str, password: &str) -> OidcResult<Option<String>>;
}

/// In-memory verifier holding hashed passwords.
#[derive(Default)]
pub struct MemoryIdentityVerifier {
    users: Mutex<HashMap<String, StoredUser>>,
}

struct StoredUser {
    subject: String,
    password_hash: String,
}

impl MemoryIdentityVerifier {
    /// Creates an empty verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user.
    pub fn add_user(
        &self,
        username: impl Into<String>,
        password: &str,
        subject: impl Into<String>,
    ) {
        self.users.lock().insert(
            username.into(),
            StoredUser {
                subject: subject.into(),
                password_hash: password_hash(password),
            },
        );
    }
}

#[async_trait]
impl IdentityVerifier for MemoryIdentityVerifier {
    async fn verify(&self, username: &str, password: &str) -> OidcResult<Option<String>> {
        let users = self.users.lock();
        let Some(user) = users.get(username) else {
            tracing::debug!(username, "unknown user");
            return Ok(None);
        };
        if user.password_hash != password_hash(password) {
            tracing::debug!(username, "password mismatch");
            return Ok(None);
        }
        Ok(Some(user.subject.clone()))
    }
}

fn password_hash(password: &str) -> String {
    to_hex(&sha256(password.as_bytes()))
}
