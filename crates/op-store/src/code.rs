//! Authorization-code store.
//!
//! Codes are stored hashed; the raw value never touches the store.
//! Redemption is a single atomic check-and-invalidate.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

/// A stored authorization code and its bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCode {
    /// Hash of the code value (base64url SHA-256).
    pub code_hash: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Subject (resource owner) the code authenticates.
    pub subject: String,

    /// Redirect URI the code is bound to.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// Nonce from the authorization request.
    pub nonce: Option<String>,

    /// Authentication time of the underlying session (Unix seconds).
    pub auth_time: i64,

    /// Session the code is bound to.
    pub session_id: Option<Uuid>,

    /// When the code was issued.
    pub created_at: DateTime<Utc>,

    /// When the code expires.
    pub expires_at: DateTime<Utc>,

    /// Whether the code has been redeemed (single-use).
    pub used: bool,
}

impl StoredCode {
    /// Creates a stored code with the given TTL.
    #[must_use]
    pub fn new(
        code_hash: impl Into<String>,
        client_id: impl Into<String>,
        subject: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            code_hash: code_hash.into(),
            client_id: client_id.into(),
            subject: subject.into(),
            redirect_uri: redirect_uri.into(),
            scope: scope.into(),
            nonce: None,
            auth_time: now.timestamp(),
            session_id: None,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            used: false,
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the session binding and authentication time.
    #[must_use]
    pub const fn with_session(mut self, session_id: Uuid, auth_time: i64) -> Self {
        self.session_id = Some(session_id);
        self.auth_time = auth_time;
        self
    }

    /// Checks if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Provider for authorization-code persistence.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Stores a freshly issued code.
    async fn store(&self, code: &StoredCode) -> StoreResult<()>;

    /// Atomically redeems a code by hash.
    ///
    /// Returns the stored code and marks it used in one step. A second
    /// redemption of the same hash, concurrent or sequential, returns
    /// `None`. Expired codes are treated as absent.
    async fn redeem(&self, code_hash: &str) -> StoreResult<Option<StoredCode>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_code_is_not_expired() {
        let code = StoredCode::new("h", "c", "s", "https://rp/cb", "openid", 60);
        assert!(!code.is_expired());
        assert!(!code.used);
    }

    #[test]
    fn negative_ttl_expires_immediately() {
        let code = StoredCode::new("h", "c", "s", "https://rp/cb", "openid", -1);
        assert!(code.is_expired());
    }
}
