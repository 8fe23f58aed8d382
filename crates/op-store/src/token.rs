//! Refresh-token store.
//!
//! Refresh tokens are opaque values stored hashed, with revocation and
//! rotation state. Consumption for rotation is atomic, mirroring the
//! authorization-code contract.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;

/// A stored refresh token and its grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRefreshToken {
    /// Hash of the token value (base64url SHA-256).
    pub token_hash: String,

    /// Client the token was issued to.
    pub client_id: String,

    /// Subject of the grant.
    pub subject: String,

    /// Scope of the original grant (space-separated).
    pub scope: String,

    /// Authentication time of the originating session (Unix seconds).
    pub auth_time: i64,

    /// Session the token is bound to, if any.
    pub session_id: Option<Uuid>,

    /// When the token was issued.
    pub created_at: DateTime<Utc>,

    /// When the token expires.
    pub expires_at: DateTime<Utc>,

    /// Whether the token was consumed by rotation.
    pub consumed: bool,

    /// Whether the token was revoked (logout, admin action).
    pub revoked: bool,
}

impl StoredRefreshToken {
    /// Creates a stored refresh token with the given TTL.
    #[must_use]
    pub fn new(
        token_hash: impl Into<String>,
        client_id: impl Into<String>,
        subject: impl Into<String>,
        scope: impl Into<String>,
        ttl_seconds: i64,
    ) -> Self {
        let now = Utc::now();
        Self {
            token_hash: token_hash.into(),
            client_id: client_id.into(),
            subject: subject.into(),
            scope: scope.into(),
            auth_time: now.timestamp(),
            session_id: None,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            consumed: false,
            revoked: false,
        }
    }

    /// Sets the session binding and authentication time.
    #[must_use]
    pub const fn with_session(mut self, session_id: Uuid, auth_time: i64) -> Self {
        self.session_id = Some(session_id);
        self.auth_time = auth_time;
        self
    }

    /// Checks if the token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Checks if the token can still be redeemed.
    #[must_use]
    pub fn is_redeemable(&self) -> bool {
        !self.consumed && !self.revoked && !self.is_expired()
    }
}

/// Provider for refresh-token persistence.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Stores a freshly issued refresh token.
    async fn store(&self, token: &StoredRefreshToken) -> StoreResult<()>;

    /// Looks up a token by hash without consuming it.
    ///
    /// Expired, consumed, and revoked tokens are treated as absent.
    async fn get(&self, token_hash: &str) -> StoreResult<Option<StoredRefreshToken>>;

    /// Atomically consumes a token by hash (rotation).
    ///
    /// Returns the stored token and marks it consumed in one step;
    /// exactly one of any number of concurrent callers succeeds.
    async fn consume(&self, token_hash: &str) -> StoreResult<Option<StoredRefreshToken>>;

    /// Revokes a token by hash. Unknown hashes are a no-op.
    async fn revoke(&self, token_hash: &str) -> StoreResult<()>;

    /// Revokes every live token bound to a session (logout).
    async fn revoke_session(&self, session_id: Uuid) -> StoreResult<u64>;
}
