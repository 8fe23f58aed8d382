//! JWT claim types for access and ID tokens.
//!
//! Claims as defined in RFC 7519 and `OpenID` Connect Core 1.0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience claim: a single value or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience.
    Single(String),
    /// Multiple audiences.
    Multiple(Vec<String>),
}

impl Audience {
    /// Checks whether the audience contains a value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(aud) => aud == value,
            Self::Multiple(auds) => auds.iter().any(|a| a == value),
        }
    }
}

impl From<String> for Audience {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for Audience {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// Access token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject.
    pub sub: String,

    /// Audience.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,

    /// Expiration time (Unix seconds).
    pub exp: i64,

    /// Issued-at time (Unix seconds).
    pub iat: i64,

    /// JWT id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Authentication time (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Authorized party (client id that requested the token).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Session id the token is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Granted scope (space-separated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Token type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
}

impl AccessTokenClaims {
    /// Creates access token claims.
    #[must_use]
    pub fn new(issuer: impl Into<String>, subject: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: None,
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            jti: Some(Uuid::now_v7().to_string()),
            auth_time: None,
            azp: None,
            sid: None,
            scope: None,
            typ: Some("Bearer".to_string()),
        }
    }

    /// Sets the audience.
    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<Audience>) -> Self {
        self.aud = Some(audience.into());
        self
    }

    /// Sets the authorized party.
    #[must_use]
    pub fn with_azp(mut self, client_id: impl Into<String>) -> Self {
        self.azp = Some(client_id.into());
        self
    }

    /// Sets the session binding.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.sid = Some(session_id.into());
        self
    }

    /// Sets the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the authentication time.
    #[must_use]
    pub const fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Checks if the token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// ID token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer URL.
    pub iss: String,

    /// Subject.
    pub sub: String,

    /// Audience (the client id).
    pub aud: Audience,

    /// Expiration time (Unix seconds).
    pub exp: i64,

    /// Issued-at time (Unix seconds).
    pub iat: i64,

    /// Authentication time (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,

    /// Nonce echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Authorized party.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,

    /// Left-half hash of the access token issued alongside.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_hash: Option<String>,

    /// Left-half hash of the authorization code issued alongside.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c_hash: Option<String>,

    /// Session id the token is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    /// Session-state value for front-channel session monitoring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_state: Option<String>,
}

impl IdTokenClaims {
    /// Creates ID token claims for a client audience.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        subject: impl Into<String>,
        client_id: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let client_id = client_id.into();
        Self {
            iss: issuer.into(),
            sub: subject.into(),
            aud: Audience::Single(client_id.clone()),
            exp: expires_at.timestamp(),
            iat: Utc::now().timestamp(),
            auth_time: None,
            nonce: None,
            azp: Some(client_id),
            at_hash: None,
            c_hash: None,
            sid: None,
            session_state: None,
        }
    }

    /// Sets the nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Sets the authentication time.
    #[must_use]
    pub const fn with_auth_time(mut self, auth_time: i64) -> Self {
        self.auth_time = Some(auth_time);
        self
    }

    /// Sets the access-token hash binding.
    #[must_use]
    pub fn with_at_hash(mut self, at_hash: impl Into<String>) -> Self {
        self.at_hash = Some(at_hash.into());
        self
    }

    /// Sets the authorization-code hash binding.
    #[must_use]
    pub fn with_c_hash(mut self, c_hash: impl Into<String>) -> Self {
        self.c_hash = Some(c_hash.into());
        self
    }

    /// Sets the session binding.
    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.sid = Some(session_id.into());
        self
    }

    /// Sets the session-state value.
    #[must_use]
    pub fn with_session_state(mut self, session_state: impl Into<String>) -> Self {
        self.session_state = Some(session_state.into());
        self
    }
}
