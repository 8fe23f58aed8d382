//! Authenticated-session model.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Created for an authorization request, owner not yet verified.
    #[default]
    Unauthenticated,
    /// Resource owner has authenticated.
    Authenticated,
}

/// A resource-owner session.
///
/// Every interactive authentication mints a fresh session with a fresh
/// identifier; a superseded session is removed in the same store
/// operation, so two sequential authorization transactions never
/// observe the same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier (opaque, unguessable).
    pub id: Uuid,
    /// Authenticated subject, once known.
    pub subject: Option<String>,
    /// Current state.
    pub state: SessionState,
    /// When the owner authenticated.
    pub auth_time: Option<DateTime<Utc>>,

    /// OP browser state: random per-session value that feeds the
    /// `session_state` derivation so the session id itself never
    /// reaches the client.
    pub opbs: String,
    /// Cached `session_state` salts keyed by `"{client_id} {origin}"`,
    /// kept so polling within one open session is stable.
    pub state_salts: HashMap<String, String>,

    /// Per-client consents granted in this session (client ids).
    pub consented_clients: Vec<String>,
    /// Free-form attributes.
    pub attributes: HashMap<String, String>,

    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Last activity timestamp (idle expiry).
    pub last_used: DateTime<Utc>,
}

impl Session {
    /// Creates a new unauthenticated session.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            subject: None,
            state: SessionState::Unauthenticated,
            auth_time: None,
            opbs: Uuid::new_v4().to_string(),
            state_salts: HashMap::new(),
            consented_clients: Vec::new(),
            attributes: HashMap::new(),
            created_at: now,
            last_used: now,
        }
    }

    /// Creates an authenticated session for a subject.
    #[must_use]
    pub fn authenticated(subject: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.subject = Some(subject.into());
        session.state = SessionState::Authenticated;
        session.auth_time = Some(Utc::now());
        session
    }

    /// Checks if the owner has authenticated.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated)
    }

    /// Records consent for a client.
    pub fn add_consent(&mut self, client_id: impl Into<String>) {
        let client_id = client_id.into();
        if !self.consented_clients.contains(&client_id) {
            self.consented_clients.push(client_id);
        }
    }

    /// Checks whether the client already has consent in this session.
    #[must_use]
    pub fn has_consent(&self, client_id: &str) -> bool {
        self.consented_clients.iter().any(|c| c == client_id)
    }

    /// Updates the last-activity timestamp.
    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }

    /// Authentication time as Unix seconds (0 if never authenticated).
    #[must_use]
    pub fn auth_time_secs(&self) -> i64 {
        self.auth_time.map_or(0, |t| t.timestamp())
    }

    /// Checks expiry against idle and absolute timeouts (seconds).
    #[must_use]
    pub fn is_expired(&self, idle_timeout: i64, max_lifespan: i64) -> bool {
        let now = Utc::now();
        (now - self.last_used).num_seconds() > idle_timeout
            || (now - self.created_at).num_seconds() > max_lifespan
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
