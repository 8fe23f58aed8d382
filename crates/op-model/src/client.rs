//! Client domain model.
//!
//! A registered relying party. Behavior differences between web, native,
//! and script clients are data-driven through the capability set
//! (allowed response types, grant types, auth method, redirect-URI
//! list) rather than through a type hierarchy.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ApplicationType, GrantType, ResponseType, TokenEndpointAuthMethod};

/// A registered OAuth 2.0 / OIDC client.
///
/// Created by dynamic registration; immutable identity (`client_id`),
/// secret rotated only through re-registration. Secrets and the
/// registration access token are stored hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    // === Identity ===
    /// Internal identifier.
    pub id: Uuid,
    /// Unique client identifier (OAuth `client_id`). Immutable.
    pub client_id: String,
    /// Display name.
    pub client_name: Option<String>,
    /// Whether the client is enabled.
    pub enabled: bool,

    // === Secrets (hashed at rest) ===
    /// Hash of the client secret (confidential clients only).
    pub secret_hash: Option<String>,
    /// Hash of the registration access token.
    pub registration_token_hash: String,
    /// Unix timestamp the secret expires at (0 = never).
    pub secret_expires_at: i64,

    // === Capability set ===
    /// Application type (web or native).
    pub application_type: ApplicationType,
    /// Response types the client may request at the authorization endpoint.
    pub response_types: HashSet<ResponseType>,
    /// Grant types the client may use at the token endpoint.
    pub grant_types: HashSet<GrantType>,
    /// How the client authenticates at the token endpoint.
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,
    /// Whether consent is skipped for this client (pre-trusted).
    pub trusted: bool,

    // === URIs ===
    /// Registered redirect URIs, in registration order.
    pub redirect_uris: Vec<String>,
    /// Registered post-logout redirect URIs.
    pub post_logout_redirect_uris: Vec<String>,
    /// Authorized JavaScript origins.
    pub authorized_origins: Vec<String>,
    /// Sector identifier URI (pairwise subject / redirect cross-check).
    pub sector_identifier_uri: Option<String>,

    // === Custom attributes (opaque) ===
    /// Custom attributes, stored and returned verbatim.
    pub attributes: HashMap<String, String>,

    // === Timestamps ===
    /// When the client was registered.
    pub created_at: DateTime<Utc>,
}

impl Client {
    /// Creates a new client with the given identifiers.
    #[must_use]
    pub fn new(client_id: impl Into<String>, registration_token_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            client_id: client_id.into(),
            client_name: None,
            enabled: true,
            secret_hash: None,
            registration_token_hash: registration_token_hash.into(),
            secret_expires_at: 0,
            application_type: ApplicationType::default(),
            response_types: HashSet::from([ResponseType::Code]),
            grant_types: HashSet::from([GrantType::AuthorizationCode, GrantType::RefreshToken]),
            token_endpoint_auth_method: TokenEndpointAuthMethod::default(),
            trusted: false,
            redirect_uris: Vec::new(),
            post_logout_redirect_uris: Vec::new(),
            authorized_origins: Vec::new(),
            sector_identifier_uri: None,
            attributes: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = Some(name.into());
        self
    }

    /// Sets the secret hash.
    #[must_use]
    pub fn with_secret_hash(mut self, hash: impl Into<String>) -> Self {
        self.secret_hash = Some(hash.into());
        self
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Replaces the allowed response types.
    #[must_use]
    pub fn with_response_types(mut self, types: impl IntoIterator<Item = ResponseType>) -> Self {
        self.response_types = types.into_iter().collect();
        self
    }

    /// Replaces the allowed grant types.
    #[must_use]
    pub fn with_grant_types(mut self, grants: impl IntoIterator<Item = GrantType>) -> Self {
        self.grant_types = grants.into_iter().collect();
        self
    }

    /// Marks the client as pre-trusted (consent skipped).
    #[must_use]
    pub const fn with_trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    /// Checks whether every requested response type is registered.
    #[must_use]
    pub fn allows_response_types<'a>(
        &self,
        requested: impl IntoIterator<Item = &'a ResponseType>,
    ) -> bool {
        requested.into_iter().all(|t| self.response_types.contains(t))
    }

    /// Checks whether the client may use a grant type.
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grant_types.contains(&grant)
    }

    /// Checks a redirect URI against the registered set (exact match).
    #[must_use]
    pub fn has_redirect_uri(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == uri)
    }

    /// Checks whether the client is confidential (holds a secret).
    #[must_use]
    pub const fn is_confidential(&self) -> bool {
        self.secret_hash.is_some()
    }
}
