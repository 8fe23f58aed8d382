//! Dynamic client registration.
//!
//! Implements `OpenID` Connect Dynamic Client Registration 1.0: client
//! creation with metadata validation, sector-identifier cross-checks,
//! and reads authenticated by the registration access token.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use op_crypto::{generate_client_secret, generate_registration_token, sha256, to_hex};
use op_model::{ApplicationType, Client, GrantType, ResponseType, TokenEndpointAuthMethod};
use op_store::ClientStore;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::{OidcError, OidcResult};
use crate::redirect::UrlPatternList;

/// Client metadata submitted for registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrationRequest {
    /// Application type (defaults to `web`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_type: Option<ApplicationType>,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Redirect URIs (required, non-empty).
    pub redirect_uris: Vec<String>,

    /// Response types the client will use (defaults to `["code"]`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<ResponseType>>,

    /// Grant types the client will use (derived from response types
    /// when absent).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<GrantType>>,

    /// Token endpoint authentication method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<TokenEndpointAuthMethod>,

    /// Sector identifier URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_identifier_uri: Option<String>,

    /// Post-logout redirect URIs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uris: Option<Vec<String>>,

    /// Authorized JavaScript origins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_origins: Option<Vec<String>>,

    /// Custom attributes, stored and returned verbatim.
    #[serde(flatten)]
    pub attributes: HashMap<String, String>,
}

/// Successful registration response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationResponse {
    /// Issued client id.
    pub client_id: String,

    /// Issued client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Token authenticating reads of this registration.
    pub registration_access_token: String,

    /// URI for reading the registration.
    pub registration_client_uri: String,

    /// When the client id was issued (Unix seconds).
    pub client_id_issued_at: i64,

    /// When the secret expires (Unix seconds, 0 = never).
    pub client_secret_expires_at: i64,
}

/// Client metadata returned on a registration read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMetadata {
    /// Client id.
    pub client_id: String,

    /// Application type.
    pub application_type: ApplicationType,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Registered redirect URIs.
    pub redirect_uris: Vec<String>,

    /// Allowed response types.
    pub response_types: Vec<ResponseType>,

    /// Allowed grant types.
    pub grant_types: Vec<GrantType>,

    /// Token endpoint authentication method.
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Sector identifier URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_identifier_uri: Option<String>,

    /// Post-logout redirect URIs.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub post_logout_redirect_uris: Vec<String>,

    /// Authorized JavaScript origins.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authorized_origins: Vec<String>,

    /// Custom attributes, verbatim from registration.
    #[serde(flatten)]
    pub attributes: HashMap<String, String>,
}

impl From<Client> for ClientMetadata {
    fn from(client: Client) -> Self {
        let mut response_types: Vec<ResponseType> = client.response_types.iter().copied().collect();
        response_types.sort_by_key(|t| t.to_string());
        let mut grant_types: Vec<GrantType> = client.grant_types.iter().copied().collect();
        grant_types.sort_by_key(|g| g.to_string());

        Self {
            client_id: client.client_id,
            application_type: client.application_type,
            client_name: client.client_name,
            redirect_uris: client.redirect_uris,
            response_types,
            grant_types,
            token_endpoint_auth_method: client.token_endpoint_auth_method,
            sector_identifier_uri: client.sector_identifier_uri,
            post_logout_redirect_uris: client.post_logout_redirect_uris,
            authorized_origins: client.authorized_origins,
            attributes: client.attributes,
        }
    }
}

/// Fetcher for sector identifier documents (a JSON array of URIs
/// published by the client).
#[async_trait]
pub trait SectorDocumentFetcher: Send + Sync {
    /// Fetches and parses the document at `uri`.
    async fn fetch(&self, uri: &str) -> OidcResult<Vec<String>>;
}

/// HTTPS sector-document fetcher with a fixed timeout.
pub struct HttpSectorFetcher {
    client: reqwest::Client,
}

impl HttpSectorFetcher {
    /// Creates a fetcher with the given per-request timeout.
    ///
    /// ## Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> OidcResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OidcError::ServerError(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SectorDocumentFetcher for HttpSectorFetcher {
    async fn fetch(&self, uri: &str) -> OidcResult<Vec<String>> {
        let response = self.client.get(uri).send().await.map_err(|e| {
            if e.is_timeout() {
                OidcError::ServiceUnavailable(format!("sector identifier fetch timed out: {uri}"))
            } else {
                OidcError::InvalidSectorIdentifier(format!("fetch failed: {e}"))
            }
        })?;

        if !response.status().is_success() {
            return Err(OidcError::InvalidSectorIdentifier(format!(
                "fetch returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<String>>()
            .await
            .map_err(|e| OidcError::InvalidSectorIdentifier(format!("malformed document: {e}")))
    }
}

/// Static in-process sector documents, keyed by URI.
#[derive(Debug, Default)]
pub struct StaticSectorFetcher {
    documents: HashMap<String, Vec<String>>,
}

impl StaticSectorFetcher {
    /// Creates an empty fetcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a document under a URI.
    #[must_use]
    pub fn with_document(mut self, uri: impl Into<String>, uris: Vec<String>) -> Self {
        self.documents.insert(uri.into(), uris);
        self
    }
}

#[async_trait]
impl SectorDocumentFetcher for StaticSectorFetcher {
    async fn fetch(&self, uri: &str) -> OidcResult<Vec<String>> {
        self.documents.get(uri).cloned().ok_or_else(|| {
            OidcError::InvalidSectorIdentifier(format!("no document at {uri}"))
        })
    }
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Base URI of the registration endpoint (for
    /// `registration_client_uri`).
    pub registration_base_uri: String,

    /// Client secret lifespan in seconds (0 = never expires).
    pub secret_lifespan: i64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registration_base_uri: "https://localhost/register".to_string(),
            secret_lifespan: 0,
        }
    }
}

/// Creates and reads registered clients.
pub struct ClientRegistry {
    clients: Arc<dyn ClientStore>,
    sector_fetcher: Arc<dyn SectorDocumentFetcher>,
    blacklist: UrlPatternList,
    config: RegistryConfig,
}

impl ClientRegistry {
    /// Creates a registry over a client store.
    pub fn new(
        clients: Arc<dyn ClientStore>,
        sector_fetcher: Arc<dyn SectorDocumentFetcher>,
        blacklist: UrlPatternList,
        config: RegistryConfig,
    ) -> Self {
        Self {
            clients,
            sector_fetcher,
            blacklist,
            config,
        }
    }

    /// Registers a client.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidRedirectUri` if a redirect URI is missing,
    /// relative, or blacklisted; `InvalidSectorIdentifier` if the
    /// sector document cannot be fetched or does not cover every
    /// redirect URI; `InvalidClientMetadata` on contradictory response
    /// and grant type combinations.
    pub async fn register(&self, request: &RegistrationRequest) -> OidcResult<RegistrationResponse> {
        self.validate_redirect_uris(&request.redirect_uris)?;

        let response_types: HashSet<ResponseType> = request
            .response_types
            .clone()
            .unwrap_or_else(|| vec![ResponseType::Code])
            .into_iter()
            .collect();
        if response_types.is_empty() {
            return Err(OidcError::InvalidClientMetadata(
                "response_types is empty".to_string(),
            ));
        }

        let grant_types = resolve_grant_types(&response_types, request.grant_types.as_deref())?;

        if let Some(sector_uri) = &request.sector_identifier_uri {
            self.verify_sector_identifier(sector_uri, &request.redirect_uris)
                .await?;
        }

        let auth_method = request.token_endpoint_auth_method.unwrap_or_default();

        let client_id = Uuid::new_v4().to_string();
        let registration_token = generate_registration_token();
        let secret = if auth_method == TokenEndpointAuthMethod::None {
            None
        } else {
            Some(generate_client_secret())
        };

        let issued_at = Utc::now().timestamp();
        let secret_expires_at = if secret.is_some() && self.config.secret_lifespan > 0 {
            issued_at + self.config.secret_lifespan
        } else {
            0
        };

        let mut client = Client::new(&client_id, hash_credential(&registration_token))
            .with_response_types(response_types)
            .with_grant_types(grant_types);
        if let Some(name) = &request.client_name {
            client = client.with_name(name);
        }
        if let Some(secret) = &secret {
            client = client.with_secret_hash(hash_credential(secret));
        }
        client.application_type = request.application_type.unwrap_or_default();
        client.token_endpoint_auth_method = auth_method;
        client.redirect_uris = request.redirect_uris.clone();
        client.post_logout_redirect_uris = request.post_logout_redirect_uris.clone().unwrap_or_default();
        client.authorized_origins = request.authorized_origins.clone().unwrap_or_default();
        client.sector_identifier_uri = request.sector_identifier_uri.clone();
        client.attributes = request.attributes.clone();
        client.secret_expires_at = secret_expires_at;

        self.clients.create(&client).await?;
        tracing::info!(client_id = %client_id, "registered client");

        Ok(RegistrationResponse {
            registration_client_uri: format!(
                "{}?client_id={}",
                self.config.registration_base_uri,
                urlencoding::encode(&client_id)
            ),
            client_id,
            client_secret: secret,
            registration_access_token: registration_token,
            client_id_issued_at: issued_at,
            client_secret_expires_at: secret_expires_at,
        })
    }

    /// Re-registers a client, replacing its metadata and rotating the
    /// secret.
    ///
    /// Authenticated by the registration access token. The client id
    /// and the registration access token survive the update; a
    /// confidential client gets a fresh secret.
    ///
    /// ## Errors
    ///
    /// Same metadata failures as [`Self::register`], plus
    /// `InvalidClient` for unknown clients and `InvalidToken` when the
    /// token does not match.
    pub async fn update(
        &self,
        client_id: &str,
        registration_token: &str,
        request: &RegistrationRequest,
    ) -> OidcResult<RegistrationResponse> {
        let mut client = self
            .clients
            .get(client_id)
            .await?
            .ok_or_else(|| OidcError::InvalidClient(format!("unknown client: {client_id}")))?;
        if hash_credential(registration_token) != client.registration_token_hash {
            return Err(OidcError::InvalidToken(
                "registration access token does not match".to_string(),
            ));
        }

        self.validate_redirect_uris(&request.redirect_uris)?;

        let response_types: HashSet<ResponseType> = request
            .response_types
            .clone()
            .unwrap_or_else(|| vec![ResponseType::Code])
            .into_iter()
            .collect();
        if response_types.is_empty() {
            return Err(OidcError::InvalidClientMetadata(
                "response_types is empty".to_string(),
            ));
        }
        let grant_types = resolve_grant_types(&response_types, request.grant_types.as_deref())?;

        if let Some(sector_uri) = &request.sector_identifier_uri {
            self.verify_sector_identifier(sector_uri, &request.redirect_uris)
                .await?;
        }

        let auth_method = request.token_endpoint_auth_method.unwrap_or_default();
        let secret = if auth_method == TokenEndpointAuthMethod::None {
            None
        } else {
            Some(generate_client_secret())
        };
        let now = Utc::now().timestamp();
        let secret_expires_at = if secret.is_some() && self.config.secret_lifespan > 0 {
            now + self.config.secret_lifespan
        } else {
            0
        };

        client.client_name = request.client_name.clone();
        client.application_type = request.application_type.unwrap_or_default();
        client.response_types = response_types;
        client.grant_types = grant_types;
        client.token_endpoint_auth_method = auth_method;
        client.secret_hash = secret.as_deref().map(hash_credential);
        client.secret_expires_at = secret_expires_at;
        client.redirect_uris = request.redirect_uris.clone();
        client.post_logout_redirect_uris =
            request.post_logout_redirect_uris.clone().unwrap_or_default();
        client.authorized_origins = request.authorized_origins.clone().unwrap_or_default();
        client.sector_identifier_uri = request.sector_identifier_uri.clone();
        client.attributes = request.attributes.clone();

        self.clients.update(&client).await?;
        tracing::info!(client_id = %client_id, "re-registered client");

        Ok(RegistrationResponse {
            registration_client_uri: format!(
                "{}?client_id={}",
                self.config.registration_base_uri,
                urlencoding::encode(client_id)
            ),
            client_id: client_id.to_string(),
            client_secret: secret,
            registration_access_token: registration_token.to_string(),
            client_id_issued_at: client.created_at.timestamp(),
            client_secret_expires_at: secret_expires_at,
        })
    }

    /// Reads a registration, authenticated by the registration access
    /// token issued at creation.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidClient` for unknown clients and `InvalidToken`
    /// when the token does not match.
    pub async fn read(&self, client_id: &str, registration_token: &str) -> OidcResult<ClientMetadata> {
        let client = self
            .clients
            .get(client_id)
            .await?
            .ok_or_else(|| OidcError::InvalidClient(format!("unknown client: {client_id}")))?;

        if hash_credential(registration_token) != client.registration_token_hash {
            return Err(OidcError::InvalidToken(
                "registration access token does not match".to_string(),
            ));
        }

        Ok(ClientMetadata::from(client))
    }

    fn validate_redirect_uris(&self, uris: &[String]) -> OidcResult<()> {
        if uris.is_empty() {
            return Err(OidcError::InvalidRedirectUri(
                "redirect_uris is required".to_string(),
            ));
        }
        for uri in uris {
            // Registered URIs may carry wildcards; those are admitted
            // as patterns, everything else must parse as absolute.
            if !uri.contains('*') && Url::parse(uri).is_err() {
                return Err(OidcError::InvalidRedirectUri(format!(
                    "not an absolute URI: {uri}"
                )));
            }
            if self.blacklist.is_listed(uri) {
                return Err(OidcError::InvalidRedirectUri(format!(
                    "redirect URI is blacklisted: {uri}"
                )));
            }
        }
        Ok(())
    }

    async fn verify_sector_identifier(
        &self,
        sector_uri: &str,
        redirect_uris: &[String],
    ) -> OidcResult<()> {
        let published = self.sector_fetcher.fetch(sector_uri).await?;
        for uri in redirect_uris {
            if !published.iter().any(|p| p == uri) {
                return Err(OidcError::InvalidSectorIdentifier(format!(
                    "redirect URI not in sector document: {uri}"
                )));
            }
        }
        Ok(())
    }
}

/// Derives or validates the grant type set against the response types.
fn resolve_grant_types(
    response_types: &HashSet<ResponseType>,
    requested: Option<&[GrantType]>,
) -> OidcResult<HashSet<GrantType>> {
    let wants_code = response_types.contains(&ResponseType::Code);
    let wants_implicit = response_types.contains(&ResponseType::Token)
        || response_types.contains(&ResponseType::IdToken);

    match requested {
        None => {
            let mut grants = HashSet::new();
            if wants_code {
                grants.insert(GrantType::AuthorizationCode);
                grants.insert(GrantType::RefreshToken);
            }
            if wants_implicit {
                grants.insert(GrantType::Implicit);
            }
            Ok(grants)
        }
        Some(grants) => {
            if grants.is_empty() {
                return Err(OidcError::InvalidClientMetadata(
                    "grant_types is empty".to_string(),
                ));
            }
            let grants: HashSet<GrantType> = grants.iter().copied().collect();
            if grants.contains(&GrantType::AuthorizationCode) && !wants_code {
                return Err(OidcError::InvalidClientMetadata(
                    "authorization_code grant requires the code response type".to_string(),
                ));
            }
            if grants.contains(&GrantType::Implicit) && !wants_implicit {
                return Err(OidcError::InvalidClientMetadata(
                    "implicit grant requires the token or id_token response type".to_string(),
                ));
            }
            Ok(grants)
        }
    }
}

/// Hashes a secret or token for at-rest comparison.
#[must_use]
pub fn hash_credential(value: &str) -> String {
    to_hex(&sha256(value.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_store::MemoryClientStore;

    fn registry() -> ClientRegistry {
        registry_with_fetcher(StaticSectorFetcher::new())
    }

    fn registry_with_fetcher(fetcher: StaticSectorFetcher) -> ClientRegistry {
        ClientRegistry::new(
            Arc::new(MemoryClientStore::new()),
            Arc::new(fetcher),
            UrlPatternList::compile(&["*.evil.example/*"]).unwrap(),
            RegistryConfig::default(),
        )
    }

    fn web_request() -> RegistrationRequest {
        RegistrationRequest {
            application_type: Some(ApplicationType::Web),
            client_name: Some("Test App".to_string()),
            redirect_uris: vec!["https://rp.example.org/cb".to_string()],
            response_types: Some(vec![ResponseType::Code]),
            ..RegistrationRequest::default()
        }
    }

    #[tokio::test]
    async fn register_then_read_round_trips_metadata() {
        let registry = registry();
        let mut request = web_request();
        request
            .attributes
            .insert("custom_attr".to_string(), "custom-value".to_string());

        let response = registry.register(&request).await.unwrap();
        assert!(response.client_secret.is_some());
        assert_eq!(response.client_secret_expires_at, 0);

        let metadata = registry
            .read(&response.client_id, &response.registration_access_token)
            .await
            .unwrap();
        assert_eq!(metadata.client_name.as_deref(), Some("Test App"));
        assert_eq!(metadata.redirect_uris, request.redirect_uris);
        assert_eq!(metadata.response_types, vec![ResponseType::Code]);
        assert_eq!(
            metadata.attributes.get("custom_attr").map(String::as_str),
            Some("custom-value")
        );
    }

    #[tokio::test]
    async fn read_with_wrong_token_is_unauthorized() {
        let registry = registry();
        let response = registry.register(&web_request()).await.unwrap();

        let err = registry
            .read(&response.client_id, "not-the-token")
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn blacklisted_redirect_uri_is_rejected() {
        let registry = registry();
        let mut request = web_request();
        request.redirect_uris = vec!["https://app.evil.example/cb".to_string()];

        let err = registry.register(&request).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_redirect_uri");
    }

    #[tokio::test]
    async fn empty_redirect_uris_are_rejected() {
        let registry = registry();
        let mut request = web_request();
        request.redirect_uris.clear();

        assert!(registry.register(&request).await.is_err());
    }

    #[tokio::test]
    async fn contradictory_grants_are_rejected() {
        let registry = registry();
        let mut request = web_request();
        request.response_types = Some(vec![ResponseType::Token]);
        request.grant_types = Some(vec![GrantType::AuthorizationCode]);

        let err = registry.register(&request).await.unwrap_err();
        assert_eq!(err.error_code(), "invalid_client_metadata");
    }

    #[tokio::test]
    async fn grant_derivation_from_response_types() {
        let registry = registry();
        let mut request = web_request();
        request.response_types = Some(vec![ResponseType::Code, ResponseType::IdToken]);

        let response = registry.register(&request).await.unwrap();
        let metadata = registry
            .read(&response.client_id, &response.registration_access_token)
            .await
            .unwrap();
        assert!(metadata.grant_types.contains(&GrantType::AuthorizationCode));
        assert!(metadata.grant_types.contains(&GrantType::Implicit));
        assert!(metadata.grant_types.contains(&GrantType::RefreshToken));
    }

    #[tokio::test]
    async fn sector_identifier_subset_check() {
        let fetcher = StaticSectorFetcher::new().with_document(
            "https://rp.example.org/sector.json",
            vec!["https://rp.example.org/cb".to_string()],
        );
        let registry = registry_with_fetcher(fetcher);

        let mut request = web_request();
        request.sector_identifier_uri = Some("https://rp.example.org/sector.json".to_string());
        assert!(registry.register(&request).await.is_ok());

        // A redirect URI outside the published document fails.
        request.redirect_uris.push("https://other.example.org/cb".to_string());
        let err = registry.register(&request).await.unwrap_err();
        assert!(matches!(err, OidcError::InvalidSectorIdentifier(_)));
    }

    #[tokio::test]
    async fn missing_sector_document_fails_registration() {
        let registry = registry();
        let mut request = web_request();
        request.sector_identifier_uri = Some("https://nowhere.example/sector.json".to_string());

        assert!(matches!(
            registry.register(&request).await.unwrap_err(),
            OidcError::InvalidSectorIdentifier(_)
        ));
    }

    #[tokio::test]
    async fn update_rotates_the_secret_and_replaces_metadata() {
        let registry = registry();
        let created = registry.register(&web_request()).await.unwrap();
        let old_secret = created.client_secret.clone().unwrap();

        let mut request = web_request();
        request.client_name = Some("Renamed App".to_string());
        request.redirect_uris = vec!["https://rp.example.org/cb2".to_string()];
        let updated = registry
            .update(
                &created.client_id,
                &created.registration_access_token,
                &request,
            )
            .await
            .unwrap();
        assert_eq!(updated.client_id, created.client_id);
        assert_ne!(updated.client_secret.as_deref(), Some(old_secret.as_str()));
        assert_eq!(
            updated.registration_access_token,
            created.registration_access_token
        );

        let metadata = registry
            .read(&created.client_id, &created.registration_access_token)
            .await
            .unwrap();
        assert_eq!(metadata.client_name.as_deref(), Some("Renamed App"));
        assert_eq!(metadata.redirect_uris, request.redirect_uris);
    }

    #[tokio::test]
    async fn update_with_wrong_token_is_unauthorized() {
        let registry = registry();
        let created = registry.register(&web_request()).await.unwrap();

        let err = registry
            .update(&created.client_id, "not-the-token", &web_request())
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn public_client_gets_no_secret() {
        let registry = registry();
        let mut request = web_request();
        request.token_endpoint_auth_method = Some(TokenEndpointAuthMethod::None);

        let response = registry.register(&request).await.unwrap();
        assert!(response.client_secret.is_none());
    }
}
