//! Client authentication for back-channel endpoints.
//!
//! Supports `client_secret_basic` (HTTP Basic authorization header),
//! `client_secret_post` (credentials in the form body), and public
//! clients registered with auth method `none`.

use axum::http::HeaderMap;
use base64::{Engine, engine::general_purpose::STANDARD};
use op_model::{Client, TokenEndpointAuthMethod};
use op_store::ClientStore;

use crate::error::{OidcError, OidcResult};
use crate::registration::hash_credential;

/// Credentials presented by a client, and how they arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Presented client id.
    pub client_id: String,
    /// Presented secret, if any.
    pub client_secret: Option<String>,
    /// Whether the credentials came from the Basic header.
    pub from_header: bool,
}

/// Extracts client credentials from the Basic authorization header or
/// the form body. The header wins when both are present.
///
/// Basic credentials are the base64 of `client_id:client_secret` in
/// plain UTF-8. The decoded octets are used as-is.
///
/// ## Errors
///
/// Returns `InvalidClient` on a malformed header or when no
/// credentials are present at all.
pub fn extract_credentials(
    headers: &HeaderMap,
    form_client_id: Option<&str>,
    form_client_secret: Option<&str>,
) -> OidcResult<ClientCredentials> {
    if let Some(value) = headers.get("authorization") {
        let value = value
            .to_str()
            .map_err(|_| OidcError::InvalidClient("malformed authorization header".to_string()))?;
        if let Some(encoded) = value.strip_prefix("Basic ") {
            let decoded = STANDARD.decode(encoded.trim()).map_err(|_| {
                OidcError::InvalidClient("malformed basic credentials".to_string())
            })?;
            let decoded = String::from_utf8(decoded).map_err(|_| {
                OidcError::InvalidClient("malformed basic credentials".to_string())
            })?;
            let (client_id, client_secret) = decoded.split_once(':').ok_or_else(|| {
                OidcError::InvalidClient("malformed basic credentials".to_string())
            })?;
            return Ok(ClientCredentials {
                client_id: client_id.to_string(),
                client_secret: Some(client_secret.to_string()),
                from_header: true,
            });
        }
    }

    if let Some(client_id) = form_client_id {
        return Ok(ClientCredentials {
            client_id: client_id.to_string(),
            client_secret: form_client_secret.map(ToString::to_string),
            from_header: false,
        });
    }

    Err(OidcError::InvalidClient(
        "no client credentials presented".to_string(),
    ))
}

/// Authenticates a client per its registered auth method.
///
/// ## Errors
///
/// Returns `InvalidClient` on unknown or disabled clients, a missing
/// or wrong secret, an expired secret, or credentials presented on the
/// wrong channel for the registered method.
pub async fn authenticate_client(
    clients: &dyn ClientStore,
    credentials: &ClientCredentials,
) -> OidcResult<Client> {
    let client = clients
        .get(&credentials.client_id)
        .await?
        .ok_or_else(|| {
            OidcError::InvalidClient(format!("unknown client '{}'", credentials.client_id))
        })?;
    if !client.enabled {
        return Err(OidcError::InvalidClient("client is disabled".to_string()));
    }

    match client.token_endpoint_auth_method {
        TokenEndpointAuthMethod::None => Ok(client),
        TokenEndpointAuthMethod::ClientSecretBasic if !credentials.from_header => Err(
            OidcError::InvalidClient("client must use basic authentication".to_string()),
        ),
        TokenEndpointAuthMethod::ClientSecretPost if credentials.from_header => Err(
            OidcError::InvalidClient("client must send credentials in the body".to_string()),
        ),
        TokenEndpointAuthMethod::ClientSecretBasic | TokenEndpointAuthMethod::ClientSecretPost => {
            verify_secret(&client, credentials.client_secret.as_deref())?;
            Ok(client)
        }
    }
}

fn verify_secret(client: &Client, presented: Option<&str>) -> OidcResult<()> {
    let Some(presented) = presented else {
        return Err(OidcError::InvalidClient(
            "client secret is required".to_string(),
        ));
    };
    let Some(secret_hash) = &client.secret_hash else {
        return Err(OidcError::InvalidClient(
            "client has no secret registered".to_string(),
        ));
    };
    if client.secret_expires_at > 0 && client.secret_expires_at <= chrono::Utc::now().timestamp() {
        return Err(OidcError::InvalidClient(
            "client secret has expired".to_string(),
        ));
    }
    if hash_credential(presented) != *secret_hash {
        tracing::debug!(client_id = %client.client_id, "client secret mismatch");
        return Err(OidcError::InvalidClient(
            "client authentication failed".to_string(),
        ));
    }
    Ok(())
}
