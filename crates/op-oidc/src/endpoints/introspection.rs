//! Token introspection and client info handlers.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::{Deserialize, Serialize};

use crate::claims::AccessTokenClaims;
use crate::error::{OidcError, OidcResult};
use crate::registration::ClientMetadata;
use crate::request::IntrospectionRequest;

use super::client_auth::{authenticate_client, extract_credentials};
use super::{bearer_token, error_response, state::OidcState};

/// Introspection response (RFC 7662).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntrospectionResponse {
    /// Whether the token is currently valid.
    pub active: bool,

    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Client the token was issued to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Token type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Expiration time (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued-at time (Unix seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Session the token is bound to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl IntrospectionResponse {
    /// The response for an invalid, expired, or unknown token.
    #[must_use]
    pub const fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            sub: None,
            token_type: None,
            exp: None,
            iat: None,
            sid: None,
        }
    }
}

impl From<AccessTokenClaims> for IntrospectionResponse {
    fn from(claims: AccessTokenClaims) -> Self {
        Self {
            active: true,
            scope: claims.scope,
            client_id: claims.azp,
            sub: Some(claims.sub),
            token_type: claims.typ,
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            sid: claims.sid,
        }
    }
}

/// POST `/introspect`
///
/// Introspects an access token. Requires client authentication.
/// Always answers 200 for authenticated callers; invalid tokens come
/// back as `active: false`.
pub async fn introspect(
    State(state): State<OidcState>,
    headers: HeaderMap,
    Form(request): Form<IntrospectionRequest>,
) -> Response {
    let credentials = match extract_credentials(
        &headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    ) {
        Ok(credentials) => credentials,
        Err(ref err) => return error_response(err),
    };
    if let Err(ref err) = authenticate_client(state.clients.as_ref(), &credentials).await {
        return error_response(err);
    }

    let response = match state.issuer.verify_access_token(&request.token) {
        Ok(claims) => IntrospectionResponse::from(claims),
        Err(_) => IntrospectionResponse::inactive(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// GET `/clientinfo`
///
/// Returns the metadata of the client an access token was issued to.
/// Authenticated by the access token itself as a bearer token.
pub async fn client_info(State(state): State<OidcState>, headers: HeaderMap) -> Response {
    match handle_client_info(&state, &headers).await {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(ref err) => error_response(err),
    }
}

async fn handle_client_info(state: &OidcState, headers: &HeaderMap) -> OidcResult<ClientMetadata> {
    let token = bearer_token(headers)?;
    let claims = state
        .issuer
        .verify_access_token(token)
        .map_err(|_| OidcError::InvalidToken("access token is not valid".to_string()))?;

    let client_id = claims
        .azp
        .ok_or_else(|| OidcError::InvalidToken("token has no authorized party".to_string()))?;
    let client = state
        .clients
        .get(&client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidClient(format!("unknown client '{client_id}'")))?;

    Ok(ClientMetadata::from(client))
}
