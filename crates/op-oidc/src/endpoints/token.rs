//! Token endpoint handler.

use axum::{Form, Json, extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use op_model::{Client, GrantType};
use serde::{Deserialize, Serialize};

use crate::error::{OidcError, OidcResult};
use crate::request::TokenRequest;
use crate::token::{IssuedTokens, TokenGrant};
use crate::types::scopes;

use super::client_auth::{authenticate_client, extract_credentials};
use super::{error_response, state::OidcState};

/// Token endpoint response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Token type.
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Granted scope.
    pub scope: String,
}

impl From<IssuedTokens> for TokenResponse {
    fn from(tokens: IssuedTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            token_type: tokens.token_type.to_string(),
            expires_in: tokens.expires_in,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            scope: tokens.scope,
        }
    }
}

/// POST `/token`
///
/// Exchanges a grant for tokens. Supported grant types:
/// `authorization_code`, `refresh_token`, and `password`.
pub async fn token(
    State(state): State<OidcState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> impl IntoResponse {
    match handle_token_request(&state, &headers, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(ref err) => error_response(err),
    }
}

async fn handle_token_request(
    state: &OidcState,
    headers: &HeaderMap,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    let credentials = extract_credentials(
        headers,
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;
    let client = authenticate_client(state.clients.as_ref(), &credentials).await?;

    match request.grant_type.as_str() {
        "authorization_code" => handle_code_grant(state, &client, request).await,
        "refresh_token" => handle_refresh_grant(state, &client, request).await,
        "password" => handle_password_grant(state, &client, request).await,
        other => Err(OidcError::UnsupportedGrantType(other.to_string())),
    }
}

async fn handle_code_grant(
    state: &OidcState,
    client: &Client,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    require_grant(client, GrantType::AuthorizationCode)?;

    let code = request
        .code
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("code is required".to_string()))?;
    let redirect_uri = request
        .redirect_uri
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("redirect_uri is required".to_string()))?;

    let stored = state
        .issuer
        .redeem_code(code, &client.client_id, redirect_uri)
        .await?;

    let mut grant = TokenGrant::back_channel(&client.client_id, &stored.subject, &stored.scope);
    grant.nonce = stored.nonce;
    grant.session_id = stored.session_id;
    grant.auth_time = Some(stored.auth_time);
    grant.include_refresh_token = client.allows_grant(GrantType::RefreshToken);

    let tokens = state.issuer.issue_tokens(&grant).await?;
    tracing::info!(client_id = %client.client_id, "authorization code exchanged");
    Ok(tokens.into())
}

async fn handle_refresh_grant(
    state: &OidcState,
    client: &Client,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    require_grant(client, GrantType::RefreshToken)?;

    let refresh_token = request
        .refresh_token
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("refresh_token is required".to_string()))?;

    let tokens = state
        .issuer
        .refresh(refresh_token, &client.client_id, request.scope.as_deref())
        .await?;
    Ok(tokens.into())
}

async fn handle_password_grant(
    state: &OidcState,
    client: &Client,
    request: &TokenRequest,
) -> OidcResult<TokenResponse> {
    require_grant(client, GrantType::Password)?;

    let username = request
        .username
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("username is required".to_string()))?;
    let password = request
        .password
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("password is required".to_string()))?;

    let subject = state
        .identity
        .verify(username, password)
        .await?
        .ok_or_else(|| {
            OidcError::InvalidGrant("resource owner credentials are not valid".to_string())
        })?;

    let scope = request
        .scope
        .clone()
        .unwrap_or_else(|| scopes::OPENID.to_string());
    let mut grant = TokenGrant::back_channel(&client.client_id, &subject, scope);
    grant.include_refresh_token = client.allows_grant(GrantType::RefreshToken);

    let tokens = state.issuer.issue_tokens(&grant).await?;
    tracing::info!(client_id = %client.client_id, "password grant issued");
    Ok(tokens.into())
}

fn require_grant(client: &Client, grant: GrantType) -> OidcResult<()> {
    if client.allows_grant(grant) {
        Ok(())
    } else {
        Err(OidcError::UnauthorizedClient(format!(
            "client is not authorized for the {grant} grant"
        )))
    }
}
