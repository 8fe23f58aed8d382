//! Dynamic client registration handlers.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::error::OidcResult;
use crate::registration::{ClientMetadata, RegistrationRequest};

use super::{bearer_token, error_response, state::OidcState};

/// POST `/register`
///
/// Registers a client and returns its credentials.
pub async fn register(
    State(state): State<OidcState>,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    match state.registry.register(&request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(ref err) => error_response(err),
    }
}

/// Query parameters for a registration read.
#[derive(Debug, Deserialize)]
pub struct ReadQuery {
    /// The client to read.
    pub client_id: String,
}

/// GET `/register?client_id=...`
///
/// Reads a registration. Authenticated by the registration access
/// token as a bearer token.
pub async fn read_registration(
    State(state): State<OidcState>,
    Query(query): Query<ReadQuery>,
    headers: HeaderMap,
) -> Response {
    match handle_read(&state, &query, &headers).await {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(ref err) => error_response(err),
    }
}

async fn handle_read(
    state: &OidcState,
    query: &ReadQuery,
    headers: &HeaderMap,
) -> OidcResult<ClientMetadata> {
    let token = bearer_token(headers)?;
    state.registry.read(&query.client_id, token).await
}

/// PUT `/register?client_id=...`
///
/// Re-registers a client, rotating its secret. Authenticated by the
/// registration access token as a bearer token.
pub async fn update_registration(
    State(state): State<OidcState>,
    Query(query): Query<ReadQuery>,
    headers: HeaderMap,
    Json(request): Json<RegistrationRequest>,
) -> Response {
    let token = match bearer_token(&headers) {
        Ok(token) => token,
        Err(ref err) => return error_response(err),
    };
    match state.registry.update(&query.client_id, token, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(ref err) => error_response(err),
    }
}
