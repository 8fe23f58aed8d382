//! End-session (RP-initiated logout) handler.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use uuid::Uuid;

use crate::claims::Audience;
use crate::error::{OidcError, OidcResult};
use crate::request::EndSessionRequest;

use super::{error_response, state::OidcState};

/// GET `/end_session`
///
/// Terminates the session named by a valid `id_token_hint` and revokes
/// its refresh tokens. Redirects to `post_logout_redirect_uri` when it
/// is registered for the token's client, otherwise shows a logout
/// confirmation page.
pub async fn end_session(
    State(state): State<OidcState>,
    Query(request): Query<EndSessionRequest>,
) -> Response {
    match handle_end_session(&state, &request).await {
        Ok(Some(location)) => Redirect::to(&location).into_response(),
        Ok(None) => (StatusCode::OK, Html(LOGGED_OUT_PAGE)).into_response(),
        Err(ref err) => error_response(err),
    }
}

async fn handle_end_session(
    state: &OidcState,
    request: &EndSessionRequest,
) -> OidcResult<Option<String>> {
    let hint = request
        .id_token_hint
        .as_deref()
        .ok_or_else(|| OidcError::InvalidRequest("id_token_hint is required".to_string()))?;
    let claims = state
        .issuer
        .verify_id_token(hint)
        .map_err(|_| OidcError::InvalidToken("id_token_hint is not valid".to_string()))?;

    if let Some(sid) = &claims.sid
        && let Ok(session_id) = Uuid::parse_str(sid)
    {
        state.sessions.logout(session_id).await?;
        let revoked = state.issuer.revoke_session(session_id).await?;
        tracing::info!(%session_id, revoked, "session terminated");
    }

    let Some(target) = &request.post_logout_redirect_uri else {
        return Ok(None);
    };

    let client_id = claims.azp.as_deref().or(match &claims.aud {
        Audience::Single(aud) => Some(aud.as_str()),
        Audience::Multiple(_) => None,
    });
    let client_id = client_id
        .ok_or_else(|| OidcError::InvalidRequest("token names no client".to_string()))?;
    let client = state
        .clients
        .get(client_id)
        .await?
        .ok_or_else(|| OidcError::InvalidClient(format!("unknown client '{client_id}'")))?;

    if !client.post_logout_redirect_uris.iter().any(|u| u == target) {
        return Err(OidcError::InvalidRequest(
            "post_logout_redirect_uri is not registered for the client".to_string(),
        ));
    }

    let location = match &request.state {
        Some(value) => {
            let separator = if target.contains('?') { '&' } else { '?' };
            format!("{target}{separator}state={}", urlencoding::encode(value))
        }
        None => target.clone(),
    };
    Ok(Some(location))
}

const LOGGED_OUT_PAGE: &str = r"<!DOCTYPE html>
<html>
<head><title>Signed out</title></head>
<body>
<h1>Signed out</h1>
<p>Your session has ended.</p>
</body>
</html>";
