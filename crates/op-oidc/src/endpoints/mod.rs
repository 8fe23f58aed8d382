//! Axum handlers for the provider endpoints.
//!
//! - Authorization (`/authorize`, `/authorize/login`)
//! - Token (`/token`)
//! - Dynamic registration (`/register`)
//! - Introspection (`/introspect`) and client info (`/clientinfo`)
//! - End session (`/end_session`)
//!
//! Use [`oidc_router`] to get a configured router:
//!
//! ```rust,ignore
//! let app = oidc_router().with_state(state);
//! ```

mod authorization;
pub mod client_auth;
mod end_session;
mod introspection;
mod registration;
mod router;
mod state;
mod token;

pub use client_auth::{ClientCredentials, authenticate_client, extract_credentials};
pub use introspection::IntrospectionResponse;
pub use router::oidc_router;
pub use state::OidcState;
pub use token::TokenResponse;

use axum::Json;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;

use crate::error::OidcError;

/// Renders an error as the standard JSON error body. Failed client
/// authentication also carries a `WWW-Authenticate` challenge.
fn error_response(err: &OidcError) -> axum::response::Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(err.to_error_response())).into_response();
    if matches!(err, OidcError::InvalidClient(_)) {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Basic"));
    }
    response
}

/// Extracts a bearer token from the authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, OidcError> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| OidcError::InvalidToken("bearer token is required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer tok-123"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok-123");

        let mut basic = HeaderMap::new();
        basic.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&basic).is_err());
        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
