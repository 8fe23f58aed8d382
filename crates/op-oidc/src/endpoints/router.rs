//! Router configuration for the provider endpoints.

use axum::{
    Router,
    routing::{get, post},
};

use super::authorization::{authorize_get, authorize_post, login};
use super::end_session::end_session;
use super::introspection::{client_info, introspect};
use super::registration::{read_registration, register, update_registration};
use super::state::OidcState;
use super::token::token;

/// Creates the provider router.
///
/// | Method   | Path               | Description                     |
/// |----------|--------------------|---------------------------------|
/// | GET/POST | `/authorize`       | Authorization endpoint          |
/// | POST     | `/authorize/login` | Interactive login completion    |
/// | POST     | `/token`           | Token endpoint                  |
/// | POST     | `/register`        | Dynamic client registration     |
/// | GET      | `/register`        | Registration read               |
/// | PUT      | `/register`        | Registration update             |
/// | POST     | `/introspect`      | Token introspection             |
/// | GET      | `/clientinfo`      | Client metadata by access token |
/// | GET      | `/end_session`     | RP-initiated logout             |
pub fn oidc_router() -> Router<OidcState> {
    Router::new()
        .route("/authorize", get(authorize_get).post(authorize_post))
        .route("/authorize/login", post(login))
        .route("/token", post(token))
        .route(
            "/register",
            post(register).get(read_registration).put(update_registration),
        )
        .route("/introspect", post(introspect))
        .route("/clientinfo", get(client_info))
        .route("/end_session", get(end_session))
}
