//! Authorization and login endpoint handlers.

use axum::Form;
use axum::extract::{Query, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::authorize::AuthorizeOutcome;
use crate::error::OidcError;
use crate::request::{AuthorizationRequest, LoginRequest};

use super::state::OidcState;

/// GET `/authorize`
///
/// Starts an authorization transaction. Responds with a redirect to
/// the client, a login page when interaction is needed, or an error
/// page when the client or redirect URI cannot be trusted.
pub async fn authorize_get(
    State(state): State<OidcState>,
    Query(request): Query<AuthorizationRequest>,
) -> Response {
    let outcome = state.engine.authorize(request).await;
    render_outcome(outcome)
}

/// POST `/authorize`
///
/// Same as GET with form-encoded parameters.
pub async fn authorize_post(
    State(state): State<OidcState>,
    Form(request): Form<AuthorizationRequest>,
) -> Response {
    let outcome = state.engine.authorize(request).await;
    render_outcome(outcome)
}

/// POST `/authorize/login`
///
/// Completes a parked authorization with resource-owner credentials.
pub async fn login(State(state): State<OidcState>, Form(request): Form<LoginRequest>) -> Response {
    let outcome = state.engine.complete_login(request).await;
    render_outcome(outcome)
}

fn render_outcome(outcome: AuthorizeOutcome) -> Response {
    match outcome {
        AuthorizeOutcome::Redirect(response) | AuthorizeOutcome::ErrorRedirect(response) => {
            with_headers(Redirect::to(&response.location).into_response(), &response.headers)
        }
        AuthorizeOutcome::LoginRequired {
            pending_id,
            headers,
        } => with_headers(
            (StatusCode::OK, Html(login_page(&pending_id.to_string()))).into_response(),
            &headers,
        ),
        AuthorizeOutcome::ErrorPage(error) => error_page(&error),
    }
}

/// Attaches custom response headers. Names or values that are not
/// representable as HTTP headers are skipped.
fn with_headers(mut response: Response, headers: &[(String, String)]) -> Response {
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::debug!(header = %name, "skipping unrepresentable custom header");
            continue;
        };
        response.headers_mut().insert(name, value);
    }
    response
}

/// Minimal login form resuming the parked transaction.
fn login_page(pending_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Sign in</title></head>
<body>
<h1>Sign in</h1>
<form method="post" action="/authorize/login">
<input type="hidden" name="pending_id" value="{}">
<label>Username <input type="text" name="username" autocomplete="username"></label>
<label>Password <input type="password" name="password" autocomplete="current-password"></label>
<button type="submit">Sign in</button>
</form>
</body>
</html>"#,
        html_escape(pending_id)
    )
}

/// Shown when the failure cannot be redirected to the client.
fn error_page(error: &OidcError) -> Response {
    let html = format!(
        r"<!DOCTYPE html>
<html>
<head><title>Authorization Error</title></head>
<body>
<h1>Authorization Error</h1>
<p><strong>Error:</strong> {}</p>
<p><strong>Description:</strong> {}</p>
</body>
</html>",
        html_escape(error.error_code()),
        html_escape(&error.to_string())
    );

    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Html(html)).into_response()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping() {
        assert_eq!(
            html_escape(r#"<script>"a" & b</script>"#),
            "&lt;script&gt;&quot;a&quot; &amp; b&lt;/script&gt;"
        );
    }

    #[test]
    fn custom_headers_are_attached() {
        let response = with_headers(
            (StatusCode::OK, "ok").into_response(),
            &[
                ("X-Debug".to_string(), "on".to_string()),
                ("bad name".to_string(), "dropped".to_string()),
            ],
        );
        assert_eq!(response.headers().get("X-Debug").unwrap(), "on");
        assert!(!response.headers().contains_key("bad name"));
    }
}
