//! Endpoint request types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Prompt;

/// Authorization endpoint request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Response type(s), space-separated (required).
    pub response_type: String,

    /// Client id (required).
    pub client_id: String,

    /// Redirect URI (required).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Requested scope, space-separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// State, echoed verbatim on the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// Nonce, bound into the ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Prompt directives, space-separated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// Session id of an existing authentication session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,

    /// Custom response headers as a JSON object, echoed verbatim on
    /// the HTTP response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_response_headers: Option<String>,
}

impl AuthorizationRequest {
    /// Parses the prompt parameter into individual values.
    #[must_use]
    pub fn prompt_values(&self) -> Vec<Prompt> {
        self.prompt
            .as_ref()
            .map(|p| {
                p.split_whitespace()
                    .filter_map(|s| match s {
                        "none" => Some(Prompt::None),
                        "login" => Some(Prompt::Login),
                        "consent" => Some(Prompt::Consent),
                        "select_account" => Some(Prompt::SelectAccount),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Checks if the prompt includes `none`.
    #[must_use]
    pub fn is_prompt_none(&self) -> bool {
        self.prompt_values().contains(&Prompt::None)
    }

    /// Checks if re-authentication is forced.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        self.prompt_values().contains(&Prompt::Login)
    }

    /// Returns the requested scopes.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_ref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Parses the custom response headers into name/value pairs.
    ///
    /// ## Errors
    ///
    /// Returns an error if the parameter is not a JSON object of
    /// string values.
    pub fn custom_headers(&self) -> Result<Vec<(String, String)>, String> {
        let Some(raw) = &self.custom_response_headers else {
            return Ok(Vec::new());
        };
        let map: std::collections::BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|e| format!("malformed custom headers: {e}"))?;
        Ok(map.into_iter().collect())
    }
}

/// Token endpoint request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Grant type (required).
    pub grant_type: String,

    /// Authorization code (`authorization_code` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Redirect URI the code was issued for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Client id (`client_secret_post` or public clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Client secret (`client_secret_post`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Refresh token (`refresh_token` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Requested scope (`refresh_token` and `password` grants).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Resource-owner username (`password` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Resource-owner password (`password` grant).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Interactive-login completion request (resumes a parked
/// authorization).
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    /// The parked authorization to resume.
    pub pending_id: Uuid,

    /// Resource-owner username.
    pub username: String,

    /// Resource-owner password.
    pub password: String,

    /// Session superseded by this login, if any.
    #[serde(default)]
    pub session_id: Option<Uuid>,
}

/// End-session endpoint request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndSessionRequest {
    /// ID token previously issued to the client (required).
    pub id_token_hint: Option<String>,

    /// Where to send the browser after logout.
    pub post_logout_redirect_uri: Option<String>,

    /// State echoed on the post-logout redirect.
    pub state: Option<String>,
}

/// Introspection endpoint request (RFC 7662).
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    /// The token under introspection.
    pub token: String,

    /// Client id (`client_secret_post` clients).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (`client_secret_post` clients).
    #[serde(default)]
    pub client_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_parsing() {
        let request = AuthorizationRequest {
            prompt: Some("login consent".to_string()),
            ..AuthorizationRequest::default()
        };
        assert_eq!(request.prompt_values(), vec![Prompt::Login, Prompt::Consent]);
        assert!(request.requires_login());
        assert!(!request.is_prompt_none());
    }

    #[test]
    fn scope_splitting() {
        let request = AuthorizationRequest {
            scope: Some("openid profile email".to_string()),
            ..AuthorizationRequest::default()
        };
        assert_eq!(request.scopes(), vec!["openid", "profile", "email"]);
    }

    #[test]
    fn custom_headers_parse_and_reject_garbage() {
        let request = AuthorizationRequest {
            custom_response_headers: Some(r#"{"X-Debug":"on","X-Trace":"t-1"}"#.to_string()),
            ..AuthorizationRequest::default()
        };
        let headers = request.custom_headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert!(headers.contains(&("X-Debug".to_string(), "on".to_string())));

        let bad = AuthorizationRequest {
            custom_response_headers: Some("not json".to_string()),
            ..AuthorizationRequest::default()
        };
        assert!(bad.custom_headers().is_err());

        let absent = AuthorizationRequest::default();
        assert!(absent.custom_headers().unwrap().is_empty());
    }
}
