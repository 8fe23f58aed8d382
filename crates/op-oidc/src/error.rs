//! Protocol error types.
//!
//! Implements OAuth 2.0 and `OpenID` Connect error responses as defined in:
//! - RFC 6749 (OAuth 2.0)
//! - RFC 7591 (Dynamic Client Registration)
//! - `OpenID` Connect Core 1.0

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Protocol errors.
#[derive(Debug, Clone, Error)]
pub enum OidcError {
    /// Invalid request parameters.
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    /// Client authentication failed.
    #[error("invalid_client: {0}")]
    InvalidClient(String),

    /// Invalid or expired authorization grant.
    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    /// Client is not authorized for this grant or response type.
    #[error("unauthorized_client: {0}")]
    UnauthorizedClient(String),

    /// Unsupported grant type.
    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    /// Unsupported response type.
    #[error("unsupported_response_type: {0}")]
    UnsupportedResponseType(String),

    /// Invalid scope.
    #[error("invalid_scope: {0}")]
    InvalidScope(String),

    /// Registration rejected a redirect URI.
    #[error("invalid_redirect_uri: {0}")]
    InvalidRedirectUri(String),

    /// Sector identifier document could not be verified.
    #[error("invalid sector identifier: {0}")]
    InvalidSectorIdentifier(String),

    /// Contradictory or incomplete registration metadata.
    #[error("invalid_client_metadata: {0}")]
    InvalidClientMetadata(String),

    /// Invalid bearer or registration access token.
    #[error("invalid_token: {0}")]
    InvalidToken(String),

    /// Access denied by the resource owner.
    #[error("access_denied: {0}")]
    AccessDenied(String),

    /// Login required but `prompt=none` forbids interaction.
    #[error("login_required")]
    LoginRequired,

    /// Consent required but `prompt=none` forbids interaction.
    #[error("consent_required")]
    ConsentRequired,

    /// A collaborator did not answer within its time bound.
    #[error("temporarily_unavailable: {0}")]
    ServiceUnavailable(String),

    /// Token signing error.
    #[error("token signing failed: {0}")]
    TokenSigning(String),

    /// Token validation error.
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    /// Internal error.
    #[error("internal error: {0}")]
    ServerError(String),
}

impl OidcError {
    /// Returns the wire error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidClient(_) => "invalid_client",
            Self::InvalidGrant(_) => "invalid_grant",
            Self::UnauthorizedClient(_) => "unauthorized_client",
            Self::UnsupportedGrantType(_) => "unsupported_grant_type",
            Self::UnsupportedResponseType(_) => "unsupported_response_type",
            Self::InvalidScope(_) => "invalid_scope",
            Self::InvalidRedirectUri(_) => "invalid_redirect_uri",
            Self::InvalidSectorIdentifier(_) | Self::InvalidClientMetadata(_) => {
                "invalid_client_metadata"
            }
            Self::InvalidToken(_) => "invalid_token",
            Self::AccessDenied(_) => "access_denied",
            Self::LoginRequired => "login_required",
            Self::ConsentRequired => "consent_required",
            Self::ServiceUnavailable(_) => "temporarily_unavailable",
            Self::TokenSigning(_) | Self::TokenValidation(_) | Self::ServerError(_) => {
                "server_error"
            }
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidGrant(_)
            | Self::UnsupportedGrantType(_)
            | Self::UnsupportedResponseType(_)
            | Self::InvalidScope(_)
            | Self::InvalidRedirectUri(_)
            | Self::InvalidSectorIdentifier(_)
            | Self::InvalidClientMetadata(_)
            | Self::LoginRequired
            | Self::ConsentRequired => 400,
            Self::InvalidClient(_) | Self::InvalidToken(_) => 401,
            Self::AccessDenied(_) | Self::UnauthorizedClient(_) => 403,
            Self::TokenSigning(_) | Self::TokenValidation(_) | Self::ServerError(_) => 500,
            Self::ServiceUnavailable(_) => 503,
        }
    }

    /// Creates a wire error response.
    #[must_use]
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            error_description: Some(self.to_string()),
        }
    }
}

impl From<op_store::StoreError> for OidcError {
    fn from(err: op_store::StoreError) -> Self {
        match err {
            op_store::StoreError::Unavailable(msg) => Self::ServiceUnavailable(msg),
            other => Self::ServerError(other.to_string()),
        }
    }
}

impl From<op_crypto::CryptoError> for OidcError {
    fn from(err: op_crypto::CryptoError) -> Self {
        Self::TokenSigning(err.to_string())
    }
}

/// OAuth 2.0 error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code.
    pub error: String,

    /// Human-readable error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Result type for protocol operations.
pub type OidcResult<T> = Result<T, OidcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_and_statuses() {
        assert_eq!(
            OidcError::InvalidGrant("used".into()).error_code(),
            "invalid_grant"
        );
        assert_eq!(OidcError::InvalidGrant("used".into()).http_status(), 400);
        assert_eq!(OidcError::InvalidClient("bad".into()).http_status(), 401);
        assert_eq!(OidcError::LoginRequired.error_code(), "login_required");
        assert_eq!(
            OidcError::ServiceUnavailable("timeout".into()).http_status(),
            503
        );
        assert_eq!(
            OidcError::InvalidSectorIdentifier("fetch".into()).error_code(),
            "invalid_client_metadata"
        );
    }

    #[test]
    fn store_unavailable_maps_to_service_unavailable() {
        let err: OidcError = op_store::StoreError::Unavailable("timed out".into()).into();
        assert_eq!(err.http_status(), 503);

        let err: OidcError = op_store::StoreError::not_found("Client", "x").into();
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn errors_clone_for_deferred_rendering() {
        let err = OidcError::InvalidScope("unknown scope".into());
        let copy = err.clone();
        assert_eq!(copy.error_code(), err.error_code());
        assert_eq!(copy.to_string(), err.to_string());
    }

    #[test]
    fn error_response_shape() {
        let body = OidcError::LoginRequired.to_error_response();
        assert_eq!(body.error, "login_required");
        assert!(body.error_description.is_some());
    }
}
