//! Protocol vocabulary enums.
//!
//! Types shared between dynamic registration, the authorization
//! endpoint, and the token endpoint (RFC 6749, OpenID Connect Core,
//! OpenID Connect Dynamic Client Registration).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OAuth 2.0 response types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResponseType {
    /// Authorization code response.
    #[serde(rename = "code")]
    Code,

    /// Implicit grant - access token.
    #[serde(rename = "token")]
    Token,

    /// `OpenID` Connect - ID token.
    #[serde(rename = "id_token")]
    IdToken,
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ResponseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code" => Ok(Self::Code),
            "token" => Ok(Self::Token),
            "id_token" => Ok(Self::IdToken),
            _ => Err(format!("unknown response type: {s}")),
        }
    }
}

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrantType {
    /// Authorization code grant (RFC 6749 Section 4.1).
    #[serde(rename = "authorization_code")]
    AuthorizationCode,

    /// Implicit grant (RFC 6749 Section 4.2).
    #[serde(rename = "implicit")]
    Implicit,

    /// Refresh token grant (RFC 6749 Section 6).
    #[serde(rename = "refresh_token")]
    RefreshToken,

    /// Resource owner password credentials grant (RFC 6749 Section 4.3).
    #[serde(rename = "password")]
    Password,
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AuthorizationCode => "authorization_code",
            Self::Implicit => "implicit",
            Self::RefreshToken => "refresh_token",
            Self::Password => "password",
        };
        write!(f, "{s}")
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "implicit" => Ok(Self::Implicit),
            "refresh_token" => Ok(Self::RefreshToken),
            "password" => Ok(Self::Password),
            _ => Err(format!("unknown grant type: {s}")),
        }
    }
}

/// OIDC application types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationType {
    /// Server-side web application (confidential).
    #[default]
    Web,
    /// Native application (mobile, desktop).
    Native,
}

impl fmt::Display for ApplicationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Web => "web",
            Self::Native => "native",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ApplicationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web" => Ok(Self::Web),
            "native" => Ok(Self::Native),
            _ => Err(format!("unknown application type: {s}")),
        }
    }
}

/// Client authentication methods for the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenEndpointAuthMethod {
    /// `client_secret_basic` - HTTP Basic auth with `client_id:client_secret`.
    #[default]
    #[serde(rename = "client_secret_basic")]
    ClientSecretBasic,

    /// `client_secret_post` - `client_id` and `client_secret` in request body.
    #[serde(rename = "client_secret_post")]
    ClientSecretPost,

    /// No authentication (public client).
    #[serde(rename = "none")]
    None,
}

impl fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::None => "none",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TokenEndpointAuthMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_secret_basic" => Ok(Self::ClientSecretBasic),
            "client_secret_post" => Ok(Self::ClientSecretPost),
            "none" => Ok(Self::None),
            _ => Err(format!("unknown token endpoint auth method: {s}")),
        }
    }
}
