//! Protocol vocabulary shared across the endpoints.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use op_model::ResponseType;
use serde::{Deserialize, Serialize};

/// The combined `response_type` parameter value (supports hybrid flows).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseTypes(pub HashSet<ResponseType>);

impl ResponseTypes {
    /// Checks if this is the plain authorization-code flow.
    #[must_use]
    pub fn is_code_flow(&self) -> bool {
        self.0.contains(&ResponseType::Code) && self.0.len() == 1
    }

    /// Checks if this is an implicit flow.
    #[must_use]
    pub fn is_implicit_flow(&self) -> bool {
        !self.0.contains(&ResponseType::Code) && !self.0.is_empty()
    }

    /// Checks if this is a hybrid flow.
    #[must_use]
    pub fn is_hybrid_flow(&self) -> bool {
        self.0.contains(&ResponseType::Code) && self.0.len() > 1
    }

    /// Checks if an authorization code is requested.
    #[must_use]
    pub fn wants_code(&self) -> bool {
        self.0.contains(&ResponseType::Code)
    }

    /// Checks if an access token is requested on the front channel.
    #[must_use]
    pub fn wants_token(&self) -> bool {
        self.0.contains(&ResponseType::Token)
    }

    /// Checks if an ID token is requested on the front channel.
    #[must_use]
    pub fn wants_id_token(&self) -> bool {
        self.0.contains(&ResponseType::IdToken)
    }
}

impl FromStr for ResponseTypes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut types = HashSet::new();
        for part in s.split_whitespace() {
            types.insert(ResponseType::from_str(part)?);
        }
        if types.is_empty() {
            return Err("response_type is empty".to_string());
        }
        Ok(Self(types))
    }
}

/// OIDC prompt values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// No UI may be displayed.
    None,
    /// Force re-authentication.
    Login,
    /// Force the consent screen.
    Consent,
    /// Force account selection.
    SelectAccount,
}

/// How authorization response parameters are delivered on the redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Query string parameters (default for the code flow).
    #[default]
    Query,
    /// Fragment parameters (default for implicit/hybrid).
    Fragment,
}

/// Token type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TokenType {
    /// Bearer token (RFC 6750).
    #[serde(rename = "Bearer")]
    #[default]
    Bearer,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer => write!(f, "Bearer"),
        }
    }
}

/// Standard OIDC scopes.
pub mod scopes {
    /// `OpenID` Connect scope (required for OIDC).
    pub const OPENID: &str = "openid";
    /// Profile scope.
    pub const PROFILE: &str = "profile";
    /// Email scope.
    pub const EMAIL: &str = "email";
    /// Address scope.
    pub const ADDRESS: &str = "address";
    /// Phone scope.
    pub const PHONE: &str = "phone";
    /// Offline access scope (refresh tokens for offline use).
    pub const OFFLINE_ACCESS: &str = "offline_access";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_types_flow_detection() {
        let code_only: ResponseTypes = "code".parse().unwrap();
        assert!(code_only.is_code_flow());
        assert!(!code_only.is_implicit_flow());
        assert!(!code_only.is_hybrid_flow());

        let implicit: ResponseTypes = "token id_token".parse().unwrap();
        assert!(!implicit.is_code_flow());
        assert!(implicit.is_implicit_flow());
        assert!(implicit.wants_id_token());

        let hybrid: ResponseTypes = "code id_token token".parse().unwrap();
        assert!(hybrid.is_hybrid_flow());
        assert!(hybrid.wants_code());
        assert!(hybrid.wants_token());
    }

    #[test]
    fn empty_or_unknown_response_type_is_rejected() {
        assert!(ResponseTypes::from_str("").is_err());
        assert!(ResponseTypes::from_str("code nonsense").is_err());
    }
}
