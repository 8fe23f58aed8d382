//! `OpenID` Connect Provider core.
//!
//! Implements the protocol surface of the provider:
//!
//! - [`registration`] - dynamic client registration with redirect-URI
//!   and sector-identifier validation
//! - [`redirect`] - wildcard URL patterns and the redirect admission
//!   policy
//! - [`authorize`] - the authorization transaction engine (code,
//!   implicit, and hybrid flows, parked interactive logins)
//! - [`token`] - token minting, verification, and refresh rotation
//! - [`identity`] - resource-owner credential verification seam
//! - [`endpoints`] - Axum handlers and the provider router
//!
//! Client and session state live in `op-model`, `op-store`, and
//! `op-session`; signing keys in `op-crypto`.

pub mod authorize;
pub mod claims;
pub mod endpoints;
pub mod error;
pub mod identity;
pub mod redirect;
pub mod registration;
pub mod request;
pub mod token;
pub mod types;

pub use authorize::{
    AuthorizationEngine, AuthorizationResponse, AuthorizationStage, AuthorizeOutcome,
};
pub use claims::{AccessTokenClaims, Audience, IdTokenClaims};
pub use endpoints::{IntrospectionResponse, OidcState, TokenResponse, oidc_router};
pub use error::{ErrorResponse, OidcError, OidcResult};
pub use identity::{IdentityVerifier, MemoryIdentityVerifier};
pub use redirect::{RedirectUriPolicy, UrlPattern, UrlPatternList};
pub use registration::{
    ClientMetadata, ClientRegistry, HttpSectorFetcher, RegistrationRequest, RegistrationResponse,
    RegistryConfig, SectorDocumentFetcher, StaticSectorFetcher, hash_credential,
};
pub use request::{
    AuthorizationRequest, EndSessionRequest, IntrospectionRequest, LoginRequest, TokenRequest,
};
pub use token::{CodeGrant, IssuedTokens, TokenConfig, TokenGrant, TokenIssuer};
pub use types::{Prompt, ResponseMode, ResponseTypes, TokenType};
