//! Domain model for the OpenID Connect Provider core.
//!
//! Contains the [`Client`] record and the protocol vocabulary enums
//! shared by registration, authorization, and token issuance.

mod client;
mod types;

pub use client::Client;
pub use types::{ApplicationType, GrantType, ResponseType, TokenEndpointAuthMethod};
