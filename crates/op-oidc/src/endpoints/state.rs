//! Shared state for the provider endpoints.

use std::sync::Arc;

use op_session::SessionManager;
use op_store::ClientStore;

use crate::authorize::AuthorizationEngine;
use crate::identity::IdentityVerifier;
use crate::registration::ClientRegistry;
use crate::token::TokenIssuer;

/// Shared state injected into every endpoint handler.
#[derive(Clone)]
pub struct OidcState {
    /// Client registration and reads.
    pub registry: Arc<ClientRegistry>,
    /// Authorization transaction engine.
    pub engine: Arc<AuthorizationEngine>,
    /// Token minting and verification.
    pub issuer: Arc<TokenIssuer>,
    /// Resource-owner sessions.
    pub sessions: Arc<SessionManager>,
    /// Registered clients.
    pub clients: Arc<dyn ClientStore>,
    /// Resource-owner credential verification.
    pub identity: Arc<dyn IdentityVerifier>,
}
