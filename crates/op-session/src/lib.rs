//! Resource-owner session tracking for the OP core.
//!
//! Covers the authenticated-session model, the session store seam, and
//! the [`SessionManager`] that resolves sessions on authorization
//! requests, rotates identifiers on interactive login, and derives the
//! client-visible `session_state` value.

mod manager;
mod session;
mod store;

pub use manager::{SessionConfig, SessionManager, SessionOutcome};
pub use session::{Session, SessionState};
pub use store::{MemorySessionStore, SessionStore};
