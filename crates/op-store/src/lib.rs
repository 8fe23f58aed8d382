//! Persistence-backend traits for the OP core, with in-memory
//! reference implementations.
//!
//! The traits are the seam between the protocol core and whatever
//! store backs a deployment. The memory implementations are the
//! reference for the concurrency contract: code and refresh-token
//! redemption are single-lock check-and-invalidate, so exactly one of
//! any number of concurrent redeemers succeeds.

mod client;
mod code;
mod error;
mod memory;
mod token;

pub use client::ClientStore;
pub use code::{CodeStore, StoredCode};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryClientStore, MemoryCodeStore, MemoryRefreshTokenStore};
pub use token::{RefreshTokenStore, StoredRefreshToken};
