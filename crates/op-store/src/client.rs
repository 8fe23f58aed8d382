//! Client store trait.

use async_trait::async_trait;
use op_model::Client;

use crate::error::StoreResult;

/// Provider for registered-client persistence.
///
/// Implementations must be thread-safe; the registry and every
/// authorization/token request read through this trait concurrently.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Stores a newly registered client.
    ///
    /// ## Errors
    ///
    /// Returns `StoreError::Duplicate` if a client with the same
    /// `client_id` exists.
    async fn create(&self, client: &Client) -> StoreResult<()>;

    /// Looks up a client by its OAuth `client_id`.
    async fn get(&self, client_id: &str) -> StoreResult<Option<Client>>;

    /// Replaces an existing client (re-registration).
    ///
    /// ## Errors
    ///
    /// Returns `StoreError::NotFound` if the client does not exist.
    async fn update(&self, client: &Client) -> StoreResult<()>;
}
