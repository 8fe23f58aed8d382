//! In-memory store implementations.
//!
//! Reference implementations of the store traits. Each store keeps its
//! map behind a single `parking_lot` lock; redemption reads and
//! invalidates under that one lock, which is what makes the
//! exactly-once property hold under concurrency.

use std::collections::HashMap;

use async_trait::async_trait;
use op_model::Client;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::client::ClientStore;
use crate::code::{CodeStore, StoredCode};
use crate::error::{StoreError, StoreResult};
use crate::token::{RefreshTokenStore, StoredRefreshToken};

/// In-memory client store.
#[derive(Debug, Default)]
pub struct MemoryClientStore {
    clients: RwLock<HashMap<String, Client>>,
}

impl MemoryClientStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn create(&self, client: &Client) -> StoreResult<()> {
        let mut clients = self.clients.write();
        if clients.contains_key(&client.client_id) {
            return Err(StoreError::duplicate("Client", &client.client_id));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn get(&self, client_id: &str) -> StoreResult<Option<Client>> {
        Ok(self.clients.read().get(client_id).cloned())
    }

    async fn update(&self, client: &Client) -> StoreResult<()> {
        let mut clients = self.clients.write();
        if !clients.contains_key(&client.client_id) {
            return Err(StoreError::not_found("Client", &client.client_id));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(())
    }
}

/// In-memory authorization-code store.
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    codes: Mutex<HashMap<String, StoredCode>>,
}

impl MemoryCodeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn store(&self, code: &StoredCode) -> StoreResult<()> {
        self.codes
            .lock()
            .insert(code.code_hash.clone(), code.clone());
        Ok(())
    }

    async fn redeem(&self, code_hash: &str) -> StoreResult<Option<StoredCode>> {
        // Check-and-invalidate under one lock: the second caller sees
        // used == true and gets None.
        let mut codes = self.codes.lock();
        match codes.get_mut(code_hash) {
            Some(code) if !code.used && !code.is_expired() => {
                code.used = true;
                Ok(Some(code.clone()))
            }
            Some(code) if code.is_expired() => {
                codes.remove(code_hash);
                Ok(None)
            }
            _ => Ok(None),
        }
    }
}

/// In-memory refresh-token store.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<String, StoredRefreshToken>>,
}

impl MemoryRefreshTokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn store(&self, token: &StoredRefreshToken) -> StoreResult<()> {
        self.tokens
            .lock()
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn get(&self, token_hash: &str) -> StoreResult<Option<StoredRefreshToken>> {
        Ok(self
            .tokens
            .lock()
            .get(token_hash)
            .filter(|t| t.is_redeemable())
            .cloned())
    }

    async fn consume(&self, token_hash: &str) -> StoreResult<Option<StoredRefreshToken>> {
        let mut tokens = self.tokens.lock();
        match tokens.get_mut(token_hash) {
            Some(token) if token.is_redeemable() => {
                token.consumed = true;
                Ok(Some(token.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn revoke(&self, token_hash: &str) -> StoreResult<()> {
        if let Some(token) = self.tokens.lock().get_mut(token_hash) {
            token.revoked = true;
        }
        Ok(())
    }

    async fn revoke_session(&self, session_id: Uuid) -> StoreResult<u64> {
        let mut revoked = 0;
        for token in self.tokens.lock().values_mut() {
            if token.session_id == Some(session_id) && !token.revoked {
                token.revoked = true;
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}
