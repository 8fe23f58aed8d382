//! Session store seam and in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use op_store::{StoreError, StoreResult};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::session::Session;

/// Provider for session persistence.
///
/// `rotate` is the critical operation: committing a new session and
/// removing the superseded one must be atomic so that a concurrent
/// lookup never sees both ids valid for authentication.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session.
    async fn create(&self, session: &Session) -> StoreResult<()>;

    /// Looks up a session by id.
    async fn get(&self, id: Uuid) -> StoreResult<Option<Session>>;

    /// Replaces a stored session.
    ///
    /// ## Errors
    ///
    /// Returns `StoreError::NotFound` if the session is gone.
    async fn update(&self, session: &Session) -> StoreResult<()>;

    /// Removes a session. Unknown ids are a no-op.
    async fn remove(&self, id: Uuid) -> StoreResult<()>;

    /// Atomically commits `new` and removes `superseded` (if any).
    async fn rotate(&self, superseded: Option<Uuid>, new: &Session) -> StoreResult<()>;
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &Session) -> StoreResult<()> {
        self.sessions.lock().insert(session.id, session.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Session>> {
        Ok(self.sessions.lock().get(&id).cloned())
    }

    async fn update(&self, session: &Session) -> StoreResult<()> {
        let mut sessions = self.sessions.lock();
        if !sessions.contains_key(&session.id) {
            return Err(StoreError::not_found("Session", session.id.to_string()));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn remove(&self, id: Uuid) -> StoreResult<()> {
        self.sessions.lock().remove(&id);
        Ok(())
    }

    async fn rotate(&self, superseded: Option<Uuid>, new: &Session) -> StoreResult<()> {
        // One lock for both steps: once the new session is visible the
        // old id is already gone.
        let mut sessions = self.sessions.lock();
        if let Some(old) = superseded {
            sessions.remove(&old);
        }
        sessions.insert(new.id, new.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_remove() {
        let store = MemorySessionStore::new();
        let session = Session::authenticated("alice");

        store.create(&session).await.unwrap();
        assert!(store.get(session.id).await.unwrap().is_some());

        store.remove(session.id).await.unwrap();
        assert!(store.get(session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rotate_removes_old_id() {
        let store = MemorySessionStore::new();
        let old = Session::authenticated("alice");
        store.create(&old).await.unwrap();

        let new = Session::authenticated("alice");
        store.rotate(Some(old.id), &new).await.unwrap();

        assert!(store.get(old.id).await.unwrap().is_none());
        assert!(store.get(new.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn update_missing_session_fails() {
        let store = MemorySessionStore::new();
        let session = Session::new();
        assert!(store.update(&session).await.unwrap_err().is_not_found());
    }
}
