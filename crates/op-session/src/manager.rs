//! Session resolution, rotation, and `session_state` derivation.

use std::sync::Arc;

use op_crypto::{random_alphanumeric, sha256, to_hex};
use op_store::StoreResult;
use url::Url;
use uuid::Uuid;

use crate::session::Session;
use crate::store::SessionStore;

/// Session-manager configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle timeout in seconds before a session expires.
    pub idle_timeout: i64,
    /// Absolute lifespan in seconds.
    pub max_lifespan: i64,
    /// Issuer URL, used as the origin fallback when a redirect URI has
    /// no usable origin.
    pub issuer: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 28_800,
            max_lifespan: 86_400,
            issuer: "https://localhost".to_string(),
        }
    }
}

/// Result of resolving a session id from an incoming request.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// A live session was found (already touched and persisted).
    Active(Session),
    /// No session, or the id referenced an expired or unknown session.
    None,
}

impl SessionOutcome {
    /// Returns the session if the outcome is active.
    #[must_use]
    pub fn into_session(self) -> Option<Session> {
        match self {
            Self::Active(session) => Some(session),
            Self::None => None,
        }
    }
}

/// Manages resource-owner sessions.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates a manager over a session store.
    pub fn new(store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        Self { store, config }
    }

    /// Resolves a session id carried by an incoming request.
    ///
    /// Expired sessions are removed lazily here; live sessions get
    /// their last-activity timestamp refreshed.
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn resolve(&self, id: Option<Uuid>) -> StoreResult<SessionOutcome> {
        let Some(id) = id else {
            return Ok(SessionOutcome::None);
        };

        let Some(mut session) = self.store.get(id).await? else {
            return Ok(SessionOutcome::None);
        };

        if session.is_expired(self.config.idle_timeout, self.config.max_lifespan) {
            tracing::debug!(session_id = %id, "removing expired session");
            self.store.remove(id).await?;
            return Ok(SessionOutcome::None);
        }

        session.touch();
        self.store.update(&session).await?;
        Ok(SessionOutcome::Active(session))
    }

    /// Completes an interactive authentication.
    ///
    /// A fresh session with a fresh id is minted every time; any
    /// superseded session is removed in the same store operation, so a
    /// fixated or previously leaked id never survives a login.
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn authenticate(
        &self,
        subject: impl Into<String>,
        superseded: Option<Uuid>,
    ) -> StoreResult<Session> {
        let session = Session::authenticated(subject);
        self.store.rotate(superseded, &session).await?;
        tracing::debug!(session_id = %session.id, "authenticated session created");
        Ok(session)
    }

    /// Derives the client-visible `session_state` value for a client
    /// and redirect URI.
    ///
    /// The value is `hex(sha256("{client_id} {origin} {opbs} {salt}"))`
    /// joined with the salt by a dot. The salt is cached per
    /// `(client_id, origin)` on the session so repeated polling within
    /// one open session yields a stable value, while a new session
    /// (fresh OP browser state) always changes it.
    ///
    /// ## Errors
    ///
    /// Returns an error if persisting a newly minted salt fails.
    pub async fn session_state(
        &self,
        session: &mut Session,
        client_id: &str,
        redirect_uri: Option<&str>,
    ) -> StoreResult<String> {
        let origin = redirect_uri
            .and_then(extract_origin)
            .unwrap_or_else(|| self.config.issuer.clone());
        let key = format!("{client_id} {origin}");

        let salt = match session.state_salts.get(&key) {
            Some(salt) => salt.clone(),
            None => {
                let salt = random_alphanumeric(16);
                session.state_salts.insert(key, salt.clone());
                self.store.update(session).await?;
                salt
            }
        };

        let digest = sha256(format!("{client_id} {origin} {} {salt}", session.opbs).as_bytes());
        Ok(format!("{}.{salt}", to_hex(&digest)))
    }

    /// Records a consent decision on the session and persists it.
    ///
    /// Already-consented clients are a no-op.
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn record_consent(&self, session: &mut Session, client_id: &str) -> StoreResult<()> {
        if !session.has_consent(client_id) {
            session.add_consent(client_id);
            self.store.update(session).await?;
        }
        Ok(())
    }

    /// Terminates a session. Unknown ids are a no-op.
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn logout(&self, id: Uuid) -> StoreResult<()> {
        self.store.remove(id).await
    }
}

/// Extracts `scheme://host[:port]` from a URI. Default ports are not
/// rendered, matching what browsers report as `window.origin`.
fn extract_origin(uri: &str) -> Option<String> {
    let url = Url::parse(uri).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::new()), SessionConfig::default())
    }

    #[tokio::test]
    async fn resolve_unknown_id_is_none() {
        let manager = manager();
        let outcome = manager.resolve(Some(Uuid::now_v7())).await.unwrap();
        assert!(outcome.into_session().is_none());
    }

    #[tokio::test]
    async fn authenticate_rotates_session_id() {
        let manager = manager();
        let first = manager.authenticate("alice", None).await.unwrap();
        let second = manager.authenticate("alice", Some(first.id)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert!(manager
            .resolve(Some(first.id))
            .await
            .unwrap()
            .into_session()
            .is_none());
        assert!(manager
            .resolve(Some(second.id))
            .await
            .unwrap()
            .into_session()
            .is_some());
    }

    #[tokio::test]
    async fn session_state_is_stable_within_a_session() {
        let manager = manager();
        let mut session = manager.authenticate("alice", None).await.unwrap();

        let a = manager
            .session_state(&mut session, "app", Some("https://rp.example.org/cb"))
            .await
            .unwrap();
        let b = manager
            .session_state(&mut session, "app", Some("https://rp.example.org/cb"))
            .await
            .unwrap();
        assert_eq!(a, b);
        assert!(a.contains('.'));
    }

    #[tokio::test]
    async fn session_state_changes_across_sessions() {
        let manager = manager();
        let mut first = manager.authenticate("alice", None).await.unwrap();
        let a = manager
            .session_state(&mut first, "app", Some("https://rp.example.org/cb"))
            .await
            .unwrap();

        let mut second = manager.authenticate("alice", Some(first.id)).await.unwrap();
        let b = manager
            .session_state(&mut second, "app", Some("https://rp.example.org/cb"))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn session_state_varies_by_client_and_origin() {
        let manager = manager();
        let mut session = manager.authenticate("alice", None).await.unwrap();

        let a = manager
            .session_state(&mut session, "app", Some("https://rp.example.org/cb"))
            .await
            .unwrap();
        let b = manager
            .session_state(&mut session, "other", Some("https://rp.example.org/cb"))
            .await
            .unwrap();
        let c = manager
            .session_state(&mut session, "app", Some("https://elsewhere.example.org/cb"))
            .await
            .unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn unparseable_redirect_uri_falls_back_to_issuer() {
        let manager = manager();
        let mut session = manager.authenticate("alice", None).await.unwrap();

        let from_garbage = manager
            .session_state(&mut session, "app", Some("not a uri"))
            .await
            .unwrap();
        let from_none = manager
            .session_state(&mut session, "app", None)
            .await
            .unwrap();
        assert_eq!(from_garbage, from_none);
    }

    #[tokio::test]
    async fn logout_removes_session() {
        let manager = manager();
        let session = manager.authenticate("alice", None).await.unwrap();
        manager.logout(session.id).await.unwrap();
        assert!(manager
            .resolve(Some(session.id))
            .await
            .unwrap()
            .into_session()
            .is_none());
    }

    #[tokio::test]
    async fn consent_is_persisted() {
        let manager = manager();
        let mut session = manager.authenticate("alice", None).await.unwrap();
        manager.record_consent(&mut session, "app").await.unwrap();

        let reloaded = manager
            .resolve(Some(session.id))
            .await
            .unwrap()
            .into_session()
            .unwrap();
        assert!(reloaded.has_consent("app"));
        assert!(!reloaded.has_consent("other"));
    }

    #[test]
    fn origin_extraction() {
        assert_eq!(
            extract_origin("https://rp.example.org/cb").as_deref(),
            Some("https://rp.example.org")
        );
        assert_eq!(
            extract_origin("http://localhost:8080/cb?x=1").as_deref(),
            Some("http://localhost:8080")
        );
        // Default port is elided by the parser.
        assert_eq!(
            extract_origin("https://rp.example.org:443/cb").as_deref(),
            Some("https://rp.example.org")
        );
        assert!(extract_origin("rp.example.org/cb").is_none());
    }
}
