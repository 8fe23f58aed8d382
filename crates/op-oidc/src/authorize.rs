//! Authorization endpoint state machine.
//!
//! A transaction moves through validation, authentication, and grant
//! stages and ends in a response redirect or a rejection. Failures
//! before the client and redirect URI are trusted are shown directly;
//! failures after that point are redirected to the client per RFC
//! 6749. Transactions that need interactive login are parked and
//! resumed by [`AuthorizationEngine::complete_login`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use op_model::Client;
use op_session::{Session, SessionManager};
use op_store::ClientStore;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::OidcError;
use crate::identity::IdentityVerifier;
use crate::redirect::{RedirectUriPolicy, UrlPattern};
use crate::request::{AuthorizationRequest, LoginRequest};
use crate::token::{CodeGrant, TokenGrant, TokenIssuer};
use crate::types::{ResponseMode, ResponseTypes, scopes};

/// How long a parked transaction survives without login, in seconds.
const PENDING_LIFESPAN: i64 = 600;

/// Lifecycle stage of an authorization transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStage {
    /// Request received, nothing checked yet.
    Received,
    /// Client and redirect URI are trusted.
    Validated,
    /// Parked awaiting interactive login.
    Authenticating,
    /// Granted without a consent interaction (trusted client).
    AutoApproved,
    /// Subject authenticated and consent settled.
    Granted,
    /// Response redirect built.
    Responded,
    /// Terminal failure.
    Rejected,
}

/// A successful (or error) redirect back to the client.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse {
    /// Redirect target including response parameters.
    pub location: String,
    /// Custom response headers to attach verbatim.
    pub headers: Vec<(String, String)>,
    /// Session the response was issued under.
    pub session_id: Option<Uuid>,
}

/// Outcome of driving an authorization transaction.
#[derive(Debug, Clone)]
pub enum AuthorizeOutcome {
    /// Success redirect carrying the response parameters.
    Redirect(AuthorizationResponse),
    /// Interactive login needed; the transaction is parked.
    LoginRequired {
        /// Handle for resuming via [`AuthorizationEngine::complete_login`].
        pending_id: Uuid,
        /// Custom response headers to attach verbatim.
        headers: Vec<(String, String)>,
    },
    /// Failure after trust was established, redirected to the client.
    ErrorRedirect(AuthorizationResponse),
    /// Failure before trust was established, shown directly.
    ErrorPage(OidcError),
}

/// A transaction parked for interactive login.
struct PendingAuthorization {
    request: AuthorizationRequest,
    superseded: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    fn is_expired(&self) -> bool {
        (Utc::now() - self.created_at).num_seconds() > PENDING_LIFESPAN
    }
}

/// A validated transaction, trusted to redirect.
struct Transaction {
    request: AuthorizationRequest,
    client: Client,
    redirect_uri: String,
    response_types: ResponseTypes,
    scope: String,
    headers: Vec<(String, String)>,
    stage: AuthorizationStage,
}

impl Transaction {
    fn response_mode(&self) -> ResponseMode {
        if self.response_types.is_code_flow() {
            ResponseMode::Query
        } else {
            ResponseMode::Fragment
        }
    }
}

/// Drives authorization transactions end to end.
pub struct AuthorizationEngine {
    clients: Arc<dyn ClientStore>,
    sessions: Arc<SessionManager>,
    issuer: Arc<TokenIssuer>,
    identity: Arc<dyn IdentityVerifier>,
    policy: RedirectUriPolicy,
    known_scopes: HashSet<String>,
    pending: Mutex<HashMap<Uuid, PendingAuthorization>>,
}

impl AuthorizationEngine {
    /// Creates an engine over the given collaborators.
    pub fn new(
        clients: Arc<dyn ClientStore>,
        sessions: Arc<SessionManager>,
        issuer: Arc<TokenIssuer>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            clients,
            sessions,
            issuer,
            identity,
            policy: RedirectUriPolicy::default(),
            known_scopes: [
                scopes::OPENID,
                scopes::PROFILE,
                scopes::EMAIL,
                scopes::ADDRESS,
                scopes::PHONE,
                scopes::OFFLINE_ACCESS,
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Installs a deployment-wide redirect URI policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RedirectUriPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Extends the set of scopes grantable by this deployment.
    #[must_use]
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.known_scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    /// Drives an authorization request as far as it can go without
    /// user interaction.
    pub async fn authorize(&self, request: AuthorizationRequest) -> AuthorizeOutcome {
        let txn = match self.validate(request).await {
            Ok(txn) => txn,
            Err(outcome) => return outcome,
        };

        let session = match self.sessions.resolve(txn.request.session_id).await {
            Ok(outcome) => outcome.into_session(),
            Err(e) => return AuthorizeOutcome::ErrorPage(e.into()),
        };

        match session {
            Some(session) if !txn.request.requires_login() => self.grant(txn, session).await,
            resolved => {
                if txn.request.is_prompt_none() {
                    return self.error_redirect(txn, &OidcError::LoginRequired);
                }
                self.park(txn, resolved.map(|s| s.id))
            }
        }
    }

    /// Resumes a parked transaction after an interactive login.
    ///
    /// A fresh session is minted on every successful login; the
    /// superseded session id (if any) stops resolving at that point.
    pub async fn complete_login(&self, login: LoginRequest) -> AuthorizeOutcome {
        let Some(pending) = self.pending.lock().remove(&login.pending_id) else {
            return AuthorizeOutcome::ErrorPage(OidcError::InvalidRequest(
                "unknown or expired login attempt".to_string(),
            ));
        };
        if pending.is_expired() {
            return AuthorizeOutcome::ErrorPage(OidcError::InvalidRequest(
                "unknown or expired login attempt".to_string(),
            ));
        }

        // Revalidate: client metadata may have changed while parked.
        let txn = match self.validate(pending.request).await {
            Ok(txn) => txn,
            Err(outcome) => return outcome,
        };

        let subject = match self.identity.verify(&login.username, &login.password).await {
            Ok(Some(subject)) => subject,
            Ok(None) => {
                tracing::debug!(username = %login.username, "login rejected");
                return AuthorizeOutcome::ErrorPage(OidcError::AccessDenied(
                    "invalid credentials".to_string(),
                ));
            }
            Err(e) => return AuthorizeOutcome::ErrorPage(e),
        };

        let superseded = login.session_id.or(pending.superseded);
        let session = match self.sessions.authenticate(subject, superseded).await {
            Ok(session) => session,
            Err(e) => return AuthorizeOutcome::ErrorPage(e.into()),
        };

        self.grant(txn, session).await
    }

    /// Validates the request up to the point where the client and
    /// redirect URI are trusted, then checks the rest.
    async fn validate(&self, request: AuthorizationRequest) -> Result<Transaction, AuthorizeOutcome> {
        let stage = AuthorizationStage::Received;
        tracing::debug!(client_id = %request.client_id, ?stage, "authorization request");

        let client = match self.clients.get(&request.client_id).await {
            Ok(Some(client)) => client,
            Ok(None) => {
                return Err(AuthorizeOutcome::ErrorPage(OidcError::InvalidClient(
                    format!("unknown client '{}'", request.client_id),
                )));
            }
            Err(e) => return Err(AuthorizeOutcome::ErrorPage(e.into())),
        };
        if !client.enabled {
            return Err(AuthorizeOutcome::ErrorPage(OidcError::InvalidClient(
                "client is disabled".to_string(),
            )));
        }

        let Some(redirect_uri) = request.redirect_uri.clone() else {
            return Err(AuthorizeOutcome::ErrorPage(OidcError::InvalidRedirectUri(
                "redirect_uri is required".to_string(),
            )));
        };
        if !redirect_uri_registered(&client, &redirect_uri) || !self.policy.admits(&redirect_uri) {
            return Err(AuthorizeOutcome::ErrorPage(OidcError::InvalidRedirectUri(
                format!("redirect_uri '{redirect_uri}' is not registered for the client"),
            )));
        }

        // Trust established. Later failures redirect to the client.
        let mut txn = Transaction {
            request,
            client,
            redirect_uri,
            response_types: ResponseTypes::default(),
            scope: scopes::OPENID.to_string(),
            headers: Vec::new(),
            stage: AuthorizationStage::Validated,
        };

        txn.headers = match txn.request.custom_headers() {
            Ok(headers) => headers,
            Err(reason) => {
                return Err(self.error_redirect(txn, &OidcError::InvalidRequest(reason)));
            }
        };

        let response_types: ResponseTypes = match txn.request.response_type.parse() {
            Ok(types) => types,
            Err(reason) => {
                return Err(
                    self.error_redirect(txn, &OidcError::UnsupportedResponseType(reason))
                );
            }
        };
        if !txn.client.allows_response_types(response_types.0.iter()) {
            return Err(self.error_redirect(
                txn,
                &OidcError::UnsupportedResponseType(
                    "client is not registered for this response_type".to_string(),
                ),
            ));
        }
        txn.response_types = response_types;

        // Front-channel ID tokens are replayable without a nonce.
        if !txn.response_types.is_code_flow()
            && txn.response_types.wants_id_token()
            && txn.request.nonce.is_none()
        {
            return Err(self.error_redirect(
                txn,
                &OidcError::InvalidRequest("nonce is required for this response_type".to_string()),
            ));
        }

        match self.filter_scope(txn.request.scope.as_deref()) {
            Ok(scope) => txn.scope = scope,
            Err(e) => return Err(self.error_redirect(txn, &e)),
        }

        Ok(txn)
    }

    /// Filters the requested scope down to the grantable set. An
    /// absent scope defaults to `openid`; a scope with no recognized
    /// value at all is rejected.
    fn filter_scope(&self, requested: Option<&str>) -> Result<String, OidcError> {
        let Some(requested) = requested else {
            return Ok(scopes::OPENID.to_string());
        };
        let granted: Vec<&str> = requested
            .split_whitespace()
            .filter(|scope| self.known_scopes.contains(*scope))
            .collect();
        if granted.is_empty() {
            return Err(OidcError::InvalidScope(
                "no grantable scope in the request".to_string(),
            ));
        }
        Ok(granted.join(" "))
    }

    /// Parks a transaction for interactive login.
    fn park(&self, mut txn: Transaction, superseded: Option<Uuid>) -> AuthorizeOutcome {
        txn.stage = AuthorizationStage::Authenticating;
        let pending_id = Uuid::now_v7();

        let mut pending = self.pending.lock();
        pending.retain(|_, p| !p.is_expired());
        pending.insert(
            pending_id,
            PendingAuthorization {
                request: txn.request,
                superseded,
                created_at: Utc::now(),
            },
        );

        tracing::debug!(%pending_id, "authorization parked for login");
        AuthorizeOutcome::LoginRequired {
            pending_id,
            headers: txn.headers,
        }
    }

    /// Settles consent and issues the response for an authenticated
    /// session.
    async fn grant(&self, mut txn: Transaction, mut session: Session) -> AuthorizeOutcome {
        let client_id = txn.client.client_id.clone();

        if txn.client.trusted {
            txn.stage = AuthorizationStage::AutoApproved;
        } else if session.has_consent(&client_id) {
            txn.stage = AuthorizationStage::Granted;
        } else if txn.request.is_prompt_none() {
            return self.error_redirect(txn, &OidcError::ConsentRequired);
        } else {
            if let Err(e) = self.sessions.record_consent(&mut session, &client_id).await {
                return self.error_redirect(txn, &e.into());
            }
            txn.stage = AuthorizationStage::Granted;
        }

        match self.respond(txn, session).await {
            Ok(outcome) => outcome,
            Err((txn, error)) => self.error_redirect(txn, &error),
        }
    }

    /// Builds the response redirect for a granted transaction.
    #[allow(clippy::result_large_err)]
    async fn respond(
        &self,
        mut txn: Transaction,
        mut session: Session,
    ) -> Result<AuthorizeOutcome, (Transaction, OidcError)> {
        let client_id = txn.client.client_id.clone();
        let scope = txn.scope.clone();
        let auth_time = session.auth_time_secs();

        let session_state = match self
            .sessions
            .session_state(&mut session, &client_id, Some(&txn.redirect_uri))
            .await
        {
            Ok(value) => value,
            Err(e) => return Err((txn, e.into())),
        };

        let code = if txn.response_types.wants_code() {
            let grant = CodeGrant {
                client_id: client_id.clone(),
                subject: session.subject.clone().unwrap_or_default(),
                redirect_uri: txn.redirect_uri.clone(),
                scope: scope.clone(),
                nonce: txn.request.nonce.clone(),
                session_id: Some(session.id),
                auth_time,
            };
            match self.issuer.issue_code(grant).await {
                Ok(code) => Some(code),
                Err(e) => return Err((txn, e)),
            }
        } else {
            None
        };

        let tokens = if txn.response_types.wants_token() || txn.response_types.wants_id_token() {
            let grant = TokenGrant {
                client_id: client_id.clone(),
                subject: session.subject.clone().unwrap_or_default(),
                scope: scope.clone(),
                nonce: txn.request.nonce.clone(),
                session_id: Some(session.id),
                session_state: Some(session_state.clone()),
                auth_time: Some(auth_time),
                include_access_token: txn.response_types.wants_token(),
                include_id_token: txn.response_types.wants_id_token(),
                include_refresh_token: false,
                bind_code: code.clone(),
            };
            match self.issuer.issue_tokens(&grant).await {
                Ok(tokens) => Some(tokens),
                Err(e) => return Err((txn, e)),
            }
        } else {
            None
        };

        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(code) = &code {
            params.push(("code", code.clone()));
        }
        if let Some(tokens) = &tokens {
            if let Some(access_token) = &tokens.access_token {
                params.push(("access_token", access_token.clone()));
                params.push(("token_type", tokens.token_type.to_string()));
                params.push(("expires_in", tokens.expires_in.to_string()));
            }
            if let Some(id_token) = &tokens.id_token {
                params.push(("id_token", id_token.clone()));
            }
            params.push(("scope", tokens.scope.clone()));
        }
        if let Some(state) = &txn.request.state {
            params.push(("state", state.clone()));
        }
        params.push(("session_state", session_state));
        params.push(("session_id", session.id.to_string()));

        let location = build_redirect(&txn.redirect_uri, &params, txn.response_mode());
        txn.stage = AuthorizationStage::Responded;
        tracing::info!(
            client_id = %client_id,
            session_id = %session.id,
            response_type = %txn.request.response_type,
            stage = ?txn.stage,
            "authorization granted"
        );

        Ok(AuthorizeOutcome::Redirect(AuthorizationResponse {
            location,
            headers: txn.headers,
            session_id: Some(session.id),
        }))
    }

    /// Builds an error redirect for a trusted transaction.
    fn error_redirect(&self, mut txn: Transaction, error: &OidcError) -> AuthorizeOutcome {
        txn.stage = AuthorizationStage::Rejected;
        tracing::debug!(
            client_id = %txn.request.client_id,
            error = error.error_code(),
            stage = ?txn.stage,
            "authorization rejected"
        );

        let mut params: Vec<(&str, String)> = vec![("error", error.error_code().to_string())];
        let description = error.to_string();
        if !description.is_empty() {
            params.push(("error_description", description));
        }
        if let Some(state) = &txn.request.state {
            params.push(("state", state.clone()));
        }

        let location = build_redirect(&txn.redirect_uri, &params, txn.response_mode());
        AuthorizeOutcome::ErrorRedirect(AuthorizationResponse {
            location,
            headers: txn.headers,
            session_id: None,
        })
    }
}

/// Checks a redirect URI against the client's registered entries.
/// Registered entries containing `*` match as URL patterns, everything
/// else matches exactly.
fn redirect_uri_registered(client: &Client, redirect_uri: &str) -> bool {
    if client.has_redirect_uri(redirect_uri) {
        return true;
    }
    client
        .redirect_uris
        .iter()
        .filter(|registered| registered.contains('*'))
        .any(|registered| match UrlPattern::compile(registered) {
            Ok(pattern) => {
                url::Url::parse(redirect_uri).is_ok_and(|url| pattern.matches(&url))
            }
            Err(_) => false,
        })
}

/// Appends response parameters to a redirect URI in the given mode.
fn build_redirect(redirect_uri: &str, params: &[(&str, String)], mode: ResponseMode) -> String {
    let encoded = params
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&");

    match mode {
        ResponseMode::Fragment => format!("{redirect_uri}#{encoded}"),
        ResponseMode::Query if redirect_uri.contains('?') => format!("{redirect_uri}&{encoded}"),
        ResponseMode::Query => format!("{redirect_uri}?{encoded}"),
    }
}

/// Extracts a response parameter out of a redirect location.
#[cfg(test)]
pub(crate) fn response_param(location: &str, name: &str) -> Option<String> {
    let (_, params) = location.split_once(['?', '#'])?;
    params.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).ok().map(|v| v.into_owned()))?
    })
}
