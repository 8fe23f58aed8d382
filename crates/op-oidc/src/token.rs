//! Token issuance and verification.
//!
//! Mints authorization codes, access tokens, refresh tokens, and
//! signed ID tokens; verifies signatures and the `at_hash`/`c_hash`
//! binding hashes. Codes and refresh tokens are opaque values stored
//! hashed; access and ID tokens are compact JWTs signed with the
//! active key of a [`KeySet`].

use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{Duration, Utc};
use jsonwebtoken::{Header, Validation, decode, decode_header, encode};
use op_crypto::{HashAlgorithm, KeySet, generate_auth_code, generate_token_id, hash};
use op_store::{CodeStore, RefreshTokenStore, StoredCode, StoredRefreshToken};
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::claims::{AccessTokenClaims, IdTokenClaims};
use crate::error::{OidcError, OidcResult};
use crate::types::{TokenType, scopes};

/// Token issuance configuration.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    /// Issuer URL (the `iss` claim).
    pub issuer: String,

    /// Access token lifespan in seconds.
    pub access_token_lifespan: i64,

    /// ID token lifespan in seconds.
    pub id_token_lifespan: i64,

    /// Refresh token lifespan in seconds.
    pub refresh_token_lifespan: i64,

    /// Authorization code lifespan in seconds.
    pub code_lifespan: i64,

    /// Accepted clock skew when verifying, in seconds.
    pub clock_skew: u64,

    /// Whether refresh tokens rotate on use.
    pub rotate_refresh_tokens: bool,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: "https://localhost".to_string(),
            access_token_lifespan: 300,
            id_token_lifespan: 300,
            refresh_token_lifespan: 1_800,
            code_lifespan: 60,
            clock_skew: 5,
            rotate_refresh_tokens: true,
        }
    }
}

/// Context for minting an authorization code.
#[derive(Debug, Clone)]
pub struct CodeGrant {
    /// Client the code is issued to.
    pub client_id: String,
    /// Authenticated subject.
    pub subject: String,
    /// Redirect URI the code is bound to.
    pub redirect_uri: String,
    /// Granted scope.
    pub scope: String,
    /// Nonce from the authorization request.
    pub nonce: Option<String>,
    /// Session the code is bound to.
    pub session_id: Option<Uuid>,
    /// Authentication time (Unix seconds).
    pub auth_time: i64,
}

/// Context for minting a token set.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Client the tokens are issued to.
    pub client_id: String,
    /// Authenticated subject.
    pub subject: String,
    /// Granted scope.
    pub scope: String,
    /// Nonce bound into the ID token.
    pub nonce: Option<String>,
    /// Session the tokens are bound to.
    pub session_id: Option<Uuid>,
    /// Session-state value carried in the ID token.
    pub session_state: Option<String>,
    /// Authentication time (Unix seconds).
    pub auth_time: Option<i64>,
    /// Whether to mint an access token.
    pub include_access_token: bool,
    /// Whether to mint an ID token.
    pub include_id_token: bool,
    /// Whether to mint a refresh token.
    pub include_refresh_token: bool,
    /// Authorization code issued alongside, bound via `c_hash`.
    pub bind_code: Option<String>,
}

impl TokenGrant {
    /// A standard back-channel grant: access token, refresh token, and
    /// an ID token when `openid` was granted.
    #[must_use]
    pub fn back_channel(
        client_id: impl Into<String>,
        subject: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        let scope = scope.into();
        let include_id_token = scope.split_whitespace().any(|s| s == scopes::OPENID);
        Self {
            client_id: client_id.into(),
            subject: subject.into(),
            scope,
            nonce: None,
            session_id: None,
            session_state: None,
            auth_time: None,
            include_access_token: true,
            include_id_token,
            include_refresh_token: true,
            bind_code: None,
        }
    }
}

/// A minted token set.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// Access token, when requested.
    pub access_token: Option<String>,
    /// Token type.
    pub token_type: TokenType,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Refresh token, when requested.
    pub refresh_token: Option<String>,
    /// ID token, when requested.
    pub id_token: Option<String>,
    /// Granted scope.
    pub scope: String,
}

/// Mints and verifies tokens.
pub struct TokenIssuer {
    config: TokenConfig,
    keys: RwLock<KeySet>,
    codes: Arc<dyn CodeStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
}

impl TokenIssuer {
    /// Creates an issuer over the given key set and stores.
    pub fn new(
        config: TokenConfig,
        keys: KeySet,
        codes: Arc<dyn CodeStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Self {
        Self {
            config,
            keys: RwLock::new(keys),
            codes,
            refresh_tokens,
        }
    }

    /// The issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// The issuance configuration.
    #[must_use]
    pub const fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Replaces the key set (rotation hook).
    pub fn reload_keys(&self, keys: KeySet) {
        *self.keys.write() = keys;
        tracing::info!("signing key set reloaded");
    }

    /// Mints an authorization code.
    ///
    /// The code is durably recorded (hashed) before it is returned.
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn issue_code(&self, grant: CodeGrant) -> OidcResult<String> {
        let code = generate_auth_code();
        let mut stored = StoredCode::new(
            opaque_hash(&code),
            grant.client_id,
            grant.subject,
            grant.redirect_uri,
            grant.scope,
            self.config.code_lifespan,
        )
        .with_nonce(grant.nonce);
        if let Some(session_id) = grant.session_id {
            stored = stored.with_session(session_id, grant.auth_time);
        } else {
            stored.auth_time = grant.auth_time;
        }

        self.codes.store(&stored).await?;
        Ok(code)
    }

    /// Atomically redeems an authorization code.
    ///
    /// Exactly one of any number of concurrent redeemers of the same
    /// code succeeds. A binding mismatch also burns the code: the
    /// redemption already happened, and handing the code back after a
    /// failed attempt would defeat single-use.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidGrant` if the code is unknown, expired, already
    /// redeemed, or bound to a different client or redirect URI.
    pub async fn redeem_code(
        &self,
        code: &str,
        client_id: &str,
        redirect_uri: &str,
    ) -> OidcResult<StoredCode> {
        let stored = self
            .codes
            .redeem(&opaque_hash(code))
            .await?
            .ok_or_else(|| {
                OidcError::InvalidGrant("code is invalid, expired, or already redeemed".to_string())
            })?;

        if stored.client_id != client_id {
            return Err(OidcError::InvalidGrant(
                "code was issued to a different client".to_string(),
            ));
        }
        if stored.redirect_uri != redirect_uri {
            return Err(OidcError::InvalidGrant(
                "redirect_uri does not match the code".to_string(),
            ));
        }
        Ok(stored)
    }

    /// Mints the token set for a grant.
    ///
    /// Every durable artifact (the refresh token) is recorded before
    /// the set is returned.
    ///
    /// ## Errors
    ///
    /// Returns an error on signing or store failure.
    pub async fn issue_tokens(&self, grant: &TokenGrant) -> OidcResult<IssuedTokens> {
        let now = Utc::now();

        let access_token = if grant.include_access_token {
            let mut claims = AccessTokenClaims::new(
                &self.config.issuer,
                &grant.subject,
                now + Duration::seconds(self.config.access_token_lifespan),
            )
            .with_audience(grant.client_id.as_str())
            .with_azp(&grant.client_id)
            .with_scope(&grant.scope);
            if let Some(auth_time) = grant.auth_time {
                claims = claims.with_auth_time(auth_time);
            }
            if let Some(session_id) = grant.session_id {
                claims = claims.with_session(session_id.to_string());
            }
            Some(self.sign(&claims)?)
        } else {
            None
        };

        let refresh_token = if grant.include_refresh_token {
            let raw = generate_token_id();
            let mut stored = StoredRefreshToken::new(
                opaque_hash(&raw),
                &grant.client_id,
                &grant.subject,
                &grant.scope,
                self.config.refresh_token_lifespan,
            );
            if let Some(session_id) = grant.session_id {
                stored = stored.with_session(session_id, grant.auth_time.unwrap_or(0));
            }
            self.refresh_tokens.store(&stored).await?;
            Some(raw)
        } else {
            None
        };

        let id_token = if grant.include_id_token {
            let mut claims = IdTokenClaims::new(
                &self.config.issuer,
                &grant.subject,
                &grant.client_id,
                now + Duration::seconds(self.config.id_token_lifespan),
            );
            if let Some(auth_time) = grant.auth_time {
                claims = claims.with_auth_time(auth_time);
            }
            if let Some(nonce) = &grant.nonce {
                claims = claims.with_nonce(nonce);
            }
            if let Some(session_id) = grant.session_id {
                claims = claims.with_session(session_id.to_string());
            }
            if let Some(session_state) = &grant.session_state {
                claims = claims.with_session_state(session_state);
            }
            if let Some(access_token) = &access_token {
                claims = claims.with_at_hash(self.binding_hash(access_token));
            }
            if let Some(code) = &grant.bind_code {
                claims = claims.with_c_hash(self.binding_hash(code));
            }
            Some(self.sign(&claims)?)
        } else {
            None
        };

        Ok(IssuedTokens {
            access_token,
            token_type: TokenType::Bearer,
            expires_in: self.config.access_token_lifespan,
            refresh_token,
            id_token,
            scope: grant.scope.clone(),
        })
    }

    /// Redeems a refresh token for a new token set.
    ///
    /// The returned access token's scope is a subset of the original
    /// grant's scope. With rotation enabled the presented token is
    /// consumed atomically and a new refresh token is issued.
    ///
    /// ## Errors
    ///
    /// Returns `InvalidGrant` on unknown, expired, revoked, consumed,
    /// or foreign-client tokens, and `InvalidScope` if the requested
    /// scope widens the grant.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        client_id: &str,
        requested_scope: Option<&str>,
    ) -> OidcResult<IssuedTokens> {
        let hash = opaque_hash(refresh_token);
        let stored = if self.config.rotate_refresh_tokens {
            self.refresh_tokens.consume(&hash).await?
        } else {
            self.refresh_tokens.get(&hash).await?
        }
        .ok_or_else(|| {
            OidcError::InvalidGrant("refresh token is invalid, expired, or revoked".to_string())
        })?;

        if stored.client_id != client_id {
            return Err(OidcError::InvalidGrant(
                "refresh token was issued to a different client".to_string(),
            ));
        }

        let scope = match requested_scope {
            None => stored.scope.clone(),
            Some(requested) => {
                if !scope_subset(requested, &stored.scope) {
                    return Err(OidcError::InvalidScope(
                        "requested scope exceeds the original grant".to_string(),
                    ));
                }
                requested.to_string()
            }
        };

        let mut grant = TokenGrant::back_channel(client_id, &stored.subject, scope);
        grant.session_id = stored.session_id;
        grant.auth_time = Some(stored.auth_time);
        grant.include_refresh_token = self.config.rotate_refresh_tokens;
        let mut tokens = self.issue_tokens(&grant).await?;

        if !self.config.rotate_refresh_tokens {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    /// Revokes every refresh token bound to a session (logout).
    ///
    /// ## Errors
    ///
    /// Returns an error if the store fails.
    pub async fn revoke_session(&self, session_id: Uuid) -> OidcResult<u64> {
        Ok(self.refresh_tokens.revoke_session(session_id).await?)
    }

    /// Signs a claim set with the active key.
    fn sign<T: Serialize>(&self, claims: &T) -> OidcResult<String> {
        let keys = self.keys.read();
        let key = keys.active()?;

        let mut header = Header::new(key.algorithm.jwt_algorithm());
        header.kid = Some(key.kid.clone());
        encode(&header, claims, key.encoding_key())
            .map_err(|e| OidcError::TokenSigning(e.to_string()))
    }

    /// Verifies and decodes an ID token.
    ///
    /// ## Errors
    ///
    /// Returns `TokenValidation` if the header names an unknown key,
    /// the signature does not validate, the issuer differs, or the
    /// token is expired beyond the configured skew.
    pub fn verify_id_token(&self, token: &str) -> OidcResult<IdTokenClaims> {
        self.verify(token)
    }

    /// Verifies and decodes an access token.
    ///
    /// ## Errors
    ///
    /// Same conditions as [`Self::verify_id_token`].
    pub fn verify_access_token(&self, token: &str) -> OidcResult<AccessTokenClaims> {
        self.verify(token)
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> OidcResult<T> {
        let header =
            decode_header(token).map_err(|e| OidcError::TokenValidation(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| OidcError::TokenValidation("missing kid in header".to_string()))?;

        let keys = self.keys.read();
        let key = keys
            .get(&kid)
            .map_err(|e| OidcError::TokenValidation(e.to_string()))?;

        let mut validation = Validation::new(key.algorithm.jwt_algorithm());
        validation.set_issuer(&[&self.config.issuer]);
        validation.leeway = self.config.clock_skew;
        // The audience is a client id, checked by the relying party.
        validation.validate_aud = false;

        let data = decode::<T>(token, key.decoding_key(), &validation)
            .map_err(|e| OidcError::TokenValidation(e.to_string()))?;
        Ok(data.claims)
    }

    /// Computes the binding hash (`at_hash`/`c_hash`) for a value:
    /// base64url of the left half of the active algorithm's hash.
    #[must_use]
    pub fn binding_hash(&self, value: &str) -> String {
        let algorithm = self
            .keys
            .read()
            .active()
            .map_or(HashAlgorithm::Sha256, |k| k.algorithm.hash_algorithm());
        let digest = hash(algorithm, value.as_bytes());
        URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2])
    }

    /// Recomputes a binding hash and compares.
    #[must_use]
    pub fn verify_binding(&self, value: &str, expected: &str) -> bool {
        self.binding_hash(value) == expected
    }
}

/// Hashes an opaque credential for storage lookup (base64url SHA-256).
fn opaque_hash(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(op_crypto::sha256(value.as_bytes()))
}

/// Checks that every requested scope is contained in the granted set.
fn scope_subset(requested: &str, granted: &str) -> bool {
    let granted: std::collections::HashSet<&str> = granted.split_whitespace().collect();
    requested.split_whitespace().all(|s| granted.contains(s))
}
