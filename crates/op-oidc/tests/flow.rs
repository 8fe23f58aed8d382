//! End-to-end provider flows through the router.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use base64::{Engine, engine::general_purpose::STANDARD};
use op_crypto::{KeySet, SignatureAlgorithm, SigningKey};
use op_oidc::endpoints::{OidcState, oidc_router};
use op_oidc::{
    AuthorizationEngine, ClientRegistry, IdentityVerifier, IntrospectionResponse,
    MemoryIdentityVerifier, RegistrationRequest, RegistrationResponse, RegistryConfig,
    StaticSectorFetcher, TokenConfig, TokenIssuer, TokenResponse, UrlPatternList,
};
use op_model::ResponseType;
use op_session::{MemorySessionStore, SessionConfig, SessionManager};
use op_store::{ClientStore, MemoryClientStore, MemoryCodeStore, MemoryRefreshTokenStore};
use tower::ServiceExt;

fn provider_state() -> OidcState {
    let clients: Arc<dyn ClientStore> = Arc::new(MemoryClientStore::new());

    let mut keys = KeySet::new();
    keys.add(
        SigningKey::from_secret("k1", SignatureAlgorithm::Hs256, b"flow-test-signing-secret")
            .unwrap(),
    );
    let issuer = Arc::new(TokenIssuer::new(
        TokenConfig::default(),
        keys,
        Arc::new(MemoryCodeStore::new()),
        Arc::new(MemoryRefreshTokenStore::new()),
    ));

    let sessions = Arc::new(SessionManager::new(
        Arc::new(MemorySessionStore::new()),
        SessionConfig::default(),
    ));

    let users = MemoryIdentityVerifier::new();
    users.add_user("alice", "correct horse", "sub-alice");
    let identity: Arc<dyn IdentityVerifier> = Arc::new(users);

    let registry = Arc::new(ClientRegistry::new(
        Arc::clone(&clients),
        Arc::new(StaticSectorFetcher::new()),
        UrlPatternList::compile(&["*.blocked.example/*"]).unwrap(),
        RegistryConfig::default(),
    ));

    let engine = Arc::new(AuthorizationEngine::new(
        Arc::clone(&clients),
        Arc::clone(&sessions),
        Arc::clone(&issuer),
        Arc::clone(&identity),
    ));

    OidcState {
        registry,
        engine,
        issuer,
        sessions,
        clients,
        identity,
    }
}

async fn send(state: &OidcState, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = oidc_router()
        .with_state(state.clone())
        .oneshot(request)
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn register_client(state: &OidcState) -> RegistrationResponse {
    let request = RegistrationRequest {
        client_name: Some("Flow Test".to_string()),
        redirect_uris: vec!["https://rp.example.org/cb".to_string()],
        post_logout_redirect_uris: Some(vec!["https://rp.example.org/bye".to_string()]),
        ..RegistrationRequest::default()
    };
    let (status, _, body) = send(
        state,
        Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&request).unwrap()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    serde_json::from_slice(&body).unwrap()
}

fn basic_auth(client_id: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{client_id}:{secret}")))
}

fn pending_id_from(html: &str) -> String {
    let marker = "name=\"pending_id\" value=\"";
    let start = html.find(marker).expect("login form") + marker.len();
    html[start..].split('"').next().unwrap().to_string()
}

fn location_param(location: &str, name: &str) -> Option<String> {
    let (_, params) = location.split_once(['?', '#'])?;
    params.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| urlencoding::decode(value).ok().map(|v| v.into_owned()))?
    })
}

/// Drives register, authorize, login, and code exchange; returns the
/// registration and the token response.
async fn login_and_exchange(state: &OidcState) -> (RegistrationResponse, TokenResponse) {
    let registration = register_client(state).await;

    let uri = format!(
        "/authorize?response_type=code&client_id={}&redirect_uri={}&scope=openid%20profile&state=st-1&nonce=n-1",
        registration.client_id,
        urlencoding::encode("https://rp.example.org/cb"),
    );
    let (status, _, body) = send(
        state,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let pending_id = pending_id_from(&String::from_utf8(body).unwrap());

    let (status, headers, _) = send(
        state,
        Request::builder()
            .method("POST")
            .uri("/authorize/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "pending_id={pending_id}&username=alice&password=correct%20horse"
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers.get("location").unwrap().to_str().unwrap().to_string();
    assert!(location.starts_with("https://rp.example.org/cb?"));
    let code = location_param(&location, "code").unwrap();
    assert!(location_param(&location, "session_state").is_some());
    assert_eq!(location_param(&location, "state").as_deref(), Some("st-1"));

    let secret = registration.client_secret.clone().unwrap();
    let (status, _, body) = send(
        state,
        Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("authorization", basic_auth(&registration.client_id, &secret))
            .body(Body::from(format!(
                "grant_type=authorization_code&code={code}&redirect_uri={}",
                urlencoding::encode("https://rp.example.org/cb"),
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tokens: TokenResponse = serde_json::from_slice(&body).unwrap();
    (registration, tokens)
}

#[tokio::test]
async fn code_flow_issues_bound_tokens() {
    let state = provider_state();
    let (registration, tokens) = login_and_exchange(&state).await;

    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.scope, "openid profile");
    let access_token = tokens.access_token.clone().unwrap();
    assert!(tokens.refresh_token.is_some());

    let claims = state
        .issuer
        .verify_id_token(tokens.id_token.as_deref().unwrap())
        .unwrap();
    assert_eq!(claims.sub, "sub-alice");
    assert!(claims.aud.contains(&registration.client_id));
    assert_eq!(claims.nonce.as_deref(), Some("n-1"));
    assert!(claims.sid.is_some());
    assert!(state
        .issuer
        .verify_binding(&access_token, claims.at_hash.as_deref().unwrap()));
}

#[tokio::test]
async fn code_is_single_use_across_the_wire() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let uri = format!(
        "/authorize?response_type=code&client_id={}&redirect_uri={}&scope=openid",
        registration.client_id,
        urlencoding::encode("https://rp.example.org/cb"),
    );
    let (_, _, body) = send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    let pending_id = pending_id_from(&String::from_utf8(body).unwrap());
    let (_, headers, _) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/authorize/login")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(format!(
                "pending_id={pending_id}&username=alice&password=correct%20horse"
            )))
            .unwrap(),
    )
    .await;
    let location = headers.get("location").unwrap().to_str().unwrap();
    let code = location_param(location, "code").unwrap();

    let secret = registration.client_secret.unwrap();
    let exchange = |code: String| {
        let state = state.clone();
        let auth = basic_auth(&registration.client_id, &secret);
        async move {
            send(
                &state,
                Request::builder()
                    .method("POST")
                    .uri("/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("authorization", auth)
                    .body(Body::from(format!(
                        "grant_type=authorization_code&code={code}&redirect_uri={}",
                        urlencoding::encode("https://rp.example.org/cb"),
                    )))
                    .unwrap(),
            )
            .await
        }
    };

    let (first, _, _) = exchange(code.clone()).await;
    assert_eq!(first, StatusCode::OK);

    let (second, _, body) = exchange(code).await;
    assert_eq!(second, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_grant");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_widened_scope() {
    let state = provider_state();
    let (registration, tokens) = login_and_exchange(&state).await;
    let secret = registration.client_secret.unwrap();
    let refresh_token = tokens.refresh_token.unwrap();

    let refresh = |token: String, scope: Option<&str>| {
        let state = state.clone();
        let auth = basic_auth(&registration.client_id, &secret);
        let mut body = format!("grant_type=refresh_token&refresh_token={token}");
        if let Some(scope) = scope {
            body.push_str(&format!("&scope={}", urlencoding::encode(scope)));
        }
        async move {
            send(
                &state,
                Request::builder()
                    .method("POST")
                    .uri("/token")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("authorization", auth)
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
        }
    };

    // Narrowed scope succeeds and rotates the token.
    let (status, _, body) = refresh(refresh_token.clone(), Some("openid")).await;
    assert_eq!(status, StatusCode::OK);
    let rotated: TokenResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(rotated.scope, "openid");
    let new_refresh = rotated.refresh_token.unwrap();
    assert_ne!(new_refresh, refresh_token);

    // The consumed token is dead.
    let (status, _, _) = refresh(refresh_token, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Widening beyond the original grant fails.
    let (status, _, body) = refresh(new_refresh, Some("openid profile email admin")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_scope");
}

#[tokio::test]
async fn wrong_client_secret_is_unauthorized() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let (status, headers, body) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .header("authorization", basic_auth(&registration.client_id, "wrong"))
            .body(Body::from("grant_type=authorization_code&code=x&redirect_uri=y"))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        headers.get("www-authenticate").unwrap().to_str().unwrap(),
        "Basic"
    );
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_client");
}

#[tokio::test]
async fn prompt_none_without_session_redirects_login_required() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let uri = format!(
        "/authorize?response_type=code&client_id={}&redirect_uri={}&scope=openid&prompt=none",
        registration.client_id,
        urlencoding::encode("https://rp.example.org/cb"),
    );
    let (status, headers, _) =
        send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    let location = headers.get("location").unwrap().to_str().unwrap();
    assert_eq!(
        location_param(location, "error").as_deref(),
        Some("login_required")
    );
}

#[tokio::test]
async fn unknown_client_gets_an_error_page() {
    let state = provider_state();
    let uri = format!(
        "/authorize?response_type=code&client_id=ghost&redirect_uri={}",
        urlencoding::encode("https://rp.example.org/cb"),
    );
    let (status, _, body) =
        send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Authorization Error"));
}

#[tokio::test]
async fn custom_response_headers_are_echoed() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let uri = format!(
        "/authorize?response_type=code&client_id={}&redirect_uri={}&scope=openid&custom_response_headers={}",
        registration.client_id,
        urlencoding::encode("https://rp.example.org/cb"),
        urlencoding::encode(r#"{"X-Debug":"on"}"#),
    );
    let (status, headers, _) =
        send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;

    // Echoed even on the interstitial login page.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("X-Debug").unwrap(), "on");
}

#[tokio::test]
async fn custom_headers_ride_every_response_type_combination() {
    let state = provider_state();
    let request = RegistrationRequest {
        client_name: Some("Combo Test".to_string()),
        redirect_uris: vec!["https://rp.example.org/cb".to_string()],
        response_types: Some(vec![
            ResponseType::Code,
            ResponseType::Token,
            ResponseType::IdToken,
        ]),
        ..RegistrationRequest::default()
    };
    let (status, _, body) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&request).unwrap()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let registration: RegistrationResponse = serde_json::from_slice(&body).unwrap();

    let combinations = [
        "code",
        "token",
        "id_token",
        "code token",
        "code id_token",
        "id_token token",
        "code id_token token",
    ];
    for response_type in combinations {
        let uri = format!(
            "/authorize?response_type={}&client_id={}&redirect_uri={}&scope=openid&nonce=n-1&custom_response_headers={}",
            urlencoding::encode(response_type),
            registration.client_id,
            urlencoding::encode("https://rp.example.org/cb"),
            urlencoding::encode(r#"{"X-Combo":"v1"}"#),
        );
        let (status, headers, body) =
            send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK, "{response_type}: login page");
        assert_eq!(headers.get("X-Combo").unwrap(), "v1", "{response_type}");
        let pending_id = pending_id_from(&String::from_utf8(body).unwrap());

        let (status, headers, _) = send(
            &state,
            Request::builder()
                .method("POST")
                .uri("/authorize/login")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(format!(
                    "pending_id={pending_id}&username=alice&password=correct%20horse"
                )))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::SEE_OTHER, "{response_type}: redirect");
        assert_eq!(headers.get("X-Combo").unwrap(), "v1", "{response_type}");

        let location = headers.get("location").unwrap().to_str().unwrap();
        assert_eq!(
            location_param(location, "code").is_some(),
            response_type.contains("code"),
            "{response_type}"
        );
        assert_eq!(
            location_param(location, "access_token").is_some(),
            response_type.contains("token") && !response_type.ends_with("id_token"),
            "{response_type}"
        );
        assert_eq!(
            location_param(location, "id_token").is_some(),
            response_type.contains("id_token"),
            "{response_type}"
        );
    }
}

#[tokio::test]
async fn registration_read_requires_the_registration_token() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let uri = format!("/register?client_id={}", registration.client_id);
    let (status, _, body) = send(
        &state,
        Request::builder()
            .uri(uri.clone())
            .header(
                "authorization",
                format!("Bearer {}", registration.registration_access_token),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let metadata: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(metadata["client_id"], registration.client_id.as_str());
    assert_eq!(metadata["client_name"], "Flow Test");

    let (status, _, _) = send(
        &state,
        Request::builder()
            .uri(uri)
            .header("authorization", "Bearer not-the-token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_update_rotates_the_secret() {
    let state = provider_state();
    let registration = register_client(&state).await;

    let request = RegistrationRequest {
        client_name: Some("Flow Test v2".to_string()),
        redirect_uris: vec!["https://rp.example.org/cb".to_string()],
        ..RegistrationRequest::default()
    };
    let (status, _, body) = send(
        &state,
        Request::builder()
            .method("PUT")
            .uri(format!("/register?client_id={}", registration.client_id))
            .header("content-type", "application/json")
            .header(
                "authorization",
                format!("Bearer {}", registration.registration_access_token),
            )
            .body(Body::from(serde_json::to_vec(&request).unwrap()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let updated: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(updated["client_id"], registration.client_id.as_str());
    assert_ne!(
        updated["client_secret"].as_str().unwrap(),
        registration.client_secret.as_deref().unwrap()
    );
}

#[tokio::test]
async fn introspection_reports_active_and_inactive_tokens() {
    let state = provider_state();
    let (registration, tokens) = login_and_exchange(&state).await;
    let secret = registration.client_secret.unwrap();
    let access_token = tokens.access_token.unwrap();

    let introspect = |token: String| {
        let state = state.clone();
        let auth = basic_auth(&registration.client_id, &secret);
        async move {
            send(
                &state,
                Request::builder()
                    .method("POST")
                    .uri("/introspect")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .header("authorization", auth)
                    .body(Body::from(format!(
                        "token={}",
                        urlencoding::encode(&token)
                    )))
                    .unwrap(),
            )
            .await
        }
    };

    let (status, _, body) = introspect(access_token).await;
    assert_eq!(status, StatusCode::OK);
    let response: IntrospectionResponse = serde_json::from_slice(&body).unwrap();
    assert!(response.active);
    assert_eq!(response.sub.as_deref(), Some("sub-alice"));
    assert_eq!(response.client_id.as_deref(), Some(registration.client_id.as_str()));

    let (status, _, body) = introspect("garbage".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    let response: IntrospectionResponse = serde_json::from_slice(&body).unwrap();
    assert!(!response.active);
}

#[tokio::test]
async fn clientinfo_resolves_the_token_client() {
    let state = provider_state();
    let (registration, tokens) = login_and_exchange(&state).await;

    let (status, _, body) = send(
        &state,
        Request::builder()
            .uri("/clientinfo")
            .header(
                "authorization",
                format!("Bearer {}", tokens.access_token.unwrap()),
            )
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let metadata: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(metadata["client_id"], registration.client_id.as_str());
}

#[tokio::test]
async fn end_session_terminates_and_redirects() {
    let state = provider_state();
    let (registration, tokens) = login_and_exchange(&state).await;
    let id_token = tokens.id_token.unwrap();
    let sid = state
        .issuer
        .verify_id_token(&id_token)
        .unwrap()
        .sid
        .unwrap();

    let uri = format!(
        "/end_session?id_token_hint={}&post_logout_redirect_uri={}&state=bye-1",
        urlencoding::encode(&id_token),
        urlencoding::encode("https://rp.example.org/bye"),
    );
    let (status, headers, _) =
        send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(
        headers.get("location").unwrap(),
        "https://rp.example.org/bye?state=bye-1"
    );

    // The session is gone and its refresh tokens are revoked.
    let session_id = sid.parse().unwrap();
    assert!(state
        .sessions
        .resolve(Some(session_id))
        .await
        .unwrap()
        .into_session()
        .is_none());
    let (status, _, body) = send(
        &state,
        Request::builder()
            .method("POST")
            .uri("/token")
            .header("content-type", "application/x-www-form-urlencoded")
            .header(
                "authorization",
                basic_auth(
                    &registration.client_id,
                    registration.client_secret.as_deref().unwrap(),
                ),
            )
            .body(Body::from(format!(
                "grant_type=refresh_token&refresh_token={}",
                tokens.refresh_token.unwrap()
            )))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_grant");
}

#[tokio::test]
async fn end_session_rejects_unregistered_logout_target() {
    let state = provider_state();
    let (_, tokens) = login_and_exchange(&state).await;

    let uri = format!(
        "/end_session?id_token_hint={}&post_logout_redirect_uri={}",
        urlencoding::encode(&tokens.id_token.unwrap()),
        urlencoding::encode("https://elsewhere.example/bye"),
    );
    let (status, _, _) =
        send(&state, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn end_session_with_bad_hint_is_unauthorized() {
    let state = provider_state();
    let (status, _, _) = send(
        &state,
        Request::builder()
            .uri("/end_session?id_token_hint=garbage")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
