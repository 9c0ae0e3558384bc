use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use enrollment_backend::{
    AuthClient, AuthFlow, AuthTab, BackendConfig, BackendError, Direction, Persistence, Query,
    RestPersistence, Route, SessionStore, session_key, sign_out,
};

fn config(server: &MockServer) -> BackendConfig {
    let mut config = BackendConfig::new(server.uri(), "anon-key");
    config.redirect_url = Some("http://app.test/".into());
    config
}

fn token_body(user_id: &str) -> serde_json::Value {
    json!({
        "access_token": "access-abc123",
        "token_type": "bearer",
        "expires_in": 3600,
        "expires_at": 1_900_000_000,
        "refresh_token": "refresh-xyz",
        "user": { "id": user_id, "email": "anne@example.com", "aud": "authenticated" }
    })
}

async fn mount_sign_in(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .and(header("apikey", "anon-key"))
        .and(body_json(json!({"email": "anne@example.com", "password": "secret1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-1")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn sign_in_stores_session_and_notifies_watchers() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.json");

    let auth = AuthClient::new(config(&server), SessionStore::open(&session_path).unwrap()).unwrap();
    let mut changes = auth.subscribe();
    assert!(auth.session().is_none());

    let session = auth.sign_in("anne@example.com", "secret1").await.unwrap();
    assert_eq!(session.user.id, "user-1");
    assert!(changes.has_changed().unwrap());
    assert_eq!(
        changes.borrow_and_update().as_ref().map(|s| s.user.id.clone()),
        Some("user-1".to_string())
    );

    let key = session_key(&config(&server).project_ref());
    let reopened = SessionStore::open(&session_path).unwrap();
    assert_eq!(reopened.load_session(&key).unwrap(), Some(session));
}

#[tokio::test]
async fn current_user_uses_bearer_token_and_drops_rejected_sessions() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("authorization", "Bearer access-abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-1",
            "email": "anne@example.com"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"msg": "invalid JWT"})))
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    assert_eq!(auth.current_user().await.unwrap(), None);

    auth.sign_in("anne@example.com", "secret1").await.unwrap();
    let user = auth.current_user().await.unwrap().expect("user");
    assert_eq!(user.id, "user-1");

    assert_eq!(auth.current_user().await.unwrap(), None);
    assert!(auth.session().is_none());
    assert!(matches!(
        auth.require_user().await,
        Err(BackendError::NotAuthenticated)
    ));
}

#[tokio::test]
async fn sign_in_failure_keeps_sign_in_tab_with_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid login credentials"
        })))
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    let mut flow = AuthFlow::new();
    let outcome = flow.sign_in(&auth, "anne@example.com", "wrong-pass").await;

    assert_eq!(outcome.route, None);
    assert_eq!(outcome.notice.title, "Sign In Failed");
    assert_eq!(outcome.notice.description, "Invalid login credentials");
    assert_eq!(flow.tab(), AuthTab::SignIn);
}

#[tokio::test]
async fn sign_in_flow_clears_stale_state_and_routes_home() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;

    let mut store = SessionStore::in_memory();
    store.set("supabase.auth.token", "stale").unwrap();
    store.set("theme", "dark").unwrap();
    let auth = AuthClient::new(config(&server), store).unwrap();

    let mut flow = AuthFlow::new();
    let outcome = flow.sign_in(&auth, "anne@example.com", "secret1").await;
    assert_eq!(outcome.route, Some(Route::Dashboard));
    assert_eq!(outcome.notice.title, "Welcome back!");
    assert_eq!(auth.session().map(|s| s.user.id), Some("user-1".to_string()));
}

#[tokio::test]
async fn signing_in_again_revokes_the_previous_session_globally() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(query_param("scope", "global"))
        .and(header("authorization", "Bearer access-abc123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    auth.sign_in("anne@example.com", "secret1").await.unwrap();

    let mut flow = AuthFlow::new();
    let outcome = flow.sign_in(&auth, "anne@example.com", "secret1").await;
    assert_eq!(outcome.route, Some(Route::Dashboard));
    assert_eq!(auth.session().map(|s| s.user.id), Some("user-1".to_string()));
    server.verify().await;
}

#[tokio::test]
async fn sign_up_sends_redirect_and_switches_to_sign_in_tab() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .and(query_param("redirect_to", "http://app.test/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "user-2",
            "email": "new@example.com",
            "confirmation_sent_at": "2026-10-18T09:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    let mut flow = AuthFlow::new();
    flow.select_tab(AuthTab::SignUp);

    let outcome = flow
        .sign_up(&auth, "new@example.com", "secret1", "secret1")
        .await;
    assert_eq!(outcome.notice.title, "Account Created Successfully");
    assert_eq!(
        outcome.notice.description,
        "Please check your email to verify your account."
    );
    assert_eq!(outcome.route, None);
    assert_eq!(flow.tab(), AuthTab::SignIn);
}

#[tokio::test]
async fn duplicate_sign_up_redirects_to_sign_in_tab() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "code": 422,
            "msg": "User already registered"
        })))
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    let mut flow = AuthFlow::new();
    let outcome = flow
        .sign_up(&auth, "anne@example.com", "secret1", "secret1")
        .await;
    assert_eq!(outcome.notice.title, "Account Already Exists");
    assert_eq!(flow.tab(), AuthTab::SignIn);
}

#[tokio::test]
async fn sign_up_password_checks_happen_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    let mut flow = AuthFlow::new();
    let outcome = flow
        .sign_up(&auth, "anne@example.com", "secret1", "secret2")
        .await;
    assert_eq!(outcome.notice.title, "Password Mismatch");
    assert_eq!(flow.tab(), AuthTab::SignUp);
}

#[tokio::test]
async fn sign_out_revokes_globally_and_forgets_session() {
    let server = MockServer::start().await;
    mount_sign_in(&server).await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .and(query_param("scope", "global"))
        .and(header("authorization", "Bearer access-abc123"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let auth = AuthClient::new(config(&server), SessionStore::in_memory()).unwrap();
    auth.sign_in("anne@example.com", "secret1").await.unwrap();

    let notice = sign_out(&auth).await;
    assert_eq!(notice.title, "Signed Out Successfully");
    assert!(auth.session().is_none());
}

#[tokio::test]
async fn rest_insert_and_select_speak_table_dialect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/enrollment_applications"))
        .and(header("prefer", "return=minimal"))
        .and(header("authorization", "Bearer user-token"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/enrollment_applications"))
        .and(query_param("select", "*"))
        .and(query_param("user_id", "eq.user-1"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "row-1"}])))
        .mount(&server)
        .await;

    let rest = RestPersistence::new(config(&server)).with_access_token(Some("user-token".into()));
    rest.insert_one("enrollment_applications", json!({"user_id": "user-1"}))
        .await
        .unwrap();
    let rows = rest
        .select(
            "enrollment_applications",
            &Query::new()
                .eq("user_id", "user-1")
                .order("created_at", Direction::Descending),
        )
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({"id": "row-1"})]);
}

#[tokio::test]
async fn rest_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/enrollment_applications"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .mount(&server)
        .await;

    let rest = RestPersistence::new(config(&server));
    let err = rest
        .insert_one("enrollment_applications", json!({}))
        .await
        .unwrap_err();
    match err {
        BackendError::Api { status, message } => {
            assert_eq!(status, 403);
            assert!(message.contains("row-level security"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
