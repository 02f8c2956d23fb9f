//! End-to-end session tests against mock identity-provider and backend
//! servers.

use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use worklog_core::auth::{SecureTokenRefresher, TokioTimer};
use worklog_core::{
    ApiClient, ApiError, IdentityConfig, RefreshOutcome, SessionManager, SessionOptions,
    SessionState,
};

fn config() -> IdentityConfig {
    IdentityConfig {
        api_key: "k1".to_string(),
        client_id: None,
        project_id: None,
    }
}

async fn manager_for(server: &MockServer, dir: &TempDir, auto_refresh: bool) -> SessionManager {
    let refresher = SecureTokenRefresher::with_endpoint(format!("{}/v1/token", server.uri())).unwrap();
    SessionManager::with_components(
        config(),
        SessionOptions::new(dir.path().join("worklog").join("credentials.dat"))
            .with_auto_refresh(auto_refresh),
        Arc::new(refresher),
        Arc::new(TokioTimer::new()),
    )
    .await
}

#[tokio::test]
async fn test_sign_in_survives_restart() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let manager = manager_for(&server, &dir, true).await;
    manager.sign_in("idtok1", "reftok1");
    assert!(manager.credentials_path().exists());
    drop(manager);

    let restored = manager_for(&server, &dir, false).await;
    assert_eq!(restored.access_token().as_deref(), Some("idtok1"));
    assert_eq!(restored.refresh_token().as_deref(), Some("reftok1"));
}

#[tokio::test]
async fn test_startup_refresh_over_http() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .and(query_param("key", "k1"))
        .and(body_string_contains("refresh_token=reftok1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id_token": "idtok2"})))
        .expect(1)
        .mount(&server)
        .await;

    manager_for(&server, &dir, false).await.sign_in("idtok1", "reftok1");

    let restored = manager_for(&server, &dir, true).await;
    assert_eq!(restored.access_token().as_deref(), Some("idtok2"));
    assert!(restored.is_refresh_running());
    restored.sign_out();
    assert!(!restored.is_refresh_running());
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("POST"))
        .and(path("/v1/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_REFRESH_TOKEN"))
        .mount(&server)
        .await;

    let manager = manager_for(&server, &dir, false).await;
    manager.sign_in("idtok1", "reftok1");

    assert_eq!(manager.refresh().await, RefreshOutcome::SignedOut);
    assert_eq!(manager.state(), SessionState::SignedOut);
    assert!(!manager.credentials_path().exists());
}

#[tokio::test]
async fn test_backend_401_collapses_session() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/worklogs"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let manager = manager_for(&server, &dir, true).await;
    manager.sign_in("idtok1", "reftok1");
    assert!(manager.is_refresh_running());

    let token = manager.access_token().unwrap();
    let client = ApiClient::with_base_url(format!("{}/api", server.uri()))
        .unwrap()
        .with_auth_failure_hook(manager.auth_failure_hook())
        .with_token(token);

    let err = client.get_worklogs(&[("page", "1")]).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(manager.access_token(), None);
    assert!(!manager.credentials_path().exists());
    assert!(!manager.is_refresh_running());
}
