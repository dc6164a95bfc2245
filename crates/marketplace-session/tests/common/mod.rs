/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for marketplace-session tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use marketplace_session::{
    ClientConfig, SessionClient, SessionConfig, StoredTokens, TokenStore, UserProfile,
};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Fresh scratch directory for file-backed stores
pub fn temp_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("marketplace-session-it-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}

pub fn client_for(server: &MockServer, store: Arc<dyn TokenStore>) -> SessionClient {
    SessionClient::from_config(
        ClientConfig::with_base_url(server.uri()),
        store,
        SessionConfig::default(),
    )
    .expect("client init")
}

pub fn test_user() -> UserProfile {
    UserProfile {
        id: "u-1".to_string(),
        email: Some("ada@example.com".to_string()),
        display_name: Some("Ada".to_string()),
        avatar_url: None,
        wallet_address: None,
    }
}

/// Token record whose access token expired five minutes ago
pub fn expired_tokens(access: &str, refresh: &str) -> StoredTokens {
    let now = Utc::now();
    StoredTokens {
        access_token: access.to_string(),
        refresh_token: refresh.to_string(),
        token_type: "Bearer".to_string(),
        expires_at: now - Duration::minutes(5),
        stored_at: now - Duration::hours(1),
    }
}

pub fn envelope(data: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true, "data": data}))
}

pub fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({"accessToken": access, "refreshToken": refresh, "expiresIn": 900})
}

pub async fn mount_refresh(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}
