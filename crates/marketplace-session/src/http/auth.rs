/*
[INPUT]:  Credentials, refresh tokens, wallet challenge material
[OUTPUT]: Typed backend auth responses via the AuthBackend seam
[POS]:    HTTP layer - auth endpoints (login, refresh, revoke, oauth, wallet)
[UPDATE]: When auth endpoints or their payloads change
*/

use async_trait::async_trait;
use reqwest::Method;

use crate::http::{ApiClient, Result};
use crate::types::{
    GoogleUrlData, LoginData, LoginRequest, NonceData, RefreshRequest, RevokeRequest, TokenPair,
    WalletConnectData, WalletConnectRequest,
};

/// Backend operations the session core depends on.
///
/// `ApiClient` is the production implementation; tests may substitute their own.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginData>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair>;

    async fn revoke(&self, access_token: &str, refresh_token: &str) -> Result<()>;

    async fn google_auth_url(&self) -> Result<String>;

    async fn wallet_nonce(&self, address: &str) -> Result<String>;

    async fn wallet_connect(
        &self,
        request: &WalletConnectRequest,
        access_token: Option<&str>,
    ) -> Result<WalletConnectData>;
}

#[async_trait]
impl AuthBackend for ApiClient {
    /// POST /auth/login
    async fn login(&self, email: &str, password: &str) -> Result<LoginData> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let builder = self.request(Method::POST, "/auth/login")?.json(&body);
        self.send_envelope(builder).await
    }

    /// POST /auth/refresh
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let builder = self.request(Method::POST, "/auth/refresh")?.json(&body);
        self.send_envelope(builder).await
    }

    /// POST /auth/revoke
    async fn revoke(&self, access_token: &str, refresh_token: &str) -> Result<()> {
        let body = RevokeRequest {
            refresh_token: refresh_token.to_string(),
        };
        let builder = self
            .request(Method::POST, "/auth/revoke")?
            .bearer_auth(access_token)
            .json(&body);
        self.send_ack(builder).await
    }

    /// GET /auth/google/url
    async fn google_auth_url(&self) -> Result<String> {
        let builder = self.request(Method::GET, "/auth/google/url")?;
        let data: GoogleUrlData = self.send_envelope(builder).await?;
        Ok(data.url)
    }

    /// GET /auth/wallet/nonce?address={address}
    async fn wallet_nonce(&self, address: &str) -> Result<String> {
        let builder = self
            .request(Method::GET, "/auth/wallet/nonce")?
            .query(&[("address", address)]);
        let data: NonceData = self.send_envelope(builder).await?;
        Ok(data.nonce)
    }

    /// POST /auth/wallet/connect
    async fn wallet_connect(
        &self,
        request: &WalletConnectRequest,
        access_token: Option<&str>,
    ) -> Result<WalletConnectData> {
        let mut builder = self.request(Method::POST, "/auth/wallet/connect")?.json(request);
        if let Some(token) = access_token {
            builder = builder.bearer_auth(token);
        }
        self.send_envelope(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::http::ClientConfig;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::with_config(ClientConfig::with_base_url(server.uri())).expect("client init")
    }

    #[tokio::test]
    async fn test_login_parses_user_and_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .and(body_json(serde_json::json!({
                "email": "ada@example.com",
                "password": "hunter2",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "user": {"id": "u-1", "email": "ada@example.com", "name": "Ada"},
                    "tokens": {"accessToken": "a-1", "refreshToken": "r-1", "expiresIn": 900},
                },
            })))
            .expect(1)
            .mount(&server)
            .await;

        let login = client_for(&server)
            .await
            .login("ada@example.com", "hunter2")
            .await
            .expect("login failed");

        assert_eq!(login.user.id, "u-1");
        assert_eq!(login.user.display_name.as_deref(), Some("Ada"));
        assert_eq!(login.tokens.access_token, "a-1");
        assert_eq!(login.tokens.expires_in_seconds, Some(900));
    }

    #[tokio::test]
    async fn test_refresh_sends_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/refresh"))
            .and(body_json(serde_json::json!({"refreshToken": "r-1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"accessToken": "a-2", "refreshToken": "r-2", "expiresIn": 900},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let pair = client_for(&server).await.refresh("r-1").await.expect("refresh failed");
        assert_eq!(pair.access_token, "a-2");
        assert_eq!(pair.refresh_token, "r-2");
    }

    #[tokio::test]
    async fn test_revoke_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/revoke"))
            .and(header("authorization", "Bearer a-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .await
            .revoke("a-1", "r-1")
            .await
            .expect("revoke failed");
    }

    #[tokio::test]
    async fn test_wallet_nonce_passes_address_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/wallet/nonce"))
            .and(query_param("address", "0xabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"nonce": "n-1"},
            })))
            .expect(1)
            .mount(&server)
            .await;

        let nonce = client_for(&server)
            .await
            .wallet_nonce("0xabc")
            .await
            .expect("nonce failed");
        assert_eq!(nonce, "n-1");
    }

    #[tokio::test]
    async fn test_google_auth_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/google/url"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"url": "https://accounts.google.com/o/oauth2/auth?x=1"},
            })))
            .mount(&server)
            .await;

        let url = client_for(&server).await.google_auth_url().await.expect("url failed");
        assert!(url.starts_with("https://accounts.google.com"));
    }
}
