/*
[INPUT]:  Auth backend, token store, optional wallet signer, session config
[OUTPUT]: SessionClient facade - the only surface the application touches
[POS]:    Crate root - facade over state machine, refresher and wallet bridge
[UPDATE]: When public session operations change
*/

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::auth::{AuthStateMachine, SessionConfig, TokenStore, WalletLinkBridge, WalletSigner};
use crate::gate::{GateConfig, SessionCookie};
use crate::http::{ApiClient, AuthBackend, ClientConfig, LinkError, Result};
use crate::types::{AuthError, SessionSnapshot, TokenPair, UserProfile, WalletIdentity};

/// Session facade.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use marketplace_session::{ClientConfig, MemoryTokenStore, SessionClient, SessionConfig};
///
/// # async fn run() -> marketplace_session::Result<()> {
/// let client = SessionClient::from_config(
///     ClientConfig::with_base_url("https://api.example.com/api"),
///     Arc::new(MemoryTokenStore::new()),
///     SessionConfig::default(),
/// )?;
///
/// client.login_with_password("ada@example.com", "hunter2").await?;
/// assert!(client.check_auth().await);
/// # Ok(())
/// # }
/// ```
pub struct SessionClient {
    backend: Arc<dyn AuthBackend>,
    machine: Arc<AuthStateMachine>,
    bridge: Option<WalletLinkBridge>,
    cookie: SessionCookie,
}

impl SessionClient {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> Self {
        let machine = Arc::new(AuthStateMachine::new(backend.clone(), store, config));
        Self {
            backend,
            machine,
            bridge: None,
            cookie: SessionCookie::from_config(&GateConfig::default()),
        }
    }

    /// Build over the HTTP backend.
    pub fn from_config(
        client_config: ClientConfig,
        store: Arc<dyn TokenStore>,
        session_config: SessionConfig,
    ) -> Result<Self> {
        let backend = Arc::new(ApiClient::with_config(client_config)?);
        Ok(Self::new(backend, store, session_config))
    }

    pub fn with_wallet(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.bridge = Some(WalletLinkBridge::new(self.backend.clone(), signer));
        self
    }

    pub fn with_cookie(mut self, cookie: SessionCookie) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn machine(&self) -> &Arc<AuthStateMachine> {
        &self.machine
    }

    pub fn is_authenticated(&self) -> bool {
        self.machine.snapshot().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.machine.snapshot().is_loading()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.machine.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.machine.subscribe()
    }

    pub fn last_error(&self) -> Option<AuthError> {
        self.machine.snapshot().last_error
    }

    pub async fn check_auth(&self) -> bool {
        self.machine.check_auth().await
    }

    pub fn login(&self, user: UserProfile, tokens: &TokenPair) -> Result<()> {
        self.machine.login(user, tokens)
    }

    /// `POST /auth/login`, then start the session with the returned pair.
    pub async fn login_with_password(&self, email: &str, password: &str) -> Result<UserProfile> {
        let data = self
            .backend
            .login(email, password)
            .await
            .inspect_err(|err| self.machine.record_error(AuthError::from(err)))?;

        self.machine.login(data.user.clone(), &data.tokens)?;
        Ok(data.user)
    }

    /// Clear local state. Synchronous; the very next gate check sees no session.
    pub fn logout(&self) -> Result<()> {
        self.machine.logout().map(|_| ())
    }

    /// Clear locally, then revoke the removed refresh token on the backend.
    ///
    /// Revocation is best effort; its failure is logged and not returned.
    pub async fn logout_and_revoke(&self) -> Result<()> {
        let Some(tokens) = self.machine.logout()? else {
            return Ok(());
        };

        match self
            .backend
            .revoke(&tokens.access_token, &tokens.refresh_token)
            .await
        {
            Ok(()) => info!("refresh token revoked"),
            Err(err) => warn!(error = %err, "refresh token revocation failed"),
        }
        Ok(())
    }

    pub async fn refresh_access_token(&self) -> bool {
        self.machine.refresh_access_token().await
    }

    /// OAuth callback entry point.
    pub fn set_tokens(&self, tokens: &TokenPair) -> Result<()> {
        self.machine.set_tokens(tokens)
    }

    pub async fn google_auth_url(&self) -> Result<String> {
        self.backend
            .google_auth_url()
            .await
            .inspect_err(|err| self.machine.record_error(AuthError::from(err)))
    }

    /// Link `address` through the configured wallet.
    pub async fn link_wallet(&self, address: &str) -> std::result::Result<WalletIdentity, LinkError> {
        let result = self.try_link_wallet(address).await;
        if let Err(err) = &result {
            self.machine.record_error(AuthError::from(err));
        }
        result
    }

    async fn try_link_wallet(&self, address: &str) -> std::result::Result<WalletIdentity, LinkError> {
        let Some(bridge) = &self.bridge else {
            return Err(LinkError::WalletNotConnected {
                address: address.to_string(),
            });
        };

        let epoch = self.machine.epoch();
        let access_token = if self.is_authenticated() {
            self.machine.access_token().map_err(LinkError::from)?
        } else {
            None
        };

        let outcome = bridge.link_wallet(address, access_token.as_deref()).await?;
        self.machine.attach_wallet(epoch, outcome)
    }

    /// Drop the wallet identity; backend tokens are untouched.
    pub fn disconnect_wallet(&self) {
        self.machine.detach_wallet();
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.machine.set_error(message);
    }

    pub fn clear_error(&self) {
        self.machine.clear_error();
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.machine.access_token()
    }

    /// `Set-Cookie` value mirroring whether tokens are persisted right now.
    pub fn session_cookie_header(&self) -> String {
        if self.machine.ledger().is_present() {
            self.cookie.set_header()
        } else {
            self.cookie.clear_header()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::auth::{MemoryTokenStore, MockWalletSigner};
    use crate::http::ErrorKind;
    use tokio_test::assert_ok;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    fn client_for(server: &MockServer) -> SessionClient {
        SessionClient::from_config(
            ClientConfig::with_base_url(server.uri()),
            Arc::new(MemoryTokenStore::new()),
            SessionConfig::default(),
        )
        .expect("client init")
    }

    async fn mount_login(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "user": {"id": "u-1", "email": "ada@example.com"},
                    "tokens": {"accessToken": "a-1", "refreshToken": "r-1", "expiresIn": 900},
                },
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_password_login_and_cookie() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        let client = client_for(&server);

        assert!(client.session_cookie_header().contains("Max-Age=0"));

        let user = assert_ok!(client.login_with_password("ada@example.com", "hunter2").await);
        assert_eq!(user.id, "u-1");
        assert!(client.is_authenticated());
        assert!(!client.is_loading());
        assert!(client.session_cookie_header().starts_with("access_token=1"));

        assert_ok!(client.logout());
        assert!(!client.is_authenticated());
        assert!(client.session_cookie_header().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_failed_password_login_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "success": false,
                "error": "invalid credentials",
            })))
            .mount(&server)
            .await;
        let client = client_for(&server);

        assert!(client.login_with_password("ada@example.com", "nope").await.is_err());
        let error = client.last_error().unwrap();
        assert_eq!(error.kind, ErrorKind::Rejected);
        assert!(error.message.contains("invalid credentials"));
        assert!(!client.is_authenticated());
    }

    #[tokio::test]
    async fn test_logout_and_revoke_clears_before_revoking() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("POST"))
            .and(path("/auth/revoke"))
            .and(header("authorization", "Bearer a-1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        let client = client_for(&server);

        assert_ok!(client.login_with_password("ada@example.com", "hunter2").await);
        assert_ok!(client.logout_and_revoke().await);
        assert!(!client.is_authenticated());
        assert!(client.access_token().unwrap().is_none());

        // nothing left to revoke
        assert_ok!(client.logout_and_revoke().await);
    }

    #[tokio::test]
    async fn test_link_wallet_attaches_to_session() {
        let server = MockServer::start().await;
        mount_login(&server).await;
        Mock::given(method("GET"))
            .and(path("/auth/wallet/nonce"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {"nonce": "n-1"},
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/wallet/connect"))
            .and(header("authorization", "Bearer a-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"success": true, "data": {}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(MockWalletSigner::new(1, ADDRESS, "0xsig"));
        let client = client_for(&server).with_wallet(signer);
        assert_ok!(client.login_with_password("ada@example.com", "hunter2").await);

        let identity = assert_ok!(client.link_wallet(ADDRESS).await);
        assert_eq!(identity.chain_id, 1);
        assert!(client.snapshot().has_wallet());

        client.disconnect_wallet();
        assert!(!client.snapshot().has_wallet());
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn test_link_wallet_without_signer() {
        let server = MockServer::start().await;
        let client = client_for(&server);

        let err = client.link_wallet(ADDRESS).await.unwrap_err();
        assert!(matches!(err, LinkError::WalletNotConnected { .. }));
        assert_eq!(client.last_error().unwrap().kind, ErrorKind::WalletNotConnected);
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

        let url = assert_ok!(client_for(&server).google_auth_url().await);
        assert!(url.starts_with("https://accounts.google.com"));
    }
}
