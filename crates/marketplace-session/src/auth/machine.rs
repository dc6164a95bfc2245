/*
[INPUT]:  Token ledger, refresher results, wallet-link outcomes, UI commands
[OUTPUT]: Authoritative session status published as SessionSnapshot
[POS]:    Auth layer - session state machine and sole writer of persisted state
[UPDATE]: When auth states, transitions, or compare-before-apply rules change
*/

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::http::{AuthBackend, ErrorKind, LinkError, RefreshError, Result};
use crate::types::{
    AuthError, AuthStatus, SessionSnapshot, StoredTokens, TokenPair, UserProfile, WalletIdentity,
};

use super::bridge::LinkOutcome;
use super::refresher::TokenRefresher;
use super::store::{TokenLedger, TokenStore};

/// Session timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Tokens this close to expiry are refreshed before use
    pub expiry_leeway_secs: u64,
    /// Lifetime assumed when the backend gives neither `expiresIn` nor a JWT `exp`
    pub default_expires_in_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_leeway_secs: 30,
            default_expires_in_secs: 3600,
        }
    }
}

impl SessionConfig {
    pub fn expiry_leeway(&self) -> Duration {
        secs(self.expiry_leeway_secs)
    }

    pub fn fallback_lifetime(&self) -> Duration {
        secs(self.default_expires_in_secs)
    }
}

fn secs(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// In-memory session. Token material lives in the ledger, never here.
#[derive(Debug, Default)]
struct Session {
    /// Bumped whenever the identity behind the session changes
    epoch: u64,
    status: AuthStatus,
    user: Option<UserProfile>,
    wallet: Option<WalletIdentity>,
    expires_at: Option<chrono::DateTime<Utc>>,
    last_error: Option<AuthError>,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            user: self.user.clone(),
            wallet: self.wallet.clone(),
            expires_at: self.expires_at,
            last_error: self.last_error.clone(),
        }
    }

    /// Drop everything tied to the previous identity.
    fn reset(&mut self, status: AuthStatus, last_error: Option<AuthError>) {
        *self = Session {
            epoch: self.epoch + 1,
            status,
            last_error,
            ..Session::default()
        };
    }
}

/// What the persisted tokens say about the session right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settled {
    Authenticated,
    Absent,
    Expired { generation: u64 },
    Failed,
}

/// Which caller is reacting to a refresh failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshCause {
    /// `check_auth` found the access token expired
    Verify,
    /// Explicit `refresh_access_token`
    Explicit,
}

/// Owns the session and funnels every persisted write through generation checks.
pub struct AuthStateMachine {
    ledger: Arc<TokenLedger>,
    refresher: TokenRefresher,
    config: SessionConfig,
    session: Mutex<Session>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl AuthStateMachine {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        store: Arc<dyn TokenStore>,
        config: SessionConfig,
    ) -> Self {
        let ledger = Arc::new(TokenLedger::new(store));
        let refresher = TokenRefresher::new(backend, ledger.clone(), config.fallback_lifetime())
            .with_expiry_leeway(config.expiry_leeway());
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());

        Self {
            ledger,
            refresher,
            config,
            session: Mutex::new(Session::default()),
            snapshot_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        self.snapshot_tx.send_replace(session.snapshot());
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<TokenLedger> {
        &self.ledger
    }

    pub fn refresher(&self) -> &TokenRefresher {
        &self.refresher
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.lock().status
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    /// Current access token straight from storage.
    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.ledger.current()?.map(|entry| entry.tokens.access_token))
    }

    /// Re-derive the session from persisted tokens, refreshing an expired access token.
    ///
    /// Returns true iff the machine ends up `Authenticated`.
    pub async fn check_auth(&self) -> bool {
        match self.settle() {
            Settled::Authenticated => true,
            Settled::Absent | Settled::Failed => false,
            Settled::Expired { generation } => {
                self.run_refresh(generation, RefreshCause::Verify).await
            }
        }
    }

    /// Rotate tokens now. Transient failures keep the session; a rejected
    /// refresh token logs out.
    pub async fn refresh_access_token(&self) -> bool {
        let generation = match self.ledger.current() {
            Ok(Some(entry)) => entry.generation,
            Ok(None) => {
                let mut session = self.lock();
                if session.status != AuthStatus::Unauthenticated || session.user.is_some() {
                    let last_error = session.last_error.take();
                    session.reset(AuthStatus::Unauthenticated, last_error);
                    self.publish(&session);
                }
                return false;
            }
            Err(err) => {
                self.record_error(AuthError::from(&err));
                return false;
            }
        };

        self.run_refresh(generation, RefreshCause::Explicit).await
    }

    /// Start a session from a fresh login. Overwrites any prior session.
    pub fn login(&self, user: UserProfile, tokens: &TokenPair) -> Result<()> {
        let stored = self.to_stored(tokens)?;

        let mut session = self.lock();
        self.ledger.replace(&stored)?;
        let user_id = user.id.clone();
        session.reset(AuthStatus::Authenticated, None);
        session.user = Some(user);
        session.expires_at = Some(stored.expires_at);
        self.publish(&session);

        info!(user_id = %user_id, expires_at = %stored.expires_at, "session established");
        Ok(())
    }

    /// Replace tokens on the current session, keeping user and wallet.
    pub fn set_tokens(&self, tokens: &TokenPair) -> Result<()> {
        let stored = self.to_stored(tokens)?;

        let mut session = self.lock();
        self.ledger.replace(&stored)?;
        session.status = AuthStatus::Authenticated;
        session.expires_at = Some(stored.expires_at);
        session.last_error = None;
        self.publish(&session);

        debug!(expires_at = %stored.expires_at, "tokens replaced");
        Ok(())
    }

    /// Clear persisted tokens and the in-memory session before returning.
    ///
    /// Returns the tokens that were removed so callers can revoke them.
    pub fn logout(&self) -> Result<Option<StoredTokens>> {
        let mut session = self.lock();
        let taken = self.ledger.take();
        session.reset(AuthStatus::Unauthenticated, None);
        self.publish(&session);
        drop(session);

        info!("session cleared");
        taken
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.record_error(AuthError::new(ErrorKind::Other, message));
    }

    pub fn clear_error(&self) {
        let mut session = self.lock();
        if session.last_error.take().is_some() {
            self.publish(&session);
        }
    }

    /// Apply a finished wallet link started at `expected_epoch`.
    ///
    /// Tokens issued by the link replace the stored pair only if the session
    /// has not changed identity in the meantime.
    pub fn attach_wallet(
        &self,
        expected_epoch: u64,
        outcome: LinkOutcome,
    ) -> std::result::Result<WalletIdentity, LinkError> {
        let mut session = self.lock();
        if session.epoch != expected_epoch {
            warn!(
                expected_epoch,
                epoch = session.epoch,
                "discarding wallet link for a replaced session"
            );
            return Err(LinkError::Superseded);
        }

        match outcome.tokens {
            Some(pair) => {
                let stored = StoredTokens::from_pair(&pair, self.config.fallback_lifetime())
                    .map_err(|err| LinkError::MalformedTokenPair(err.to_string()))?;
                self.ledger.replace(&stored).map_err(LinkError::from)?;
                session.status = AuthStatus::Authenticated;
                session.expires_at = Some(stored.expires_at);
            }
            None if session.status.is_authenticated() && self.ledger.is_present() => {}
            None => return Err(LinkError::MissingSession),
        }

        if let Some(user) = outcome.user {
            session.user = Some(user);
        }
        session.wallet = Some(outcome.identity.clone());
        session.last_error = None;
        self.publish(&session);

        info!(address = %outcome.identity.address, chain_id = outcome.identity.chain_id, "wallet attached");
        Ok(outcome.identity)
    }

    pub fn detach_wallet(&self) {
        let mut session = self.lock();
        if session.wallet.take().is_some() {
            self.publish(&session);
            debug!("wallet detached");
        }
    }

    pub(crate) fn record_error(&self, error: AuthError) {
        let mut session = self.lock();
        debug!(kind = ?error.kind, message = %error.message, "auth error recorded");
        session.last_error = Some(error);
        self.publish(&session);
    }

    fn to_stored(&self, tokens: &TokenPair) -> Result<StoredTokens> {
        StoredTokens::from_pair(tokens, self.config.fallback_lifetime()).inspect_err(|err| {
            self.record_error(AuthError::from(err));
        })
    }

    fn settle(&self) -> Settled {
        let mut session = self.lock();
        let settled = self.settle_locked(&mut session);
        self.publish(&session);
        settled
    }

    /// Read storage and set status from it. Never touches the network.
    fn settle_locked(&self, session: &mut Session) -> Settled {
        let entry = match self.ledger.current() {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "could not read persisted tokens");
                session.status = AuthStatus::Error;
                session.last_error = Some(AuthError::from(&err));
                return Settled::Failed;
            }
        };

        let Some(entry) = entry else {
            if session.status != AuthStatus::Unauthenticated || session.user.is_some() {
                let last_error = session.last_error.take();
                session.reset(AuthStatus::Unauthenticated, last_error);
            }
            return Settled::Absent;
        };

        if entry
            .tokens
            .is_expired_at(Utc::now(), self.config.expiry_leeway())
        {
            debug!(generation = entry.generation, "access token expired");
            if !session.status.is_authenticated() {
                session.status = AuthStatus::Verifying;
            }
            return Settled::Expired {
                generation: entry.generation,
            };
        }

        session.status = AuthStatus::Authenticated;
        session.expires_at = Some(entry.tokens.expires_at);
        session.last_error = None;
        Settled::Authenticated
    }

    async fn run_refresh(&self, generation: u64, cause: RefreshCause) -> bool {
        let outcome = match self.refresher.begin(Some(generation)) {
            Ok(pending) => pending.wait().await,
            Err(err) => Err(err),
        };

        let mut session = self.lock();
        let authenticated = match outcome {
            Ok(pair) => self.apply_refreshed(&mut session, &pair),
            Err(err) => self.apply_refresh_failure(&mut session, generation, cause, err),
        };
        self.publish(&session);
        authenticated
    }

    /// Compare-before-apply: only a pair that storage still holds counts.
    fn apply_refreshed(&self, session: &mut Session, pair: &TokenPair) -> bool {
        match self.ledger.current() {
            Ok(Some(entry)) if entry.tokens.access_token == pair.access_token => {
                session.status = AuthStatus::Authenticated;
                session.expires_at = Some(entry.tokens.expires_at);
                session.last_error = None;
                true
            }
            _ => self.rederive(session),
        }
    }

    /// Settle from storage after a refresh outcome turned out to be stale.
    fn rederive(&self, session: &mut Session) -> bool {
        match self.settle_locked(session) {
            Settled::Authenticated => true,
            Settled::Expired { .. } => {
                if session.status == AuthStatus::Verifying {
                    session.status = AuthStatus::Error;
                }
                session.last_error = Some(AuthError::new(
                    ErrorKind::Superseded,
                    "session changed during refresh",
                ));
                false
            }
            Settled::Absent | Settled::Failed => false,
        }
    }

    fn apply_refresh_failure(
        &self,
        session: &mut Session,
        generation: u64,
        cause: RefreshCause,
        err: RefreshError,
    ) -> bool {
        match err {
            RefreshError::Superseded { .. } | RefreshError::NoSession => {
                debug!(generation, error = %err, "refresh outcome stale; re-deriving from storage");
                self.rederive(session)
            }
            RefreshError::RefreshTokenInvalid(_) => {
                let cleared = match self.ledger.clear_if_current(generation) {
                    Ok(cleared) => cleared,
                    Err(clear_err) => {
                        warn!(error = %clear_err, "could not clear rejected tokens");
                        false
                    }
                };
                if !cleared && self.ledger.is_present() {
                    // Someone stored a newer pair; that one decides
                    return self.rederive(session);
                }

                let status = match cause {
                    RefreshCause::Verify => AuthStatus::Error,
                    RefreshCause::Explicit => AuthStatus::Unauthenticated,
                };
                warn!(generation, ?status, "refresh token rejected; session cleared");
                session.reset(status, Some(AuthError::from(&err)));
                false
            }
            RefreshError::Network(_)
            | RefreshError::Rejected(_)
            | RefreshError::MalformedTokenPair(_)
            | RefreshError::Storage(_) => {
                warn!(generation, error = %err, "refresh failed; keeping session");
                if cause == RefreshCause::Verify {
                    session.status = AuthStatus::Error;
                }
                session.last_error = Some(AuthError::from(&err));
                false
            }
        }
    }
}
