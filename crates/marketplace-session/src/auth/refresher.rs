/*
[INPUT]:  Persisted refresh token (via TokenLedger) and the auth backend
[OUTPUT]: Rotated token pair shared by every concurrent caller
[POS]:    Auth layer - single-flight token refresh
[UPDATE]: When refresh coalescing, commit rules, or failure classes change
*/

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{Duration, Utc};
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::http::{AuthBackend, RefreshError};
use crate::types::{StoredTokens, TokenPair};

use super::store::{LedgerEntry, TokenLedger};

type RefreshFuture = Shared<BoxFuture<'static, Result<TokenPair, RefreshError>>>;

/// One outstanding refresh call, keyed by the generation it was started for.
struct RefreshAttempt {
    id: u64,
    generation: u64,
    future: RefreshFuture,
}

type AttemptSlot = Arc<Mutex<Option<RefreshAttempt>>>;

fn lock_slot(slot: &AttemptSlot) -> MutexGuard<'_, Option<RefreshAttempt>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle on a started (or joined) refresh.
pub struct PendingRefresh {
    generation: u64,
    future: RefreshFuture,
}

impl PendingRefresh {
    /// Generation of the token pair this refresh replaces.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) -> Result<TokenPair, RefreshError> {
        self.future.await
    }
}

/// Coalesces refresh requests so at most one network call runs per generation.
///
/// Performs exactly one backend attempt per started refresh; retrying is left
/// to callers.
pub struct TokenRefresher {
    backend: Arc<dyn AuthBackend>,
    ledger: Arc<TokenLedger>,
    fallback_lifetime: Duration,
    expiry_leeway: Duration,
    in_flight: AttemptSlot,
    next_attempt_id: AtomicU64,
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("in_flight_generation", &self.in_flight_generation())
            .field("fallback_lifetime", &self.fallback_lifetime)
            .field("expiry_leeway", &self.expiry_leeway)
            .finish()
    }
}

impl TokenRefresher {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        ledger: Arc<TokenLedger>,
        fallback_lifetime: Duration,
    ) -> Self {
        Self {
            backend,
            ledger,
            fallback_lifetime,
            expiry_leeway: Duration::zero(),
            in_flight: Arc::new(Mutex::new(None)),
            next_attempt_id: AtomicU64::new(1),
        }
    }

    /// Margin under which a rotated pair no longer counts as fresh.
    pub fn with_expiry_leeway(mut self, leeway: Duration) -> Self {
        self.expiry_leeway = leeway;
        self
    }

    /// Refresh the current generation, joining an in-flight attempt if one exists.
    pub async fn refresh(&self) -> Result<TokenPair, RefreshError> {
        self.begin(None)?.wait().await
    }

    /// Generation of the attempt currently on the wire, if any.
    pub fn in_flight_generation(&self) -> Option<u64> {
        lock_slot(&self.in_flight)
            .as_ref()
            .map(|attempt| attempt.generation)
    }

    /// Start or join a refresh.
    ///
    /// With `observed` set, a caller that read generation `observed` and finds
    /// the ledger already moved on to a still-fresh pair gets that pair instead
    /// of a second call. An expired newer pair is refreshed like any other.
    pub fn begin(&self, observed: Option<u64>) -> Result<PendingRefresh, RefreshError> {
        let mut slot = lock_slot(&self.in_flight);

        let entry = self
            .ledger
            .current()
            .map_err(|err| RefreshError::Storage(err.to_string()))?
            .ok_or(RefreshError::NoSession)?;

        if let Some(observed) = observed {
            let fresh = !entry.tokens.is_expired_at(Utc::now(), self.expiry_leeway);
            if entry.generation != observed && fresh {
                debug!(
                    observed,
                    generation = entry.generation,
                    "tokens rotated since caller read them; reusing current pair"
                );
                let pair = entry.tokens.to_pair();
                return Ok(PendingRefresh {
                    generation: entry.generation,
                    future: future::ready(Ok(pair)).boxed().shared(),
                });
            }
        }

        if let Some(attempt) = slot.as_ref() {
            if attempt.generation == entry.generation {
                debug!(generation = entry.generation, "joining in-flight token refresh");
                return Ok(PendingRefresh {
                    generation: entry.generation,
                    future: attempt.future.clone(),
                });
            }
        }

        let id = self.next_attempt_id.fetch_add(1, Ordering::Relaxed);
        let generation = entry.generation;
        let attempt = run_attempt(
            self.backend.clone(),
            self.ledger.clone(),
            self.in_flight.clone(),
            self.fallback_lifetime,
            id,
            entry,
        );
        let future = attempt.boxed().shared();

        debug!(generation, attempt = id, "starting token refresh");
        *slot = Some(RefreshAttempt {
            id,
            generation,
            future: future.clone(),
        });

        Ok(PendingRefresh { generation, future })
    }
}

async fn run_attempt(
    backend: Arc<dyn AuthBackend>,
    ledger: Arc<TokenLedger>,
    in_flight: AttemptSlot,
    fallback_lifetime: Duration,
    id: u64,
    entry: LedgerEntry,
) -> Result<TokenPair, RefreshError> {
    let generation = entry.generation;
    let outcome = match backend.refresh(&entry.tokens.refresh_token).await {
        Ok(pair) => commit(&ledger, fallback_lifetime, &entry, pair),
        Err(err) => {
            let err = RefreshError::from(err);
            warn!(generation, error = %err, "token refresh failed");
            Err(err)
        }
    };

    release(&in_flight, id);
    outcome
}

fn commit(
    ledger: &TokenLedger,
    fallback_lifetime: Duration,
    entry: &LedgerEntry,
    pair: TokenPair,
) -> Result<TokenPair, RefreshError> {
    let generation = entry.generation;
    let tokens = StoredTokens::from_pair(&pair, fallback_lifetime)
        .map_err(|err| RefreshError::MalformedTokenPair(err.to_string()))?;

    match ledger.commit_rotation(generation, &entry.tokens.refresh_token, &tokens) {
        Ok(Some(next)) => {
            info!(generation = next, "token refresh committed");
            Ok(pair)
        }
        Ok(None) => {
            warn!(generation, "discarding refresh result for superseded generation");
            Err(RefreshError::Superseded { generation })
        }
        Err(err) => Err(RefreshError::Storage(err.to_string())),
    }
}

fn release(in_flight: &AttemptSlot, id: u64) {
    let mut slot = lock_slot(in_flight);
    if slot.as_ref().is_some_and(|attempt| attempt.id == id) {
        *slot = None;
    }
}
