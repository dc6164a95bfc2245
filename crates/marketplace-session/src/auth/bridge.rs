/*
[INPUT]:  Wallet address to link, connected wallet signer, optional bearer token
[OUTPUT]: Verified wallet identity plus any session the backend issued
[POS]:    Auth layer - nonce/sign/submit wallet-link protocol
[UPDATE]: When challenge format, nonce rules, or connect payload change
*/

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::http::{AuthBackend, LinkError};
use crate::types::{TokenPair, UserProfile, WalletConnectRequest, WalletIdentity};

use super::wallet::{WalletSigner, same_address};

const CHALLENGE_STATEMENT: &str = "Sign in to the marketplace with your wallet.";
const CONSUMED_NONCE_CAPACITY: usize = 128;

/// Everything a successful link produced; the state machine decides what to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub identity: WalletIdentity,
    pub user: Option<UserProfile>,
    pub tokens: Option<TokenPair>,
}

/// Canonical challenge string signed by the wallet.
pub fn challenge_message(address: &str, chain_id: u64, nonce: &str) -> String {
    format!("{CHALLENGE_STATEMENT}\n\nAddress: {address}\nChain ID: {chain_id}\nNonce: {nonce}")
}

/// Binds a wallet signature to a backend session.
pub struct WalletLinkBridge {
    backend: Arc<dyn AuthBackend>,
    signer: Arc<dyn WalletSigner>,
    consumed_nonces: Mutex<VecDeque<String>>,
}

impl WalletLinkBridge {
    pub fn new(backend: Arc<dyn AuthBackend>, signer: Arc<dyn WalletSigner>) -> Self {
        Self {
            backend,
            signer,
            consumed_nonces: Mutex::new(VecDeque::new()),
        }
    }

    pub fn signer(&self) -> &Arc<dyn WalletSigner> {
        &self.signer
    }

    /// Run nonce -> sign -> submit for `address`.
    ///
    /// `access_token` attaches the wallet to an existing session; without it the
    /// backend is expected to open a new one.
    pub async fn link_wallet(
        &self,
        address: &str,
        access_token: Option<&str>,
    ) -> Result<LinkOutcome, LinkError> {
        self.ensure_connected(address)?;

        // Step 1: single-use nonce
        let nonce = self.backend.wallet_nonce(address).await?;
        let nonce = nonce.trim().to_string();
        if nonce.is_empty() {
            return Err(LinkError::NonceInvalid("backend returned an empty nonce".to_string()));
        }
        if self.is_consumed(&nonce) {
            warn!(address, "backend handed out a nonce that was already submitted");
            return Err(LinkError::NonceInvalid("nonce already used".to_string()));
        }

        // Step 2: sign the canonical challenge
        let chain_id = self.signer.chain_id();
        let message = challenge_message(address, chain_id, &nonce);
        let signature = self.signer.sign_message(&message).await?;

        // The wallet may have been switched away while the user was signing
        self.ensure_connected(address)?;

        // Step 3: submit; the nonce counts as spent from here on
        self.mark_consumed(&nonce);
        let request = WalletConnectRequest {
            address: address.to_string(),
            signature,
            nonce,
        };
        let data = self.backend.wallet_connect(&request, access_token).await?;

        if let Some(tokens) = &data.tokens {
            tokens
                .validate()
                .map_err(|err| LinkError::MalformedTokenPair(err.to_string()))?;
        }

        info!(
            address,
            chain_id,
            new_session = data.tokens.is_some(),
            "wallet linked"
        );

        Ok(LinkOutcome {
            identity: WalletIdentity {
                address: address.to_string(),
                chain_id,
                verified_at: Utc::now(),
            },
            user: data.user,
            tokens: data.tokens,
        })
    }

    fn ensure_connected(&self, address: &str) -> Result<(), LinkError> {
        if self.signer.is_connected() && same_address(self.signer.address(), address) {
            return Ok(());
        }
        debug!(
            requested = address,
            connected = self.signer.address(),
            "wallet not connected for requested address"
        );
        Err(LinkError::WalletNotConnected {
            address: address.to_string(),
        })
    }

    fn is_consumed(&self, nonce: &str) -> bool {
        let consumed = self
            .consumed_nonces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        consumed.iter().any(|used| used == nonce)
    }

    fn mark_consumed(&self, nonce: &str) {
        let mut consumed = self
            .consumed_nonces
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if consumed.len() == CONSUMED_NONCE_CAPACITY {
            consumed.pop_front();
        }
        consumed.push_back(nonce.to_string());
    }
}
