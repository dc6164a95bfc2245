/*
[INPUT]:  Challenge message to sign and the connected wallet
[OUTPUT]: Signature string plus address/chain/connection status
[POS]:    Auth layer - wallet integration abstraction
[UPDATE]: When adding new wallet types or changing signature format
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::LinkError;

/// Trait for wallet signing operations
///
/// The trait is async to support browser extensions, hardware wallets and
/// other external signers.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// EIP-155 chain id the wallet is currently on
    fn chain_id(&self) -> u64;

    /// Get the wallet address
    fn address(&self) -> &str;

    /// Whether the wallet is connected right now
    fn is_connected(&self) -> bool {
        true
    }

    /// Sign a message and return the hex-encoded signature (0x...)
    async fn sign_message(&self, message: &str) -> Result<String, LinkError>;
}

/// Mock wallet signer for testing
#[derive(Debug, Clone)]
pub struct MockWalletSigner {
    chain_id: u64,
    address: String,
    signature: String,
    connected: Arc<AtomicBool>,
}

impl MockWalletSigner {
    /// Create a new mock signer with predetermined signature
    pub fn new(chain_id: u64, address: &str, signature: &str) -> Self {
        Self {
            chain_id,
            address: address.to_string(),
            signature: signature.to_string(),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

#[async_trait]
impl WalletSigner for MockWalletSigner {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn sign_message(&self, _message: &str) -> Result<String, LinkError> {
        if !self.is_connected() {
            return Err(LinkError::WalletNotConnected {
                address: self.address.clone(),
            });
        }
        Ok(self.signature.clone())
    }
}

/// Lowercase, `0x`-less form used to compare EVM addresses.
pub fn normalize_evm_address(address: &str) -> String {
    let address = address.trim();
    address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
        .to_ascii_lowercase()
}

pub fn same_address(left: &str, right: &str) -> bool {
    normalize_evm_address(left) == normalize_evm_address(right)
}
