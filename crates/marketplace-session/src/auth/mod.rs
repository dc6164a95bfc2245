/*
[INPUT]:  Auth backend, token storage, wallet signers
[OUTPUT]: Session state machine, single-flight refresher, wallet-link bridge
[POS]:    Auth layer - session and token lifecycle
[UPDATE]: When auth flow, storage, or wallet linking changes
*/

pub mod bridge;
pub mod evm_wallet;
pub mod machine;
pub mod refresher;
pub mod store;
pub mod wallet;

pub use bridge::{LinkOutcome, WalletLinkBridge, challenge_message};
pub use evm_wallet::EvmWalletSigner;
pub use machine::{AuthStateMachine, SessionConfig};
pub use refresher::{PendingRefresh, TokenRefresher};
pub use store::{FileTokenStore, LedgerEntry, MemoryTokenStore, TokenLedger, TokenStore};
pub use wallet::{MockWalletSigner, WalletSigner, normalize_evm_address, same_address};
