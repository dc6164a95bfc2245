/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public session-lifecycle crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod auth;
pub mod client;
pub mod gate;
pub mod http;
pub mod types;

// Re-export commonly used types from auth
pub use auth::{
    AuthStateMachine,
    EvmWalletSigner,
    FileTokenStore,
    LinkOutcome,
    MemoryTokenStore,
    MockWalletSigner,
    SessionConfig,
    TokenLedger,
    TokenRefresher,
    TokenStore,
    WalletLinkBridge,
    WalletSigner,
};

pub use client::SessionClient;

pub use gate::{AccessRequirement, GateConfig, GateDecision, RouteGate, SessionCookie};

// Re-export commonly used types from http
pub use http::{
    ApiClient,
    AuthBackend,
    ClientConfig,
    ErrorKind,
    LinkError,
    RefreshError,
    Result,
    SessionError,
};

// Re-export all types
pub use types::*;
