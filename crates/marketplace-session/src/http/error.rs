/*
[INPUT]:  Error sources (HTTP, API envelope, serialization, storage, refresh, wallet link)
[OUTPUT]: Structured error types with machine-checkable kinds and retry hints
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing failure classification
*/

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Backend error codes with dedicated meaning.
pub const CODE_NONCE_INVALID: &str = "NONCE_INVALID";
pub const CODE_NONCE_EXPIRED: &str = "NONCE_EXPIRED";
pub const CODE_REFRESH_TOKEN_INVALID: &str = "INVALID_REFRESH_TOKEN";

/// Machine-checkable error kind surfaced next to `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    RefreshTokenInvalid,
    NonceInvalid,
    NonceExpired,
    MalformedTokenPair,
    WalletNotConnected,
    Rejected,
    Storage,
    Config,
    Superseded,
    Other,
}

/// Main error type for the session crate
#[derive(Error, Debug)]
pub enum SessionError {
    /// HTTP request failed before a response was read
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with `success: false` or a non-2xx status
    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Token store could not be read or written
    #[error("Token storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Token pair with a missing half
    #[error("Malformed token pair: {0}")]
    MalformedTokenPair(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Refresh(#[from] RefreshError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl SessionError {
    /// Check if the error is transient
    pub fn is_retryable(&self) -> bool {
        match self {
            SessionError::Http(_) => true,
            SessionError::Api { status, .. } => is_transient_status(*status),
            SessionError::Refresh(err) => err.is_retryable(),
            SessionError::Link(err) => err.kind() == ErrorKind::Network,
            _ => false,
        }
    }

    /// Check if error indicates the session itself is gone
    pub fn is_auth_error(&self) -> bool {
        match self {
            SessionError::Api { status, code, .. } => {
                *status == 401 || code.as_deref() == Some(CODE_REFRESH_TOKEN_INVALID)
            }
            SessionError::Refresh(RefreshError::RefreshTokenInvalid(_) | RefreshError::NoSession) => {
                true
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Http(_) => ErrorKind::Network,
            SessionError::Api { status, code, .. } => match code.as_deref() {
                Some(CODE_NONCE_INVALID) => ErrorKind::NonceInvalid,
                Some(CODE_NONCE_EXPIRED) => ErrorKind::NonceExpired,
                Some(CODE_REFRESH_TOKEN_INVALID) => ErrorKind::RefreshTokenInvalid,
                _ if is_transient_status(*status) => ErrorKind::Network,
                _ => ErrorKind::Rejected,
            },
            SessionError::Serialization(_) | SessionError::InvalidResponse(_) => ErrorKind::Network,
            SessionError::UrlParse(_) | SessionError::Config(_) => ErrorKind::Config,
            SessionError::Storage(_) => ErrorKind::Storage,
            SessionError::MalformedTokenPair(_) => ErrorKind::MalformedTokenPair,
            SessionError::Refresh(err) => err.kind(),
            SessionError::Link(err) => err.kind(),
        }
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, code: Option<String>, message: impl Into<String>) -> Self {
        SessionError::Api {
            status: status.as_u16(),
            code,
            message: message.into(),
        }
    }
}

/// Outcome of a failed refresh, shared verbatim by every waiter on the same attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// Transient; the caller may retry after backoff
    #[error("token refresh failed: {0}")]
    Network(String),

    /// Terminal; the session must be logged out
    #[error("refresh token rejected: {0}")]
    RefreshTokenInvalid(String),

    /// Backend refused the call for a reason other than the refresh token
    /// (routing, validation, proxy). The session is kept.
    #[error("refresh request rejected: {0}")]
    Rejected(String),

    #[error("refresh returned a malformed token pair: {0}")]
    MalformedTokenPair(String),

    #[error("no persisted session to refresh")]
    NoSession,

    /// The attempt resolved after its generation was replaced (logout, login, rotation)
    #[error("refresh result for generation {generation} discarded")]
    Superseded { generation: u64 },

    #[error("token storage error: {0}")]
    Storage(String),
}

impl RefreshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RefreshError::Network(_) => ErrorKind::Network,
            RefreshError::RefreshTokenInvalid(_) | RefreshError::NoSession => {
                ErrorKind::RefreshTokenInvalid
            }
            RefreshError::Rejected(_) => ErrorKind::Rejected,
            RefreshError::MalformedTokenPair(_) => ErrorKind::MalformedTokenPair,
            RefreshError::Superseded { .. } => ErrorKind::Superseded,
            RefreshError::Storage(_) => ErrorKind::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, RefreshError::Network(_) | RefreshError::MalformedTokenPair(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshError::RefreshTokenInvalid(_) | RefreshError::NoSession)
    }
}

impl From<SessionError> for RefreshError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MalformedTokenPair(message) => RefreshError::MalformedTokenPair(message),
            SessionError::Storage(io) => RefreshError::Storage(io.to_string()),
            SessionError::Refresh(inner) => inner,
            other if other.is_auth_error() => RefreshError::RefreshTokenInvalid(other.to_string()),
            other => match other.kind() {
                ErrorKind::Rejected => RefreshError::Rejected(other.to_string()),
                _ => RefreshError::Network(other.to_string()),
            },
        }
    }
}

/// Failure of the wallet-link protocol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("wallet {address} is not connected")]
    WalletNotConnected { address: String },

    /// Restart from the nonce request
    #[error("wallet nonce invalid: {0}")]
    NonceInvalid(String),

    /// Restart from the nonce request
    #[error("wallet nonce expired: {0}")]
    NonceExpired(String),

    #[error("wallet link failed: {0}")]
    Network(String),

    #[error("wallet signature rejected: {0}")]
    Rejected(String),

    #[error("wallet signing failed: {0}")]
    Signing(String),

    #[error("wallet link returned a malformed token pair: {0}")]
    MalformedTokenPair(String),

    #[error("wallet link completed without a backend session")]
    MissingSession,

    #[error("wallet link result discarded after the session changed")]
    Superseded,
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::WalletNotConnected { .. } => ErrorKind::WalletNotConnected,
            LinkError::NonceInvalid(_) => ErrorKind::NonceInvalid,
            LinkError::NonceExpired(_) => ErrorKind::NonceExpired,
            LinkError::Network(_) => ErrorKind::Network,
            LinkError::Rejected(_) | LinkError::Signing(_) | LinkError::MissingSession => {
                ErrorKind::Rejected
            }
            LinkError::MalformedTokenPair(_) => ErrorKind::MalformedTokenPair,
            LinkError::Superseded => ErrorKind::Superseded,
        }
    }

    /// Nonce failures require restarting the whole challenge.
    pub fn requires_restart(&self) -> bool {
        matches!(self, LinkError::NonceInvalid(_) | LinkError::NonceExpired(_))
    }
}

impl From<SessionError> for LinkError {
    fn from(err: SessionError) -> Self {
        match err.kind() {
            ErrorKind::NonceInvalid => LinkError::NonceInvalid(err.to_string()),
            ErrorKind::NonceExpired => LinkError::NonceExpired(err.to_string()),
            ErrorKind::MalformedTokenPair => LinkError::MalformedTokenPair(err.to_string()),
            ErrorKind::Network | ErrorKind::Storage | ErrorKind::Config | ErrorKind::Other => {
                LinkError::Network(err.to_string())
            }
            _ => LinkError::Rejected(err.to_string()),
        }
    }
}

fn is_transient_status(status: u16) -> bool {
    status >= 500 || status == 408 || status == 429
}

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
