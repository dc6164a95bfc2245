/*
[INPUT]:  Backend auth API schema ({success, data?, error?} envelope)
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - inbound payloads for auth endpoints
[UPDATE]: When the envelope or endpoint payloads change
*/

use serde::{Deserialize, Serialize};

use super::models::{TokenPair, UserProfile};

/// Envelope every backend response is wrapped in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Backends report errors either as a bare message or as `{code, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiErrorBody {
    Message(String),
    Detailed {
        #[serde(default)]
        code: Option<String>,
        message: String,
    },
}

impl ApiErrorBody {
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiErrorBody::Message(_) => None,
            ApiErrorBody::Detailed { code, .. } => code.as_deref(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiErrorBody::Message(message) => message,
            ApiErrorBody::Detailed { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginData {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleUrlData {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceData {
    #[serde(default)]
    pub nonce: String,
}

/// Result of `POST /auth/wallet/connect`: a fresh session, or an attach ack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConnectData {
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub tokens: Option<TokenPair>,
}
