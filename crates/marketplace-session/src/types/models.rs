/*
[INPUT]:  Backend token payloads, wallet verification results, local clock
[OUTPUT]: Token pair, persisted token record, profile and session snapshot types
[POS]:    Data layer - core session entities
[UPDATE]: When token fields, expiry derivation, or snapshot contents change
*/

use base64::{
    Engine as _,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::http::{ErrorKind, LinkError, RefreshError, Result, SessionError};

use super::enums::AuthStatus;

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Matched access + refresh token set as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, alias = "expiresIn")]
    pub expires_in_seconds: Option<u64>,
    #[serde(default = "Utc::now")]
    pub issued_at: DateTime<Utc>,
}

impl TokenPair {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_in_seconds: Option<u64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: default_token_type(),
            expires_in_seconds,
            issued_at: Utc::now(),
        }
    }

    /// A pair is either fully present or treated as absent.
    pub fn validate(&self) -> Result<()> {
        if self.access_token.trim().is_empty() {
            return Err(SessionError::MalformedTokenPair(
                "access token is empty".to_string(),
            ));
        }
        if self.refresh_token.trim().is_empty() {
            return Err(SessionError::MalformedTokenPair(
                "refresh token is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Expiry derived from `expires_in`, then the access token's `exp` claim,
    /// then the supplied fallback lifetime.
    pub fn expires_at(&self, fallback_lifetime: Duration) -> DateTime<Utc> {
        match self.expires_in_seconds {
            Some(seconds) if seconds > 0 => i64::try_from(seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|ttl| self.issued_at.checked_add_signed(ttl))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            _ => jwt_expiry(&self.access_token).unwrap_or_else(|| {
                self.issued_at
                    .checked_add_signed(fallback_lifetime)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            }),
        }
    }
}

/// Token record as it lives in durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

impl StoredTokens {
    pub fn from_pair(pair: &TokenPair, fallback_lifetime: Duration) -> Result<Self> {
        pair.validate()?;
        Ok(Self {
            access_token: pair.access_token.clone(),
            refresh_token: pair.refresh_token.clone(),
            token_type: pair.token_type.clone(),
            expires_at: pair.expires_at(fallback_lifetime),
            stored_at: Utc::now(),
        })
    }

    /// Rebuild a pair whose remaining lifetime matches this record.
    pub fn to_pair(&self) -> TokenPair {
        let now = Utc::now();
        let remaining = (self.expires_at - now).num_seconds().max(0);
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            token_type: self.token_type.clone(),
            expires_in_seconds: u64::try_from(remaining).ok(),
            issued_at: now,
        }
    }

    pub fn is_well_formed(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }

    /// Local clock comparison; `leeway` treats tokens about to expire as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>, leeway: Duration) -> bool {
        now.checked_add_signed(leeway)
            .is_none_or(|deadline| deadline >= self.expires_at)
    }
}

/// Backend user profile attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, alias = "name")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub wallet_address: Option<String>,
}

/// A wallet address verified through a signed-nonce challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletIdentity {
    pub address: String,
    pub chain_id: u64,
    pub verified_at: DateTime<Utc>,
}

/// UI-facing error: readable message plus a machine-checkable kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthError {
    pub kind: ErrorKind,
    pub message: String,
}

impl AuthError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Read-only view of the session, free of token material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub user: Option<UserProfile>,
    pub wallet: Option<WalletIdentity>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<AuthError>,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.status.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.status.is_loading()
    }

    pub fn has_wallet(&self) -> bool {
        self.wallet.is_some()
    }
}

/// Read the `exp` claim of a JWT without verifying it.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload_b64 = token.trim().split('.').nth(1)?;
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .or_else(|_| URL_SAFE.decode(payload_b64))
        .ok()?;
    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).ok()?;
    let exp = payload.get("exp")?.as_i64()?;
    DateTime::from_timestamp(exp, 0)
}

impl From<&SessionError> for AuthError {
    fn from(err: &SessionError) -> Self {
        AuthError::new(err.kind(), err.to_string())
    }
}

impl From<&RefreshError> for AuthError {
    fn from(err: &RefreshError) -> Self {
        AuthError::new(err.kind(), err.to_string())
    }
}

impl From<&LinkError> for AuthError {
    fn from(err: &LinkError) -> Self {
        AuthError::new(err.kind(), err.to_string())
    }
}
