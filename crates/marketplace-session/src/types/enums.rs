/*
[INPUT]:  Session lifecycle vocabulary and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - type definitions for session state
[UPDATE]: When auth states or route classes change
*/

use serde::{Deserialize, Serialize};

/// Authentication status owned by the state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    #[default]
    Unauthenticated,
    Verifying,
    Authenticated,
    Error,
}

impl AuthStatus {
    pub fn is_authenticated(self) -> bool {
        matches!(self, AuthStatus::Authenticated)
    }

    pub fn is_loading(self) -> bool {
        matches!(self, AuthStatus::Verifying)
    }
}

/// Path class used by the edge route gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Protected,
    AuthEntry,
    OAuthCallback,
    Public,
}
