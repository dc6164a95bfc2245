/*
[INPUT]:  Request path plus the raw Cookie header (or a presence flag)
[OUTPUT]: Allow / redirect decision, presence-cookie headers, client-side access requirements
[POS]:    Edge layer - stateless route admission
[UPDATE]: When route classes, redirect targets, or cookie attributes change
*/

use serde::{Deserialize, Serialize};

use crate::types::{RouteClass, SessionSnapshot};

/// Route tables and redirect targets for the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub protected: Vec<String>,
    pub auth_entry: Vec<String>,
    pub oauth_callback: Vec<String>,
    /// Pages that need a linked wallet; enforced client-side only
    pub wallet_required: Vec<String>,
    pub login_path: String,
    pub home_path: String,
    pub cookie_name: String,
    /// Max-Age for the presence cookie
    pub cookie_max_age_secs: u64,
    pub secure_cookie: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            protected: vec!["/profile".to_string(), "/settings".to_string()],
            auth_entry: vec!["/login".to_string(), "/register".to_string()],
            oauth_callback: vec!["/auth/google-callback".to_string()],
            wallet_required: vec!["/create".to_string(), "/listings".to_string()],
            login_path: "/login".to_string(),
            home_path: "/".to_string(),
            cookie_name: "access_token".to_string(),
            cookie_max_age_secs: 7 * 24 * 60 * 60,
            secure_cookie: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { location: String },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    pub fn redirect_location(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Redirect { location } => Some(location),
        }
    }
}

/// Presence-only cookie shared between the session client and the gate.
///
/// The value is a flag, never the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    name: String,
    max_age_secs: u64,
    secure: bool,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, max_age_secs: u64, secure: bool) -> Self {
        Self {
            name: name.into(),
            max_age_secs,
            secure,
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(
            config.cookie_name.clone(),
            config.cookie_max_age_secs,
            config.secure_cookie,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Set-Cookie` value marking a persisted session.
    pub fn set_header(&self) -> String {
        let mut header = format!(
            "{}=1; Path=/; Max-Age={}; SameSite=Lax",
            self.name, self.max_age_secs
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }

    /// `Set-Cookie` value that removes the flag.
    pub fn clear_header(&self) -> String {
        let mut header = format!("{}=; Path=/; Max-Age=0; SameSite=Lax", self.name);
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }

    /// Whether a request `Cookie` header carries a non-empty session flag.
    pub fn is_present(&self, cookie_header: &str) -> bool {
        cookie_header.split(';').any(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next().unwrap_or_default().trim();
            let value = parts.next().unwrap_or_default().trim();
            name == self.name && !value.is_empty()
        })
    }
}

/// Client-side guard; backend session and wallet link compose independently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    pub backend_session: bool,
    pub wallet: bool,
}

impl AccessRequirement {
    pub fn is_met_by(&self, snapshot: &SessionSnapshot) -> bool {
        (!self.backend_session || snapshot.is_authenticated())
            && (!self.wallet || snapshot.has_wallet())
    }
}

impl SessionSnapshot {
    pub fn satisfies(&self, requirement: &AccessRequirement) -> bool {
        requirement.is_met_by(self)
    }
}

/// Per-request admission check. Only looks at cookie presence, never token validity.
#[derive(Debug, Clone)]
pub struct RouteGate {
    config: GateConfig,
    cookie: SessionCookie,
}

impl Default for RouteGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl RouteGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            cookie: SessionCookie::from_config(&config),
            config,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn cookie(&self) -> &SessionCookie {
        &self.cookie
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        let path = normalize_path(path);
        // Callback first: it must never bounce mid-flow
        if matches_any(path, &self.config.oauth_callback) {
            RouteClass::OAuthCallback
        } else if matches_any(path, &self.config.protected) {
            RouteClass::Protected
        } else if matches_any(path, &self.config.auth_entry) {
            RouteClass::AuthEntry
        } else {
            RouteClass::Public
        }
    }

    pub fn evaluate(&self, path: &str, cookie_present: bool) -> GateDecision {
        match (self.classify(path), cookie_present) {
            (RouteClass::Protected, false) => GateDecision::Redirect {
                location: self.config.login_path.clone(),
            },
            (RouteClass::AuthEntry, true) => GateDecision::Redirect {
                location: self.config.home_path.clone(),
            },
            _ => GateDecision::Allow,
        }
    }

    /// Same as [`RouteGate::evaluate`], reading presence from the raw `Cookie` header.
    pub fn evaluate_request(&self, path: &str, cookie_header: Option<&str>) -> GateDecision {
        let present = cookie_header.is_some_and(|header| self.cookie().is_present(header));
        self.evaluate(path, present)
    }

    /// What the page itself should verify once client code is running.
    pub fn requirement_for(&self, path: &str) -> AccessRequirement {
        let normalized = normalize_path(path);
        AccessRequirement {
            backend_session: self.classify(path) == RouteClass::Protected,
            wallet: matches_any(normalized, &self.config.wallet_required),
        }
    }
}

fn normalize_path(path: &str) -> &str {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    let path = &path[..end];
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(path, prefix))
}

/// Prefix match on whole path segments: `/profile` covers `/profile/edit`, not `/profiles`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    let prefix = normalize_path(prefix);
    if prefix == "/" {
        return path == "/";
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
