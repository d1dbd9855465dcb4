use std::fmt;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use super::route::Role;

/// Cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "hairflow_session";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signed-in staff member as reported by the session provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Authentication state resolved once per request and handed to views explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            SessionState::Loading | SessionState::SignedOut => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedInSession {
    pub token: SessionToken,
    pub identity: Identity,
}

/// External identity service. Implementations own token issuance and lookup.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn resolve(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError>;
    async fn sign_in(&self, credentials: &Credentials) -> Result<SignedInSession, SessionError>;
    async fn sign_up(&self, registration: &Registration) -> Result<SignedInSession, SessionError>;
    async fn sign_out(&self, token: &SessionToken) -> Result<(), SessionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("email or password is incorrect")]
    InvalidCredentials,
    #[error("an account already exists for {0}")]
    EmailTaken(String),
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Read the session token from the session cookie, falling back to a bearer token.
pub fn session_token_from_headers(headers: &HeaderMap) -> Option<SessionToken> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string());

    let token = from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|value| value.trim().to_string())
    })?;

    (!token.is_empty()).then_some(SessionToken(token))
}

/// Resolve the request's session. An unreachable provider leaves the session loading.
pub async fn resolve_session(provider: &dyn SessionProvider, headers: &HeaderMap) -> SessionState {
    let Some(token) = session_token_from_headers(headers) else {
        return SessionState::SignedOut;
    };
    match provider.resolve(&token).await {
        Ok(Some(identity)) => SessionState::SignedIn(identity),
        Ok(None) => SessionState::SignedOut,
        Err(SessionError::Unavailable(reason)) => {
            tracing::warn!(%reason, "session provider unavailable");
            SessionState::Loading
        }
        Err(_) => SessionState::SignedOut,
    }
}

/// `Set-Cookie` value that stores the token for browser clients.
pub fn session_cookie(token: &SessionToken) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn cleared_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}
