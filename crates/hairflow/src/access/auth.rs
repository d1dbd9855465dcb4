use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use tracing::info;

use super::route::{AppRoute, Role};
use super::session::{
    resolve_session, Credentials, Registration, SessionError, SessionProvider, SessionState,
    SessionToken, SignedInSession,
};

/// Result of a successful sign-in or sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthOutcome {
    #[serde(flatten)]
    pub session: SignedInSession,
    pub redirect: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email and password are required")]
    MissingCredentials,
    #[error("choose whether you're an agent or clinic staff")]
    RoleRequired,
    #[error(transparent)]
    Provider(#[from] SessionError),
}

/// Sign-in, sign-up and session lookup on top of a [`SessionProvider`].
pub struct AuthFlow {
    provider: Arc<dyn SessionProvider>,
}

impl AuthFlow {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self { provider }
    }

    pub async fn session(&self, headers: &HeaderMap) -> SessionState {
        resolve_session(self.provider.as_ref(), headers).await
    }

    pub async fn sign_in(&self, credentials: Credentials) -> Result<AuthOutcome, AuthError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let session = self.provider.sign_in(&credentials).await?;
        let redirect = session.identity.role.unwrap_or(Role::Agent).dashboard();
        info!(user_id = %session.identity.user_id, "staff member signed in");
        Ok(outcome(session, redirect))
    }

    /// Create an account. The role is checked before the provider is contacted.
    pub async fn sign_up(&self, registration: Registration) -> Result<AuthOutcome, AuthError> {
        let Some(role) = registration.role else {
            return Err(AuthError::RoleRequired);
        };
        if registration.email.trim().is_empty() || registration.password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        let session = self.provider.sign_up(&registration).await?;
        info!(user_id = %session.identity.user_id, ?role, "staff account created");
        Ok(outcome(session, role.dashboard()))
    }

    pub async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError> {
        self.provider.sign_out(token).await?;
        Ok(())
    }
}

fn outcome(session: SignedInSession, redirect: AppRoute) -> AuthOutcome {
    AuthOutcome {
        session,
        redirect: redirect.path(),
    }
}
