use serde::Serialize;

use super::route::{AppRoute, Role};
use super::session::SessionState;

/// What the routing boundary should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Render(AppRoute),
    Redirect(AppRoute),
    /// Session not resolved yet; show a loading view and retry.
    Pending,
}

impl Navigation {
    pub fn view(&self) -> NavigationView {
        match self {
            Navigation::Render(route) => NavigationView {
                outcome: "render",
                location: route.path(),
            },
            Navigation::Redirect(route) => NavigationView {
                outcome: "redirect",
                location: route.path(),
            },
            Navigation::Pending => NavigationView {
                outcome: "pending",
                location: String::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationView {
    pub outcome: &'static str,
    pub location: String,
}

/// Decide whether `route` can be shown for `session`.
pub fn guard(route: &AppRoute, session: &SessionState) -> Navigation {
    match (route, session) {
        (AppRoute::Landing | AppRoute::Intake(_), _) => Navigation::Render(route.clone()),
        (_, SessionState::Loading) => Navigation::Pending,
        (AppRoute::Auth, SessionState::SignedIn(identity)) => {
            Navigation::Redirect(identity.role.unwrap_or(Role::Agent).dashboard())
        }
        (AppRoute::Auth, SessionState::SignedOut) => Navigation::Render(AppRoute::Auth),
        (route, SessionState::SignedOut) if route.requires_identity() => {
            Navigation::Redirect(AppRoute::Auth)
        }
        (route, _) => Navigation::Render(route.clone()),
    }
}
