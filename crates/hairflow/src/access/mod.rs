//! Staff authentication and page-level access control.
//!
//! The session is resolved once at the routing boundary through a [`SessionProvider`] and the
//! resulting [`SessionState`] is passed to [`guard`] and the views explicitly. Staff JSON APIs
//! sit behind [`require_identity`], which answers 401 for anonymous callers.

pub mod auth;
pub mod guard;
pub mod middleware;
pub mod route;
pub mod router;
pub mod session;

pub use auth::{AuthError, AuthFlow, AuthOutcome};
pub use guard::{guard, Navigation, NavigationView};
pub use middleware::require_identity;
pub use route::{AppRoute, Role};
pub use router::access_router;
pub use session::{
    cleared_session_cookie, resolve_session, session_cookie, session_token_from_headers,
    Credentials, Identity, Registration, SessionError, SessionProvider, SessionState,
    SessionToken, SignedInSession, SESSION_COOKIE,
};
