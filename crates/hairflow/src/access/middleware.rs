use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::debug;

use super::auth::AuthFlow;
use super::session::SessionState;

/// Admit only signed-in staff. The resolved [`Identity`](super::Identity) is inserted into the
/// request extensions for the handler.
pub async fn require_identity(
    State(flow): State<Arc<AuthFlow>>,
    mut request: Request,
    next: Next,
) -> Response {
    match flow.session(request.headers()).await {
        SessionState::SignedIn(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        SessionState::SignedOut => {
            debug!(path = %request.uri().path(), "anonymous request refused");
            rejection(StatusCode::UNAUTHORIZED, "sign in to manage intake forms")
        }
        SessionState::Loading => rejection(
            StatusCode::SERVICE_UNAVAILABLE,
            "session provider unavailable, try again shortly",
        ),
    }
}

fn rejection(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
