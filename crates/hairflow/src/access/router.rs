use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use super::auth::{AuthError, AuthFlow, AuthOutcome};
use super::session::{
    cleared_session_cookie, session_cookie, session_token_from_headers, Credentials,
    Registration, SessionError,
};

/// Router exposing sign-in, sign-up, sign-out and the current session.
pub fn access_router(flow: Arc<AuthFlow>) -> Router {
    Router::new()
        .route("/api/v1/auth/session", get(session_handler))
        .route("/api/v1/auth/sign-in", post(sign_in_handler))
        .route("/api/v1/auth/sign-up", post(sign_up_handler))
        .route("/api/v1/auth/sign-out", post(sign_out_handler))
        .with_state(flow)
}

pub(crate) async fn session_handler(
    State(flow): State<Arc<AuthFlow>>,
    headers: HeaderMap,
) -> Response {
    let session = flow.session(&headers).await;
    (StatusCode::OK, Json(session)).into_response()
}

pub(crate) async fn sign_in_handler(
    State(flow): State<Arc<AuthFlow>>,
    Json(credentials): Json<Credentials>,
) -> Response {
    match flow.sign_in(credentials).await {
        Ok(outcome) => signed_in_response(StatusCode::OK, outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn sign_up_handler(
    State(flow): State<Arc<AuthFlow>>,
    Json(registration): Json<Registration>,
) -> Response {
    match flow.sign_up(registration).await {
        Ok(outcome) => signed_in_response(StatusCode::CREATED, outcome),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn sign_out_handler(
    State(flow): State<Arc<AuthFlow>>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = session_token_from_headers(&headers) {
        if let Err(err) = flow.sign_out(&token).await {
            return error_response(err);
        }
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, cleared_session_cookie())],
    )
        .into_response()
}

fn signed_in_response(status: StatusCode, outcome: AuthOutcome) -> Response {
    let cookie = session_cookie(&outcome.session.token);
    (status, [(header::SET_COOKIE, cookie)], Json(outcome)).into_response()
}

fn error_response(err: AuthError) -> Response {
    let status = match &err {
        AuthError::MissingCredentials | AuthError::RoleRequired => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Provider(SessionError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
        AuthError::Provider(SessionError::EmailTaken(_)) => StatusCode::CONFLICT,
        AuthError::Provider(SessionError::Unavailable(_)) => StatusCode::BAD_GATEWAY,
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
