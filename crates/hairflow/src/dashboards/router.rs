use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::agent::agent_dashboard;
use super::clinic::clinic_dashboard;
use super::directory::PatientDirectory;
use super::landing::landing_page;
use crate::access::{guard, AppRoute, AuthFlow, Identity, Navigation, Role, SessionState};
use crate::error::AppError;
use crate::forms::router::IntakeQuery;
use crate::forms::{FieldKind, FormService};

/// Collaborators the page routes read from.
#[derive(Clone)]
pub struct PageContext {
    pub auth: Arc<AuthFlow>,
    pub forms: Arc<FormService>,
    pub directory: Arc<dyn PatientDirectory>,
}

/// Router for the navigable pages. Each request resolves the session once and runs the guard.
pub fn pages_router(context: PageContext) -> Router {
    Router::new()
        .route("/", get(landing_handler))
        .route("/auth", get(auth_handler))
        .route("/agent/dashboard", get(agent_handler))
        .route("/clinic/dashboard", get(clinic_handler))
        .route("/forms", get(forms_handler))
        .route("/intake/:form_id", get(intake_handler))
        .with_state(context)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

/// Resolve the session and apply the guard, short-circuiting with a redirect or loading view.
async fn admit(
    context: &PageContext,
    route: AppRoute,
    headers: &HeaderMap,
) -> Result<SessionState, Response> {
    let session = context.auth.session(headers).await;
    match guard(&route, &session) {
        Navigation::Render(_) => Ok(session),
        Navigation::Redirect(target) => Err(Redirect::to(&target.path()).into_response()),
        Navigation::Pending => Err((
            StatusCode::ACCEPTED,
            Json(json!({ "state": "loading", "location": route.path() })),
        )
            .into_response()),
    }
}

fn signed_in(session: &SessionState) -> Result<&Identity, Response> {
    session
        .identity()
        .ok_or_else(|| Redirect::to(&AppRoute::Auth.path()).into_response())
}

type PageResult = Result<Response, AppError>;

pub(crate) async fn landing_handler() -> Response {
    (StatusCode::OK, Json(landing_page())).into_response()
}

pub(crate) async fn auth_handler(
    State(context): State<PageContext>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = admit(&context, AppRoute::Auth, &headers).await {
        return response;
    }
    let roles: Vec<_> = [Role::Agent, Role::Clinic]
        .into_iter()
        .map(|role| json!({ "value": role, "label": role.label() }))
        .collect();
    let payload = json!({
        "title": "HairFlow",
        "tabs": ["sign_in", "sign_up"],
        "roles": roles,
        "sign_in": "/api/v1/auth/sign-in",
        "sign_up": "/api/v1/auth/sign-up",
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn agent_handler(
    State(context): State<PageContext>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> PageResult {
    let session = match admit(&context, AppRoute::AgentDashboard, &headers).await {
        Ok(session) => session,
        Err(response) => return Ok(response),
    };
    let identity = match signed_in(&session) {
        Ok(identity) => identity,
        Err(response) => return Ok(response),
    };

    let patients = context.directory.agent_patients(identity)?;
    let active_forms = context.forms.portfolio_summary()?.total_forms;

    let dashboard = agent_dashboard(identity, patients, active_forms, query.q.as_deref());
    Ok((StatusCode::OK, Json(dashboard)).into_response())
}

pub(crate) async fn clinic_handler(
    State(context): State<PageContext>,
    headers: HeaderMap,
) -> PageResult {
    let session = match admit(&context, AppRoute::ClinicDashboard, &headers).await {
        Ok(session) => session,
        Err(response) => return Ok(response),
    };
    let identity = match signed_in(&session) {
        Ok(identity) => identity,
        Err(response) => return Ok(response),
    };

    let patients = context.directory.clinic_patients(identity)?;
    let dashboard = clinic_dashboard(identity, patients, Utc::now().date_naive());
    Ok((StatusCode::OK, Json(dashboard)).into_response())
}

pub(crate) async fn forms_handler(
    State(context): State<PageContext>,
    Query(query): Query<SearchQuery>,
    headers: HeaderMap,
) -> PageResult {
    if let Err(response) = admit(&context, AppRoute::Forms, &headers).await {
        return Ok(response);
    }

    let templates = context.forms.list_templates(query.q.as_deref())?;
    let summary = context.forms.portfolio_summary()?;
    let kinds: Vec<_> = FieldKind::ALL
        .into_iter()
        .map(|kind| json!({ "kind": kind, "label": kind.label() }))
        .collect();
    let payload = json!({
        "summary": summary,
        "templates": templates,
        "field_kinds": kinds,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

/// Public landing view of a shared form. Sessions are opened by the intake API, not here.
pub(crate) async fn intake_handler(
    State(context): State<PageContext>,
    Path(form_id): Path<String>,
    Query(query): Query<IntakeQuery>,
    headers: HeaderMap,
) -> PageResult {
    if let Err(response) = admit(&context, AppRoute::Intake(form_id.clone()), &headers).await {
        return Ok(response);
    }

    let landing = context
        .forms
        .open_form(&form_id, query.distribution_id(), Utc::now())?;
    Ok((StatusCode::OK, Json(landing)).into_response())
}
