use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::builder::FormBuilder;
use crate::access::{require_identity, AuthFlow};
use super::domain::{FieldId, FieldKind, TemplateDraft, TemplateId};
use super::renderer::{AnswerValue, RendererError};
use super::repository::RepositoryError;
use super::service::{FormService, FormServiceError, IntakeSessionId, SendRequest};
use super::sharing::DistributionId;
use super::uploads::{UploadError, UploadKind, UploadPayload};

/// Router exposing template management, sharing and respondent intake sessions.
///
/// Template and distribution routes require a signed-in staff session; the intake routes a
/// patient reaches from a share link stay public.
pub fn forms_router(service: Arc<FormService>, auth: Arc<AuthFlow>) -> Router {
    staff_routes(auth).merge(intake_routes()).with_state(service)
}

fn staff_routes(auth: Arc<AuthFlow>) -> Router<Arc<FormService>> {
    Router::new()
        .route("/api/v1/forms", get(list_handler).post(save_handler))
        .route("/api/v1/forms/new", get(new_draft_handler))
        .route("/api/v1/forms/preview", post(preview_handler))
        .route(
            "/api/v1/forms/:template_id",
            get(template_handler).delete(delete_handler),
        )
        .route("/api/v1/forms/:template_id/draft", get(edit_draft_handler))
        .route("/api/v1/forms/:template_id/share", get(share_handler))
        .route("/api/v1/forms/:template_id/send", post(send_handler))
        .route(
            "/api/v1/forms/:template_id/submissions",
            get(submissions_handler),
        )
        .route("/api/v1/distributions/expire", post(expire_handler))
        .route_layer(middleware::from_fn_with_state(auth, require_identity))
}

fn intake_routes() -> Router<Arc<FormService>> {
    Router::new()
        .route("/api/v1/intake/:form_id", get(open_form_handler))
        .route("/api/v1/intake/:form_id/sessions", post(start_intake_handler))
        .route("/api/v1/intake-sessions/:session_id", get(intake_view_handler))
        .route(
            "/api/v1/intake-sessions/:session_id/answers/:field_id",
            put(answer_handler),
        )
        .route("/api/v1/intake-sessions/:session_id/next", post(next_handler))
        .route(
            "/api/v1/intake-sessions/:session_id/previous",
            post(previous_handler),
        )
        .route(
            "/api/v1/intake-sessions/:session_id/uploads/:field_id",
            post(upload_handler),
        )
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IntakeQuery {
    #[serde(default)]
    invite: Option<String>,
}

impl IntakeQuery {
    pub(crate) fn distribution_id(self) -> Option<DistributionId> {
        self.invite
            .filter(|invite| !invite.trim().is_empty())
            .map(DistributionId)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadQuery {
    kind: String,
    filename: String,
}

#[derive(Debug, Serialize)]
struct FieldKindOption {
    kind: FieldKind,
    label: &'static str,
}

pub(crate) async fn list_handler(
    State(service): State<Arc<FormService>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let listing = service
        .list_templates(query.q.as_deref())
        .and_then(|templates| Ok((templates, service.portfolio_summary()?)));
    match listing {
        Ok((templates, summary)) => {
            let payload = json!({
                "summary": summary,
                "templates": templates,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_handler(
    State(service): State<Arc<FormService>>,
    Json(draft): Json<TemplateDraft>,
) -> Response {
    match service.save_template(draft, Utc::now()) {
        Ok(saved) if saved.created => (StatusCode::CREATED, Json(saved.template)).into_response(),
        Ok(saved) => (StatusCode::OK, Json(saved.template)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn new_draft_handler() -> Response {
    let kinds: Vec<FieldKindOption> = FieldKind::ALL
        .into_iter()
        .map(|kind| FieldKindOption {
            kind,
            label: kind.label(),
        })
        .collect();
    let payload = json!({
        "draft": FormBuilder::new().into_draft(),
        "field_kinds": kinds,
    });
    (StatusCode::OK, Json(payload)).into_response()
}

pub(crate) async fn preview_handler(
    State(service): State<Arc<FormService>>,
    Json(draft): Json<TemplateDraft>,
) -> Response {
    let view = service.preview(&draft, Utc::now());
    (StatusCode::OK, Json(view)).into_response()
}

pub(crate) async fn template_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
) -> Response {
    match service.get_template(&TemplateId(template_id)) {
        Ok(template) => (StatusCode::OK, Json(template)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn edit_draft_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
) -> Response {
    match service.get_template(&TemplateId(template_id)) {
        Ok(template) => {
            let draft = FormBuilder::editing(&template).into_draft();
            (StatusCode::OK, Json(draft)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn delete_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
) -> Response {
    match service.delete_template(&TemplateId(template_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn share_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
) -> Response {
    match service.share_panel(&TemplateId(template_id)) {
        Ok(panel) => (StatusCode::OK, Json(panel)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn send_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
    Json(request): Json<SendRequest>,
) -> Response {
    match service.send_form(&TemplateId(template_id), request, Utc::now()) {
        Ok(receipt) => (StatusCode::ACCEPTED, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submissions_handler(
    State(service): State<Arc<FormService>>,
    Path(template_id): Path<String>,
) -> Response {
    match service.submissions(&TemplateId(template_id)) {
        Ok(submissions) => (StatusCode::OK, Json(submissions)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn expire_handler(State(service): State<Arc<FormService>>) -> Response {
    match service.expire_overdue(Utc::now()) {
        Ok(expired) => (StatusCode::OK, Json(json!({ "expired": expired }))).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn open_form_handler(
    State(service): State<Arc<FormService>>,
    Path(form_id): Path<String>,
    Query(query): Query<IntakeQuery>,
) -> Response {
    match service.open_form(&form_id, query.distribution_id(), Utc::now()) {
        Ok(landing) => (StatusCode::OK, Json(landing)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn start_intake_handler(
    State(service): State<Arc<FormService>>,
    Path(form_id): Path<String>,
    Query(query): Query<IntakeQuery>,
) -> Response {
    match service.start_intake(&form_id, query.distribution_id(), Utc::now()) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn intake_view_handler(
    State(service): State<Arc<FormService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.intake_view(&IntakeSessionId(session_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn answer_handler(
    State(service): State<Arc<FormService>>,
    Path((session_id, field_id)): Path<(String, String)>,
    Json(value): Json<AnswerValue>,
) -> Response {
    match service.record_answer(&IntakeSessionId(session_id), &FieldId(field_id), value) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn next_handler(
    State(service): State<Arc<FormService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.advance(&IntakeSessionId(session_id), Utc::now()) {
        Ok(step) => (StatusCode::OK, Json(step)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn previous_handler(
    State(service): State<Arc<FormService>>,
    Path(session_id): Path<String>,
) -> Response {
    match service.retreat(&IntakeSessionId(session_id)) {
        Ok(step) => (StatusCode::OK, Json(step)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn upload_handler(
    State(service): State<Arc<FormService>>,
    Path((session_id, field_id)): Path<(String, String)>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(kind) = UploadKind::parse(&query.kind) else {
        let payload = json!({
            "error": format!("unknown upload kind '{}'", query.kind),
        });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    };
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let payload = UploadPayload {
        file_name: query.filename,
        content_type,
        bytes: body.to_vec(),
    };

    match service
        .upload_files(
            &IntakeSessionId(session_id),
            &FieldId(field_id),
            kind,
            vec![payload],
        )
        .await
    {
        Ok(files) => (StatusCode::CREATED, Json(files)).into_response(),
        Err(err) => error_response(err),
    }
}

impl IntoResponse for FormServiceError {
    fn into_response(self) -> Response {
        error_response(self)
    }
}

pub(crate) fn error_response(err: FormServiceError) -> Response {
    let status = match &err {
        FormServiceError::InvalidField(_)
        | FormServiceError::NoRecipients
        | FormServiceError::Renderer(RendererError::UnknownField(_))
        | FormServiceError::Renderer(RendererError::KindMismatch { .. })
        | FormServiceError::Upload(UploadError::Empty)
        | FormServiceError::Upload(UploadError::InvalidFileName) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        FormServiceError::Repository(RepositoryError::NotFound)
        | FormServiceError::SessionNotFound => StatusCode::NOT_FOUND,
        FormServiceError::Repository(RepositoryError::Conflict)
        | FormServiceError::Renderer(RendererError::AlreadySubmitted)
        | FormServiceError::Upload(UploadError::InProgress)
        | FormServiceError::Status(_) => StatusCode::CONFLICT,
        FormServiceError::InvitationExpired(_) => StatusCode::GONE,
        FormServiceError::Upload(UploadError::TimedOut { .. }) => StatusCode::GATEWAY_TIMEOUT,
        FormServiceError::Dispatch(_) | FormServiceError::Upload(UploadError::Storage(_)) => {
            StatusCode::BAD_GATEWAY
        }
        FormServiceError::SessionLimit => StatusCode::SERVICE_UNAVAILABLE,
        FormServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
