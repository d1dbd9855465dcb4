use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::access::{
    AuthFlow, Credentials, Identity, Registration, Role, SessionError, SessionProvider,
    SessionToken, SignedInSession,
};
use crate::forms::domain::{Branding, FieldDefinition, FieldKind, FormTemplate, TemplateDraft, TemplateId};
use crate::forms::memory::{
    InMemoryDistributionRepository, InMemorySubmissionRepository, InMemoryTemplateRepository,
    RecordingDispatcher,
};
use crate::forms::repository::{
    DispatchError, FormDispatcher, IntakeSubmission, RepositoryError, SubmissionRepository,
    TemplateRepository,
};
use crate::forms::router::forms_router;
use crate::forms::service::{FormCollaborators, FormService, FormSettings};
use crate::forms::sharing::Invitation;
use crate::forms::uploads::{StorageError, StorageProvider, StoredObject, UploadPayload};

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
}

pub(super) fn settings() -> FormSettings {
    FormSettings {
        share_base_url: "https://forms.test".to_string(),
        ..FormSettings::default()
    }
}

pub(super) fn consultation_draft() -> TemplateDraft {
    TemplateDraft {
        id: None,
        name: "Hair Transplant Consultation".to_string(),
        description: "Initial consultation intake".to_string(),
        fields: vec![
            FieldDefinition::new("name", FieldKind::ShortText, "Full Name").required(),
            FieldDefinition::new("email", FieldKind::Email, "Email").required(),
            FieldDefinition::new("area", FieldKind::SingleSelect, "Area of concern")
                .with_options(["Crown", "Hairline", "Temples"]),
            FieldDefinition::new("history", FieldKind::LongText, "Hair loss history"),
            FieldDefinition::new("consent", FieldKind::Boolean, "I agree to be contacted"),
            FieldDefinition::new("photos", FieldKind::File, "Scalp photos"),
        ],
        branding: Branding::default(),
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryStorage {
    pub(super) paths: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn upload(&self, path: &str, _payload: UploadPayload) -> Result<StoredObject, StorageError> {
        self.paths.lock().expect("storage mutex poisoned").push(path.to_string());
        Ok(StoredObject {
            public_url: format!("https://cdn.test/{path}"),
        })
    }
}

pub(super) struct OfflineDispatcher;

impl FormDispatcher for OfflineDispatcher {
    fn dispatch(&self, _invitation: &Invitation) -> Result<(), DispatchError> {
        Err(DispatchError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableTemplates;

impl TemplateRepository for UnavailableTemplates {
    fn insert(&self, _template: FormTemplate) -> Result<FormTemplate, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _template: FormTemplate) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &TemplateId) -> Result<Option<FormTemplate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn delete(&self, _id: &TemplateId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) const STAFF_TOKEN: &str = "staff-token";

/// Knows exactly one signed-in coordinator, reachable through [`STAFF_TOKEN`].
pub(super) struct StaffSessions;

#[async_trait]
impl SessionProvider for StaffSessions {
    async fn resolve(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError> {
        Ok((token.0 == STAFF_TOKEN).then(|| Identity {
            user_id: "coordinator-1".to_string(),
            email: "coordinator@hairflow.test".to_string(),
            full_name: Some("Intake Coordinator".to_string()),
            role: Some(Role::Agent),
        }))
    }

    async fn sign_in(&self, _credentials: &Credentials) -> Result<SignedInSession, SessionError> {
        Err(SessionError::InvalidCredentials)
    }

    async fn sign_up(&self, _registration: &Registration) -> Result<SignedInSession, SessionError> {
        Err(SessionError::InvalidCredentials)
    }

    async fn sign_out(&self, _token: &SessionToken) -> Result<(), SessionError> {
        Ok(())
    }
}

pub(super) fn forms_app(service: Arc<FormService>) -> Router {
    forms_router(service, Arc::new(AuthFlow::new(Arc::new(StaffSessions))))
}

/// Request carrying the staff bearer token.
pub(super) fn staff(builder: axum::http::request::Builder) -> axum::http::request::Builder {
    builder.header(header::AUTHORIZATION, format!("Bearer {STAFF_TOKEN}"))
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    staff(Request::builder().method(method).uri(uri))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
        .expect("request")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    staff(Request::builder().method(method).uri(uri))
        .body(Body::empty())
        .expect("request")
}

pub(super) fn anonymous_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Submission store that can be switched offline.
#[derive(Default, Clone)]
pub(super) struct SwitchableSubmissions {
    pub(super) inner: InMemorySubmissionRepository,
    pub(super) offline: Arc<AtomicBool>,
}

impl SwitchableSubmissions {
    pub(super) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }
}

impl SubmissionRepository for SwitchableSubmissions {
    fn store(&self, submission: IntakeSubmission) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("submission store offline".to_string()));
        }
        self.inner.store(submission)
    }

    fn for_template(&self, id: &TemplateId) -> Result<Vec<IntakeSubmission>, RepositoryError> {
        self.inner.for_template(id)
    }
}

pub(super) struct Harness {
    pub(super) service: Arc<FormService>,
    pub(super) templates: InMemoryTemplateRepository,
    pub(super) distributions: InMemoryDistributionRepository,
    pub(super) submissions: SwitchableSubmissions,
    pub(super) dispatcher: RecordingDispatcher,
    pub(super) storage: MemoryStorage,
}

pub(super) fn build_service() -> Harness {
    build_service_with(settings())
}

pub(super) fn build_service_with(settings: FormSettings) -> Harness {
    let templates = InMemoryTemplateRepository::default();
    let distributions = InMemoryDistributionRepository::default();
    let submissions = SwitchableSubmissions::default();
    let dispatcher = RecordingDispatcher::default();
    let storage = MemoryStorage::default();
    let service = FormService::new(
        FormCollaborators {
            templates: Arc::new(templates.clone()),
            distributions: Arc::new(distributions.clone()),
            submissions: Arc::new(submissions.clone()),
            dispatcher: Arc::new(dispatcher.clone()),
            storage: Arc::new(storage.clone()),
        },
        settings,
    );
    Harness {
        service: Arc::new(service),
        templates,
        distributions,
        submissions,
        dispatcher,
        storage,
    }
}

pub(super) fn service_with_dispatcher(dispatcher: Arc<dyn FormDispatcher>) -> FormService {
    FormService::new(
        FormCollaborators {
            templates: Arc::new(InMemoryTemplateRepository::default()),
            distributions: Arc::new(InMemoryDistributionRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            dispatcher,
            storage: Arc::new(MemoryStorage::default()),
        },
        settings(),
    )
}

pub(super) fn service_with_storage(storage: Arc<dyn StorageProvider>) -> Arc<FormService> {
    Arc::new(FormService::new(
        FormCollaborators {
            templates: Arc::new(InMemoryTemplateRepository::default()),
            distributions: Arc::new(InMemoryDistributionRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            dispatcher: Arc::new(RecordingDispatcher::default()),
            storage,
        },
        settings(),
    ))
}

pub(super) fn service_with_templates(templates: Arc<dyn TemplateRepository>) -> FormService {
    FormService::new(
        FormCollaborators {
            templates,
            distributions: Arc::new(InMemoryDistributionRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            dispatcher: Arc::new(RecordingDispatcher::default()),
            storage: Arc::new(MemoryStorage::default()),
        },
        settings(),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
