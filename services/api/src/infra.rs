use async_trait::async_trait;
use chrono::NaiveDate;
use hairflow::access::{
    Credentials, Identity, Registration, SessionError, SessionProvider, SessionToken,
    SignedInSession,
};
use hairflow::dashboards::{
    AgentPatient, AgentStage, ClinicPatient, ClinicStage, StaticPatientDirectory,
};
use hairflow::forms::{
    DispatchError, FormDispatcher, Invitation, StorageError, StorageProvider, StoredObject,
    UploadPayload,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) objects: Arc<InMemoryObjectStore>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SessionError> {
    mutex
        .lock()
        .map_err(|_| SessionError::Unavailable("session store mutex poisoned".to_string()))
}

/// Demo session backend: any non-blank credentials sign in, accounts are remembered by email.
#[derive(Default)]
pub(crate) struct InMemorySessionProvider {
    accounts: Mutex<HashMap<String, Identity>>,
    sessions: Mutex<HashMap<String, Identity>>,
}

impl InMemorySessionProvider {
    fn open_session(&self, identity: Identity) -> Result<SignedInSession, SessionError> {
        let token = Uuid::new_v4().simple().to_string();
        lock(&self.sessions)?.insert(token.clone(), identity.clone());
        Ok(SignedInSession {
            token: SessionToken(token),
            identity,
        })
    }
}

#[async_trait]
impl SessionProvider for InMemorySessionProvider {
    async fn resolve(&self, token: &SessionToken) -> Result<Option<Identity>, SessionError> {
        Ok(lock(&self.sessions)?.get(&token.0).cloned())
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<SignedInSession, SessionError> {
        let email = credentials.email.trim().to_lowercase();
        let identity = {
            let mut accounts = lock(&self.accounts)?;
            accounts
                .entry(email.clone())
                .or_insert_with(|| Identity {
                    user_id: Uuid::new_v4().to_string(),
                    email,
                    full_name: None,
                    role: None,
                })
                .clone()
        };
        self.open_session(identity)
    }

    async fn sign_up(&self, registration: &Registration) -> Result<SignedInSession, SessionError> {
        let email = registration.email.trim().to_lowercase();
        let identity = {
            let mut accounts = lock(&self.accounts)?;
            if accounts.contains_key(&email) {
                return Err(SessionError::EmailTaken(email));
            }
            let identity = Identity {
                user_id: Uuid::new_v4().to_string(),
                email: email.clone(),
                full_name: Some(registration.full_name.trim().to_string())
                    .filter(|name| !name.is_empty()),
                role: registration.role,
            };
            accounts.insert(email, identity.clone());
            identity
        };
        self.open_session(identity)
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), SessionError> {
        lock(&self.sessions)?.remove(&token.0);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoredFile {
    pub(crate) content_type: String,
    pub(crate) bytes: Vec<u8>,
}

/// Patient file bucket kept in memory and served back under `/storage/`.
pub(crate) struct InMemoryObjectStore {
    public_base: String,
    objects: Mutex<HashMap<String, StoredFile>>,
}

impl InMemoryObjectStore {
    pub(crate) fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, path: &str) -> Option<StoredFile> {
        self.objects
            .lock()
            .ok()
            .and_then(|objects| objects.get(path).cloned())
    }

    pub(crate) fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }
}

#[async_trait]
impl StorageProvider for InMemoryObjectStore {
    async fn upload(
        &self,
        path: &str,
        payload: UploadPayload,
    ) -> Result<StoredObject, StorageError> {
        let content_type = payload.content_type.unwrap_or_else(|| {
            mime_guess::from_path(&payload.file_name)
                .first_or_octet_stream()
                .to_string()
        });
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("object store mutex poisoned".to_string()))?;
        objects.insert(
            path.to_string(),
            StoredFile {
                content_type,
                bytes: payload.bytes,
            },
        );
        Ok(StoredObject {
            public_url: format!("{}/storage/{path}", self.public_base),
        })
    }
}

/// Dispatcher that only logs; no mail transport is wired up.
#[derive(Default)]
pub(crate) struct LoggingDispatcher;

impl FormDispatcher for LoggingDispatcher {
    fn dispatch(&self, invitation: &Invitation) -> Result<(), DispatchError> {
        for delivery in &invitation.deliveries {
            info!(
                template_id = %invitation.template_id,
                distribution_id = %delivery.distribution_id,
                email = %delivery.email,
                link = %delivery.link,
                "form invitation queued"
            );
        }
        Ok(())
    }
}

fn day(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or_default()
}

fn agent_patient(
    id: u32,
    name: &str,
    email: &str,
    clinic: &str,
    date: NaiveDate,
    stage: AgentStage,
) -> AgentPatient {
    AgentPatient {
        id,
        name: name.to_string(),
        email: email.to_string(),
        status: stage.badge().label.to_string(),
        clinic: clinic.to_string(),
        date,
        stage,
    }
}

fn clinic_patient(
    id: u32,
    name: &str,
    email: &str,
    agent: Option<&str>,
    date: NaiveDate,
    stage: ClinicStage,
) -> ClinicPatient {
    ClinicPatient {
        id,
        name: name.to_string(),
        email: email.to_string(),
        status: stage.badge().label.to_string(),
        agent: agent.map(str::to_string),
        date,
        stage,
    }
}

/// Sample patients shown on the dashboards until a real directory is connected.
pub(crate) fn demo_directory() -> StaticPatientDirectory {
    StaticPatientDirectory::new(
        vec![
            agent_patient(
                1,
                "John Smith",
                "john@example.com",
                "Istanbul Hair Center",
                day(2024, 1, 15),
                AgentStage::Sent,
            ),
            agent_patient(
                2,
                "Sarah Johnson",
                "sarah@example.com",
                "Turkey Hair Clinic",
                day(2024, 1, 14),
                AgentStage::Completed,
            ),
            agent_patient(
                3,
                "Mike Chen",
                "mike@example.com",
                "Elite Hair Restoration",
                day(2024, 1, 13),
                AgentStage::Pending,
            ),
        ],
        vec![
            clinic_patient(
                1,
                "David Wilson",
                "david@example.com",
                Some("Hair Solutions Agency"),
                day(2024, 1, 15),
                ClinicStage::NewReferral,
            ),
            clinic_patient(
                2,
                "Lisa Brown",
                "lisa@example.com",
                Some("Global Hair Partners"),
                day(2024, 1, 14),
                ClinicStage::UnderReview,
            ),
            clinic_patient(
                3,
                "Tom Anderson",
                "tom@example.com",
                Some("Hair Solutions Agency"),
                day(2024, 1, 13),
                ClinicStage::Scheduled,
            ),
            clinic_patient(
                4,
                "Emma Davis",
                "emma@example.com",
                None,
                day(2024, 1, 12),
                ClinicStage::Consultation,
            ),
            clinic_patient(
                5,
                "James Miller",
                "james@example.com",
                None,
                day(2024, 1, 11),
                ClinicStage::PlanReady,
            ),
        ],
    )
}
