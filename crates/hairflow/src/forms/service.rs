use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{
    share_url, FieldDefinition, FieldDefinitionError, FieldId, FieldKind, FormTemplate,
    TemplateDraft, TemplateId, TemplateStats,
};
use super::renderer::{
    AnswerSet, AnswerValue, FormRenderer, PageTransition, RenderView, RendererError,
    SubmissionHandler,
};
use super::repository::{
    DispatchError, DistributionRepository, FormDispatcher, IntakeSubmission, RepositoryError,
    SubmissionRepository, TemplateRepository,
};
use super::sharing::{
    invitation_link, parse_recipients, DistributionId, DistributionRecord, DistributionStatus,
    Invitation, InvitationDelivery, Recipient, SendReceipt, SharePanel, StatusTransitionError,
    DEFAULT_INVITATION_MESSAGE,
};
use super::uploads::{
    FileReference, IntakeUploader, StorageProvider, UploadError, UploadGate, UploadKind,
    UploadPayload,
};
use crate::config::FormsConfig;

static TEMPLATE_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static DISTRIBUTION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_template_id() -> (TemplateId, u64) {
    let id = TEMPLATE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (TemplateId(format!("tpl-{id:06}")), id)
}

fn next_distribution_id() -> DistributionId {
    let id = DISTRIBUTION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    DistributionId(format!("dist-{id:06}"))
}

/// Tunables the service reads from [`FormsConfig`].
#[derive(Debug, Clone)]
pub struct FormSettings {
    pub share_base_url: String,
    pub invite_ttl: Duration,
    pub upload_timeout: std::time::Duration,
    /// Idle time after which an unfinished intake session is dropped.
    pub session_ttl: Duration,
    pub max_sessions: usize,
}

impl FormSettings {
    pub fn from_config(config: &FormsConfig) -> Self {
        Self {
            share_base_url: config.share_base_url.clone(),
            invite_ttl: Duration::days(i64::from(config.invite_ttl_days)),
            upload_timeout: config.upload_timeout,
            session_ttl: Duration::from_std(config.session_ttl)
                .unwrap_or_else(|_| Duration::days(1)),
            max_sessions: config.max_intake_sessions,
        }
    }
}

impl Default for FormSettings {
    fn default() -> Self {
        Self::from_config(&FormsConfig::default())
    }
}

/// External systems the forms service depends on.
#[derive(Clone)]
pub struct FormCollaborators {
    pub templates: Arc<dyn TemplateRepository>,
    pub distributions: Arc<dyn DistributionRepository>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub dispatcher: Arc<dyn FormDispatcher>,
    pub storage: Arc<dyn StorageProvider>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntakeSessionId(pub String);

impl IntakeSessionId {
    fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for IntakeSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the frozen answers until the service persists them.
#[derive(Debug, Default)]
struct SubmissionCapture {
    captured: Option<AnswerSet>,
}

impl SubmissionHandler for SubmissionCapture {
    fn on_submit(&mut self, _template: &FormTemplate, answers: &AnswerSet) {
        self.captured = Some(answers.clone());
    }
}

struct IntakeSession {
    renderer: FormRenderer<SubmissionCapture>,
    gate: Arc<UploadGate>,
    invite: Option<DistributionId>,
    /// Frozen answers that have not reached the submission repository yet.
    pending: Option<IntakeSubmission>,
    touched_at: DateTime<Utc>,
}

impl IntakeSession {
    fn is_idle(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        !self.gate.is_uploading() && now - self.touched_at >= ttl
    }

    /// Turn the renderer's captured answers into a pending submission, once.
    fn capture_pending(&mut self, now: DateTime<Utc>) {
        if let Some(answers) = self.renderer.handler_mut().captured.take() {
            self.pending = Some(IntakeSubmission {
                template_id: self.renderer.template().id.clone(),
                distribution_id: self.invite.clone(),
                answers,
                submitted_at: now,
            });
        }
    }

    fn view(&self, id: &IntakeSessionId) -> IntakeSessionView {
        IntakeSessionView {
            session_id: id.clone(),
            distribution_id: self.invite.clone(),
            uploading: self.gate.is_uploading(),
            render: self.renderer.view(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeSessionView {
    pub session_id: IntakeSessionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<DistributionId>,
    pub uploading: bool,
    #[serde(flatten)]
    pub render: RenderView,
}

/// Public landing view of a shared form. Opening it does not start a session.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeLanding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<DistributionId>,
    #[serde(flatten)]
    pub render: RenderView,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntakeStep {
    pub transition: PageTransition,
    pub session: IntakeSessionView,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedTemplate {
    pub template: FormTemplate,
    pub created: bool,
}

/// Headline numbers across every template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PortfolioSummary {
    pub total_forms: usize,
    pub total_sent: u64,
    pub total_completed: u64,
    pub average_completion_rate: u8,
}

impl PortfolioSummary {
    pub fn from_templates(templates: &[FormTemplate]) -> Self {
        if templates.is_empty() {
            return Self::default();
        }
        let rate_sum: u32 = templates
            .iter()
            .map(|template| u32::from(template.stats.completion_rate))
            .sum();
        let average = (f64::from(rate_sum) / templates.len() as f64).round();
        Self {
            total_forms: templates.len(),
            total_sent: templates
                .iter()
                .map(|template| u64::from(template.stats.sent))
                .sum(),
            total_completed: templates
                .iter()
                .map(|template| u64::from(template.stats.completed))
                .sum(),
            average_completion_rate: average.clamp(0.0, 100.0) as u8,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendRequest {
    /// Comma separated e-mail addresses.
    pub recipients: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Template lifecycle, distribution and intake sessions over the repository collaborators.
pub struct FormService {
    templates: Arc<dyn TemplateRepository>,
    distributions: Arc<dyn DistributionRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    dispatcher: Arc<dyn FormDispatcher>,
    uploader: IntakeUploader,
    settings: FormSettings,
    sessions: Mutex<HashMap<IntakeSessionId, IntakeSession>>,
}

impl FormService {
    pub fn new(collaborators: FormCollaborators, settings: FormSettings) -> Self {
        let uploader = IntakeUploader::new(collaborators.storage, settings.upload_timeout);
        Self {
            templates: collaborators.templates,
            distributions: collaborators.distributions,
            submissions: collaborators.submissions,
            dispatcher: collaborators.dispatcher,
            uploader,
            settings,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &FormSettings {
        &self.settings
    }

    /// Templates in creation order, filtered by a case-insensitive name/description query.
    pub fn list_templates(&self, query: Option<&str>) -> Result<Vec<FormTemplate>, FormServiceError> {
        let templates = self.templates.list()?;
        Ok(match query {
            Some(query) => templates
                .into_iter()
                .filter(|template| template.matches_query(query))
                .collect(),
            None => templates,
        })
    }

    pub fn portfolio_summary(&self) -> Result<PortfolioSummary, FormServiceError> {
        Ok(PortfolioSummary::from_templates(&self.templates.list()?))
    }

    pub fn get_template(&self, id: &TemplateId) -> Result<FormTemplate, FormServiceError> {
        let template = self.templates.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        Ok(template)
    }

    /// Persist a builder draft: create when it has no id, otherwise replace the stored content.
    pub fn save_template(
        &self,
        draft: TemplateDraft,
        now: DateTime<Utc>,
    ) -> Result<SavedTemplate, FormServiceError> {
        let fields = normalize_fields(draft.fields)?;

        match draft.id {
            None => {
                let (id, sequence) = next_template_id();
                let template = FormTemplate {
                    share_url: share_url(
                        &self.settings.share_base_url,
                        &draft.name,
                        &sequence.to_string(),
                    ),
                    id,
                    name: draft.name,
                    description: draft.description,
                    fields,
                    branding: draft.branding,
                    created_at: now,
                    updated_at: now,
                    stats: TemplateStats::default(),
                };
                let stored = self.templates.insert(template)?;
                info!(template_id = %stored.id, fields = stored.fields.len(), "form template created");
                Ok(SavedTemplate {
                    template: stored,
                    created: true,
                })
            }
            Some(id) => {
                let mut template = self.get_template(&id)?;
                template.name = draft.name;
                template.description = draft.description;
                template.fields = fields;
                template.branding = draft.branding;
                template.updated_at = now;
                self.templates.update(template.clone())?;
                info!(template_id = %template.id, fields = template.fields.len(), "form template updated");
                Ok(SavedTemplate {
                    template,
                    created: false,
                })
            }
        }
    }

    /// Remove a template along with every distribution record that points at it.
    pub fn delete_template(&self, id: &TemplateId) -> Result<(), FormServiceError> {
        self.templates.delete(id)?;
        let removed = self.distributions.delete_for_template(id)?;
        info!(template_id = %id, distributions = removed, "form template deleted");
        Ok(())
    }

    /// Render a draft without persisting it. Submitting a preview goes nowhere.
    pub fn preview(&self, draft: &TemplateDraft, now: DateTime<Utc>) -> RenderView {
        FormRenderer::new(draft.preview_template(now), |_: &FormTemplate, _: &AnswerSet| {})
            .view()
    }

    pub fn share_panel(&self, id: &TemplateId) -> Result<SharePanel, FormServiceError> {
        let template = self.get_template(id)?;
        let records = self.distributions.for_template(id)?;
        Ok(SharePanel::build(&template, &records))
    }

    /// Send a template to a comma separated recipient list.
    pub fn send_form(
        &self,
        id: &TemplateId,
        request: SendRequest,
        now: DateTime<Utc>,
    ) -> Result<SendReceipt, FormServiceError> {
        let emails = parse_recipients(&request.recipients);
        if emails.is_empty() {
            return Err(FormServiceError::NoRecipients);
        }

        let mut template = self.get_template(id)?;
        let records: Vec<DistributionRecord> = emails
            .into_iter()
            .map(|email| {
                DistributionRecord::sent(
                    next_distribution_id(),
                    template.id.clone(),
                    Recipient { email, name: None },
                    now,
                    self.settings.invite_ttl,
                )
            })
            .collect();

        let message = request
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_INVITATION_MESSAGE.to_string());
        let invitation = Invitation {
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            message,
            deliveries: records
                .iter()
                .map(|record| InvitationDelivery {
                    distribution_id: record.id.clone(),
                    email: record.recipient.email.clone(),
                    link: invitation_link(&template.share_url, &record.id),
                })
                .collect(),
        };
        self.dispatcher.dispatch(&invitation)?;

        for record in &records {
            self.distributions.insert(record.clone())?;
        }
        let count = u32::try_from(records.len()).unwrap_or(u32::MAX);
        template.stats.record_sent(count);
        self.templates.update(template.clone())?;

        info!(template_id = %template.id, recipients = records.len(), "intake form sent");
        Ok(SendReceipt {
            template_id: template.id,
            recipient_count: records.len(),
            distribution_ids: records.into_iter().map(|record| record.id).collect(),
        })
    }

    /// Mark every open distribution past its expiry as expired. Returns how many changed.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Result<usize, FormServiceError> {
        let mut expired = 0;
        for mut record in self.distributions.all()? {
            if !record.is_overdue(now) {
                continue;
            }
            record.transition(DistributionStatus::Expired)?;
            self.distributions.update(record)?;
            expired += 1;
        }
        if expired > 0 {
            info!(expired, "overdue distributions expired");
        }
        Ok(expired)
    }

    /// Resolve a form reference from a share link: a template id or the `{slug}-{suffix}` tail.
    pub fn resolve_form(&self, form_ref: &str) -> Result<FormTemplate, FormServiceError> {
        let id = TemplateId(form_ref.to_string());
        if let Some(template) = self.templates.fetch(&id)? {
            return Ok(template);
        }
        let tail = format!("/intake/{form_ref}");
        let template = self
            .templates
            .list()?
            .into_iter()
            .find(|template| template.share_url.ends_with(&tail))
            .ok_or(RepositoryError::NotFound)?;
        Ok(template)
    }

    pub fn submissions(&self, id: &TemplateId) -> Result<Vec<IntakeSubmission>, FormServiceError> {
        Ok(self.submissions.for_template(id)?)
    }

    /// Render a shared form for its landing page. A personal invitation is marked opened.
    pub fn open_form(
        &self,
        form_ref: &str,
        invite: Option<DistributionId>,
        now: DateTime<Utc>,
    ) -> Result<IntakeLanding, FormServiceError> {
        let template = self.resolve_form(form_ref)?;
        let distribution_id = match invite {
            Some(distribution_id) => self.open_invitation(&template, distribution_id, now)?,
            None => None,
        };
        let render = FormRenderer::new(template, SubmissionCapture::default()).view();
        Ok(IntakeLanding {
            distribution_id,
            render,
        })
    }

    /// Open a render session for a shared form. A personal invitation marks its record opened.
    ///
    /// Idle sessions are evicted first; when the live count is still at the limit the call is
    /// refused with [`FormServiceError::SessionLimit`].
    pub fn start_intake(
        &self,
        form_ref: &str,
        invite: Option<DistributionId>,
        now: DateTime<Utc>,
    ) -> Result<IntakeSessionView, FormServiceError> {
        let template = self.resolve_form(form_ref)?;
        let invite = match invite {
            Some(distribution_id) => self.open_invitation(&template, distribution_id, now)?,
            None => None,
        };

        let session_id = IntakeSessionId::generate();
        let session = IntakeSession {
            renderer: FormRenderer::new(template, SubmissionCapture::default()),
            gate: Arc::new(UploadGate::default()),
            invite,
            pending: None,
            touched_at: now,
        };
        let view = session.view(&session_id);

        let mut sessions = self.lock_sessions()?;
        self.evict_idle(&mut sessions, now);
        if sessions.len() >= self.settings.max_sessions {
            warn!(live = sessions.len(), "intake session limit reached");
            return Err(FormServiceError::SessionLimit);
        }
        sessions.insert(session_id.clone(), session);
        drop(sessions);

        info!(%session_id, template_id = %view.render.template_id, "intake session started");
        Ok(view)
    }

    pub fn live_sessions(&self) -> Result<usize, FormServiceError> {
        Ok(self.lock_sessions()?.len())
    }

    pub fn intake_view(&self, session_id: &IntakeSessionId) -> Result<IntakeSessionView, FormServiceError> {
        self.with_session(session_id, |session| Ok(session.view(session_id)))
    }

    pub fn record_answer(
        &self,
        session_id: &IntakeSessionId,
        field_id: &FieldId,
        value: AnswerValue,
    ) -> Result<IntakeSessionView, FormServiceError> {
        self.with_session(session_id, |session| {
            session.renderer.record_answer(field_id, value)?;
            Ok(session.view(session_id))
        })
    }

    /// Move to the next page; on the last page this submits and persists the answers.
    ///
    /// The session is dropped once its submission is stored. A failed store keeps the frozen
    /// answers on the session so calling `advance` again retries the store.
    pub fn advance(
        &self,
        session_id: &IntakeSessionId,
        now: DateTime<Utc>,
    ) -> Result<IntakeStep, FormServiceError> {
        let (step, submission) = self.with_session(session_id, |session| {
            session.touched_at = now;
            let retrying = session.pending.is_some();
            if !retrying
                && !session.renderer.is_submitted()
                && session.renderer.is_last_page()
                && session.gate.is_uploading()
            {
                return Err(UploadError::InProgress.into());
            }

            let transition = if retrying {
                PageTransition::Submitted
            } else {
                session.renderer.next()
            };
            session.capture_pending(now);
            let step = IntakeStep {
                transition,
                session: session.view(session_id),
            };
            Ok((step, session.pending.take()))
        })?;

        let Some(submission) = submission else {
            return Ok(step);
        };
        if let Err(err) = self.submissions.store(submission.clone()) {
            warn!(%session_id, error = %err, "intake submission not stored; kept for retry");
            let restored = self.with_session(session_id, |session| {
                session.pending = Some(submission);
                Ok(())
            });
            if restored.is_err() {
                warn!(%session_id, "intake session vanished before its submission was stored");
            }
            return Err(err.into());
        }

        self.lock_sessions()?.remove(session_id);
        if let Err(err) = self.record_submission(&submission) {
            warn!(%session_id, error = %err, "submission stored but bookkeeping failed");
        }
        info!(
            template_id = %submission.template_id,
            distribution_id = ?submission.distribution_id,
            "intake form submitted"
        );
        Ok(step)
    }

    pub fn retreat(&self, session_id: &IntakeSessionId) -> Result<IntakeStep, FormServiceError> {
        self.with_session(session_id, |session| {
            let transition = session.renderer.previous();
            Ok(IntakeStep {
                transition,
                session: session.view(session_id),
            })
        })
    }

    /// Upload patient files into a file field. Only one upload per session runs at a time.
    pub async fn upload_files(
        &self,
        session_id: &IntakeSessionId,
        field_id: &FieldId,
        kind: UploadKind,
        files: Vec<UploadPayload>,
    ) -> Result<Vec<FileReference>, FormServiceError> {
        let (ticket, template_id) = self.with_session(session_id, |session| {
            if session.renderer.is_submitted() {
                return Err(RendererError::AlreadySubmitted.into());
            }
            let template = session.renderer.template();
            let field = template
                .field(field_id)
                .ok_or_else(|| RendererError::UnknownField(field_id.clone()))?;
            if field.kind != FieldKind::File {
                return Err(RendererError::KindMismatch {
                    field: field_id.clone(),
                    kind: field.kind,
                }
                .into());
            }
            let ticket = session.gate.try_begin()?;
            Ok((ticket, template.id.clone()))
        })?;

        let uploaded = self
            .uploader
            .upload(ticket, &template_id, kind, files)
            .await?;

        self.with_session(session_id, |session| {
            session
                .renderer
                .append_files(field_id, uploaded.clone())?;
            Ok(())
        })?;
        Ok(uploaded)
    }

    fn open_invitation(
        &self,
        template: &FormTemplate,
        distribution_id: DistributionId,
        now: DateTime<Utc>,
    ) -> Result<Option<DistributionId>, FormServiceError> {
        let mut record = self
            .distributions
            .fetch(&distribution_id)?
            .filter(|record| record.template_id == template.id)
            .ok_or(RepositoryError::NotFound)?;

        if record.is_overdue(now) {
            record.transition(DistributionStatus::Expired)?;
            self.distributions.update(record)?;
            return Err(FormServiceError::InvitationExpired(distribution_id));
        }

        match record.status {
            DistributionStatus::Expired => Err(FormServiceError::InvitationExpired(distribution_id)),
            DistributionStatus::Completed => Ok(None),
            DistributionStatus::Sent => {
                record.transition(DistributionStatus::Opened)?;
                self.distributions.update(record)?;
                Ok(Some(distribution_id))
            }
            DistributionStatus::Opened => Ok(Some(distribution_id)),
        }
    }

    /// Complete the invitation behind a stored submission and move the template counters.
    /// Only a completed invitation counts toward the completion rate.
    fn record_submission(&self, submission: &IntakeSubmission) -> Result<(), FormServiceError> {
        let completed_invite = match &submission.distribution_id {
            Some(distribution_id) => match self.distributions.fetch(distribution_id)? {
                Some(mut record) => match record.complete(submission.submitted_at) {
                    Ok(()) => {
                        self.distributions.update(record)?;
                        true
                    }
                    Err(err) => {
                        warn!(%distribution_id, error = %err, "distribution left unchanged");
                        false
                    }
                },
                None => false,
            },
            None => false,
        };

        let template_id = &submission.template_id;
        match self.templates.fetch(template_id)? {
            Some(mut template) => {
                if completed_invite {
                    template.stats.record_completed();
                } else {
                    template.stats.record_public_submission();
                }
                self.templates.update(template)?;
            }
            None => warn!(%template_id, "submission received for a template that no longer exists"),
        }
        Ok(())
    }

    fn evict_idle(&self, sessions: &mut HashMap<IntakeSessionId, IntakeSession>, now: DateTime<Utc>) {
        let ttl = self.settings.session_ttl;
        let before = sessions.len();
        sessions.retain(|session_id, session| {
            if !session.is_idle(now, ttl) {
                return true;
            }
            if session.pending.is_some() {
                warn!(%session_id, "dropping idle intake session with an unstored submission");
            }
            false
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, "idle intake sessions evicted");
        }
    }

    fn lock_sessions(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<IntakeSessionId, IntakeSession>>, FormServiceError> {
        self.sessions.lock().map_err(|_| {
            FormServiceError::Repository(RepositoryError::Unavailable(
                "intake session mutex poisoned".to_string(),
            ))
        })
    }

    fn with_session<T>(
        &self,
        session_id: &IntakeSessionId,
        f: impl FnOnce(&mut IntakeSession) -> Result<T, FormServiceError>,
    ) -> Result<T, FormServiceError> {
        let mut sessions = self.lock_sessions()?;
        let session = sessions
            .get_mut(session_id)
            .ok_or(FormServiceError::SessionNotFound)?;
        f(session)
    }
}

/// Drop options on kinds that cannot carry them, then enforce the field invariants.
fn normalize_fields(fields: Vec<FieldDefinition>) -> Result<Vec<FieldDefinition>, FieldDefinitionError> {
    let mut seen = HashSet::new();
    fields
        .into_iter()
        .map(|mut field| {
            if !field.kind.requires_options() {
                field.options = None;
            }
            if !seen.insert(field.id.clone()) {
                return Err(FieldDefinitionError::DuplicateId { field: field.id });
            }
            field.validate()?;
            Ok(field)
        })
        .collect()
}

/// Error raised by the forms service.
#[derive(Debug, thiserror::Error)]
pub enum FormServiceError {
    #[error(transparent)]
    InvalidField(#[from] FieldDefinitionError),
    #[error("at least one recipient email is required")]
    NoRecipients,
    #[error("invitation {0} has expired")]
    InvitationExpired(DistributionId),
    #[error("intake session not found")]
    SessionNotFound,
    #[error("too many intake sessions are open, try again shortly")]
    SessionLimit,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Status(#[from] StatusTransitionError),
}
