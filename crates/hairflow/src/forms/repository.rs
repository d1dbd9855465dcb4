use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{FormTemplate, TemplateId};
use super::renderer::AnswerSet;
use super::sharing::{DistributionId, DistributionRecord, Invitation};

/// Completed intake, frozen at submission time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeSubmission {
    pub template_id: TemplateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_id: Option<DistributionId>,
    pub answers: AnswerSet,
    pub submitted_at: DateTime<Utc>,
}

/// Persistence for templates so the service can run against any backing store.
pub trait TemplateRepository: Send + Sync {
    fn insert(&self, template: FormTemplate) -> Result<FormTemplate, RepositoryError>;
    fn update(&self, template: FormTemplate) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &TemplateId) -> Result<Option<FormTemplate>, RepositoryError>;
    fn delete(&self, id: &TemplateId) -> Result<(), RepositoryError>;
    /// All templates in creation order.
    fn list(&self) -> Result<Vec<FormTemplate>, RepositoryError>;
}

/// Persistence for sent forms and their delivery status.
pub trait DistributionRepository: Send + Sync {
    fn insert(&self, record: DistributionRecord) -> Result<(), RepositoryError>;
    fn update(&self, record: DistributionRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &DistributionId) -> Result<Option<DistributionRecord>, RepositoryError>;
    /// Records for one template, most recently sent first.
    fn for_template(&self, id: &TemplateId) -> Result<Vec<DistributionRecord>, RepositoryError>;
    fn all(&self) -> Result<Vec<DistributionRecord>, RepositoryError>;
    fn delete_for_template(&self, id: &TemplateId) -> Result<usize, RepositoryError>;
}

pub trait SubmissionRepository: Send + Sync {
    fn store(&self, submission: IntakeSubmission) -> Result<(), RepositoryError>;
    fn for_template(&self, id: &TemplateId) -> Result<Vec<IntakeSubmission>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound delivery of invitations (e-mail, SMS, ...).
pub trait FormDispatcher: Send + Sync {
    fn dispatch(&self, invitation: &Invitation) -> Result<(), DispatchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("dispatch transport unavailable: {0}")]
    Transport(String),
    #[error("recipient rejected by transport: {0}")]
    Rejected(String),
}
