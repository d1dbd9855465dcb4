//! Intake form templates: building, rendering, distribution and patient uploads.
//!
//! Templates are edited as [`TemplateDraft`]s by the [`FormBuilder`], persisted through the
//! [`FormService`], sent to patients as personal invitations, and filled in page by page by a
//! [`FormRenderer`] session that hands its frozen answers back to the service on submit.

pub mod builder;
pub mod domain;
pub mod memory;
pub mod renderer;
pub mod repository;
pub mod router;
pub mod service;
pub mod sharing;
pub mod uploads;

#[cfg(test)]
mod tests;

pub use builder::{parse_options, FieldPatch, FormBuilder};
pub use domain::{
    completion_rate, share_url, slugify, Branding, FieldDefinition, FieldDefinitionError, FieldId,
    FieldKind, FormTemplate, TemplateDraft, TemplateId, TemplateStats,
};
pub use memory::{
    InMemoryDistributionRepository, InMemorySubmissionRepository, InMemoryTemplateRepository,
    RecordingDispatcher,
};
pub use renderer::{
    AnswerSet, AnswerValue, FormRenderer, PageTransition, RenderPhase, RenderView, RenderedField,
    RendererError, SubmissionHandler, FIELDS_PER_PAGE,
};
pub use repository::{
    DispatchError, DistributionRepository, FormDispatcher, IntakeSubmission, RepositoryError,
    SubmissionRepository, TemplateRepository,
};
pub use router::forms_router;
pub use service::{
    FormCollaborators, FormService, FormServiceError, FormSettings, IntakeLanding, IntakeSessionId,
    IntakeSessionView, IntakeStep, PortfolioSummary, SavedTemplate, SendRequest,
};
pub use sharing::{
    embed_snippet, invitation_link, parse_recipients, DistributionId, DistributionRecord,
    DistributionRecordView, DistributionStatus, Invitation, InvitationDelivery, Recipient,
    SendReceipt, ShareAnalytics, SharePanel, StatusTransitionError, DEFAULT_INVITATION_MESSAGE,
};
pub use uploads::{
    upload_path, FileReference, IntakeUploader, StorageError, StorageProvider, StoredObject,
    UploadError, UploadGate, UploadKind, UploadPayload, UploadTicket,
};
