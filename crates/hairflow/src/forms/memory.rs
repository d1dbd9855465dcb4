//! Process-local implementations of the forms collaborators, used by the API service and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{FormTemplate, TemplateId};
use super::repository::{
    DispatchError, DistributionRepository, FormDispatcher, IntakeSubmission, RepositoryError,
    SubmissionRepository, TemplateRepository,
};
use super::sharing::{DistributionId, DistributionRecord, Invitation};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, RepositoryError> {
    mutex
        .lock()
        .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
}

#[derive(Default, Clone)]
pub struct InMemoryTemplateRepository {
    templates: Arc<Mutex<Vec<FormTemplate>>>,
}

impl TemplateRepository for InMemoryTemplateRepository {
    fn insert(&self, template: FormTemplate) -> Result<FormTemplate, RepositoryError> {
        let mut guard = lock(&self.templates)?;
        if guard.iter().any(|existing| existing.id == template.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(template.clone());
        Ok(template)
    }

    fn update(&self, template: FormTemplate) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.templates)?;
        let slot = guard
            .iter_mut()
            .find(|existing| existing.id == template.id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = template;
        Ok(())
    }

    fn fetch(&self, id: &TemplateId) -> Result<Option<FormTemplate>, RepositoryError> {
        let guard = lock(&self.templates)?;
        Ok(guard.iter().find(|template| &template.id == id).cloned())
    }

    fn delete(&self, id: &TemplateId) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.templates)?;
        let before = guard.len();
        guard.retain(|template| &template.id != id);
        if guard.len() == before {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<FormTemplate>, RepositoryError> {
        Ok(lock(&self.templates)?.clone())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryDistributionRepository {
    records: Arc<Mutex<HashMap<DistributionId, DistributionRecord>>>,
}

impl DistributionRepository for InMemoryDistributionRepository {
    fn insert(&self, record: DistributionRecord) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record);
        Ok(())
    }

    fn update(&self, record: DistributionRecord) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.records)?;
        match guard.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &DistributionId) -> Result<Option<DistributionRecord>, RepositoryError> {
        Ok(lock(&self.records)?.get(id).cloned())
    }

    fn for_template(&self, id: &TemplateId) -> Result<Vec<DistributionRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut records: Vec<DistributionRecord> = guard
            .values()
            .filter(|record| &record.template_id == id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.sent_at.cmp(&a.sent_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }

    fn all(&self) -> Result<Vec<DistributionRecord>, RepositoryError> {
        let guard = lock(&self.records)?;
        let mut records: Vec<DistributionRecord> = guard.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    fn delete_for_template(&self, id: &TemplateId) -> Result<usize, RepositoryError> {
        let mut guard = lock(&self.records)?;
        let before = guard.len();
        guard.retain(|_, record| &record.template_id != id);
        Ok(before - guard.len())
    }
}

#[derive(Default, Clone)]
pub struct InMemorySubmissionRepository {
    submissions: Arc<Mutex<Vec<IntakeSubmission>>>,
}

impl SubmissionRepository for InMemorySubmissionRepository {
    fn store(&self, submission: IntakeSubmission) -> Result<(), RepositoryError> {
        lock(&self.submissions)?.push(submission);
        Ok(())
    }

    fn for_template(&self, id: &TemplateId) -> Result<Vec<IntakeSubmission>, RepositoryError> {
        let guard = lock(&self.submissions)?;
        Ok(guard
            .iter()
            .filter(|submission| &submission.template_id == id)
            .cloned()
            .collect())
    }
}

/// Dispatcher that keeps every invitation it was handed.
#[derive(Default, Clone)]
pub struct RecordingDispatcher {
    invitations: Arc<Mutex<Vec<Invitation>>>,
}

impl RecordingDispatcher {
    pub fn invitations(&self) -> Vec<Invitation> {
        self.invitations
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl FormDispatcher for RecordingDispatcher {
    fn dispatch(&self, invitation: &Invitation) -> Result<(), DispatchError> {
        self.invitations
            .lock()
            .map_err(|_| DispatchError::Transport("dispatcher mutex poisoned".to_string()))?
            .push(invitation.clone());
        Ok(())
    }
}
