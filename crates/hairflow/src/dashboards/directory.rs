use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::access::Identity;
use crate::views::{Badge, BadgeTone};

/// Where an agent's patient is in the hand-off to a clinic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStage {
    Sent,
    Pending,
    Completed,
}

impl AgentStage {
    pub const fn badge(self) -> Badge {
        match self {
            AgentStage::Sent => Badge::new("Form Sent", BadgeTone::Blue),
            AgentStage::Pending => Badge::new("Pending", BadgeTone::Yellow),
            AgentStage::Completed => Badge::new("Completed", BadgeTone::Green),
        }
    }
}

/// Where a clinic's patient is in the treatment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicStage {
    #[serde(rename = "new")]
    NewReferral,
    #[serde(rename = "review")]
    UnderReview,
    Scheduled,
    Consultation,
    #[serde(rename = "plan")]
    PlanReady,
}

impl ClinicStage {
    pub const fn badge(self) -> Badge {
        match self {
            ClinicStage::NewReferral => Badge::new("New Referral", BadgeTone::Blue),
            ClinicStage::UnderReview => Badge::new("Under Review", BadgeTone::Yellow),
            ClinicStage::Scheduled => Badge::new("Scheduled", BadgeTone::Green),
            ClinicStage::Consultation => Badge::new("Consultation", BadgeTone::Purple),
            ClinicStage::PlanReady => Badge::new("Plan Ready", BadgeTone::Indigo),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentPatient {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub status: String,
    pub clinic: String,
    pub date: NaiveDate,
    pub stage: AgentStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicPatient {
    pub id: u32,
    pub name: String,
    pub email: String,
    pub status: String,
    /// Referring agent; `None` for patients who came to the clinic directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub date: NaiveDate,
    pub stage: ClinicStage,
}

/// Source of patient rows shown on the role dashboards.
pub trait PatientDirectory: Send + Sync {
    fn agent_patients(&self, agent: &Identity) -> Result<Vec<AgentPatient>, DirectoryError>;
    fn clinic_patients(&self, clinic: &Identity) -> Result<Vec<ClinicPatient>, DirectoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("patient directory unavailable: {0}")]
    Unavailable(String),
}

/// Fixed patient lists, shared by every signed-in user.
#[derive(Debug, Clone, Default)]
pub struct StaticPatientDirectory {
    agent_patients: Vec<AgentPatient>,
    clinic_patients: Vec<ClinicPatient>,
}

impl StaticPatientDirectory {
    pub fn new(agent_patients: Vec<AgentPatient>, clinic_patients: Vec<ClinicPatient>) -> Self {
        Self {
            agent_patients,
            clinic_patients,
        }
    }
}

impl PatientDirectory for StaticPatientDirectory {
    fn agent_patients(&self, _agent: &Identity) -> Result<Vec<AgentPatient>, DirectoryError> {
        Ok(self.agent_patients.clone())
    }

    fn clinic_patients(&self, _clinic: &Identity) -> Result<Vec<ClinicPatient>, DirectoryError> {
        Ok(self.clinic_patients.clone())
    }
}
