use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::agent::avatar_initial;
use super::directory::ClinicPatient;
use crate::access::{AppRoute, Identity};
use crate::views::{Badge, StatCard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralSource {
    Agent,
    Direct,
}

impl ClinicPatient {
    pub fn source(&self) -> ReferralSource {
        if self.agent.is_some() {
            ReferralSource::Agent
        } else {
            ReferralSource::Direct
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicPatientRow {
    #[serde(flatten)]
    pub patient: ClinicPatient,
    pub source: ReferralSource,
    pub badge: Badge,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicDashboard {
    pub title: &'static str,
    pub avatar_initial: char,
    pub stats: Vec<StatCard>,
    pub agent_referrals: Vec<ClinicPatientRow>,
    pub direct_patients: Vec<ClinicPatientRow>,
    pub links: Vec<String>,
}

/// Build the clinic dashboard, splitting patients by how they reached the clinic.
pub fn clinic_dashboard(
    identity: &Identity,
    patients: Vec<ClinicPatient>,
    today: NaiveDate,
) -> ClinicDashboard {
    let this_month = patients
        .iter()
        .filter(|patient| patient.date.year() == today.year() && patient.date.month() == today.month())
        .count();

    let mut agent_referrals = Vec::new();
    let mut direct_patients = Vec::new();
    let total = patients.len();
    for patient in patients {
        let source = patient.source();
        let row = ClinicPatientRow {
            badge: patient.stage.badge(),
            source,
            patient,
        };
        match source {
            ReferralSource::Agent => agent_referrals.push(row),
            ReferralSource::Direct => direct_patients.push(row),
        }
    }

    ClinicDashboard {
        title: "Clinic Dashboard",
        avatar_initial: avatar_initial(identity, 'C'),
        stats: vec![
            StatCard::new("Total Patients", total),
            StatCard::new("From Agents", agent_referrals.len()),
            StatCard::new("Direct Patients", direct_patients.len()),
            StatCard::new("This Month", this_month),
        ],
        agent_referrals,
        direct_patients,
        links: vec![AppRoute::AgentDashboard.path(), AppRoute::Forms.path()],
    }
}
