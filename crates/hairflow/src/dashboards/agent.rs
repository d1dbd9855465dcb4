use serde::Serialize;

use super::directory::{AgentPatient, AgentStage};
use crate::access::{AppRoute, Identity};
use crate::views::{Badge, StatCard};

#[derive(Debug, Clone, Serialize)]
pub struct AgentPatientRow {
    #[serde(flatten)]
    pub patient: AgentPatient,
    pub badge: Badge,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentDashboard {
    pub title: &'static str,
    pub avatar_initial: char,
    pub stats: Vec<StatCard>,
    pub search: String,
    pub patients: Vec<AgentPatientRow>,
    pub links: Vec<String>,
}

/// Case-insensitive substring match on name or email. A blank query keeps every patient.
pub fn matches_search(patient: &AgentPatient, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    needle.is_empty()
        || patient.name.to_lowercase().contains(&needle)
        || patient.email.to_lowercase().contains(&needle)
}

pub(crate) fn avatar_initial(identity: &Identity, fallback: char) -> char {
    identity
        .email
        .chars()
        .next()
        .map(|initial| initial.to_ascii_uppercase())
        .unwrap_or(fallback)
}

/// Build the agent dashboard. Stats cover every patient; the table honours the search query.
pub fn agent_dashboard(
    identity: &Identity,
    patients: Vec<AgentPatient>,
    active_forms: usize,
    query: Option<&str>,
) -> AgentDashboard {
    let count = |stage: AgentStage| patients.iter().filter(|p| p.stage == stage).count();
    let stats = vec![
        StatCard::new("Total Patients", patients.len()),
        StatCard::new("Active Forms", active_forms),
        StatCard::new("Pending Reviews", count(AgentStage::Pending)),
        StatCard::new("Completed", count(AgentStage::Completed)),
    ];

    let search = query.unwrap_or_default().to_string();
    let rows = patients
        .into_iter()
        .filter(|patient| matches_search(patient, &search))
        .map(|patient| AgentPatientRow {
            badge: patient.stage.badge(),
            patient,
        })
        .collect();

    AgentDashboard {
        title: "Agent Dashboard",
        avatar_initial: avatar_initial(identity, 'A'),
        stats,
        search,
        patients: rows,
        links: vec![AppRoute::ClinicDashboard.path(), AppRoute::Forms.path()],
    }
}
