use std::fmt;

use serde::{Deserialize, Serialize};

/// Account role chosen at sign-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Agent,
    Clinic,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Agent => "Hair Transplant Agent",
            Role::Clinic => "Clinic Owner/Staff",
        }
    }

    pub const fn dashboard(self) -> AppRoute {
        match self {
            Role::Agent => AppRoute::AgentDashboard,
            Role::Clinic => AppRoute::ClinicDashboard,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "agent" => Some(Role::Agent),
            "clinic" => Some(Role::Clinic),
            _ => None,
        }
    }
}

/// Navigable pages of the application.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppRoute {
    Landing,
    Auth,
    AgentDashboard,
    ClinicDashboard,
    Forms,
    Intake(String),
}

impl AppRoute {
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(AppRoute::Landing),
            "/auth" => Some(AppRoute::Auth),
            "/agent/dashboard" => Some(AppRoute::AgentDashboard),
            "/clinic/dashboard" => Some(AppRoute::ClinicDashboard),
            "/forms" => Some(AppRoute::Forms),
            other => other
                .strip_prefix("/intake/")
                .filter(|form_id| !form_id.is_empty() && !form_id.contains('/'))
                .map(|form_id| AppRoute::Intake(form_id.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            AppRoute::Landing => "/".to_string(),
            AppRoute::Auth => "/auth".to_string(),
            AppRoute::AgentDashboard => "/agent/dashboard".to_string(),
            AppRoute::ClinicDashboard => "/clinic/dashboard".to_string(),
            AppRoute::Forms => "/forms".to_string(),
            AppRoute::Intake(form_id) => format!("/intake/{form_id}"),
        }
    }

    /// Dashboards and form management are for signed-in staff only.
    pub fn requires_identity(&self) -> bool {
        matches!(
            self,
            AppRoute::AgentDashboard | AppRoute::ClinicDashboard | AppRoute::Forms
        )
    }
}

impl fmt::Display for AppRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}
