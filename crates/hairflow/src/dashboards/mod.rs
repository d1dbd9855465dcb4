//! Landing page and the role dashboards, plus the guarded page routes that serve them.

pub mod agent;
pub mod clinic;
pub mod directory;
pub mod landing;
pub mod router;

pub use agent::{agent_dashboard, matches_search, AgentDashboard, AgentPatientRow};
pub use clinic::{clinic_dashboard, ClinicDashboard, ClinicPatientRow, ReferralSource};
pub use directory::{
    AgentPatient, AgentStage, ClinicPatient, ClinicStage, DirectoryError, PatientDirectory,
    StaticPatientDirectory,
};
pub use landing::{landing_page, Feature, LandingPage, PricingPlan, Testimonial};
pub use router::{pages_router, PageContext};
