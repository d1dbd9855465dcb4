//! HairFlow: patient intake forms, sharing and role dashboards for hair transplant agents
//! and clinics.

pub mod access;
pub mod config;
pub mod dashboards;
pub mod error;
pub mod forms;
pub mod telemetry;
pub mod views;
