//! Process-level error for the HairFlow service and the page handlers built on top of it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;
use crate::dashboards::DirectoryError;
use crate::forms::FormServiceError;
use crate::telemetry::TelemetryError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Forms(#[from] FormServiceError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Forms(err) => err.into_response(),
            AppError::Directory(err) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": err.to_string() }))).into_response()
            }
            AppError::Config(_) | AppError::Telemetry(_) | AppError::Io(_) => {
                error!(error = %self, "request failed on a process-level error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal server error" })),
                )
                    .into_response()
            }
        }
    }
}
