use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use hairflow::access::{access_router, AuthFlow};
use hairflow::dashboards::{pages_router, PageContext, PatientDirectory};
use hairflow::forms::{forms_router, FormService};
use serde_json::json;
use std::sync::Arc;

/// Services shared by the HTTP surface.
#[derive(Clone)]
pub(crate) struct HairflowServices {
    pub(crate) forms: Arc<FormService>,
    pub(crate) auth: Arc<AuthFlow>,
    pub(crate) directory: Arc<dyn PatientDirectory>,
}

pub(crate) fn with_hairflow_routes(services: HairflowServices) -> Router {
    let pages = pages_router(PageContext {
        auth: services.auth.clone(),
        forms: services.forms.clone(),
        directory: services.directory,
    });

    forms_router(services.forms, services.auth.clone())
        .merge(access_router(services.auth))
        .merge(pages)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .route("/storage/*path", get(storage_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serve an uploaded patient file back from the object store.
pub(crate) async fn storage_endpoint(
    Extension(state): Extension<AppState>,
    Path(path): Path<String>,
) -> Response {
    match state.objects.get(&path) {
        Some(file) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, file.content_type)],
            file.bytes,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no stored object at '{path}'") })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{demo_directory, InMemoryObjectStore, InMemorySessionProvider, LoggingDispatcher};
    use axum::body::Body;
    use axum::http::Request;
    use hairflow::forms::{
        FormCollaborators, FormSettings, InMemoryDistributionRepository,
        InMemorySubmissionRepository, InMemoryTemplateRepository, StorageProvider, UploadPayload,
    };
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool, objects: Arc<InMemoryObjectStore>) -> Router {
        let forms = Arc::new(FormService::new(
            FormCollaborators {
                templates: Arc::new(InMemoryTemplateRepository::default()),
                distributions: Arc::new(InMemoryDistributionRepository::default()),
                submissions: Arc::new(InMemorySubmissionRepository::default()),
                dispatcher: Arc::new(LoggingDispatcher),
                storage: objects.clone(),
            },
            FormSettings::default(),
        ));
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            objects,
        };
        with_hairflow_routes(HairflowServices {
            forms,
            auth: Arc::new(AuthFlow::new(Arc::new(InMemorySessionProvider::default()))),
            directory: Arc::new(demo_directory()),
        })
        .layer(Extension(state))
    }

    async fn call(app: Router, path: &str) -> Response {
        app.oneshot(Request::get(path).body(Body::empty()).expect("request"))
            .await
            .expect("response")
    }

    #[tokio::test]
    async fn readiness_follows_flag() {
        let objects = Arc::new(InMemoryObjectStore::new("http://localhost"));
        let response = call(app(false, objects.clone()), "/ready").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = call(app(true, objects), "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn health_and_landing_are_served_together() {
        let objects = Arc::new(InMemoryObjectStore::new("http://localhost"));
        let router = app(true, objects);
        assert_eq!(call(router.clone(), "/health").await.status(), StatusCode::OK);
        assert_eq!(call(router.clone(), "/").await.status(), StatusCode::OK);

        let response = call(router.clone(), "/agent/dashboard").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = call(router, "/api/v1/forms").await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stored_files_are_served_with_their_content_type() {
        let objects = Arc::new(InMemoryObjectStore::new("http://localhost"));
        objects
            .upload(
                "patient-files/tpl-000009/photos/crown.png",
                UploadPayload {
                    file_name: "crown.png".to_string(),
                    content_type: None,
                    bytes: vec![0x89, 0x50, 0x4E, 0x47],
                },
            )
            .await
            .expect("stored");

        let router = app(true, objects);
        let response = call(router.clone(), "/storage/patient-files/tpl-000009/photos/crown.png").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("image/png")
        );

        let missing = call(router, "/storage/patient-files/none.png").await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }
}
