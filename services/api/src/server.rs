use crate::cli::ServeArgs;
use crate::infra::{
    demo_directory, AppState, InMemoryObjectStore, InMemorySessionProvider, LoggingDispatcher,
};
use crate::routes::{with_hairflow_routes, HairflowServices};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hairflow::access::AuthFlow;
use hairflow::config::AppConfig;
use hairflow::error::AppError;
use hairflow::forms::{
    FormCollaborators, FormService, FormSettings, InMemoryDistributionRepository,
    InMemorySubmissionRepository, InMemoryTemplateRepository,
};
use hairflow::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let objects = Arc::new(InMemoryObjectStore::new(&config.forms.share_base_url));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        objects: objects.clone(),
    };

    let forms = Arc::new(FormService::new(
        FormCollaborators {
            templates: Arc::new(InMemoryTemplateRepository::default()),
            distributions: Arc::new(InMemoryDistributionRepository::default()),
            submissions: Arc::new(InMemorySubmissionRepository::default()),
            dispatcher: Arc::new(LoggingDispatcher),
            storage: objects,
        },
        FormSettings::from_config(&config.forms),
    ));
    let auth = Arc::new(AuthFlow::new(Arc::new(InMemorySessionProvider::default())));

    let app = with_hairflow_routes(HairflowServices {
        forms,
        auth,
        directory: Arc::new(demo_directory()),
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hairflow intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
