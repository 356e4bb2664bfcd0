use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryApplicationRepository, InMemoryWardDirectory, LoggingProvisioning,
};
use crate::routes::with_approval_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use civic_workflow::config::AppConfig;
use civic_workflow::error::AppError;
use civic_workflow::telemetry;
use civic_workflow::workflows::approvals::{
    DocumentRequirementChecker, MemoryAuditTrail, WorkflowEngine,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = match std::env::var("APP_OFFICER_WARDS") {
        Ok(raw) => InMemoryWardDirectory::parse(&raw).unwrap_or_else(|reason| {
            warn!(%reason, "ignoring APP_OFFICER_WARDS; officer queues will be empty");
            InMemoryWardDirectory::default()
        }),
        Err(_) => InMemoryWardDirectory::default(),
    };

    let engine = Arc::new(WorkflowEngine::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::new(MemoryAuditTrail::default()),
        Arc::new(LoggingProvisioning::default()),
        DocumentRequirementChecker::new(config.workflow.required_documents.clone()),
    ));

    let app = with_approval_routes(engine, Arc::new(directory))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "approval workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
