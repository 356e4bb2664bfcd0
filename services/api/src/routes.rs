use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use civic_workflow::workflows::approvals::{
    approval_router, ApplicationRepository, AuditTrail, ProvisioningHook, WardDirectory,
    WorkflowEngine, TRANSITION_TABLE,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// One row of the published transition table.
#[derive(Debug, Serialize)]
pub(crate) struct TransitionRow {
    pub(crate) from: &'static str,
    pub(crate) transition: String,
    pub(crate) to: Option<&'static str>,
    pub(crate) role: &'static str,
    pub(crate) creator_only: bool,
    pub(crate) required_field: Option<&'static str>,
    pub(crate) requires_documents: bool,
}

pub(crate) fn transition_rows() -> Vec<TransitionRow> {
    TRANSITION_TABLE
        .iter()
        .map(|edge| TransitionRow {
            from: edge.from.label(),
            transition: edge.transition.label(),
            to: edge.to.map(|status| status.label()),
            role: edge.role.label(),
            creator_only: edge.creator_only,
            required_field: edge.required_field.map(|field| field.label()),
            requires_documents: edge.requires_documents,
        })
        .collect()
}

pub(crate) fn with_approval_routes<R, L, P, D>(
    engine: Arc<WorkflowEngine<R, L, P>>,
    directory: Arc<D>,
) -> axum::Router
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    approval_router(engine, directory)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/workflow/transitions",
            axum::routing::get(transitions_endpoint),
        )
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

pub(crate) async fn transitions_endpoint() -> Json<Vec<TransitionRow>> {
    Json(transition_rows())
}
