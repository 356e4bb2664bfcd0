use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::audit::AuditTrail;
use super::domain::{
    ActorContext, ActorId, ActorRole, ApplicationId, DocumentReference, DocumentType,
    DraftApplication, PayloadFields,
};
use super::escalation::{EscalationError, EscalationRouter};
use super::repository::{ApplicationRepository, ProvisioningHook, WardDirectory};
use super::service::{TransitionRequest, WorkflowEngine, WorkflowError, WorkflowErrorKind};
use super::transition::{InspectionDecision, OfficerDecision, RemarkField, Transition, TransitionPayload};

/// Shared state behind every approval route.
pub struct ApprovalApi<R, L, P, D> {
    engine: Arc<WorkflowEngine<R, L, P>>,
    escalation: EscalationRouter<R, L, D>,
}

impl<R, L, P, D> ApprovalApi<R, L, P, D>
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    pub fn new(engine: Arc<WorkflowEngine<R, L, P>>, directory: Arc<D>) -> Self {
        let escalation = engine.escalation_router(directory);
        Self { engine, escalation }
    }
}

/// Router exposing the clerk, inspector and officer consoles over HTTP.
pub fn approval_router<R, L, P, D>(engine: Arc<WorkflowEngine<R, L, P>>, directory: Arc<D>) -> Router
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let api = Arc::new(ApprovalApi::new(engine, directory));
    Router::new()
        .route("/api/v1/applications", post(create_handler::<R, L, P, D>))
        .route(
            "/api/v1/applications/:application_id",
            get(status_handler::<R, L, P, D>).delete(delete_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/payload",
            put(save_payload_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/documents",
            post(attach_document_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/submit",
            post(submit_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/inspection",
            post(begin_inspection_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/inspect",
            post(inspect_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/officer-decision",
            post(officer_decision_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/audit",
            get(audit_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/applications/:application_id/decisions",
            get(decisions_handler::<R, L, P, D>),
        )
        .route(
            "/api/v1/officers/:officer_id/queue",
            get(officer_queue_handler::<R, L, P, D>),
        )
        .with_state(api)
}

type ApiState<R, L, P, D> = State<Arc<ApprovalApi<R, L, P, D>>>;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateDraftRequest {
    pub actor: ActorContext,
    pub application: DraftApplication,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SavePayloadRequest {
    pub actor: ActorContext,
    pub payload_fields: PayloadFields,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AttachDocumentRequest {
    pub actor: ActorContext,
    pub document_type: DocumentType,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorRequest {
    pub actor: ActorContext,
    #[serde(default)]
    pub clerk_remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InspectRequest {
    pub actor: ActorContext,
    pub decision: InspectionDecision,
    /// Fills the slot the decision requires and, when `payload` has none, the inspector remarks.
    #[serde(default)]
    pub remarks: Option<String>,
    /// Any additional remarks the decision carries.
    #[serde(default)]
    pub payload: TransitionPayload,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfficerDecisionRequest {
    pub actor: ActorContext,
    pub decision: OfficerDecision,
    #[serde(default)]
    pub officer_remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorQuery {
    pub actor_id: Option<String>,
    pub actor_role: Option<ActorRole>,
    #[serde(default)]
    pub is_creator: bool,
}

impl ActorQuery {
    fn actor(self) -> Option<ActorContext> {
        match (self.actor_id, self.actor_role) {
            (Some(actor_id), Some(actor_role)) => {
                Some(ActorContext::new(actor_id, actor_role, self.is_creator))
            }
            _ => None,
        }
    }
}

pub(crate) async fn create_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Json(request): Json<CreateDraftRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    match api.engine.create_draft(&request.actor, request.application) {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn status_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Query(query): Query<ActorQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    let result = match query.actor() {
        Some(actor) => api.engine.status_for(&id, &actor),
        None => api.engine.get(&id).map(|record| record.status_view()),
    };
    match result {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn save_payload_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<SavePayloadRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api
        .engine
        .save_draft(&id, &request.actor, request.payload_fields)
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn attach_document_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<AttachDocumentRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    let document = DocumentReference {
        document_type: request.document_type,
        reference: request.reference,
    };
    match api.engine.attach_document(&id, &request.actor, document) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn submit_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api
        .engine
        .submit_with_remarks(&id, &request.actor, request.clerk_remarks.as_deref())
    {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn begin_inspection_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api.engine.begin_inspection(&id, &request.actor) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn inspect_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<InspectRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let InspectRequest {
        actor,
        decision,
        remarks,
        payload,
    } = request;
    let payload = decision.payload_with(payload, remarks.as_deref());

    let outcome = api.engine.execute(TransitionRequest {
        application_id: ApplicationId(application_id),
        transition: decision.transition(),
        actor,
        payload,
    });
    match outcome {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn officer_decision_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<OfficerDecisionRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let payload = match request.officer_remarks {
        Some(remarks) => TransitionPayload::default().with(RemarkField::OfficerRemarks, remarks),
        None => TransitionPayload::default(),
    };
    let outcome = api.engine.execute(TransitionRequest {
        application_id: ApplicationId(application_id),
        transition: Transition::Decide(request.decision),
        actor: request.actor,
        payload,
    });
    match outcome {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn delete_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
    Json(request): Json<ActorRequest>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api.engine.delete_draft(&id, &request.actor) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn audit_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api.engine.history(&id) {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(error) => workflow_error_response(error),
    }
}

pub(crate) async fn decisions_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let id = ApplicationId(application_id);
    match api.escalation.decisions_for(&id) {
        Ok(decisions) => (StatusCode::OK, Json(decisions)).into_response(),
        Err(error) => escalation_error_response(error),
    }
}

pub(crate) async fn officer_queue_handler<R, L, P, D>(
    State(api): ApiState<R, L, P, D>,
    Path(officer_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
    D: WardDirectory + 'static,
{
    let officer = ActorId(officer_id);
    match api.escalation.queue_for(&officer) {
        Ok(records) => {
            let views: Vec<_> = records.iter().map(|record| record.status_view()).collect();
            let payload = json!({
                "officer_id": officer.0,
                "applications": views,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => escalation_error_response(error),
    }
}

pub(crate) fn status_for_kind(kind: WorkflowErrorKind) -> StatusCode {
    match kind {
        WorkflowErrorKind::InvalidTransition
        | WorkflowErrorKind::MissingRequiredField
        | WorkflowErrorKind::DocumentRequirementNotMet => StatusCode::UNPROCESSABLE_ENTITY,
        WorkflowErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
        WorkflowErrorKind::Conflict => StatusCode::CONFLICT,
        WorkflowErrorKind::NotFound => StatusCode::NOT_FOUND,
        WorkflowErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub(crate) fn workflow_error_response(error: WorkflowError) -> Response {
    let kind = error.kind();
    let payload = json!({
        "error": error.to_string(),
        "kind": kind,
        "retryable": error.is_retryable(),
    });
    (status_for_kind(kind), Json(payload)).into_response()
}

fn escalation_error_response(error: EscalationError) -> Response {
    let payload = json!({
        "error": error.to_string(),
        "kind": WorkflowErrorKind::Unavailable,
        "retryable": false,
    });
    (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
}
