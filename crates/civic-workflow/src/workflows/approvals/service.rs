use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{error, info, warn};

use super::audit::{AuditEntry, AuditError, AuditTrail, WorkflowAction};
use super::clock::{Clock, SystemClock};
use super::documents::DocumentRequirementChecker;
use super::domain::{
    ActorContext, ActorRole, ApplicationId, ApplicationNumber, ApplicationStatus,
    ApplicationType, DocumentReference, DraftApplication, PayloadFields,
};
use super::escalation::EscalationRouter;
use super::record::{ApplicationRecord, ApplicationStatusView};
use super::repository::{
    ApplicationRepository, CollaboratorError, DocumentStore, NoDocumentStore, ProvisioningHook,
    RepositoryError, WardDirectory,
};
use super::role_gate::RoleGate;
use super::transition::{
    InspectionDecision, OfficerDecision, RemarkField, Transition, TransitionPayload,
};
use super::validator::{TransitionRejection, TransitionValidator};

/// Process-local id source. It restarts at 1 with the process, so a durable repository has to
/// own id minting (a database sequence) or a restart reissues `app-000001` and the insert fails
/// with `Conflict`.
static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_identity(
    application_type: ApplicationType,
    now: DateTime<Utc>,
) -> (ApplicationId, ApplicationNumber) {
    let sequence = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (
        ApplicationId(format!("app-{sequence:06}")),
        ApplicationNumber(format!(
            "{}-{}-{sequence:06}",
            application_type.number_prefix(),
            now.year()
        )),
    )
}

/// A transition request as submitted by a clerk, inspector or officer console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub application_id: ApplicationId,
    pub transition: Transition,
    pub actor: ActorContext,
    pub payload: TransitionPayload,
}

/// Error kinds surfaced to callers; each maps to one actionable message family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowErrorKind {
    InvalidTransition,
    MissingRequiredField,
    DocumentRequirementNotMet,
    PreconditionFailed,
    Conflict,
    NotFound,
    Unavailable,
}

/// Error raised by the workflow engine.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error("application {0} was changed by another request; reload and retry")]
    Conflict(ApplicationId),
    #[error(transparent)]
    Rejected(#[from] TransitionRejection),
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl WorkflowError {
    pub fn kind(&self) -> WorkflowErrorKind {
        match self {
            WorkflowError::NotFound(_) => WorkflowErrorKind::NotFound,
            WorkflowError::Conflict(_) => WorkflowErrorKind::Conflict,
            WorkflowError::Rejected(rejection) => match rejection {
                TransitionRejection::InvalidTransition { .. }
                | TransitionRejection::ActionNotPermitted { .. } => {
                    WorkflowErrorKind::InvalidTransition
                }
                TransitionRejection::MissingRequiredField { .. } => {
                    WorkflowErrorKind::MissingRequiredField
                }
                TransitionRejection::DocumentRequirementNotMet { .. } => {
                    WorkflowErrorKind::DocumentRequirementNotMet
                }
                TransitionRejection::PreconditionFailed { .. } => {
                    WorkflowErrorKind::PreconditionFailed
                }
            },
            WorkflowError::Repository(_)
            | WorkflowError::Audit(_)
            | WorkflowError::Collaborator(_) => WorkflowErrorKind::Unavailable,
        }
    }

    /// Only lost races are worth an automatic retry; everything else needs a corrected request.
    pub fn is_retryable(&self) -> bool {
        self.kind() == WorkflowErrorKind::Conflict
    }

    fn from_repository(error: RepositoryError, application_id: &ApplicationId) -> Self {
        match error {
            RepositoryError::Conflict => WorkflowError::Conflict(application_id.clone()),
            RepositoryError::NotFound => WorkflowError::NotFound(application_id.clone()),
            other => WorkflowError::Repository(other),
        }
    }
}

/// Orchestrates role gating, document checks and payload validation, then commits the
/// record and appends exactly one audit entry per call.
pub struct WorkflowEngine<R, L, P> {
    repository: Arc<R>,
    audit: Arc<L>,
    provisioning: Arc<P>,
    documents: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    validator: TransitionValidator,
    checker: DocumentRequirementChecker,
}

impl<R, L, P> WorkflowEngine<R, L, P>
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    P: ProvisioningHook + 'static,
{
    pub fn new(
        repository: Arc<R>,
        audit: Arc<L>,
        provisioning: Arc<P>,
        checker: DocumentRequirementChecker,
    ) -> Self {
        Self {
            repository,
            audit,
            provisioning,
            documents: Arc::new(NoDocumentStore),
            clock: Arc::new(SystemClock),
            validator: TransitionValidator::default(),
            checker,
        }
    }

    pub fn with_document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = documents;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn role_gate(&self) -> &RoleGate {
        self.validator.gate()
    }

    pub fn document_checker(&self) -> &DocumentRequirementChecker {
        &self.checker
    }

    /// Officer queue view sharing this engine's repository and audit trail.
    pub fn escalation_router<D>(&self, directory: Arc<D>) -> EscalationRouter<R, L, D>
    where
        D: WardDirectory + 'static,
    {
        EscalationRouter::new(self.repository.clone(), self.audit.clone(), directory)
    }

    /// Open a new DRAFT on behalf of a clerk.
    pub fn create_draft(
        &self,
        actor: &ActorContext,
        draft: DraftApplication,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        let now = self.clock.now();
        let (application_id, application_number) =
            next_application_identity(draft.application_type, now);

        if actor.actor_role != ActorRole::Clerk {
            let rejection = TransitionRejection::ActionNotPermitted {
                action: WorkflowAction::Create.label(),
                role: actor.actor_role,
            };
            let error = WorkflowError::from(rejection);
            self.record_failure(&application_id, None, WorkflowAction::Create, actor, &error, None, now);
            return Err(error);
        }

        let mut record = ApplicationRecord::draft(
            application_id.clone(),
            application_number,
            draft.application_type,
            draft.jurisdiction,
            draft.payload_fields,
            actor.actor_id.clone(),
            now,
        );
        for document in draft.documents {
            record.attach(document, now);
        }

        let stored = match self.repository.insert(record) {
            Ok(stored) => stored,
            Err(err) => {
                let error = WorkflowError::from_repository(err, &application_id);
                self.record_failure(&application_id, None, WorkflowAction::Create, actor, &error, None, now);
                return Err(error);
            }
        };

        info!(
            application_id = %stored.id(),
            application_number = %stored.application_number(),
            application_type = stored.application_type().label(),
            actor = %actor.actor_id,
            "application draft created"
        );
        self.record_success(&stored, None, WorkflowAction::Create, actor, None, now);
        Ok(stored.status_view())
    }

    /// Replace the opaque payload of a DRAFT or RETURNED application (the "edit" entry point).
    pub fn save_draft(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        payload_fields: PayloadFields,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.edit(application_id, actor, WorkflowAction::SaveDraft, |record, now| {
            record.replace_payload(payload_fields, now);
        })
    }

    /// Attach a document reference. Attachments are append-only; duplicates are ignored.
    pub fn attach_document(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        document: DocumentReference,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.edit(application_id, actor, WorkflowAction::AttachDocument, |record, now| {
            record.attach(document, now);
        })
    }

    /// DRAFT/RETURNED → SUBMITTED.
    pub fn submit(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.submit_with_remarks(application_id, actor, None)
    }

    pub fn submit_with_remarks(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        clerk_remarks: Option<&str>,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        let payload = remarks_payload(RemarkField::ClerkRemarks, clerk_remarks);
        self.execute(TransitionRequest {
            application_id: application_id.clone(),
            transition: Transition::Submit,
            actor: actor.clone(),
            payload,
        })
        .map(expect_view)
    }

    /// SUBMITTED → UNDER_INSPECTION.
    pub fn begin_inspection(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.execute(TransitionRequest {
            application_id: application_id.clone(),
            transition: Transition::BeginInspection,
            actor: actor.clone(),
            payload: TransitionPayload::default(),
        })
        .map(expect_view)
    }

    /// Record an inspector decision. `remarks` is stored as the inspector's remarks and also
    /// fills the field the decision requires (rejection reason or escalation reason).
    pub fn inspect(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        decision: InspectionDecision,
        remarks: Option<&str>,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.execute(TransitionRequest {
            application_id: application_id.clone(),
            transition: decision.transition(),
            actor: actor.clone(),
            payload: decision.payload_with(TransitionPayload::default(), remarks),
        })
        .map(expect_view)
    }

    /// ESCALATED → APPROVED / REJECTED / RETURNED.
    pub fn officer_decide(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        decision: OfficerDecision,
        officer_remarks: Option<&str>,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        self.execute(TransitionRequest {
            application_id: application_id.clone(),
            transition: Transition::Decide(decision),
            actor: actor.clone(),
            payload: remarks_payload(RemarkField::OfficerRemarks, officer_remarks),
        })
        .map(expect_view)
    }

    /// Remove a DRAFT. Audit entries for the application are kept.
    pub fn delete_draft(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
    ) -> Result<(), WorkflowError> {
        self.execute(TransitionRequest {
            application_id: application_id.clone(),
            transition: Transition::Delete,
            actor: actor.clone(),
            payload: TransitionPayload::default(),
        })
        .map(|_| ())
    }

    /// Run one transition request end to end. Returns `None` when the record was removed.
    pub fn execute(
        &self,
        request: TransitionRequest,
    ) -> Result<Option<ApplicationStatusView>, WorkflowError> {
        let TransitionRequest {
            application_id,
            transition,
            actor,
            payload,
        } = request;
        let action = WorkflowAction::Transition(transition);
        let remarks = payload.scoped_to(transition).summary();
        let now = self.clock.now();

        let mut record = match self.load(&application_id) {
            Ok(record) => record,
            Err(error) => {
                self.record_failure(&application_id, None, action, &actor, &error, remarks, now);
                return Err(error);
            }
        };
        let from = record.status();
        let expected_version = record.version();

        let edge = match self
            .validator
            .validate(from, transition, &record.resolve_actor(&actor), &payload)
        {
            Ok(edge) => edge,
            Err(rejection) => {
                let error = WorkflowError::from(rejection);
                self.record_failure(&application_id, Some(from), action, &actor, &error, remarks, now);
                return Err(error);
            }
        };

        if edge.requires_documents {
            if let Err(error) = self.check_documents(&mut record, now) {
                self.record_failure(&application_id, Some(from), action, &actor, &error, remarks, now);
                return Err(error);
            }
        }

        let committed = match edge.to {
            Some(_) => {
                record.commit(edge, &actor, &payload, now);
                self.repository.update(record.clone(), expected_version)
            }
            None => self.repository.remove(&application_id, expected_version),
        };
        if let Err(err) = committed {
            let error = WorkflowError::from_repository(err, &application_id);
            self.record_failure(&application_id, Some(from), action, &actor, &error, remarks, now);
            return Err(error);
        }

        info!(
            application_id = %application_id,
            transition = %transition,
            from = %from,
            to = edge.to.map(ApplicationStatus::label).unwrap_or("REMOVED"),
            actor = %actor.actor_id,
            role = %actor.actor_role,
            "workflow transition committed"
        );
        self.append(AuditEntry {
            application_id: application_id.clone(),
            from_state: Some(from),
            to_state: edge.to,
            action,
            actor_id: actor.actor_id.clone(),
            actor_role: actor.actor_role,
            succeeded: true,
            failure_reason: None,
            remarks,
            timestamp: record.timestamps().updated_at.max(now),
        });

        if edge.to.is_none() {
            return Ok(None);
        }

        if record.status() == ApplicationStatus::Approved {
            self.notify_approved(&record);
        }

        Ok(Some(record.status_view()))
    }

    pub fn get(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, WorkflowError> {
        self.load(application_id)
    }

    /// Status view including the transitions available to `actor`.
    pub fn status_for(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
    ) -> Result<ApplicationStatusView, WorkflowError> {
        let record = self.load(application_id)?;
        Ok(record.status_view_for(self.role_gate(), &record.resolve_actor(actor)))
    }

    pub fn list(&self, status: ApplicationStatus) -> Result<Vec<ApplicationRecord>, WorkflowError> {
        self.repository
            .by_status(status)
            .map_err(WorkflowError::Repository)
    }

    /// Every attempt recorded against the application, oldest first.
    pub fn history(&self, application_id: &ApplicationId) -> Result<Vec<AuditEntry>, WorkflowError> {
        Ok(self.audit.entries_for(application_id)?)
    }

    fn load(&self, application_id: &ApplicationId) -> Result<ApplicationRecord, WorkflowError> {
        self.repository
            .fetch(application_id)
            .map_err(|err| WorkflowError::from_repository(err, application_id))?
            .ok_or_else(|| WorkflowError::NotFound(application_id.clone()))
    }

    fn edit<F>(
        &self,
        application_id: &ApplicationId,
        actor: &ActorContext,
        action: WorkflowAction,
        apply: F,
    ) -> Result<ApplicationStatusView, WorkflowError>
    where
        F: FnOnce(&mut ApplicationRecord, DateTime<Utc>),
    {
        let now = self.clock.now();
        let mut record = match self.load(application_id) {
            Ok(record) => record,
            Err(error) => {
                self.record_failure(application_id, None, action, actor, &error, None, now);
                return Err(error);
            }
        };
        let from = record.status();

        let gate = self.role_gate();
        let resolved = record.resolve_actor(actor);
        let rejection = if resolved.actor_role != ActorRole::Clerk || !resolved.is_creator {
            Some(TransitionRejection::ActionNotPermitted {
                action: action.label(),
                role: actor.actor_role,
            })
        } else if !gate.may_edit(from, &resolved) {
            Some(TransitionRejection::PreconditionFailed {
                reason: format!("only DRAFT or RETURNED applications can be edited (current status {from})"),
            })
        } else {
            None
        };
        if let Some(rejection) = rejection {
            let error = WorkflowError::from(rejection);
            self.record_failure(application_id, Some(from), action, actor, &error, None, now);
            return Err(error);
        }

        let expected_version = record.version();
        apply(&mut record, now);
        if let Err(err) = self.repository.update(record.clone(), expected_version) {
            let error = WorkflowError::from_repository(err, application_id);
            self.record_failure(application_id, Some(from), action, actor, &error, None, now);
            return Err(error);
        }

        self.record_success(&record, Some(from), action, actor, None, now);
        Ok(record.status_view())
    }

    /// Pull references from the external store, then require every mandatory type.
    fn check_documents(
        &self,
        record: &mut ApplicationRecord,
        now: DateTime<Utc>,
    ) -> Result<(), WorkflowError> {
        for document in self.documents.list_documents(record.id())? {
            record.attach(document, now);
        }

        let missing = self
            .checker
            .missing(record.application_type(), record.documents());
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransitionRejection::DocumentRequirementNotMet { missing }.into())
        }
    }

    fn notify_approved(&self, record: &ApplicationRecord) {
        if let Err(err) = self
            .provisioning
            .on_application_approved(record.id(), record.application_type())
        {
            // Approval stands; provisioning is retried by its own at-least-once delivery.
            warn!(
                application_id = %record.id(),
                error = %err,
                "provisioning hook failed after approval"
            );
        }
    }

    fn record_success(
        &self,
        record: &ApplicationRecord,
        from: Option<ApplicationStatus>,
        action: WorkflowAction,
        actor: &ActorContext,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.append(AuditEntry {
            application_id: record.id().clone(),
            from_state: from,
            to_state: Some(record.status()),
            action,
            actor_id: actor.actor_id.clone(),
            actor_role: actor.actor_role,
            succeeded: true,
            failure_reason: None,
            remarks,
            timestamp: record.timestamps().updated_at.max(now),
        });
    }

    #[allow(clippy::too_many_arguments)]
    fn record_failure(
        &self,
        application_id: &ApplicationId,
        from: Option<ApplicationStatus>,
        action: WorkflowAction,
        actor: &ActorContext,
        error: &WorkflowError,
        remarks: Option<String>,
        now: DateTime<Utc>,
    ) {
        warn!(
            application_id = %application_id,
            action = %action.label(),
            from = from.map(ApplicationStatus::label).unwrap_or("-"),
            actor = %actor.actor_id,
            role = %actor.actor_role,
            kind = ?error.kind(),
            reason = %error,
            "workflow request rejected"
        );
        self.append(AuditEntry {
            application_id: application_id.clone(),
            from_state: from,
            to_state: None,
            action,
            actor_id: actor.actor_id.clone(),
            actor_role: actor.actor_role,
            succeeded: false,
            failure_reason: Some(error.to_string()),
            remarks,
            timestamp: now,
        });
    }

    /// The commit is authoritative; a failed audit write is logged rather than surfaced.
    fn append(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.append(entry) {
            error!(error = %err, "failed to append workflow audit entry");
        }
    }
}

fn remarks_payload(field: RemarkField, remarks: Option<&str>) -> TransitionPayload {
    match remarks {
        Some(value) => TransitionPayload::default().with(field, value),
        None => TransitionPayload::default(),
    }
}

fn expect_view(view: Option<ApplicationStatusView>) -> ApplicationStatusView {
    view.unwrap_or_else(|| unreachable!("only DELETE removes a record"))
}
