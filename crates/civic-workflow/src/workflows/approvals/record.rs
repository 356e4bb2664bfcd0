use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ActorContext, ActorId, ActorRefs, ApplicationId, ApplicationNumber, ApplicationStatus,
    ApplicationType, DocumentAttachment, DocumentReference, Jurisdiction, PayloadFields,
    StageRemarks, StageTimestamps,
};
use super::role_gate::RoleGate;
use super::transition::{OfficerDecision, Transition, TransitionEdge, TransitionPayload};
use super::validator::TransitionRejection;

/// Persisted application. Fields are private so status only moves through the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    id: ApplicationId,
    application_number: ApplicationNumber,
    application_type: ApplicationType,
    jurisdiction: Jurisdiction,
    status: ApplicationStatus,
    payload_fields: PayloadFields,
    documents: Vec<DocumentAttachment>,
    actor_refs: ActorRefs,
    remarks: StageRemarks,
    timestamps: StageTimestamps,
    version: u64,
}

impl ApplicationRecord {
    pub(crate) fn draft(
        id: ApplicationId,
        application_number: ApplicationNumber,
        application_type: ApplicationType,
        jurisdiction: Jurisdiction,
        payload_fields: PayloadFields,
        created_by: ActorId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            application_number,
            application_type,
            jurisdiction,
            status: ApplicationStatus::Draft,
            payload_fields,
            documents: Vec::new(),
            actor_refs: ActorRefs {
                created_by,
                submitted_by: None,
                inspected_by: None,
                decided_by_officer: None,
            },
            remarks: StageRemarks::default(),
            timestamps: StageTimestamps::starting_at(now),
            version: 0,
        }
    }

    pub fn id(&self) -> &ApplicationId {
        &self.id
    }

    pub fn application_number(&self) -> &ApplicationNumber {
        &self.application_number
    }

    pub fn application_type(&self) -> ApplicationType {
        self.application_type
    }

    pub fn jurisdiction(&self) -> &Jurisdiction {
        &self.jurisdiction
    }

    pub fn status(&self) -> ApplicationStatus {
        self.status
    }

    pub fn payload_fields(&self) -> &PayloadFields {
        &self.payload_fields
    }

    pub fn documents(&self) -> &[DocumentAttachment] {
        &self.documents
    }

    pub fn actor_refs(&self) -> &ActorRefs {
        &self.actor_refs
    }

    pub fn remarks(&self) -> &StageRemarks {
        &self.remarks
    }

    pub fn timestamps(&self) -> &StageTimestamps {
        &self.timestamps
    }

    /// Optimistic concurrency token; bumped by every committed change.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// `actor` with its creator claim checked against `created_by`. A caller-supplied
    /// `is_creator` only counts when the actor id matches the drafting clerk.
    pub fn resolve_actor(&self, actor: &ActorContext) -> ActorContext {
        ActorContext {
            is_creator: actor.is_creator && actor.actor_id == self.actor_refs.created_by,
            ..actor.clone()
        }
    }

    /// Apply an accepted edge. Stage timestamps and actor refs are write-once; remarks are
    /// only written by the transition that carries them and never cleared.
    pub(crate) fn commit(
        &mut self,
        edge: &TransitionEdge,
        actor: &ActorContext,
        payload: &TransitionPayload,
        now: DateTime<Utc>,
    ) {
        let now = self.touch(now);
        let actor_id = actor.actor_id.clone();

        match edge.transition {
            Transition::Submit => {
                self.actor_refs.submitted_by.get_or_insert(actor_id);
                self.timestamps.submitted_at.get_or_insert(now);
            }
            Transition::BeginInspection
            | Transition::Approve
            | Transition::Reject
            | Transition::Return
            | Transition::Escalate => {
                self.actor_refs.inspected_by = Some(actor_id);
                self.timestamps.inspected_at.get_or_insert(now);
            }
            Transition::Decide(_) => {
                self.actor_refs.decided_by_officer.get_or_insert(actor_id);
            }
            Transition::Delete => {}
        }

        match edge.transition {
            Transition::Escalate => {
                self.timestamps.escalated_at.get_or_insert(now);
            }
            Transition::Approve
            | Transition::Reject
            | Transition::Decide(OfficerDecision::Approve)
            | Transition::Decide(OfficerDecision::Reject) => {
                self.timestamps.decided_at.get_or_insert(now);
            }
            _ => {}
        }

        let mut scoped = payload.scoped_to(edge.transition);
        if edge.transition == Transition::Return && scoped.return_reason.is_none() {
            scoped.return_reason = scoped.inspector_remarks.clone();
        }
        scoped.apply_to(&mut self.remarks);

        if let Some(to) = edge.to {
            self.status = to;
        }
    }

    pub(crate) fn replace_payload(&mut self, payload_fields: PayloadFields, now: DateTime<Utc>) {
        self.touch(now);
        self.payload_fields = payload_fields;
    }

    /// Append a document unless the same type/reference pair is already attached.
    pub(crate) fn attach(&mut self, document: DocumentReference, now: DateTime<Utc>) -> bool {
        let duplicate = self.documents.iter().any(|existing| {
            existing.document_type == document.document_type
                && existing.reference == document.reference
        });
        if duplicate {
            return false;
        }

        let now = self.touch(now);
        self.documents.push(DocumentAttachment {
            document_type: document.document_type,
            reference: document.reference,
            uploaded_at: now,
        });
        true
    }

    /// Bookkeeping step owned by the provisioning side: approved water connections become
    /// `COMPLETED` once the connection is live.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), TransitionRejection> {
        if self.application_type != ApplicationType::WaterConnection
            || self.status != ApplicationStatus::Approved
        {
            return Err(TransitionRejection::PreconditionFailed {
                reason: format!(
                    "only APPROVED water connections can be completed (found {} {})",
                    self.application_type.label(),
                    self.status
                ),
            });
        }
        self.touch(now);
        self.status = ApplicationStatus::Completed;
        Ok(())
    }

    /// Advance `updated_at` monotonically and bump the version; returns the effective time.
    fn touch(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = now.max(self.timestamps.updated_at);
        self.timestamps.updated_at = now;
        self.version += 1;
        now
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        ApplicationStatusView {
            application_id: self.id.clone(),
            application_number: self.application_number.clone(),
            application_type: self.application_type,
            status: self.status,
            timestamps: self.timestamps.clone(),
            actor_refs: self.actor_refs.clone(),
            remarks: self.remarks.clone(),
            documents: self.documents.len(),
            available_actions: None,
        }
    }

    /// Status view plus the transitions `actor` may request right now.
    pub fn status_view_for(&self, gate: &RoleGate, actor: &ActorContext) -> ApplicationStatusView {
        let mut view = self.status_view();
        view.available_actions = Some(
            gate.allowed_for(self.status, actor)
                .into_iter()
                .map(|transition| transition.label())
                .collect(),
        );
        view
    }
}

/// Projection returned to callers after each operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub application_number: ApplicationNumber,
    pub application_type: ApplicationType,
    pub status: ApplicationStatus,
    pub timestamps: StageTimestamps,
    pub actor_refs: ActorRefs,
    pub remarks: StageRemarks,
    pub documents: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_actions: Option<Vec<String>>,
}
