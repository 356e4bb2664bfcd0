use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::audit::{AuditError, AuditTrail};
use super::domain::{ActorId, ActorRole, ApplicationId, ApplicationStatus, WardId};
use super::record::ApplicationRecord;
use super::repository::{
    ApplicationRepository, CollaboratorError, RepositoryError, WardDirectory,
};
use super::transition::{InspectionDecision, Transition};

/// Where an inspector's decision sends the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionRoute {
    /// Back to the originating clerk for correction.
    Clerk,
    /// Workflow ends with the given terminal state.
    Closure(ApplicationStatus),
    /// Out of inspector hands into the officer queue.
    OfficerReview,
}

/// Route an inspector decision. Only inspector-origin transitions are routed here; officer
/// decisions always either close the application or send it back to the clerk.
pub fn route(decision: InspectionDecision) -> InspectionRoute {
    match decision {
        InspectionDecision::Return => InspectionRoute::Clerk,
        InspectionDecision::Approve => InspectionRoute::Closure(ApplicationStatus::Approved),
        InspectionDecision::Reject => InspectionRoute::Closure(ApplicationStatus::Rejected),
        InspectionDecision::Escalate => InspectionRoute::OfficerReview,
    }
}

/// A committed decision, reconstructed from the audit trail for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionRecord {
    pub transition: String,
    pub resulting_status: Option<ApplicationStatus>,
    pub actor_id: ActorId,
    pub actor_role: ActorRole,
    pub remarks: Option<String>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum EscalationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] CollaboratorError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Officer-facing view of escalated work.
///
/// Queue membership is derived from `ESCALATED` status, so an application leaves every
/// officer queue the moment a DECIDE commits. Each application sits in exactly one ward
/// queue (its originating ward); every officer scoped to that ward can see it.
pub struct EscalationRouter<R, L, D> {
    repository: Arc<R>,
    audit: Arc<L>,
    directory: Arc<D>,
}

impl<R, L, D> EscalationRouter<R, L, D>
where
    R: ApplicationRepository + 'static,
    L: AuditTrail + 'static,
    D: WardDirectory + 'static,
{
    pub fn new(repository: Arc<R>, audit: Arc<L>, directory: Arc<D>) -> Self {
        Self {
            repository,
            audit,
            directory,
        }
    }

    /// Escalated applications grouped by originating ward, ordered by escalation time.
    pub fn ward_queues(&self) -> Result<BTreeMap<WardId, Vec<ApplicationRecord>>, EscalationError> {
        let mut queues: BTreeMap<WardId, Vec<ApplicationRecord>> = BTreeMap::new();
        for record in self.repository.by_status(ApplicationStatus::Escalated)? {
            queues
                .entry(record.jurisdiction().ward_id.clone())
                .or_default()
                .push(record);
        }
        for queue in queues.values_mut() {
            queue.sort_by(|left, right| {
                left.timestamps()
                    .escalated_at
                    .cmp(&right.timestamps().escalated_at)
                    .then_with(|| left.id().cmp(right.id()))
            });
        }
        Ok(queues)
    }

    /// The active queue visible to one officer.
    pub fn queue_for(&self, officer_id: &ActorId) -> Result<Vec<ApplicationRecord>, EscalationError> {
        let scope: BTreeSet<WardId> = self.directory.ward_scope_of(officer_id)?.into_iter().collect();
        let queue = self
            .ward_queues()?
            .into_iter()
            .filter(|(ward, _)| scope.contains(ward))
            .flat_map(|(_, records)| records)
            .collect();
        Ok(queue)
    }

    pub fn is_visible_to(
        &self,
        officer_id: &ActorId,
        record: &ApplicationRecord,
    ) -> Result<bool, EscalationError> {
        if record.status() != ApplicationStatus::Escalated {
            return Ok(false);
        }
        let scope = self.directory.ward_scope_of(officer_id)?;
        Ok(scope.contains(&record.jurisdiction().ward_id))
    }

    /// Committed inspector and officer decisions, oldest first.
    pub fn decisions_for(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<DecisionRecord>, EscalationError> {
        let decisions = self
            .audit
            .entries_for(application_id)?
            .into_iter()
            .filter(|entry| entry.succeeded)
            .filter(|entry| {
                matches!(
                    entry.action.transition(),
                    Some(
                        Transition::Approve
                            | Transition::Reject
                            | Transition::Return
                            | Transition::Escalate
                            | Transition::Decide(_)
                    )
                )
            })
            .map(|entry| DecisionRecord {
                transition: entry.action.label(),
                resulting_status: entry.to_state,
                actor_id: entry.actor_id,
                actor_role: entry.actor_role,
                remarks: entry.remarks,
                decided_at: entry.timestamp,
            })
            .collect();
        Ok(decisions)
    }
}
