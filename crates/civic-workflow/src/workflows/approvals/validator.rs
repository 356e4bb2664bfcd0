use super::domain::{ActorContext, ActorRole, ApplicationStatus, DocumentType};
use super::role_gate::RoleGate;
use super::transition::{edge_for, RemarkField, Transition, TransitionEdge, TransitionPayload};

/// Typed reasons a transition request is refused before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionRejection {
    #[error("{transition} is not permitted from {from} for role {role}")]
    InvalidTransition {
        from: ApplicationStatus,
        transition: Transition,
        role: ActorRole,
    },
    #[error("{action} is not permitted for role {role}")]
    ActionNotPermitted { action: String, role: ActorRole },
    #[error("{}", .field.requirement_message())]
    MissingRequiredField { field: RemarkField },
    #[error("mandatory documents missing: {}", join_documents(.missing))]
    DocumentRequirementNotMet { missing: Vec<DocumentType> },
    #[error("{reason}")]
    PreconditionFailed { reason: String },
}

fn join_documents(missing: &[DocumentType]) -> String {
    missing
        .iter()
        .map(|document| document.label())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pure check of (state, transition, actor, payload) against the transition table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionValidator {
    gate: RoleGate,
}

impl TransitionValidator {
    pub fn new(gate: RoleGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &RoleGate {
        &self.gate
    }

    /// Accept with the matching edge, or reject without side effects.
    ///
    /// Checks run in a fixed order: DELETE precondition, source state, role and creator
    /// scope, then required remarks. Document requirements are checked by the engine.
    pub fn validate(
        &self,
        from: ApplicationStatus,
        transition: Transition,
        actor: &ActorContext,
        payload: &TransitionPayload,
    ) -> Result<&'static TransitionEdge, TransitionRejection> {
        if transition == Transition::Delete && from != ApplicationStatus::Draft {
            return Err(TransitionRejection::PreconditionFailed {
                reason: format!("only DRAFT applications can be deleted (current status {from})"),
            });
        }

        let invalid = || TransitionRejection::InvalidTransition {
            from,
            transition,
            role: actor.actor_role,
        };

        let edge = edge_for(from, transition).ok_or_else(invalid)?;
        if !self.gate.permits(from, transition, actor) {
            return Err(invalid());
        }

        if let Some(field) = edge.required_field {
            if !payload.has(field) {
                return Err(TransitionRejection::MissingRequiredField { field });
            }
        }

        Ok(edge)
    }
}
