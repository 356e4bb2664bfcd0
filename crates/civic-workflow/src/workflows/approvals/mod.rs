//! Approval workflow shared by property, water connection and shop registration applications.
//!
//! A clerk drafts and submits, an inspector decides or escalates, and an officer resolves
//! escalations. Every call goes through [`WorkflowEngine`], which checks the caller against
//! the transition table, commits under an optimistic version check and writes one audit entry.

pub mod audit;
pub mod clock;
pub mod documents;
pub mod domain;
pub mod escalation;
pub mod record;
pub mod repository;
pub mod role_gate;
pub mod router;
pub mod service;
pub mod transition;
pub mod validator;

#[cfg(test)]
mod tests;

pub use audit::{write_csv, AuditEntry, AuditError, AuditTrail, MemoryAuditTrail, WorkflowAction};
pub use clock::{Clock, SystemClock};
pub use documents::{DocumentRequirementChecker, DocumentRequirements};
pub use domain::{
    ActorContext, ActorId, ActorRefs, ActorRole, ApplicationId, ApplicationNumber,
    ApplicationStatus, ApplicationType, DocumentAttachment, DocumentReference, DocumentType,
    DraftApplication, Jurisdiction, PayloadFields, StageRemarks, StageTimestamps, WardId,
};
pub use escalation::{route, DecisionRecord, EscalationError, EscalationRouter, InspectionRoute};
pub use record::{ApplicationRecord, ApplicationStatusView};
pub use repository::{
    ApplicationRepository, CollaboratorError, DocumentStore, NoDocumentStore, ProvisioningHook,
    RepositoryError, WardDirectory,
};
pub use role_gate::RoleGate;
pub use router::approval_router;
pub use service::{TransitionRequest, WorkflowEngine, WorkflowError, WorkflowErrorKind};
pub use transition::{
    edge_for, InspectionDecision, OfficerDecision, RemarkField, Transition, TransitionEdge,
    TransitionPayload, TRANSITION_TABLE,
};
pub use validator::{TransitionRejection, TransitionValidator};
