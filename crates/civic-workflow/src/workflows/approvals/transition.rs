use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ActorRole, ApplicationStatus, StageRemarks};

/// Decisions an inspector may record after (or instead of) opening an inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InspectionDecision {
    Approve,
    Reject,
    Return,
    Escalate,
}

impl InspectionDecision {
    pub const fn transition(self) -> Transition {
        match self {
            InspectionDecision::Approve => Transition::Approve,
            InspectionDecision::Reject => Transition::Reject,
            InspectionDecision::Return => Transition::Return,
            InspectionDecision::Escalate => Transition::Escalate,
        }
    }

    /// Slot that free-text remarks fill for this decision.
    pub const fn remarks_field(self) -> RemarkField {
        match self {
            InspectionDecision::Approve | InspectionDecision::Return => {
                RemarkField::InspectorRemarks
            }
            InspectionDecision::Reject => RemarkField::RejectionReason,
            InspectionDecision::Escalate => RemarkField::EscalationReason,
        }
    }

    /// Spread one free-text remark over `base`: it fills the slot the decision requires and is
    /// kept as the inspector's remarks unless `base` already carries some.
    pub fn payload_with(self, base: TransitionPayload, remarks: Option<&str>) -> TransitionPayload {
        let Some(remarks) = remarks else {
            return base;
        };
        let payload = base.with(self.remarks_field(), remarks);
        if payload.has(RemarkField::InspectorRemarks) {
            payload
        } else {
            payload.with(RemarkField::InspectorRemarks, remarks)
        }
    }
}

/// Decisions available to an officer on an escalated application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfficerDecision {
    Approve,
    Reject,
    SendBack,
}

impl OfficerDecision {
    pub const fn label(self) -> &'static str {
        match self {
            OfficerDecision::Approve => "APPROVE",
            OfficerDecision::Reject => "REJECT",
            OfficerDecision::SendBack => "SEND_BACK",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Submit,
    BeginInspection,
    Approve,
    Reject,
    Return,
    Escalate,
    Decide(OfficerDecision),
    Delete,
}

impl Transition {
    pub fn label(self) -> String {
        match self {
            Transition::Submit => "SUBMIT".to_string(),
            Transition::BeginInspection => "BEGIN_INSPECTION".to_string(),
            Transition::Approve => "APPROVE".to_string(),
            Transition::Reject => "REJECT".to_string(),
            Transition::Return => "RETURN".to_string(),
            Transition::Escalate => "ESCALATE".to_string(),
            Transition::Decide(decision) => format!("DECIDE({})", decision.label()),
            Transition::Delete => "DELETE".to_string(),
        }
    }

    /// Remark slots this transition is allowed to write. Everything else in a payload is ignored.
    pub const fn carried_fields(self) -> &'static [RemarkField] {
        match self {
            Transition::Submit => &[RemarkField::ClerkRemarks],
            Transition::BeginInspection | Transition::Delete => &[],
            Transition::Approve => &[RemarkField::InspectorRemarks],
            Transition::Reject => &[RemarkField::RejectionReason, RemarkField::InspectorRemarks],
            Transition::Return => &[RemarkField::InspectorRemarks, RemarkField::ReturnReason],
            Transition::Escalate => &[RemarkField::EscalationReason, RemarkField::InspectorRemarks],
            Transition::Decide(_) => &[RemarkField::OfficerRemarks],
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Remark slots on the record; each one is written only by the transition that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemarkField {
    ClerkRemarks,
    InspectorRemarks,
    RejectionReason,
    ReturnReason,
    EscalationReason,
    OfficerRemarks,
}

impl RemarkField {
    pub const fn label(self) -> &'static str {
        match self {
            RemarkField::ClerkRemarks => "clerk_remarks",
            RemarkField::InspectorRemarks => "inspector_remarks",
            RemarkField::RejectionReason => "rejection_reason",
            RemarkField::ReturnReason => "return_reason",
            RemarkField::EscalationReason => "escalation_reason",
            RemarkField::OfficerRemarks => "officer_remarks",
        }
    }

    /// Message shown to the caller when the field is missing.
    pub const fn requirement_message(self) -> &'static str {
        match self {
            RemarkField::ClerkRemarks => "Clerk remarks are required",
            RemarkField::InspectorRemarks => "Inspector remarks are required",
            RemarkField::RejectionReason => "Rejection reason is required",
            RemarkField::ReturnReason => "Return reason is required",
            RemarkField::EscalationReason => "Escalation reason is required",
            RemarkField::OfficerRemarks => "Officer remarks are required",
        }
    }
}

/// Transition-specific remarks supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    #[serde(default)]
    pub clerk_remarks: Option<String>,
    #[serde(default)]
    pub inspector_remarks: Option<String>,
    #[serde(default)]
    pub rejection_reason: Option<String>,
    #[serde(default)]
    pub return_reason: Option<String>,
    #[serde(default)]
    pub escalation_reason: Option<String>,
    #[serde(default)]
    pub officer_remarks: Option<String>,
}

impl TransitionPayload {
    pub fn get(&self, field: RemarkField) -> Option<&str> {
        let value = match field {
            RemarkField::ClerkRemarks => &self.clerk_remarks,
            RemarkField::InspectorRemarks => &self.inspector_remarks,
            RemarkField::RejectionReason => &self.rejection_reason,
            RemarkField::ReturnReason => &self.return_reason,
            RemarkField::EscalationReason => &self.escalation_reason,
            RemarkField::OfficerRemarks => &self.officer_remarks,
        };
        value.as_deref()
    }

    /// Present and non-blank.
    pub fn has(&self, field: RemarkField) -> bool {
        self.get(field)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn with(mut self, field: RemarkField, value: impl Into<String>) -> Self {
        let value = Some(value.into());
        match field {
            RemarkField::ClerkRemarks => self.clerk_remarks = value,
            RemarkField::InspectorRemarks => self.inspector_remarks = value,
            RemarkField::RejectionReason => self.rejection_reason = value,
            RemarkField::ReturnReason => self.return_reason = value,
            RemarkField::EscalationReason => self.escalation_reason = value,
            RemarkField::OfficerRemarks => self.officer_remarks = value,
        }
        self
    }

    /// Keep only the remarks `transition` may write, trimmed, with blanks dropped.
    pub fn scoped_to(&self, transition: Transition) -> TransitionPayload {
        let mut scoped = TransitionPayload::default();
        for field in transition.carried_fields() {
            if let Some(value) = self.get(*field) {
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    scoped = scoped.with(*field, trimmed);
                }
            }
        }
        scoped
    }

    /// Copy present fields onto the record. Absent fields never clear earlier remarks.
    pub(crate) fn apply_to(&self, remarks: &mut StageRemarks) {
        fn merge(slot: &mut Option<String>, incoming: &Option<String>) {
            if let Some(value) = incoming {
                *slot = Some(value.clone());
            }
        }

        merge(&mut remarks.clerk_remarks, &self.clerk_remarks);
        merge(&mut remarks.inspector_remarks, &self.inspector_remarks);
        merge(&mut remarks.rejection_reason, &self.rejection_reason);
        merge(&mut remarks.return_reason, &self.return_reason);
        merge(&mut remarks.escalation_reason, &self.escalation_reason);
        merge(&mut remarks.officer_remarks, &self.officer_remarks);
    }

    /// The most specific remark, recorded alongside audit entries.
    pub(crate) fn summary(&self) -> Option<String> {
        [
            &self.rejection_reason,
            &self.escalation_reason,
            &self.officer_remarks,
            &self.inspector_remarks,
            &self.return_reason,
            &self.clerk_remarks,
        ]
        .into_iter()
        .flatten()
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
    }
}

/// One row of the approval state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEdge {
    pub from: ApplicationStatus,
    pub transition: Transition,
    /// `None` means the record is removed.
    pub to: Option<ApplicationStatus>,
    pub role: ActorRole,
    pub creator_only: bool,
    pub required_field: Option<RemarkField>,
    pub requires_documents: bool,
}

const fn edge(
    from: ApplicationStatus,
    transition: Transition,
    to: Option<ApplicationStatus>,
    role: ActorRole,
    required_field: Option<RemarkField>,
) -> TransitionEdge {
    TransitionEdge {
        from,
        transition,
        to,
        role,
        creator_only: matches!(role, ActorRole::Clerk),
        required_field,
        requires_documents: matches!(transition, Transition::Submit),
    }
}

use super::domain::ActorRole::{Clerk, Inspector, Officer};
use super::domain::ApplicationStatus::{
    Approved, Draft, Escalated, Rejected, Returned, Submitted, UnderInspection,
};

/// Every legal edge. Anything absent from this table is rejected.
pub const TRANSITION_TABLE: &[TransitionEdge] = &[
    edge(Draft, Transition::Submit, Some(Submitted), Clerk, None),
    edge(Draft, Transition::Delete, None, Clerk, None),
    edge(Returned, Transition::Submit, Some(Submitted), Clerk, None),
    edge(Submitted, Transition::BeginInspection, Some(UnderInspection), Inspector, None),
    edge(Submitted, Transition::Approve, Some(Approved), Inspector, None),
    edge(UnderInspection, Transition::Approve, Some(Approved), Inspector, None),
    edge(
        Submitted,
        Transition::Reject,
        Some(Rejected),
        Inspector,
        Some(RemarkField::RejectionReason),
    ),
    edge(
        UnderInspection,
        Transition::Reject,
        Some(Rejected),
        Inspector,
        Some(RemarkField::RejectionReason),
    ),
    edge(
        Submitted,
        Transition::Return,
        Some(Returned),
        Inspector,
        Some(RemarkField::InspectorRemarks),
    ),
    edge(
        UnderInspection,
        Transition::Return,
        Some(Returned),
        Inspector,
        Some(RemarkField::InspectorRemarks),
    ),
    edge(
        Submitted,
        Transition::Escalate,
        Some(Escalated),
        Inspector,
        Some(RemarkField::EscalationReason),
    ),
    edge(
        UnderInspection,
        Transition::Escalate,
        Some(Escalated),
        Inspector,
        Some(RemarkField::EscalationReason),
    ),
    edge(
        Escalated,
        Transition::Decide(OfficerDecision::Approve),
        Some(Approved),
        Officer,
        None,
    ),
    edge(
        Escalated,
        Transition::Decide(OfficerDecision::Reject),
        Some(Rejected),
        Officer,
        Some(RemarkField::OfficerRemarks),
    ),
    edge(
        Escalated,
        Transition::Decide(OfficerDecision::SendBack),
        Some(Returned),
        Officer,
        Some(RemarkField::OfficerRemarks),
    ),
];

/// Look up the edge for `transition` leaving `from`, regardless of who asks.
pub fn edge_for(from: ApplicationStatus, transition: Transition) -> Option<&'static TransitionEdge> {
    TRANSITION_TABLE
        .iter()
        .find(|edge| edge.from == from && edge.transition == transition)
}
