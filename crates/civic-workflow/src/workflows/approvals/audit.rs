use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, ActorRole, ApplicationId, ApplicationStatus};
use super::transition::Transition;

/// What the caller tried to do. Non-transition calls are audited too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowAction {
    Create,
    SaveDraft,
    AttachDocument,
    Transition(Transition),
}

impl WorkflowAction {
    pub fn label(self) -> String {
        match self {
            WorkflowAction::Create => "CREATE".to_string(),
            WorkflowAction::SaveDraft => "SAVE_DRAFT".to_string(),
            WorkflowAction::AttachDocument => "ATTACH_DOCUMENT".to_string(),
            WorkflowAction::Transition(transition) => transition.label(),
        }
    }

    pub fn transition(self) -> Option<Transition> {
        match self {
            WorkflowAction::Transition(transition) => Some(transition),
            _ => None,
        }
    }
}

/// One attempt against an application, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub application_id: ApplicationId,
    /// `None` when the application did not exist (creation or an unknown id).
    pub from_state: Option<ApplicationStatus>,
    /// Resulting state for successful transitions.
    pub to_state: Option<ApplicationStatus>,
    pub action: WorkflowAction,
    pub actor_id: ActorId,
    pub actor_role: ActorRole,
    pub succeeded: bool,
    pub failure_reason: Option<String>,
    pub remarks: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only ledger of workflow attempts. Entries are never updated or removed.
pub trait AuditTrail: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
    fn entries_for(&self, application_id: &ApplicationId) -> Result<Vec<AuditEntry>, AuditError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("audit trail unavailable: {0}")]
    Unavailable(String),
}

/// Process-local ledger keyed by application id, preserving append order.
#[derive(Debug, Default, Clone)]
pub struct MemoryAuditTrail {
    entries: Arc<Mutex<HashMap<ApplicationId, Vec<AuditEntry>>>>,
}

impl MemoryAuditTrail {
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .map(|guard| guard.values().map(Vec::len).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditTrail for MemoryAuditTrail {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        guard
            .entry(entry.application_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    fn entries_for(&self, application_id: &ApplicationId) -> Result<Vec<AuditEntry>, AuditError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| AuditError::Unavailable("audit mutex poisoned".to_string()))?;
        Ok(guard.get(application_id).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Serialize)]
struct AuditCsvRow<'a> {
    application_id: &'a str,
    timestamp: String,
    action: String,
    from_state: &'static str,
    to_state: &'static str,
    actor_id: &'a str,
    actor_role: &'static str,
    succeeded: bool,
    failure_reason: &'a str,
    remarks: &'a str,
}

/// Export entries as CSV with a header row, for hand-off to records staff.
pub fn write_csv<W: Write>(entries: &[AuditEntry], writer: W) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for entry in entries {
        csv_writer.serialize(AuditCsvRow {
            application_id: &entry.application_id.0,
            timestamp: entry.timestamp.to_rfc3339(),
            action: entry.action.label(),
            from_state: entry.from_state.map(ApplicationStatus::label).unwrap_or(""),
            to_state: entry.to_state.map(ApplicationStatus::label).unwrap_or(""),
            actor_id: &entry.actor_id.0,
            actor_role: entry.actor_role.label(),
            succeeded: entry.succeeded,
            failure_reason: entry.failure_reason.as_deref().unwrap_or(""),
            remarks: entry.remarks.as_deref().unwrap_or(""),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
