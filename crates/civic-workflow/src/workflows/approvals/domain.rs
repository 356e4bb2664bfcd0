use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for workflow applications.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Human-readable code printed on notices and demands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationNumber(pub String);

impl fmt::Display for ApplicationNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WardId(pub String);

impl fmt::Display for WardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Application families sharing the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    Property,
    WaterConnection,
    ShopRegistration,
}

impl ApplicationType {
    pub const ALL: [ApplicationType; 3] = [
        ApplicationType::Property,
        ApplicationType::WaterConnection,
        ApplicationType::ShopRegistration,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationType::Property => "PROPERTY",
            ApplicationType::WaterConnection => "WATER_CONNECTION",
            ApplicationType::ShopRegistration => "SHOP_REGISTRATION",
        }
    }

    /// Prefix used when minting application numbers.
    pub const fn number_prefix(self) -> &'static str {
        match self {
            ApplicationType::Property => "PRP",
            ApplicationType::WaterConnection => "WTR",
            ApplicationType::ShopRegistration => "SHP",
        }
    }
}

/// Closed set of workflow states. `Completed` is only ever written by the provisioning side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    UnderInspection,
    Returned,
    Escalated,
    Approved,
    Rejected,
    Completed,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 8] = [
        ApplicationStatus::Draft,
        ApplicationStatus::Submitted,
        ApplicationStatus::UnderInspection,
        ApplicationStatus::Returned,
        ApplicationStatus::Escalated,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
        ApplicationStatus::Completed,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Draft => "DRAFT",
            ApplicationStatus::Submitted => "SUBMITTED",
            ApplicationStatus::UnderInspection => "UNDER_INSPECTION",
            ApplicationStatus::Returned => "RETURNED",
            ApplicationStatus::Escalated => "ESCALATED",
            ApplicationStatus::Approved => "APPROVED",
            ApplicationStatus::Rejected => "REJECTED",
            ApplicationStatus::Completed => "COMPLETED",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected | ApplicationStatus::Completed
        )
    }

    /// States from which the creating clerk may still edit the application.
    pub const fn is_editable(self) -> bool {
        matches!(self, ApplicationStatus::Draft | ApplicationStatus::Returned)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Console roles. Only clerks, inspectors and officers drive the approval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Citizen,
    Clerk,
    Inspector,
    Officer,
    Collector,
    Supervisor,
    Administrator,
}

impl ActorRole {
    pub const ALL: [ActorRole; 7] = [
        ActorRole::Citizen,
        ActorRole::Clerk,
        ActorRole::Inspector,
        ActorRole::Officer,
        ActorRole::Collector,
        ActorRole::Supervisor,
        ActorRole::Administrator,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ActorRole::Citizen => "CITIZEN",
            ActorRole::Clerk => "CLERK",
            ActorRole::Inspector => "INSPECTOR",
            ActorRole::Officer => "OFFICER",
            ActorRole::Collector => "COLLECTOR",
            ActorRole::Supervisor => "SUPERVISOR",
            ActorRole::Administrator => "ADMINISTRATOR",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Explicit caller context handed to every workflow call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub actor_id: ActorId,
    pub actor_role: ActorRole,
    #[serde(default)]
    pub is_creator: bool,
}

impl ActorContext {
    pub fn new(actor_id: impl Into<String>, actor_role: ActorRole, is_creator: bool) -> Self {
        Self {
            actor_id: ActorId(actor_id.into()),
            actor_role,
            is_creator,
        }
    }

    pub fn clerk(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorRole::Clerk, true)
    }

    pub fn inspector(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorRole::Inspector, false)
    }

    pub fn officer(actor_id: impl Into<String>) -> Self {
        Self::new(actor_id, ActorRole::Officer, false)
    }
}

/// Administrative scope of the ward an application originated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub ulb_id: String,
    pub ward_id: WardId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentType {
    ApplicationForm,
    IdProof,
    AddressProof,
    OwnershipProof,
    TaxReceipt,
    SitePlan,
    NoObjectionCertificate,
    Photograph,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            DocumentType::ApplicationForm => "APPLICATION_FORM",
            DocumentType::IdProof => "ID_PROOF",
            DocumentType::AddressProof => "ADDRESS_PROOF",
            DocumentType::OwnershipProof => "OWNERSHIP_PROOF",
            DocumentType::TaxReceipt => "TAX_RECEIPT",
            DocumentType::SitePlan => "SITE_PLAN",
            DocumentType::NoObjectionCertificate => "NO_OBJECTION_CERTIFICATE",
            DocumentType::Photograph => "PHOTOGRAPH",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        [
            DocumentType::ApplicationForm,
            DocumentType::IdProof,
            DocumentType::AddressProof,
            DocumentType::OwnershipProof,
            DocumentType::TaxReceipt,
            DocumentType::SitePlan,
            DocumentType::NoObjectionCertificate,
            DocumentType::Photograph,
        ]
        .into_iter()
        .find(|candidate| candidate.label() == normalized)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque pointer to a stored document; the workflow never reads the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentReference {
    pub document_type: DocumentType,
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAttachment {
    pub document_type: DocumentType,
    pub reference: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Who performed each stage. Set once, except `inspected_by` which follows the latest inspector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRefs {
    pub created_by: ActorId,
    pub submitted_by: Option<ActorId>,
    pub inspected_by: Option<ActorId>,
    pub decided_by_officer: Option<ActorId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRemarks {
    pub clerk_remarks: Option<String>,
    pub inspector_remarks: Option<String>,
    pub rejection_reason: Option<String>,
    pub return_reason: Option<String>,
    pub escalation_reason: Option<String>,
    pub officer_remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimestamps {
    pub created_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub decided_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StageTimestamps {
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            created_at: at,
            submitted_at: None,
            inspected_at: None,
            escalated_at: None,
            decided_at: None,
            updated_at: at,
        }
    }
}

/// Type-specific business data. The workflow stores it but never looks inside.
pub type PayloadFields = BTreeMap<String, serde_json::Value>;

/// Draft request captured from the clerk console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftApplication {
    pub application_type: ApplicationType,
    pub jurisdiction: Jurisdiction,
    #[serde(default)]
    pub payload_fields: PayloadFields,
    #[serde(default)]
    pub documents: Vec<DocumentReference>,
}
