use super::domain::{ActorId, ApplicationId, ApplicationStatus, ApplicationType, DocumentReference, WardId};
use super::record::ApplicationRecord;

/// Storage abstraction so the engine can be exercised in isolation.
///
/// `update` and `remove` take the version the caller read; implementations must refuse the
/// write with [`RepositoryError::Conflict`] when the stored version differs.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord, expected_version: u64)
        -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn remove(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError>;
    fn by_status(&self, status: ApplicationStatus)
        -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Externally owned document store; read-only from the workflow's point of view.
pub trait DocumentStore: Send + Sync {
    fn list_documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<DocumentReference>, CollaboratorError>;
}

/// Externally owned role/ward directory used to scope officer queues.
pub trait WardDirectory: Send + Sync {
    fn ward_scope_of(&self, officer_id: &ActorId) -> Result<Vec<WardId>, CollaboratorError>;
}

/// Downstream hook fired after an application reaches APPROVED.
///
/// Delivery is at-least-once, so implementations must be idempotent on `application_id`.
pub trait ProvisioningHook: Send + Sync {
    fn on_application_approved(
        &self,
        application_id: &ApplicationId,
        application_type: ApplicationType,
    ) -> Result<(), CollaboratorError>;
}

/// Failure talking to an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator transport unavailable: {0}")]
    Transport(String),
    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

/// Used where documents are only ever attached through the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDocumentStore;

impl DocumentStore for NoDocumentStore {
    fn list_documents(
        &self,
        _application_id: &ApplicationId,
    ) -> Result<Vec<DocumentReference>, CollaboratorError> {
        Ok(Vec::new())
    }
}
