use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::approvals::audit::{AuditEntry, AuditError, AuditTrail, MemoryAuditTrail};
use crate::workflows::approvals::clock::Clock;
use crate::workflows::approvals::documents::DocumentRequirementChecker;
use crate::workflows::approvals::domain::{
    ActorContext, ActorId, ApplicationId, ApplicationStatus, ApplicationType, DocumentReference,
    DocumentType, DraftApplication, Jurisdiction, WardId,
};
use crate::workflows::approvals::record::ApplicationRecord;
use crate::workflows::approvals::repository::{
    ApplicationRepository, CollaboratorError, DocumentStore, ProvisioningHook, RepositoryError,
    WardDirectory,
};
use crate::workflows::approvals::service::WorkflowEngine;

pub(super) type TestEngine = WorkflowEngine<MemoryRepository, MemoryAuditTrail, CountingProvisioning>;

pub(super) struct Harness {
    pub(super) engine: TestEngine,
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) audit: Arc<MemoryAuditTrail>,
    pub(super) provisioning: Arc<CountingProvisioning>,
    pub(super) clock: Arc<ManualClock>,
}

impl Harness {
    pub(super) fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(MemoryAuditTrail::default());
    let provisioning = Arc::new(CountingProvisioning::default());
    let clock = Arc::new(ManualClock::starting_at(start_time()));
    let engine = WorkflowEngine::new(
        repository.clone(),
        audit.clone(),
        provisioning.clone(),
        DocumentRequirementChecker::default(),
    )
    .with_clock(clock.clone());

    Harness {
        engine,
        repository,
        audit,
        provisioning,
        clock,
    }
}

pub(super) fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap()
}

pub(super) fn clerk() -> ActorContext {
    ActorContext::clerk("clerk-ward7")
}

pub(super) fn inspector() -> ActorContext {
    ActorContext::inspector("insp-ward7")
}

pub(super) fn officer() -> ActorContext {
    ActorContext::officer("officer-zone2")
}

pub(super) fn jurisdiction(ward: &str) -> Jurisdiction {
    Jurisdiction {
        ulb_id: "ulb-ranchi".to_string(),
        ward_id: WardId(ward.to_string()),
    }
}

pub(super) fn document(document_type: DocumentType) -> DocumentReference {
    DocumentReference {
        document_type,
        reference: format!("dms://{}", document_type.label().to_ascii_lowercase()),
    }
}

pub(super) fn water_documents() -> Vec<DocumentReference> {
    vec![
        document(DocumentType::ApplicationForm),
        document(DocumentType::IdProof),
        document(DocumentType::AddressProof),
    ]
}

pub(super) fn water_draft(ward: &str, documents: Vec<DocumentReference>) -> DraftApplication {
    let mut payload_fields = BTreeMap::new();
    payload_fields.insert("connection_size_mm".to_string(), Value::from(15));
    payload_fields.insert("holding_no".to_string(), Value::from("07-118-B"));
    DraftApplication {
        application_type: ApplicationType::WaterConnection,
        jurisdiction: jurisdiction(ward),
        payload_fields,
        documents,
    }
}

/// Create a complete water connection draft and submit it.
pub(super) fn submitted_application(harness: &Harness, ward: &str) -> ApplicationId {
    let view = harness
        .engine
        .create_draft(&clerk(), water_draft(ward, water_documents()))
        .expect("draft created");
    harness.clock.advance_minutes(5);
    harness
        .engine
        .submit(&view.application_id, &clerk())
        .expect("submit succeeds");
    view.application_id
}

pub(super) fn escalated_application(harness: &Harness, ward: &str) -> ApplicationId {
    let id = submitted_application(harness, ward);
    harness.clock.advance_minutes(30);
    harness
        .engine
        .inspect(
            &id,
            &inspector(),
            crate::workflows::approvals::InspectionDecision::Escalate,
            Some("Pipeline crosses a state highway; needs officer sign-off"),
        )
        .expect("escalation succeeds");
    id
}

pub(super) fn stored(harness: &Harness, id: &ApplicationId) -> ApplicationRecord {
    harness
        .repository
        .fetch(id)
        .expect("fetch succeeds")
        .expect("record present")
}

pub(super) fn history(harness: &Harness, id: &ApplicationId) -> Vec<AuditEntry> {
    harness.audit.entries_for(id).expect("audit readable")
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(record.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let current = guard.get(record.id()).ok_or(RepositoryError::NotFound)?;
        if current.version() != expected_version {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id().clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let current = guard.get(id).ok_or(RepositoryError::NotFound)?;
        if current.version() != expected_version {
            return Err(RepositoryError::Conflict);
        }
        guard.remove(id);
        Ok(())
    }

    fn by_status(&self, status: ApplicationStatus) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<_> = guard
            .values()
            .filter(|record| record.status() == status)
            .cloned()
            .collect();
        records.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(records)
    }
}

/// Lets an identical competing write land first on the next update, so the caller's own
/// write arrives with a stale version.
#[derive(Default)]
pub(super) struct RacingRepository {
    pub(super) inner: MemoryRepository,
    armed: AtomicBool,
}

impl RacingRepository {
    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl ApplicationRepository for RacingRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(&self, record: ApplicationRecord, expected_version: u64) -> Result<(), RepositoryError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.inner.update(record.clone(), expected_version)?;
        }
        self.inner.update(record, expected_version)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn remove(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError> {
        self.inner.remove(id, expected_version)
    }

    fn by_status(&self, status: ApplicationStatus) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.by_status(status)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord, _expected_version: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn remove(&self, _id: &ApplicationId, _expected_version: u64) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn by_status(&self, _status: ApplicationStatus) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingAuditTrail;

impl AuditTrail for FailingAuditTrail {
    fn append(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Unavailable("ledger offline".to_string()))
    }

    fn entries_for(&self, _application_id: &ApplicationId) -> Result<Vec<AuditEntry>, AuditError> {
        Err(AuditError::Unavailable("ledger offline".to_string()))
    }
}

/// Records every delivery and provisions each application at most once.
#[derive(Default)]
pub(super) struct CountingProvisioning {
    deliveries: Mutex<Vec<ApplicationId>>,
    provisioned: Mutex<HashSet<ApplicationId>>,
    fail: AtomicBool,
}

impl CountingProvisioning {
    pub(super) fn failing() -> Self {
        Self {
            fail: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub(super) fn deliveries(&self) -> usize {
        self.deliveries.lock().expect("provisioning mutex poisoned").len()
    }

    pub(super) fn provisioned(&self) -> usize {
        self.provisioned
            .lock()
            .expect("provisioning mutex poisoned")
            .len()
    }
}

impl ProvisioningHook for CountingProvisioning {
    fn on_application_approved(
        &self,
        application_id: &ApplicationId,
        _application_type: ApplicationType,
    ) -> Result<(), CollaboratorError> {
        self.deliveries
            .lock()
            .expect("provisioning mutex poisoned")
            .push(application_id.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Transport("billing gateway timeout".to_string()));
        }
        self.provisioned
            .lock()
            .expect("provisioning mutex poisoned")
            .insert(application_id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct StaticDocumentStore {
    documents: Mutex<HashMap<ApplicationId, Vec<DocumentReference>>>,
}

impl StaticDocumentStore {
    pub(super) fn upload(&self, id: &ApplicationId, document: DocumentReference) {
        self.documents
            .lock()
            .expect("document mutex poisoned")
            .entry(id.clone())
            .or_default()
            .push(document);
    }
}

impl DocumentStore for StaticDocumentStore {
    fn list_documents(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Vec<DocumentReference>, CollaboratorError> {
        Ok(self
            .documents
            .lock()
            .expect("document mutex poisoned")
            .get(application_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(super) struct StaticWardDirectory {
    scopes: HashMap<ActorId, Vec<WardId>>,
}

impl StaticWardDirectory {
    pub(super) fn with_scope(mut self, officer_id: &str, wards: &[&str]) -> Self {
        self.scopes.insert(
            ActorId(officer_id.to_string()),
            wards.iter().map(|ward| WardId(ward.to_string())).collect(),
        );
        self
    }
}

impl WardDirectory for StaticWardDirectory {
    fn ward_scope_of(&self, officer_id: &ActorId) -> Result<Vec<WardId>, CollaboratorError> {
        Ok(self.scopes.get(officer_id).cloned().unwrap_or_default())
    }
}

pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance_minutes(&self, minutes: i64) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += Duration::minutes(minutes);
    }

    pub(super) fn rewind_minutes(&self, minutes: i64) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard -= Duration::minutes(minutes);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
