use civic_workflow::workflows::approvals::{
    ActorId, ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus,
    ApplicationType, CollaboratorError, ProvisioningHook, RepositoryError, WardDirectory, WardId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

fn poisoned() -> RepositoryError {
    RepositoryError::Unavailable("repository mutex poisoned".to_string())
}

/// Process-local store with the same version check a database row lock would give.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<ApplicationId, ApplicationRecord>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().map_err(|_| poisoned())?;
        if guard.contains_key(record.id()) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id().clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().map_err(|_| poisoned())?;
        match guard.get(record.id()) {
            Some(current) if current.version() == expected_version => {
                guard.insert(record.id().clone(), record);
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().map_err(|_| poisoned())?;
        Ok(guard.get(id).cloned())
    }

    fn remove(&self, id: &ApplicationId, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().map_err(|_| poisoned())?;
        match guard.get(id) {
            Some(current) if current.version() == expected_version => {
                guard.remove(id);
                Ok(())
            }
            Some(_) => Err(RepositoryError::Conflict),
            None => Err(RepositoryError::NotFound),
        }
    }

    fn by_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().map_err(|_| poisoned())?;
        let mut records: Vec<_> = guard
            .values()
            .filter(|record| record.status() == status)
            .cloned()
            .collect();
        records.sort_by(|left, right| left.id().cmp(right.id()));
        Ok(records)
    }
}

/// Officer to ward assignments, loaded once at startup.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryWardDirectory {
    scopes: HashMap<ActorId, Vec<WardId>>,
}

impl InMemoryWardDirectory {
    /// Parse `officer:ward,ward;officer:ward` as used by `APP_OFFICER_WARDS`.
    pub(crate) fn parse(raw: &str) -> Result<Self, String> {
        let mut scopes = HashMap::new();
        for assignment in raw.split(';').map(str::trim).filter(|part| !part.is_empty()) {
            let (officer, wards) = assignment
                .split_once(':')
                .ok_or_else(|| format!("'{assignment}' must look like officer:ward,ward"))?;
            let wards: Vec<WardId> = wards
                .split(',')
                .map(str::trim)
                .filter(|ward| !ward.is_empty())
                .map(|ward| WardId(ward.to_string()))
                .collect();
            if wards.is_empty() {
                return Err(format!("officer '{}' has no wards", officer.trim()));
            }
            scopes.insert(ActorId(officer.trim().to_string()), wards);
        }
        Ok(Self { scopes })
    }

    pub(crate) fn assign(mut self, officer_id: &str, wards: &[&str]) -> Self {
        self.scopes.insert(
            ActorId(officer_id.to_string()),
            wards.iter().map(|ward| WardId(ward.to_string())).collect(),
        );
        self
    }
}

impl WardDirectory for InMemoryWardDirectory {
    fn ward_scope_of(&self, officer_id: &ActorId) -> Result<Vec<WardId>, CollaboratorError> {
        Ok(self.scopes.get(officer_id).cloned().unwrap_or_default())
    }
}

/// Stand-in for the billing/connection service. Repeated deliveries for the same
/// application are acknowledged without provisioning again.
#[derive(Default, Clone)]
pub(crate) struct LoggingProvisioning {
    provisioned: Arc<Mutex<HashSet<ApplicationId>>>,
}

impl LoggingProvisioning {
    pub(crate) fn provisioned(&self) -> Vec<ApplicationId> {
        let mut ids: Vec<_> = self
            .provisioned
            .lock()
            .map(|guard| guard.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

impl ProvisioningHook for LoggingProvisioning {
    fn on_application_approved(
        &self,
        application_id: &ApplicationId,
        application_type: ApplicationType,
    ) -> Result<(), CollaboratorError> {
        let mut guard = self
            .provisioned
            .lock()
            .map_err(|_| CollaboratorError::Transport("provisioning mutex poisoned".to_string()))?;
        if guard.insert(application_id.clone()) {
            info!(
                application_id = %application_id,
                application_type = application_type.label(),
                "downstream provisioning started"
            );
        } else {
            debug!(application_id = %application_id, "duplicate provisioning delivery ignored");
        }
        Ok(())
    }
}
