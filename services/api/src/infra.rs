use async_trait::async_trait;
use chrono::Utc;
use intake_wizard::config::{ConfigError, IntakeConfig};
use intake_wizard::workflows::intake::{
    ApplicantId, ApplicationRecord, EnrollmentGateway, EnrollmentRecord, EnrollmentRequest,
    FetchGateway, FileReference, GatewayError, IntakeGateways, Notice, NoticeLevel,
    NotificationSink, PendingEnrollment, PendingEnrollmentStore, PersistenceGateway, RecordPatch,
    UploadFile, UploadGateway,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use url::Url;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Applicant records held in process; stands in for the remote applicant store.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicantStore {
    records: Arc<Mutex<HashMap<ApplicantId, ApplicationRecord>>>,
}

impl InMemoryApplicantStore {
    pub(crate) fn snapshot(&self, applicant_id: &ApplicantId) -> Option<ApplicationRecord> {
        let guard = self.records.lock().expect("applicant store mutex poisoned");
        guard.get(applicant_id).cloned()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryApplicantStore {
    async fn patch(
        &self,
        applicant_id: &ApplicantId,
        patch: RecordPatch,
    ) -> Result<ApplicationRecord, GatewayError> {
        let mut guard = self.records.lock().expect("applicant store mutex poisoned");
        let record = guard.entry(applicant_id.clone()).or_default();
        record.apply_patch(&patch);
        Ok(record.clone())
    }
}

#[async_trait]
impl FetchGateway for InMemoryApplicantStore {
    async fn get(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<ApplicationRecord>, GatewayError> {
        Ok(self.snapshot(applicant_id))
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryEnrollments {
    next_id: Arc<AtomicU64>,
    created: Arc<Mutex<Vec<EnrollmentRecord>>>,
}

impl InMemoryEnrollments {
    pub(crate) fn created(&self) -> Vec<EnrollmentRecord> {
        self.created
            .lock()
            .expect("enrollment mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl EnrollmentGateway for InMemoryEnrollments {
    async fn create(&self, request: EnrollmentRequest) -> Result<EnrollmentRecord, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = EnrollmentRecord {
            enrollment_id: format!("enr-{id:05}"),
            course_id: request.course_id,
            intake_id: request.intake_id,
            applicant_id: request.applicant_id,
        };
        self.created
            .lock()
            .expect("enrollment mutex poisoned")
            .push(record.clone());
        Ok(record)
    }
}

/// Files documents under a fixed base URL; only the reference is kept, never the bytes.
#[derive(Clone)]
pub(crate) struct StaticUploadGateway {
    base: Url,
}

impl StaticUploadGateway {
    pub(crate) fn new(base: &str) -> Result<Self, ConfigError> {
        let base = Url::parse(base).map_err(|source| ConfigError::InvalidUploadUrl {
            value: base.to_string(),
            source,
        })?;
        Ok(Self { base })
    }
}

#[async_trait]
impl UploadGateway for StaticUploadGateway {
    async fn upload(&self, file: UploadFile) -> Result<FileReference, GatewayError> {
        let file_name = file.file_name.trim();
        if file_name.is_empty() || file_name.contains('/') {
            return Err(GatewayError::Rejected(format!(
                "'{}' is not a valid file name",
                file.file_name
            )));
        }
        let key = format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S"), file_name);
        let url = self
            .base
            .join(&key)
            .map_err(|err| GatewayError::Rejected(err.to_string()))?;
        info!(
            file = file_name,
            bytes = file.bytes.len(),
            content_type = file.content_type.as_deref().unwrap_or("application/octet-stream"),
            %url,
            "stored uploaded document"
        );
        Ok(FileReference {
            file_url: url.to_string(),
            file_name: file_name.to_string(),
        })
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryPendingEnrollments {
    entries: Arc<Mutex<HashMap<ApplicantId, PendingEnrollment>>>,
}

impl PendingEnrollmentStore for InMemoryPendingEnrollments {
    fn remember(&self, applicant_id: &ApplicantId, pending: PendingEnrollment) {
        let mut guard = self.entries.lock().expect("pending mutex poisoned");
        guard.insert(applicant_id.clone(), pending);
    }

    fn pending(&self, applicant_id: &ApplicantId) -> Option<PendingEnrollment> {
        let guard = self.entries.lock().expect("pending mutex poisoned");
        guard.get(applicant_id).cloned()
    }

    fn clear(&self, applicant_id: &ApplicantId) {
        let mut guard = self.entries.lock().expect("pending mutex poisoned");
        guard.remove(applicant_id);
    }
}

/// Notices have no UI to land on in the service, so they become log events.
#[derive(Default, Clone)]
pub(crate) struct TracingNotificationSink;

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(notice = %notice.message, "applicant notice"),
            NoticeLevel::Failure => warn!(notice = %notice.message, "applicant notice"),
        }
    }
}

/// Concrete collaborators shared by the server and the demo runner.
#[derive(Clone)]
pub(crate) struct InMemoryBackends {
    pub(crate) store: InMemoryApplicantStore,
    pub(crate) enrollments: InMemoryEnrollments,
    pub(crate) gateways: IntakeGateways,
}

pub(crate) fn in_memory_backends(config: &IntakeConfig) -> Result<InMemoryBackends, ConfigError> {
    let store = InMemoryApplicantStore::default();
    let enrollments = InMemoryEnrollments::default();
    let gateways = IntakeGateways {
        persistence: Arc::new(store.clone()),
        fetch: Arc::new(store.clone()),
        enrollments: Arc::new(enrollments.clone()),
        uploads: Arc::new(StaticUploadGateway::new(&config.upload_base_url)?),
        pending_enrollments: Arc::new(InMemoryPendingEnrollments::default()),
        notifications: Arc::new(TracingNotificationSink),
    };
    Ok(InMemoryBackends {
        store,
        enrollments,
        gateways,
    })
}
