use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use crate::config::IntakeConfig;
use crate::workflows::intake::domain::{
    ApplicantId, ApplicationRecord, EnrollmentRecord, EnrollmentRequest, FileReference,
    PendingEnrollment, RecordPatch, SectionKey, StepDraft, StepId, UploadFile,
};
use crate::workflows::intake::gateway::{
    EnrollmentGateway, FetchGateway, GatewayError, IntakeGateways, Notice, NoticeLevel,
    NotificationSink, PendingEnrollmentStore, PersistenceGateway, UploadGateway,
};
use crate::workflows::intake::schema::WizardBlueprint;
use crate::workflows::intake::sequencer::StepSequencer;
use crate::workflows::intake::service::IntakeWizardService;

pub(super) fn applicant() -> ApplicantId {
    ApplicantId("applicant-42".to_string())
}

pub(super) fn file_reference(name: &str) -> Value {
    json!({
        "fileUrl": format!("https://uploads.test/applicant-42/{name}"),
        "fileName": name,
    })
}

fn section(values: Value) -> serde_json::Map<String, Value> {
    match values {
        Value::Object(map) => map,
        _ => panic!("fixture sections must be objects"),
    }
}

/// Valid draft for `step` for an `eu` or `international` applicant.
pub(super) fn step_draft(step: StepId, student_type: &str) -> StepDraft {
    let international = student_type == "international";
    match step {
        StepId::PersonalDetails => {
            let mut personal = json!({
                "firstName": "Ada",
                "lastName": "Okafor",
                "dateOfBirth": "1998-04-12",
                "gender": "female",
                "studentType": student_type,
            });
            if international {
                personal["nationality"] = json!("Nigerian");
            } else {
                personal["euSettlementStatus"] = json!("settled");
            }
            StepDraft::new().with_section(SectionKey::PersonalDetails, section(personal))
        }
        StepId::AddressAndContact => StepDraft::new()
            .with_section(
                SectionKey::AddressData,
                section(json!({
                    "addressLine1": "12 Harbour Road",
                    "city": "Bristol",
                    "postcode": "BS1 4QA",
                    "country": "United Kingdom",
                })),
            )
            .with_section(
                SectionKey::ContactData,
                section(json!({ "email": "ada@example.org", "phone": "+44 7700 900123" })),
            )
            .with_section(
                SectionKey::EmergencyContactData,
                section(json!({
                    "emergencyContactName": "Ngozi Okafor",
                    "emergencyContactRelationship": "Sister",
                    "emergencyContactPhone": "+44 7700 900456",
                })),
            ),
        StepId::Compliance => {
            let mut compliance = json!({ "visaRefusal": "no", "disability": "no" });
            if international {
                compliance["visaRequired"] = json!("yes");
            } else {
                compliance["immigrationStatus"] = json!("settled");
            }
            StepDraft::new().with_section(SectionKey::ComplianceData, section(compliance))
        }
        StepId::Education => {
            let mut education = json!({ "educationData": [education_entry()] });
            if international {
                education["englishTestType"] = json!("IELTS");
                education["englishTestScore"] = json!("7.5");
                education["englishTestDate"] = json!("2023-05-10");
            }
            StepDraft::new().with_section(SectionKey::EducationData, section(education))
        }
        StepId::Employment => StepDraft::new().with_section(
            SectionKey::EmploymentData,
            section(json!({ "isEmployed": "no", "hasPreviousEmployment": "no" })),
        ),
        StepId::Documents => {
            let mut documents = json!({ "passportDocument": file_reference("passport.pdf") });
            if international {
                documents["visaDocument"] = file_reference("visa.pdf");
            }
            StepDraft::new().with_section(SectionKey::DocumentsData, section(documents))
        }
        StepId::CourseAndFunding => StepDraft::new()
            .with_section(
                SectionKey::CourseDetailsData,
                section(json!({
                    "courseId": "course-msc-data",
                    "intakeId": "intake-2025-09",
                    "studyMode": "full-time",
                })),
            )
            .with_section(
                SectionKey::FundingData,
                section(json!({ "fundingType": "Self" })),
            ),
        StepId::Terms => StepDraft::new().with_section(
            SectionKey::TermsData,
            section(json!({ "acceptTerms": true, "acceptPrivacyPolicy": true })),
        ),
    }
}

pub(super) fn education_entry() -> Value {
    json!({
        "institution": "University of Lagos",
        "qualification": "BSc",
        "subject": "Mathematics",
        "startDate": "2016-09-01",
        "endDate": "2020-06-30",
    })
}

/// Record whose steps up to and including `last` are filled in.
pub(super) fn record_through(last: StepId, student_type: &str) -> ApplicationRecord {
    let mut record = ApplicationRecord::default();
    for step in StepId::ordered() {
        if step > last {
            break;
        }
        record.merge_draft(&step_draft(step, student_type));
    }
    record
}

pub(super) fn complete_record(student_type: &str) -> ApplicationRecord {
    record_through(StepId::Terms, student_type)
}

/// Persistence and fetch double backed by a map, recording every patch.
#[derive(Default)]
pub(super) struct MemoryStore {
    records: Mutex<HashMap<ApplicantId, ApplicationRecord>>,
    patches: Mutex<Vec<(ApplicantId, RecordPatch)>>,
    rejected: Mutex<HashSet<ApplicantId>>,
    fail_patches: AtomicBool,
    fail_fetch: AtomicBool,
}

impl MemoryStore {
    pub(super) fn seed(&self, applicant_id: &ApplicantId, record: ApplicationRecord) {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(applicant_id.clone(), record);
    }

    pub(super) fn stored(&self, applicant_id: &ApplicantId) -> Option<ApplicationRecord> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .get(applicant_id)
            .cloned()
    }

    pub(super) fn patches(&self) -> Vec<(ApplicantId, RecordPatch)> {
        self.patches.lock().expect("store mutex poisoned").clone()
    }

    pub(super) fn fail_patches(&self, fail: bool) {
        self.fail_patches.store(fail, Ordering::SeqCst);
    }

    pub(super) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(super) fn reject(&self, applicant_id: &ApplicantId) {
        self.rejected
            .lock()
            .expect("store mutex poisoned")
            .insert(applicant_id.clone());
    }
}

#[async_trait]
impl PersistenceGateway for MemoryStore {
    async fn patch(
        &self,
        applicant_id: &ApplicantId,
        patch: RecordPatch,
    ) -> Result<ApplicationRecord, GatewayError> {
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("store offline".to_string()));
        }
        if self
            .rejected
            .lock()
            .expect("store mutex poisoned")
            .contains(applicant_id)
        {
            return Err(GatewayError::NotFound);
        }
        self.patches
            .lock()
            .expect("store mutex poisoned")
            .push((applicant_id.clone(), patch.clone()));
        let mut records = self.records.lock().expect("store mutex poisoned");
        let record = records.entry(applicant_id.clone()).or_default();
        record.apply_patch(&patch);
        Ok(record.clone())
    }
}

#[async_trait]
impl FetchGateway for MemoryStore {
    async fn get(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<ApplicationRecord>, GatewayError> {
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("store offline".to_string()));
        }
        Ok(self.stored(applicant_id))
    }
}

/// Persistence double that parks every patch until a permit is released.
pub(super) struct GatedStore {
    pub(super) inner: Arc<MemoryStore>,
    pub(super) gate: Arc<Semaphore>,
    pub(super) waiting: AtomicUsize,
}

impl GatedStore {
    pub(super) fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            gate: Arc::new(Semaphore::new(0)),
            waiting: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PersistenceGateway for GatedStore {
    async fn patch(
        &self,
        applicant_id: &ApplicantId,
        patch: RecordPatch,
    ) -> Result<ApplicationRecord, GatewayError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| GatewayError::Unavailable("gate closed".to_string()))?;
        permit.forget();
        self.inner.patch(applicant_id, patch).await
    }
}

#[derive(Default)]
pub(super) struct MemoryEnrollments {
    requests: Mutex<Vec<EnrollmentRequest>>,
    fail: AtomicBool,
}

impl MemoryEnrollments {
    pub(super) fn requests(&self) -> Vec<EnrollmentRequest> {
        self.requests.lock().expect("enrollment mutex poisoned").clone()
    }

    pub(super) fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl EnrollmentGateway for MemoryEnrollments {
    async fn create(&self, request: EnrollmentRequest) -> Result<EnrollmentRecord, GatewayError> {
        let mut requests = self.requests.lock().expect("enrollment mutex poisoned");
        requests.push(request.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("intake is full".to_string()));
        }
        Ok(EnrollmentRecord {
            enrollment_id: format!("enr-{}", requests.len()),
            course_id: request.course_id,
            intake_id: request.intake_id,
            applicant_id: request.applicant_id,
        })
    }
}

#[derive(Default)]
pub(super) struct MemoryUploads {
    files: Mutex<Vec<UploadFile>>,
    fail: AtomicBool,
}

impl MemoryUploads {
    pub(super) fn files(&self) -> Vec<UploadFile> {
        self.files.lock().expect("upload mutex poisoned").clone()
    }

    pub(super) fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UploadGateway for MemoryUploads {
    async fn upload(&self, file: UploadFile) -> Result<FileReference, GatewayError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("bucket offline".to_string()));
        }
        let reference = FileReference {
            file_url: format!("https://uploads.test/applicant-42/{}", file.file_name),
            file_name: file.file_name.clone(),
        };
        self.files.lock().expect("upload mutex poisoned").push(file);
        Ok(reference)
    }
}

#[derive(Default)]
pub(super) struct MemoryPending {
    entries: Mutex<HashMap<ApplicantId, PendingEnrollment>>,
}

impl PendingEnrollmentStore for MemoryPending {
    fn remember(&self, applicant_id: &ApplicantId, pending: PendingEnrollment) {
        self.entries
            .lock()
            .expect("pending mutex poisoned")
            .insert(applicant_id.clone(), pending);
    }

    fn pending(&self, applicant_id: &ApplicantId) -> Option<PendingEnrollment> {
        self.entries
            .lock()
            .expect("pending mutex poisoned")
            .get(applicant_id)
            .cloned()
    }

    fn clear(&self, applicant_id: &ApplicantId) {
        self.entries
            .lock()
            .expect("pending mutex poisoned")
            .remove(applicant_id);
    }
}

#[derive(Default)]
pub(super) struct MemoryNotices {
    notices: Mutex<Vec<Notice>>,
}

impl MemoryNotices {
    pub(super) fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }

    pub(super) fn failures(&self) -> usize {
        self.notices()
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Failure)
            .count()
    }
}

impl NotificationSink for MemoryNotices {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notice mutex poisoned").push(notice);
    }
}

/// Every in-memory collaborator, kept around so tests can inspect them.
pub(super) struct Harness {
    pub(super) store: Arc<MemoryStore>,
    pub(super) enrollments: Arc<MemoryEnrollments>,
    pub(super) uploads: Arc<MemoryUploads>,
    pub(super) pending: Arc<MemoryPending>,
    pub(super) notices: Arc<MemoryNotices>,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            enrollments: Arc::new(MemoryEnrollments::default()),
            uploads: Arc::new(MemoryUploads::default()),
            pending: Arc::new(MemoryPending::default()),
            notices: Arc::new(MemoryNotices::default()),
        }
    }

    pub(super) fn gateways(&self) -> IntakeGateways {
        IntakeGateways {
            persistence: self.store.clone(),
            fetch: self.store.clone(),
            enrollments: self.enrollments.clone(),
            uploads: self.uploads.clone(),
            pending_enrollments: self.pending.clone(),
            notifications: self.notices.clone(),
        }
    }

    pub(super) fn service(&self) -> IntakeWizardService {
        IntakeWizardService::new(self.gateways(), &IntakeConfig::default())
    }

    pub(super) fn sequencer(&self, record: ApplicationRecord) -> StepSequencer {
        StepSequencer::new(
            applicant(),
            Arc::new(WizardBlueprint::standard()),
            self.store.clone(),
            self.notices.clone(),
            record,
        )
    }

    pub(super) fn queue_enrollment(&self) {
        self.pending.remember(
            &applicant(),
            PendingEnrollment {
                course_id: "course-msc-data".to_string(),
                intake_id: "intake-2025-09".to_string(),
            },
        );
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
