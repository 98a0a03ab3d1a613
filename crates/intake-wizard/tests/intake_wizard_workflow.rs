//! Integration scenarios for the applicant intake wizard.
//!
//! Everything here goes through the public service facade and HTTP router, backed by in-memory
//! gateways, so the sequencing, resume and submission rules are exercised end to end.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use intake_wizard::config::IntakeConfig;
    use intake_wizard::workflows::intake::{
        ApplicantId, ApplicationRecord, EnrollmentGateway, EnrollmentRecord, EnrollmentRequest,
        FetchGateway, FileReference, GatewayError, IntakeGateways, IntakeWizardService, Notice,
        NotificationSink, PendingEnrollment, PendingEnrollmentStore, PersistenceGateway,
        RecordPatch, SectionKey, StepDraft, UploadFile, UploadGateway,
    };

    #[derive(Default)]
    pub struct Store {
        pub records: Mutex<HashMap<ApplicantId, ApplicationRecord>>,
        pub patch_count: Mutex<usize>,
    }

    #[async_trait]
    impl PersistenceGateway for Store {
        async fn patch(
            &self,
            applicant_id: &ApplicantId,
            patch: RecordPatch,
        ) -> Result<ApplicationRecord, GatewayError> {
            *self.patch_count.lock().expect("store mutex poisoned") += 1;
            let mut records = self.records.lock().expect("store mutex poisoned");
            let record = records.entry(applicant_id.clone()).or_default();
            record.apply_patch(&patch);
            Ok(record.clone())
        }
    }

    #[async_trait]
    impl FetchGateway for Store {
        async fn get(
            &self,
            applicant_id: &ApplicantId,
        ) -> Result<Option<ApplicationRecord>, GatewayError> {
            Ok(self
                .records
                .lock()
                .expect("store mutex poisoned")
                .get(applicant_id)
                .cloned())
        }
    }

    #[derive(Default)]
    pub struct Enrollments {
        pub created: Mutex<Vec<EnrollmentRequest>>,
    }

    #[async_trait]
    impl EnrollmentGateway for Enrollments {
        async fn create(
            &self,
            request: EnrollmentRequest,
        ) -> Result<EnrollmentRecord, GatewayError> {
            self.created
                .lock()
                .expect("enrollment mutex poisoned")
                .push(request.clone());
            Ok(EnrollmentRecord {
                enrollment_id: "enr-1".to_string(),
                course_id: request.course_id,
                intake_id: request.intake_id,
                applicant_id: request.applicant_id,
            })
        }
    }

    pub struct Uploads;

    #[async_trait]
    impl UploadGateway for Uploads {
        async fn upload(&self, file: UploadFile) -> Result<FileReference, GatewayError> {
            Ok(FileReference {
                file_url: format!("https://uploads.example.org/{}", file.file_name),
                file_name: file.file_name,
            })
        }
    }

    #[derive(Default)]
    pub struct Pending {
        entries: Mutex<HashMap<ApplicantId, PendingEnrollment>>,
    }

    impl PendingEnrollmentStore for Pending {
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
    pub struct Notices {
        pub seen: Mutex<Vec<Notice>>,
    }

    impl NotificationSink for Notices {
        fn notify(&self, notice: Notice) {
            self.seen.lock().expect("notice mutex poisoned").push(notice);
        }
    }

    pub struct World {
        pub store: Arc<Store>,
        pub enrollments: Arc<Enrollments>,
        pub service: Arc<IntakeWizardService>,
    }

    pub fn world() -> World {
        let store = Arc::new(Store::default());
        let enrollments = Arc::new(Enrollments::default());
        let gateways = IntakeGateways {
            persistence: store.clone(),
            fetch: store.clone(),
            enrollments: enrollments.clone(),
            uploads: Arc::new(Uploads),
            pending_enrollments: Arc::new(Pending::default()),
            notifications: Arc::new(Notices::default()),
        };
        let service = Arc::new(IntakeWizardService::new(
            gateways,
            &IntakeConfig::default(),
        ));
        World {
            store,
            enrollments,
            service,
        }
    }

    pub fn applicant() -> ApplicantId {
        ApplicantId("applicant-eu-1".to_string())
    }

    fn object(value: Value) -> serde_json::Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    pub fn personal_details() -> StepDraft {
        StepDraft::new().with_section(
            SectionKey::PersonalDetails,
            object(json!({
                "firstName": "Lena",
                "lastName": "Novak",
                "dateOfBirth": "1999-02-17",
                "gender": "female",
                "studentType": "eu",
                "euSettlementStatus": "pre-settled",
            })),
        )
    }

    pub fn address_and_contact() -> StepDraft {
        StepDraft::new()
            .with_section(
                SectionKey::AddressData,
                object(json!({
                    "addressLine1": "4 Mill Lane",
                    "city": "Leeds",
                    "postcode": "LS1 2AB",
                    "country": "United Kingdom",
                })),
            )
            .with_section(
                SectionKey::ContactData,
                object(json!({ "email": "lena@example.org", "phone": "+44 7700 900777" })),
            )
            .with_section(
                SectionKey::EmergencyContactData,
                object(json!({
                    "emergencyContactName": "Marek Novak",
                    "emergencyContactRelationship": "Father",
                    "emergencyContactPhone": "+420 601 123 456",
                })),
            )
    }

    pub fn compliance() -> StepDraft {
        StepDraft::new().with_section(
            SectionKey::ComplianceData,
            object(json!({
                "visaRefusal": "no",
                "immigrationStatus": "pre-settled",
                "disability": "no",
            })),
        )
    }

    pub fn education(entries: Value) -> StepDraft {
        StepDraft::new().with_section(
            SectionKey::EducationData,
            object(json!({ "educationData": entries })),
        )
    }

    pub fn education_entry() -> Value {
        json!({
            "institution": "Charles University",
            "qualification": "BA",
            "subject": "Economics",
            "startDate": "2017-10-01",
            "endDate": "2020-06-30",
        })
    }

    pub fn employment(values: Value) -> StepDraft {
        StepDraft::new().with_section(SectionKey::EmploymentData, object(values))
    }

    pub fn course_and_funding() -> StepDraft {
        StepDraft::new()
            .with_section(
                SectionKey::CourseDetailsData,
                object(json!({
                    "courseId": "course-ma-econ",
                    "intakeId": "intake-2026-01",
                    "studyMode": "part-time",
                })),
            )
            .with_section(
                SectionKey::FundingData,
                object(json!({ "fundingType": "Student Loan" })),
            )
    }

    pub fn terms() -> StepDraft {
        StepDraft::new().with_section(
            SectionKey::TermsData,
            object(json!({ "acceptTerms": true, "acceptPrivacyPolicy": true })),
        )
    }
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use intake_wizard::workflows::intake::{
    intake_router, ApplicationRecord, EnrollmentOutcome, PendingEnrollment, Position, ResumePoint,
    ResumeResolver, SectionKey, SequencerError, StepDraft, StepId, SubStepId, UploadFile,
    WizardBlueprint, WizardServiceError, WizardStatus,
};
use serde_json::json;
use tower::ServiceExt;

use common::*;

#[tokio::test]
async fn eu_applicant_sees_only_academic_education() {
    let world = world();
    let service = &world.service;
    service.mount(&applicant()).await.expect("mount");
    service
        .next(&applicant(), personal_details())
        .await
        .expect("personal details");
    service
        .next(&applicant(), address_and_contact())
        .await
        .expect("address");
    let view = service
        .next(&applicant(), compliance())
        .await
        .expect("compliance");

    assert_eq!(
        view.position,
        Position::new(StepId::Education, SubStepId::AcademicQualifications)
    );
    assert_eq!(
        view.active_sub_steps,
        vec![SubStepId::AcademicQualifications]
    );

    let result = service.next(&applicant(), education(json!([]))).await;
    match result {
        Err(WizardServiceError::Sequencer(SequencerError::Validation(failure))) => {
            assert!(failure.errors.contains_key("educationData"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let view = service
        .next(&applicant(), education(json!([education_entry()])))
        .await
        .expect("one entry passes");
    assert_eq!(view.position, Position::whole(StepId::Employment));
}

#[tokio::test]
async fn employed_applicant_must_describe_current_role() {
    let world = world();
    let service = &world.service;
    service.mount(&applicant()).await.expect("mount");
    service
        .jump(&applicant(), Position::whole(StepId::Employment))
        .await
        .expect("jump to employment");

    let result = service
        .next(
            &applicant(),
            employment(json!({
                "isEmployed": "yes",
                "hasPreviousEmployment": "no",
                "currentEmployment": { "employer": "" },
            })),
        )
        .await;
    match result {
        Err(WizardServiceError::Sequencer(SequencerError::Validation(failure))) => {
            assert!(failure.errors.contains_key("currentEmployment.employer"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    let view = service
        .next(
            &applicant(),
            employment(json!({
                "isEmployed": "yes",
                "hasPreviousEmployment": "no",
                "currentEmployment": {
                    "employer": "Acme Analytics",
                    "jobTitle": "Analyst",
                    "startDate": "2023-03-01",
                    "employerAddress": "2 Quay Street, Leeds",
                },
            })),
        )
        .await
        .expect("four fields pass");
    assert_eq!(view.position, Position::whole(StepId::Documents));
}

#[tokio::test]
async fn returning_applicant_resumes_at_empty_education() {
    let world = world();
    let mut record = ApplicationRecord::default();
    for draft in [
        personal_details(),
        address_and_contact(),
        compliance(),
        education(json!([])),
    ] {
        record.merge_draft(&draft);
    }
    world
        .store
        .records
        .lock()
        .expect("store mutex poisoned")
        .insert(applicant(), record.clone());

    let blueprint = WizardBlueprint::standard();
    assert_eq!(
        ResumeResolver::new(&blueprint).resolve(&record),
        ResumePoint::Incomplete(Position::new(
            StepId::Education,
            SubStepId::AcademicQualifications
        ))
    );

    let view = world.service.mount(&applicant()).await.expect("mount");
    assert_eq!(view.position.step, StepId::Education);
    assert_eq!(view.step_number, 4);
    assert_eq!(view.resumed_at, Some(view.position));
}

#[tokio::test]
async fn complete_walk_submits_once_and_enrolls() {
    let world = world();
    let service = &world.service;
    service.queue_enrollment(
        &applicant(),
        PendingEnrollment {
            course_id: "course-ma-econ".to_string(),
            intake_id: "intake-2026-01".to_string(),
        },
    );
    service.mount(&applicant()).await.expect("mount");

    for draft in [
        personal_details(),
        address_and_contact(),
        compliance(),
        education(json!([education_entry()])),
        employment(json!({ "isEmployed": "no", "hasPreviousEmployment": "no" })),
    ] {
        service.next(&applicant(), draft).await.expect("step passes");
    }

    service
        .attach_document(
            &applicant(),
            "passportDocument",
            UploadFile {
                file_name: "passport.png".to_string(),
                content_type: Some("image/png".to_string()),
                bytes: vec![0x89, 0x50, 0x4e, 0x47],
            },
        )
        .await
        .expect("upload");
    service
        .next(&applicant(), StepDraft::new())
        .await
        .expect("documents pass");
    service
        .next(&applicant(), course_and_funding())
        .await
        .expect("course passes");
    let view = service
        .next(&applicant(), terms())
        .await
        .expect("terms submit");

    assert_eq!(view.status, WizardStatus::Submitted);
    assert!(matches!(
        view.enrollment,
        Some(EnrollmentOutcome::Enrolled { .. })
    ));
    assert_eq!(
        world
            .enrollments
            .created
            .lock()
            .expect("enrollment mutex poisoned")
            .len(),
        1
    );

    let stored = world
        .store
        .records
        .lock()
        .expect("store mutex poisoned")
        .get(&applicant())
        .cloned()
        .expect("stored");
    assert!(stored.is_completed);
    assert_eq!(
        stored.text(SectionKey::DocumentsData, "passportDocument.fileName"),
        Some("passport.png")
    );
    assert_eq!(
        ResumeResolver::new(&WizardBlueprint::standard()).resolve(&stored),
        ResumePoint::Complete
    );
}

#[tokio::test]
async fn router_refuses_to_go_back_from_the_first_step() {
    let world = world();
    let router = intake_router(world.service.clone());

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/intake/applicant-eu-1/mount")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/v1/intake/applicant-eu-1/back")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(
            Request::get("/api/v1/intake/applicant-eu-1")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*world.store.patch_count.lock().expect("poisoned"), 0);
}
