use crate::infra::in_memory_backends;
use clap::Args;
use intake_wizard::config::IntakeConfig;
use intake_wizard::error::AppError;
use intake_wizard::workflows::intake::{
    ApplicantId, EnrollmentOutcome, IntakeWizardService, PendingEnrollment, ResumePoint,
    ResumeResolver, SectionKey, SequencerError, StepDraft, StepId, UploadFile, WizardBlueprint,
    WizardServiceError, WizardView,
};
use serde_json::json;

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Applicant identifier used for the scripted session
    #[arg(long, default_value = "demo-applicant")]
    pub(crate) applicant_id: String,
    /// Course the pending enrollment trigger points at
    #[arg(long, default_value = "course-ma-econ")]
    pub(crate) course_id: String,
    /// Intake the pending enrollment trigger points at
    #[arg(long, default_value = "intake-2026-01")]
    pub(crate) intake_id: String,
    /// Do not queue an enrollment before the wizard starts
    #[arg(long)]
    pub(crate) no_enrollment: bool,
    /// Leave the application on the terms step instead of submitting it
    #[arg(long)]
    pub(crate) stop_before_submit: bool,
    /// Print the stored applicant record as JSON at the end
    #[arg(long)]
    pub(crate) show_record: bool,
}

pub(crate) fn print_blueprint() {
    let blueprint = WizardBlueprint::standard();
    println!("Intake wizard ({} steps)", blueprint.total_steps());
    for step in blueprint.steps() {
        println!("{}. {}", step.id.number(), step.id.label());
        for sub_step in step.sub_steps {
            let gate = if sub_step.when.is_some() {
                " (conditional)"
            } else {
                ""
            };
            println!("   - {}{}", sub_step.id.label(), gate);
        }
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        applicant_id,
        course_id,
        intake_id,
        no_enrollment,
        stop_before_submit,
        show_record,
    } = args;

    let config = IntakeConfig::default();
    let backends = in_memory_backends(&config)?;
    let service = IntakeWizardService::new(backends.gateways.clone(), &config);
    let applicant = ApplicantId(applicant_id);

    println!("Applicant intake demo for {}", applicant);
    if !no_enrollment {
        service.queue_enrollment(
            &applicant,
            PendingEnrollment {
                course_id: course_id.clone(),
                intake_id: intake_id.clone(),
            },
        );
        println!("- Pending enrollment queued: {} / {}", course_id, intake_id);
    }

    let view = service.mount(&applicant).await?;
    render_position("Mounted", &view);

    // One deliberately incomplete submission to show the field errors.
    let mut partial = StepDraft::new();
    partial.set(SectionKey::PersonalDetails, "firstName", "Lena");
    match service.next(&applicant, partial).await {
        Err(WizardServiceError::Sequencer(SequencerError::Validation(failure))) => {
            println!("  Incomplete personal details rejected:");
            for (field, message) in &failure.errors {
                println!("    - {}: {}", field, message);
            }
        }
        Err(err) => return Err(err.into()),
        Ok(view) => render_position("Unexpectedly advanced", &view),
    }

    for (step, draft) in scripted_drafts(&course_id, &intake_id) {
        if stop_before_submit && step == StepId::Terms {
            break;
        }
        if step == StepId::Documents {
            let reference = service
                .attach_document(
                    &applicant,
                    "passportDocument",
                    UploadFile {
                        file_name: "passport.pdf".to_string(),
                        content_type: Some("application/pdf".to_string()),
                        bytes: b"%PDF-1.7 demo".to_vec(),
                    },
                )
                .await?;
            println!("  Uploaded passport -> {}", reference.file_url);
        }

        let view = service.next(&applicant, draft).await?;
        render_position(&format!("Saved {}", step.label()), &view);
    }

    let view = service.view(&applicant).await?;
    println!(
        "\nStatus: {:?} | completed steps: {}/{}",
        view.status,
        view.completed_steps.len(),
        view.total_steps
    );
    match &view.enrollment {
        Some(EnrollmentOutcome::Enrolled { enrollment }) => println!(
            "Enrollment {} created for {} / {}",
            enrollment.enrollment_id, enrollment.course_id, enrollment.intake_id
        ),
        Some(EnrollmentOutcome::Failed { reason }) => println!("Enrollment failed: {}", reason),
        Some(EnrollmentOutcome::NotRequested) => println!("No enrollment was requested"),
        None => println!("Application not submitted yet"),
    }
    println!(
        "Enrollment records held: {}",
        backends.enrollments.created().len()
    );

    if let Some(stored) = backends.store.snapshot(&applicant) {
        let blueprint = WizardBlueprint::standard();
        match ResumeResolver::new(&blueprint).resolve(&stored) {
            ResumePoint::Complete => println!("Resume point: every step is complete"),
            ResumePoint::Incomplete(position) => println!("Resume point: {}", position),
        }

        if show_record {
            match serde_json::to_string_pretty(&stored) {
                Ok(json) => println!("Stored record:\n{}", json),
                Err(err) => println!("Stored record unavailable: {}", err),
            }
        }
    }

    Ok(())
}

fn render_position(label: &str, view: &WizardView) {
    println!(
        "- {} -> step {}/{} {} [{}]",
        label,
        view.step_number,
        view.total_steps,
        view.step_title,
        view.position.sub_step.label()
    );
}

fn scripted_drafts(course_id: &str, intake_id: &str) -> Vec<(StepId, StepDraft)> {
    let mut personal = StepDraft::new();
    for (field, value) in [
        ("firstName", "Lena"),
        ("lastName", "Novak"),
        ("dateOfBirth", "1999-02-17"),
        ("gender", "female"),
        ("studentType", "eu"),
        ("euSettlementStatus", "pre-settled"),
    ] {
        personal.set(SectionKey::PersonalDetails, field, value);
    }

    let mut contact = StepDraft::new();
    for (field, value) in [
        ("addressLine1", "4 Mill Lane"),
        ("city", "Leeds"),
        ("postcode", "LS1 2AB"),
        ("country", "United Kingdom"),
    ] {
        contact.set(SectionKey::AddressData, field, value);
    }
    contact.set(SectionKey::ContactData, "email", "lena@example.org");
    contact.set(SectionKey::ContactData, "phone", "+44 7700 900777");
    for (field, value) in [
        ("emergencyContactName", "Marek Novak"),
        ("emergencyContactRelationship", "Father"),
        ("emergencyContactPhone", "+420 601 123 456"),
    ] {
        contact.set(SectionKey::EmergencyContactData, field, value);
    }

    let mut compliance = StepDraft::new();
    compliance.set(SectionKey::ComplianceData, "visaRefusal", "no");
    compliance.set(SectionKey::ComplianceData, "immigrationStatus", "pre-settled");
    compliance.set(SectionKey::ComplianceData, "disability", "no");

    let mut education = StepDraft::new();
    education.set(
        SectionKey::EducationData,
        "educationData",
        json!([{
            "institution": "Charles University",
            "qualification": "BA",
            "subject": "Economics",
            "startDate": "2017-10-01",
            "endDate": "2020-06-30",
        }]),
    );

    let mut employment = StepDraft::new();
    employment.set(SectionKey::EmploymentData, "isEmployed", "no");
    employment.set(SectionKey::EmploymentData, "hasPreviousEmployment", "no");

    let mut course = StepDraft::new();
    course.set(SectionKey::CourseDetailsData, "courseId", course_id);
    course.set(SectionKey::CourseDetailsData, "intakeId", intake_id);
    course.set(SectionKey::CourseDetailsData, "studyMode", "part-time");
    course.set(SectionKey::FundingData, "fundingType", "Student Loan");

    let mut terms = StepDraft::new();
    terms.set(SectionKey::TermsData, "acceptTerms", true);
    terms.set(SectionKey::TermsData, "acceptPrivacyPolicy", true);

    vec![
        (StepId::PersonalDetails, personal),
        (StepId::AddressAndContact, contact),
        (StepId::Compliance, compliance),
        (StepId::Education, education),
        (StepId::Employment, employment),
        (StepId::Documents, StepDraft::new()),
        (StepId::CourseAndFunding, course),
        (StepId::Terms, terms),
    ]
}
