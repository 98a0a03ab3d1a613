use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    ApplicantId, ApplicationRecord, EnrollmentRecord, EnrollmentRequest, Position, RecordPatch,
};
use super::gateway::{GatewayError, IntakeGateways, Notice};
use super::resume::{ResumePoint, ResumeResolver};
use super::schema::WizardBlueprint;

/// Outcome of the independent enrollment action that follows profile completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EnrollmentOutcome {
    NotRequested,
    Enrolled { enrollment: EnrollmentRecord },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub record: ApplicationRecord,
    pub enrollment: EnrollmentOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("application is incomplete; continue at {position}")]
    Incomplete { position: Position },
    #[error("failed to save completed application: {0}")]
    Persistence(#[from] GatewayError),
}

/// Commits a finished record and fires the one-time enrollment trigger.
pub struct SubmissionAggregator {
    blueprint: Arc<WizardBlueprint>,
    gateways: IntakeGateways,
    enforce_completeness: bool,
}

impl SubmissionAggregator {
    pub fn new(
        blueprint: Arc<WizardBlueprint>,
        gateways: IntakeGateways,
        enforce_completeness: bool,
    ) -> Self {
        Self {
            blueprint,
            gateways,
            enforce_completeness,
        }
    }

    /// Persist `{ ...record, isCompleted: true }`, then enroll if a trigger is pending.
    ///
    /// Enrollment failures do not fail the submission; a failed save does, and leaves the
    /// trigger in place for the retry.
    pub async fn submit(
        &self,
        applicant_id: &ApplicantId,
        record: &ApplicationRecord,
    ) -> Result<Committed, SubmissionError> {
        if self.enforce_completeness {
            if let ResumePoint::Incomplete(position) =
                ResumeResolver::new(&self.blueprint).resolve(record)
            {
                warn!(applicant = %applicant_id, %position, "submission blocked by incomplete step");
                return Err(SubmissionError::Incomplete { position });
            }
        }

        let stored = match self
            .gateways
            .persistence
            .patch(applicant_id, RecordPatch::completion(record))
            .await
        {
            Ok(stored) => stored,
            Err(error) => {
                warn!(applicant = %applicant_id, %error, "failed to commit application");
                self.gateways.notifications.notify(Notice::failure(
                    "We couldn't submit your application. Please try again.",
                ));
                return Err(SubmissionError::Persistence(error));
            }
        };

        let mut committed = record.clone();
        committed.is_completed = true;
        committed.is_reviewed = stored.is_reviewed;

        let enrollment = self.enroll(applicant_id).await;
        info!(applicant = %applicant_id, ?enrollment, "application submitted");
        self.gateways
            .notifications
            .notify(Notice::success("Your application has been submitted."));

        Ok(Committed {
            record: committed,
            enrollment,
        })
    }

    async fn enroll(&self, applicant_id: &ApplicantId) -> EnrollmentOutcome {
        let Some(pending) = self.gateways.pending_enrollments.pending(applicant_id) else {
            return EnrollmentOutcome::NotRequested;
        };

        let request = EnrollmentRequest {
            course_id: pending.course_id,
            intake_id: pending.intake_id,
            applicant_id: applicant_id.clone(),
        };
        let result = self.gateways.enrollments.create(request).await;
        self.gateways.pending_enrollments.clear(applicant_id);

        match result {
            Ok(enrollment) => {
                info!(
                    applicant = %applicant_id,
                    enrollment = %enrollment.enrollment_id,
                    "enrolled applicant on course intake"
                );
                EnrollmentOutcome::Enrolled { enrollment }
            }
            Err(error) => {
                warn!(applicant = %applicant_id, %error, "enrollment request failed");
                self.gateways.notifications.notify(Notice::failure(
                    "Your application was submitted, but course enrollment failed.",
                ));
                EnrollmentOutcome::Failed {
                    reason: error.to_string(),
                }
            }
        }
    }
}
