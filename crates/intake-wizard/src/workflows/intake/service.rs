use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as SessionLock, OwnedMutexGuard};
use tracing::info;

use super::documents::{attach_document, DocumentError};
use super::domain::{
    ApplicantId, ApplicationRecord, FileReference, PendingEnrollment, Position, StepDraft, StepId,
    SubStepId, UploadFile,
};
use super::gateway::{GatewayError, IntakeGateways};
use super::resume::{ResumePoint, ResumeResolver};
use super::review::{mark_reviewed, ReviewBatchReport};
use super::schema::WizardBlueprint;
use super::sequencer::{SequencerError, StepSequencer, Transition};
use super::submission::{EnrollmentOutcome, SubmissionAggregator, SubmissionError};
use crate::config::IntakeConfig;

/// Mounted wizard for one applicant.
pub struct WizardSession {
    sequencer: StepSequencer,
    staged_documents: StepDraft,
    resumed_at: Option<Position>,
    last_transition: Option<Transition>,
    enrollment: Option<EnrollmentOutcome>,
    /// Set when the session is replaced or closed; late holders must not act on it.
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStatus {
    Editing,
    Submitted,
}

/// Snapshot returned to the client after every action.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView {
    pub applicant_id: ApplicantId,
    pub status: WizardStatus,
    pub position: Position,
    pub step_number: u8,
    pub total_steps: usize,
    pub step_title: &'static str,
    pub active_sub_steps: Vec<SubStepId>,
    pub completed_steps: BTreeSet<StepId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<Position>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<EnrollmentOutcome>,
    pub record: ApplicationRecord,
}

impl WizardSession {
    pub fn view(&self) -> WizardView {
        let sequencer = &self.sequencer;
        let position = sequencer.position();
        WizardView {
            applicant_id: sequencer.applicant_id().clone(),
            status: if sequencer.is_committed() {
                WizardStatus::Submitted
            } else {
                WizardStatus::Editing
            },
            position,
            step_number: position.step.number(),
            total_steps: sequencer.blueprint().total_steps(),
            step_title: position.step.label(),
            active_sub_steps: sequencer
                .blueprint()
                .active_sub_steps(position.step, sequencer.record()),
            completed_steps: sequencer.completed_steps().clone(),
            resumed_at: self.resumed_at,
            last_transition: self.last_transition,
            enrollment: self.enrollment.clone(),
            record: sequencer.record().clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WizardServiceError {
    #[error("unable to load application {applicant_id}: {source}")]
    Fetch {
        applicant_id: ApplicantId,
        #[source]
        source: GatewayError,
    },
    #[error("no wizard session mounted for {0}")]
    NotMounted(ApplicantId),
    #[error("a transition is already in progress for {0}")]
    Busy(ApplicantId),
    #[error(transparent)]
    Sequencer(#[from] SequencerError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

/// Hosts wizard sessions and wires the sequencer to submission, uploads and review.
pub struct IntakeWizardService {
    blueprint: Arc<WizardBlueprint>,
    gateways: IntakeGateways,
    aggregator: SubmissionAggregator,
    sessions: Mutex<HashMap<ApplicantId, Arc<SessionLock<WizardSession>>>>,
}

impl IntakeWizardService {
    pub fn new(gateways: IntakeGateways, config: &IntakeConfig) -> Self {
        let blueprint = Arc::new(WizardBlueprint::standard());
        let aggregator = SubmissionAggregator::new(
            blueprint.clone(),
            gateways.clone(),
            config.enforce_completeness,
        );
        Self {
            blueprint,
            gateways,
            aggregator,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn blueprint(&self) -> &WizardBlueprint {
        &self.blueprint
    }

    /// Fetch the applicant's record and open a session, resuming at the first incomplete step.
    pub async fn mount(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<WizardView, WizardServiceError> {
        let record = self
            .gateways
            .fetch
            .get(applicant_id)
            .await
            .map_err(|source| WizardServiceError::Fetch {
                applicant_id: applicant_id.clone(),
                source,
            })?
            .unwrap_or_default();

        let mut sequencer = StepSequencer::new(
            applicant_id.clone(),
            self.blueprint.clone(),
            self.gateways.persistence.clone(),
            self.gateways.notifications.clone(),
            record,
        );

        let resumed_at = if sequencer.record().is_completed {
            let record = sequencer.record().clone();
            sequencer.mark_committed(record);
            None
        } else if sequencer.record().is_blank() {
            None
        } else {
            let target = match ResumeResolver::new(&self.blueprint).resolve(sequencer.record()) {
                ResumePoint::Incomplete(position) => position,
                ResumePoint::Complete => self.blueprint.last_position(sequencer.record()),
            };
            sequencer.jump(target)?;
            info!(applicant = %applicant_id, position = %target, "resumed application");
            Some(target)
        };

        let session = WizardSession {
            sequencer,
            staged_documents: StepDraft::new(),
            resumed_at,
            last_transition: None,
            enrollment: None,
            closed: false,
        };
        let view = session.view();

        let mut sessions = self.sessions_guard();
        if let Some(previous) = sessions.get(applicant_id).cloned() {
            retire(&previous, applicant_id)?;
        }
        sessions.insert(applicant_id.clone(), Arc::new(SessionLock::new(session)));
        Ok(view)
    }

    /// Waits for any in-flight transition rather than failing with `Busy`.
    pub async fn view(&self, applicant_id: &ApplicantId) -> Result<WizardView, WizardServiceError> {
        let guard = self.session(applicant_id)?.lock_owned().await;
        if guard.closed {
            return Err(WizardServiceError::NotMounted(applicant_id.clone()));
        }
        Ok(guard.view())
    }

    /// Leave the wizard ("return to dashboard") and drop the session.
    pub fn close(&self, applicant_id: &ApplicantId) -> Result<(), WizardServiceError> {
        let mut sessions = self.sessions_guard();
        let session = sessions
            .get(applicant_id)
            .cloned()
            .ok_or_else(|| WizardServiceError::NotMounted(applicant_id.clone()))?;
        retire(&session, applicant_id)?;
        sessions.remove(applicant_id);
        info!(applicant = %applicant_id, "closed wizard session");
        Ok(())
    }

    /// Validate and advance; on the terminal step this also commits the application.
    pub async fn next(
        &self,
        applicant_id: &ApplicantId,
        mut draft: StepDraft,
    ) -> Result<WizardView, WizardServiceError> {
        let mut guard = self.acquire(applicant_id)?;
        let session = &mut *guard;

        let on_documents = session.sequencer.position().step == StepId::Documents;
        if on_documents {
            draft.absorb_missing(&session.staged_documents);
        }

        let transition = session.sequencer.next(draft).await?;
        if on_documents {
            session.staged_documents = StepDraft::new();
        }
        session.last_transition = Some(transition);

        if let Transition::ReadyToSubmit { .. } = transition {
            let outcome = self
                .aggregator
                .submit(applicant_id, session.sequencer.record())
                .await;
            match outcome {
                Ok(committed) => {
                    session.sequencer.mark_committed(committed.record);
                    session.enrollment = Some(committed.enrollment);
                }
                Err(SubmissionError::Incomplete { position }) => {
                    session.sequencer.jump(position)?;
                    return Err(SubmissionError::Incomplete { position }.into());
                }
                Err(error) => return Err(error.into()),
            }
        }

        Ok(session.view())
    }

    /// Save the draft as-is and retreat one position.
    pub async fn back(
        &self,
        applicant_id: &ApplicantId,
        mut draft: StepDraft,
    ) -> Result<WizardView, WizardServiceError> {
        let mut guard = self.acquire(applicant_id)?;
        let session = &mut *guard;

        let on_documents = session.sequencer.position().step == StepId::Documents;
        if on_documents {
            draft.absorb_missing(&session.staged_documents);
        }
        let transition = session.sequencer.back(draft).await?;
        if on_documents {
            session.staged_documents = StepDraft::new();
        }
        session.last_transition = Some(transition);
        Ok(session.view())
    }

    pub async fn jump(
        &self,
        applicant_id: &ApplicantId,
        position: Position,
    ) -> Result<WizardView, WizardServiceError> {
        let mut guard = self.acquire(applicant_id)?;
        guard.sequencer.jump(position)?;
        guard.last_transition = None;
        Ok(guard.view())
    }

    /// Upload a document and stage its reference for the documents step.
    pub async fn attach_document(
        &self,
        applicant_id: &ApplicantId,
        field: &str,
        file: UploadFile,
    ) -> Result<FileReference, WizardServiceError> {
        let mut guard = self.acquire(applicant_id)?;
        let session = &mut *guard;
        if session.sequencer.is_committed() {
            return Err(SequencerError::Committed.into());
        }

        let reference = attach_document(
            self.gateways.uploads.as_ref(),
            self.blueprint.rules(),
            applicant_id,
            &mut session.staged_documents,
            field,
            file,
        )
        .await?;
        Ok(reference)
    }

    /// Remember the course/intake the applicant picked before starting the wizard.
    pub fn queue_enrollment(&self, applicant_id: &ApplicantId, pending: PendingEnrollment) {
        info!(
            applicant = %applicant_id,
            course = %pending.course_id,
            intake = %pending.intake_id,
            "queued enrollment for submission"
        );
        self.gateways
            .pending_enrollments
            .remember(applicant_id, pending);
    }

    pub async fn mark_reviewed(&self, applicant_ids: Vec<ApplicantId>) -> ReviewBatchReport {
        mark_reviewed(self.gateways.persistence.as_ref(), applicant_ids).await
    }

    fn acquire(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<OwnedMutexGuard<WizardSession>, WizardServiceError> {
        let guard = self
            .session(applicant_id)?
            .try_lock_owned()
            .map_err(|_| WizardServiceError::Busy(applicant_id.clone()))?;
        if guard.closed {
            return Err(WizardServiceError::NotMounted(applicant_id.clone()));
        }
        Ok(guard)
    }

    fn session(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Arc<SessionLock<WizardSession>>, WizardServiceError> {
        self.sessions_guard()
            .get(applicant_id)
            .cloned()
            .ok_or_else(|| WizardServiceError::NotMounted(applicant_id.clone()))
    }

    fn sessions_guard(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<ApplicantId, Arc<SessionLock<WizardSession>>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn retire(
    session: &SessionLock<WizardSession>,
    applicant_id: &ApplicantId,
) -> Result<(), WizardServiceError> {
    let mut guard = session
        .try_lock()
        .map_err(|_| WizardServiceError::Busy(applicant_id.clone()))?;
    guard.closed = true;
    Ok(())
}
