use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{ApplicantId, ApplicationRecord, Position, RecordPatch, StepDraft, StepId};
use super::gateway::{GatewayError, Notice, NotificationSink, PersistenceGateway};
use super::rules::ValidationFailure;
use super::schema::WizardBlueprint;

/// Result of a successful `next` or `back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    Advanced { from: Position, to: Position },
    Retreated { from: Position, to: Position },
    /// The terminal step passed validation; the caller hands the record to submission.
    ReadyToSubmit { at: Position },
}

#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error("failed to save {step} step: {source}")]
    Persistence {
        step: StepId,
        #[source]
        source: GatewayError,
    },
    #[error("application has already been submitted")]
    Committed,
    #[error("{0} is not part of this application")]
    InvalidPosition(Position),
    #[error("already at the first step")]
    NoPreviousStep,
}

/// Owns the current position and the record for one wizard session.
///
/// A transition is applied only after its persistence call succeeds; a failed save leaves both
/// the record and the position exactly as they were.
pub struct StepSequencer {
    applicant_id: ApplicantId,
    blueprint: Arc<WizardBlueprint>,
    persistence: Arc<dyn PersistenceGateway>,
    notifications: Arc<dyn NotificationSink>,
    record: ApplicationRecord,
    position: Position,
    completed_steps: BTreeSet<StepId>,
    committed: bool,
}

impl StepSequencer {
    pub fn new(
        applicant_id: ApplicantId,
        blueprint: Arc<WizardBlueprint>,
        persistence: Arc<dyn PersistenceGateway>,
        notifications: Arc<dyn NotificationSink>,
        record: ApplicationRecord,
    ) -> Self {
        let position = blueprint.first_position(&record);
        Self {
            applicant_id,
            blueprint,
            persistence,
            notifications,
            record,
            position,
            completed_steps: BTreeSet::new(),
            committed: false,
        }
    }

    pub fn applicant_id(&self) -> &ApplicantId {
        &self.applicant_id
    }

    pub fn blueprint(&self) -> &WizardBlueprint {
        &self.blueprint
    }

    pub fn record(&self) -> &ApplicationRecord {
        &self.record
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn completed_steps(&self) -> &BTreeSet<StepId> {
        &self.completed_steps
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Validate the active position against `draft`, persist, then advance.
    pub async fn next(&mut self, draft: StepDraft) -> Result<Transition, SequencerError> {
        self.ensure_editable()?;
        let draft = self.scoped(draft);
        let merged = self.record.with_draft(&draft);
        let from = self.blueprint.normalize(self.position, &merged);

        self.blueprint
            .rule_set(from)
            .evaluate(&merged)
            .into_result()?;

        self.persist(from.step, &draft, &merged).await?;
        self.record = merged;

        match self.blueprint.following(from, &self.record) {
            Some(to) => {
                if to.step != from.step {
                    self.completed_steps.insert(from.step);
                }
                self.position = to;
                info!(applicant = %self.applicant_id, %from, %to, "advanced wizard step");
                Ok(Transition::Advanced { from, to })
            }
            None => {
                self.completed_steps.insert(from.step);
                self.position = from;
                info!(applicant = %self.applicant_id, at = %from, "terminal step ready to submit");
                Ok(Transition::ReadyToSubmit { at: from })
            }
        }
    }

    /// Persist `draft` as given, without validation, then retreat one position.
    pub async fn back(&mut self, draft: StepDraft) -> Result<Transition, SequencerError> {
        self.ensure_editable()?;
        let draft = self.scoped(draft);
        let merged = self.record.with_draft(&draft);
        let from = self.blueprint.normalize(self.position, &merged);
        let to = self
            .blueprint
            .preceding(from, &merged)
            .ok_or(SequencerError::NoPreviousStep)?;

        self.persist(from.step, &draft, &merged).await?;
        self.record = merged;
        self.position = to;
        info!(applicant = %self.applicant_id, %from, %to, "retreated wizard step");
        Ok(Transition::Retreated { from, to })
    }

    /// Navigate directly, without validation or persistence.
    pub fn jump(&mut self, position: Position) -> Result<Position, SequencerError> {
        self.ensure_editable()?;
        if !self.blueprint.contains(position, &self.record) {
            return Err(SequencerError::InvalidPosition(position));
        }
        self.position = position;
        debug!(applicant = %self.applicant_id, %position, "jumped to wizard step");
        Ok(position)
    }

    /// Enter the terminal state with the committed record.
    pub fn mark_committed(&mut self, record: ApplicationRecord) {
        self.record = record;
        self.committed = true;
        self.position = self.blueprint.last_position(&self.record);
    }

    fn ensure_editable(&self) -> Result<(), SequencerError> {
        if self.committed {
            Err(SequencerError::Committed)
        } else {
            Ok(())
        }
    }

    fn scoped(&self, mut draft: StepDraft) -> StepDraft {
        let allowed = self.blueprint.sections_of(self.position.step);
        let dropped = draft.retain_sections(allowed);
        if !dropped.is_empty() {
            debug!(
                applicant = %self.applicant_id,
                step = %self.position.step,
                ?dropped,
                "ignored draft sections outside the active step"
            );
        }
        draft
    }

    async fn persist(
        &self,
        step: StepId,
        draft: &StepDraft,
        merged: &ApplicationRecord,
    ) -> Result<(), SequencerError> {
        if draft.is_empty() {
            return Ok(());
        }
        let patch = RecordPatch::sections(merged, &draft.section_keys());
        match self.persistence.patch(&self.applicant_id, patch).await {
            Ok(_) => Ok(()),
            Err(source) => {
                warn!(
                    applicant = %self.applicant_id,
                    %step,
                    error = %source,
                    "failed to save step; transition rolled back"
                );
                self.notifications.notify(Notice::failure(format!(
                    "We couldn't save your {} details. Please try again.",
                    step.label()
                )));
                Err(SequencerError::Persistence { step, source })
            }
        }
    }
}
