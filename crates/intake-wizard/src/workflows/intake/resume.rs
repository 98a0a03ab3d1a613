use serde::Serialize;

use super::domain::{ApplicationRecord, Position, StepId};
use super::rules::ValidationReport;
use super::schema::WizardBlueprint;

/// Where a returning applicant should continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "position", rename_all = "snake_case")]
pub enum ResumePoint {
    Incomplete(Position),
    Complete,
}

impl ResumePoint {
    pub fn position(&self) -> Option<Position> {
        match self {
            ResumePoint::Incomplete(position) => Some(*position),
            ResumePoint::Complete => None,
        }
    }

    /// One-based step number of the first incomplete step, `-1` when complete.
    pub fn step_number(&self) -> i8 {
        match self {
            ResumePoint::Incomplete(position) => position.step.number() as i8,
            ResumePoint::Complete => -1,
        }
    }
}

/// Re-validates a record step by step with the same rule sets `next` uses.
///
/// The session's completed-step set is deliberately ignored: the record may have been edited
/// elsewhere since that set was built.
pub struct ResumeResolver<'a> {
    blueprint: &'a WizardBlueprint,
}

impl<'a> ResumeResolver<'a> {
    pub fn new(blueprint: &'a WizardBlueprint) -> Self {
        Self { blueprint }
    }

    pub fn resolve(&self, record: &ApplicationRecord) -> ResumePoint {
        for step in self.blueprint.steps() {
            for sub_step in self.blueprint.active_sub_steps(step.id, record) {
                let position = Position::new(step.id, sub_step);
                if !self.check(position, record).is_valid() {
                    return ResumePoint::Incomplete(position);
                }
            }
        }
        ResumePoint::Complete
    }

    pub fn first_incomplete_step(&self, record: &ApplicationRecord) -> Option<StepId> {
        self.resolve(record).position().map(|position| position.step)
    }

    /// Validation outcome for a single position, as `next` would compute it with an empty draft.
    pub fn check(&self, position: Position, record: &ApplicationRecord) -> ValidationReport {
        self.blueprint.rule_set(position).evaluate(record)
    }
}
