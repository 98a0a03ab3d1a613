//! Applicant intake wizard: declarative field rules, step sequencing, resume and submission.
//!
//! A session owns one [`ApplicationRecord`] while the applicant edits it. Every transition is
//! validated against the same rule table the resume resolver uses, persisted through the
//! [`PersistenceGateway`], and only then applied to the in-memory record.

pub mod documents;
pub mod domain;
pub mod gateway;
pub mod resume;
pub mod review;
pub mod router;
pub mod rules;
mod schema;
pub mod sequencer;
pub mod service;
pub mod submission;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicantId, ApplicationRecord, EnrollmentRecord, EnrollmentRequest, FileReference,
    PendingEnrollment, Position, RecordPatch, SectionKey, SectionValues, StepDraft, StepId,
    SubStepId, UploadFile,
};
pub use gateway::{
    EnrollmentGateway, FetchGateway, GatewayError, IntakeGateways, Notice, NoticeLevel,
    NotificationSink, PendingEnrollmentStore, PersistenceGateway, UploadGateway,
};
pub use resume::{ResumePoint, ResumeResolver};
pub use review::{ReviewBatchReport, ReviewFailure};
pub use router::{error_response, intake_router};
pub use rules::{FieldRuleSet, RuleTable, ValidationFailure, ValidationReport};
pub use schema::{StepSchema, SubStepSchema, WizardBlueprint};
pub use sequencer::{SequencerError, StepSequencer, Transition};
pub use service::{IntakeWizardService, WizardServiceError, WizardStatus, WizardView};
pub use submission::{Committed, EnrollmentOutcome, SubmissionAggregator, SubmissionError};
