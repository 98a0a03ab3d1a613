use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use super::domain::{ApplicantId, RecordPatch};
use super::gateway::PersistenceGateway;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewFailure {
    pub applicant_id: ApplicantId,
    pub reason: String,
}

/// Per-member outcome of a bulk "mark reviewed" batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReviewBatchReport {
    pub reviewed: Vec<ApplicantId>,
    pub failed: Vec<ReviewFailure>,
}

/// Flag every applicant as reviewed with independent requests, settling all of them.
pub async fn mark_reviewed(
    persistence: &dyn PersistenceGateway,
    applicant_ids: Vec<ApplicantId>,
) -> ReviewBatchReport {
    let outcomes = join_all(applicant_ids.into_iter().map(|applicant_id| async move {
        let outcome = persistence
            .patch(&applicant_id, RecordPatch::reviewed())
            .await;
        (applicant_id, outcome)
    }))
    .await;

    let mut report = ReviewBatchReport::default();
    for (applicant_id, outcome) in outcomes {
        match outcome {
            Ok(_) => report.reviewed.push(applicant_id),
            Err(error) => {
                warn!(applicant = %applicant_id, %error, "failed to mark application reviewed");
                report.failed.push(ReviewFailure {
                    applicant_id,
                    reason: error.to_string(),
                });
            }
        }
    }
    report
}
