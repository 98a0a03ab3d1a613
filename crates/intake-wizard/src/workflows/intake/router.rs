use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::documents::DocumentError;
use super::domain::{ApplicantId, PendingEnrollment, Position, StepDraft, UploadFile};
use super::sequencer::SequencerError;
use super::service::{IntakeWizardService, WizardServiceError};
use super::submission::SubmissionError;

/// Router builder exposing the wizard session endpoints.
pub fn intake_router(service: Arc<IntakeWizardService>) -> Router {
    Router::new()
        .route(
            "/api/v1/intake/:applicant_id",
            get(view_handler).delete(close_handler),
        )
        .route("/api/v1/intake/:applicant_id/mount", post(mount_handler))
        .route("/api/v1/intake/:applicant_id/next", post(next_handler))
        .route("/api/v1/intake/:applicant_id/back", post(back_handler))
        .route("/api/v1/intake/:applicant_id/jump", post(jump_handler))
        .route(
            "/api/v1/intake/:applicant_id/documents/:field",
            post(document_handler),
        )
        .route(
            "/api/v1/intake/:applicant_id/enrollment",
            post(enrollment_handler),
        )
        .route("/api/v1/applicants/reviewed", post(reviewed_handler))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentQuery {
    pub(crate) file_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReviewRequest {
    pub(crate) applicant_ids: Vec<ApplicantId>,
}

pub(crate) async fn mount_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
) -> Response {
    match service.mount(&ApplicantId(applicant_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn view_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
) -> Response {
    match service.view(&ApplicantId(applicant_id)).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn close_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
) -> Response {
    match service.close(&ApplicantId(applicant_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn next_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
    Json(draft): Json<StepDraft>,
) -> Response {
    match service.next(&ApplicantId(applicant_id), draft).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn back_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
    Json(draft): Json<StepDraft>,
) -> Response {
    match service.back(&ApplicantId(applicant_id), draft).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn jump_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
    Json(position): Json<Position>,
) -> Response {
    match service.jump(&ApplicantId(applicant_id), position).await {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn document_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path((applicant_id, field)): Path<(String, String)>,
    Query(query): Query<DocumentQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let file = UploadFile {
        file_name: query.file_name,
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        bytes: body.to_vec(),
    };

    match service
        .attach_document(&ApplicantId(applicant_id), &field, file)
        .await
    {
        Ok(reference) => (StatusCode::CREATED, Json(reference)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn enrollment_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Path(applicant_id): Path<String>,
    Json(pending): Json<PendingEnrollment>,
) -> Response {
    service.queue_enrollment(&ApplicantId(applicant_id), pending);
    StatusCode::NO_CONTENT.into_response()
}

pub(crate) async fn reviewed_handler(
    State(service): State<Arc<IntakeWizardService>>,
    Json(request): Json<ReviewRequest>,
) -> Response {
    let report = service.mark_reviewed(request.applicant_ids).await;
    (StatusCode::OK, Json(report)).into_response()
}

/// Map a wizard failure onto its HTTP status and JSON payload.
pub fn error_response(error: WizardServiceError) -> Response {
    let message = error.to_string();
    match error {
        WizardServiceError::Sequencer(SequencerError::Validation(failure)) => {
            let payload = json!({
                "error": message,
                "errors": failure.errors,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        WizardServiceError::Submission(SubmissionError::Incomplete { position }) => {
            let payload = json!({
                "error": message,
                "position": position,
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        other => {
            let status = match other {
                WizardServiceError::Fetch { .. } => StatusCode::SERVICE_UNAVAILABLE,
                WizardServiceError::NotMounted(_) => StatusCode::NOT_FOUND,
                WizardServiceError::Busy(_)
                | WizardServiceError::Sequencer(SequencerError::Committed) => StatusCode::CONFLICT,
                WizardServiceError::Sequencer(SequencerError::InvalidPosition(_))
                | WizardServiceError::Sequencer(SequencerError::NoPreviousStep)
                | WizardServiceError::Document(DocumentError::UnknownField(_)) => {
                    StatusCode::BAD_REQUEST
                }
                WizardServiceError::Sequencer(SequencerError::Persistence { .. })
                | WizardServiceError::Submission(SubmissionError::Persistence(_))
                | WizardServiceError::Document(DocumentError::Upload(_)) => StatusCode::BAD_GATEWAY,
                WizardServiceError::Sequencer(SequencerError::Validation(_))
                | WizardServiceError::Submission(SubmissionError::Incomplete { .. }) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
            };
            (status, Json(json!({ "error": message }))).into_response()
        }
    }
}
