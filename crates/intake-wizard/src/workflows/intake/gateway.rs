use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicationRecord, EnrollmentRecord, EnrollmentRequest, FileReference,
    PendingEnrollment, RecordPatch, UploadFile,
};

/// Failure reported by any outbound collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("record not found")]
    NotFound,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

/// Idempotent partial update of the remote applicant record.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn patch(
        &self,
        applicant_id: &ApplicantId,
        patch: RecordPatch,
    ) -> Result<ApplicationRecord, GatewayError>;
}

/// Single read used to seed the wizard on mount. `None` means a brand new applicant.
#[async_trait]
pub trait FetchGateway: Send + Sync {
    async fn get(
        &self,
        applicant_id: &ApplicantId,
    ) -> Result<Option<ApplicationRecord>, GatewayError>;
}

#[async_trait]
pub trait EnrollmentGateway: Send + Sync {
    async fn create(&self, request: EnrollmentRequest) -> Result<EnrollmentRecord, GatewayError>;
}

#[async_trait]
pub trait UploadGateway: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<FileReference, GatewayError>;
}

/// Locally held course/intake trigger, set before the wizard starts.
pub trait PendingEnrollmentStore: Send + Sync {
    fn remember(&self, applicant_id: &ApplicantId, pending: PendingEnrollment);
    fn pending(&self, applicant_id: &ApplicantId) -> Option<PendingEnrollment>;
    fn clear(&self, applicant_id: &ApplicantId);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Success,
    Failure,
}

/// Transient user-facing message (toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Failure,
            message: message.into(),
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Bundle of collaborators the wizard core talks to.
#[derive(Clone)]
pub struct IntakeGateways {
    pub persistence: Arc<dyn PersistenceGateway>,
    pub fetch: Arc<dyn FetchGateway>,
    pub enrollments: Arc<dyn EnrollmentGateway>,
    pub uploads: Arc<dyn UploadGateway>,
    pub pending_enrollments: Arc<dyn PendingEnrollmentStore>,
    pub notifications: Arc<dyn NotificationSink>,
}
