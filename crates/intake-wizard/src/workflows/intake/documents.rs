use tracing::info;

use super::domain::{ApplicantId, FileReference, SectionKey, StepDraft, UploadFile};
use super::gateway::{GatewayError, UploadGateway};
use super::rules::{FieldKind, RuleTable};

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("'{0}' is not a document field")]
    UnknownField(String),
    #[error("upload failed: {0}")]
    Upload(#[from] GatewayError),
}

/// Upload `file` and stage the returned reference under `field` of the documents section.
pub async fn attach_document(
    uploads: &dyn UploadGateway,
    rules: &RuleTable,
    applicant_id: &ApplicantId,
    staged: &mut StepDraft,
    field: &str,
    file: UploadFile,
) -> Result<FileReference, DocumentError> {
    let is_document_field = rules
        .lookup(SectionKey::DocumentsData, field)
        .map(|rule| rule.kind == FieldKind::File)
        .unwrap_or(false);
    if !is_document_field {
        return Err(DocumentError::UnknownField(field.to_string()));
    }

    let reference = uploads.upload(file).await?;
    staged.set(
        SectionKey::DocumentsData,
        field,
        serde_json::json!({
            "fileUrl": reference.file_url.clone(),
            "fileName": reference.file_name.clone(),
        }),
    );
    info!(applicant = %applicant_id, field, url = %reference.file_url, "staged uploaded document");
    Ok(reference)
}
