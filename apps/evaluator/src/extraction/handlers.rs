//! Axum route handlers for document upload.

use axum::{
    extract::{Multipart, State},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::NewUpload;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub upload_id: i64,
    pub message: String,
}

/// A file part as received, with the hint used to pick an extraction strategy.
struct FilePart {
    hint: String,
    data: Bytes,
}

/// The filename decides the document kind when it carries an extension;
/// otherwise the part's content type does.
fn file_hint(file_name: Option<&str>, content_type: Option<&str>) -> String {
    let named = file_name.map(str::trim).filter(|name| !name.is_empty());
    let has_extension = named
        .and_then(|name| name.rsplit_once('.'))
        .is_some_and(|(stem, ext)| !stem.is_empty() && !ext.is_empty());

    match (named, content_type) {
        (Some(name), _) if has_extension => name.to_string(),
        (_, Some(content_type)) => content_type.to_string(),
        (Some(name), None) => name.to_string(),
        (None, None) => String::new(),
    }
}

/// POST /upload
///
/// Multipart form: `candidate_name`, `candidate_email`, `cv_file`, `project_file`.
/// Extracts both documents and stores the texts as a new upload.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut candidate_name = String::new();
    let mut candidate_email = String::new();
    let mut cv_file: Option<FilePart> = None;
    let mut project_file: Option<FilePart> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "candidate_name" => candidate_name = field.text().await?,
            "candidate_email" => candidate_email = field.text().await?,
            "cv_file" | "project_file" => {
                let hint = file_hint(field.file_name(), field.content_type());
                let part = FilePart {
                    hint,
                    data: field.bytes().await?,
                };
                if name == "cv_file" {
                    cv_file = Some(part);
                } else {
                    project_file = Some(part);
                }
            }
            _ => {}
        }
    }

    let cv_file = cv_file.ok_or_else(|| AppError::Validation("cv_file is required".to_string()))?;
    let project_file = project_file
        .ok_or_else(|| AppError::Validation("project_file is required".to_string()))?;

    let cv_text = state.extractor.extract(&cv_file.data, &cv_file.hint).await;
    let project_text = state
        .extractor
        .extract(&project_file.data, &project_file.hint)
        .await;

    let upload = state
        .store
        .create_upload(NewUpload {
            candidate_name,
            candidate_email,
            cv_text,
            project_text,
        })
        .await?;

    info!(
        upload_id = upload.id,
        cv_bytes = cv_file.data.len(),
        project_bytes = project_file.data.len(),
        cv_chars = upload.cv_text.len(),
        project_chars = upload.project_text.len(),
        "Files uploaded and processed"
    );

    Ok(Json(UploadResponse {
        upload_id: upload.id,
        message: "Files uploaded and processed successfully".to_string(),
    }))
}
