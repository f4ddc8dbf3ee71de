//! HTTP handlers

pub mod health;
pub mod inference;
pub mod reputation;

use axum::extract::Multipart;
use triage_core::RawArtifact;

use crate::error::{AppError, AppResult};

/// Multipart field carrying the uploaded file
const FILE_FIELD: &str = "file";

/// Pull the `file` part out of a multipart upload
pub(crate) async fn read_file_part(mut multipart: Multipart) -> AppResult<RawArtifact> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(AppError::BadRequest("No selected file".to_string()));
        }
        let bytes = field.bytes().await?;
        tracing::debug!("Received {} ({} bytes)", file_name, bytes.len());
        return Ok(RawArtifact::new(file_name, bytes.to_vec()));
    }
    Err(AppError::BadRequest("No file part".to_string()))
}
