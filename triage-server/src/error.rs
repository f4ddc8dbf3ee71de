//! Error handling

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use triage_core::{ReputationError, TriageError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Upload gate
    #[error("File is not a Portable Executable")]
    InvalidFormat,
    #[error("SUSPICIOUS FILE ALERT: File has an executable signature but an invalid PE header.")]
    MalformedHeader(String),
    #[error("Feature extraction failed: {0}")]
    ExtractionFailure(String),

    // Validation errors
    #[error("{0}")]
    BadRequest(String),

    // Reputation service
    #[error("Reputation service is not configured")]
    NotConfigured,
    #[error("{message}")]
    ExternalService { status: u16, message: String },
    #[error("Analysis still running, poll /status/{file_id}")]
    Timeout { file_id: String },

    // Generic errors
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidFormat
            | AppError::MalformedHeader(_)
            | AppError::ExtractionFailure(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ExternalService { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            AppError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::ExternalService { status, message } => {
                tracing::error!("Reputation service error {}: {}", status, message)
            }
            AppError::MalformedHeader(fault) => tracing::debug!("Header fault: {}", fault),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ => {}
        }

        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16()
        });
        if let AppError::Timeout { file_id } = &self {
            body["file_id"] = json!(file_id);
        }

        (status, Json(body)).into_response()
    }
}

impl From<TriageError> for AppError {
    fn from(err: TriageError) -> Self {
        match err {
            TriageError::InvalidFormat => AppError::InvalidFormat,
            TriageError::MalformedHeader(fault) => AppError::MalformedHeader(fault.to_string()),
            TriageError::ExtractionFailure(msg) => AppError::ExtractionFailure(msg),
        }
    }
}

impl From<ReputationError> for AppError {
    fn from(err: ReputationError) -> Self {
        match err {
            ReputationError::NotConfigured => AppError::NotConfigured,
            ReputationError::Transport(e) => AppError::ExternalService {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message: format!("Reputation service unreachable: {}", e),
            },
            ReputationError::InvalidResponse(msg) => AppError::ExternalService {
                status: StatusCode::BAD_GATEWAY.as_u16(),
                message: msg,
            },
            ReputationError::InvalidAnalysisId(id) => {
                AppError::BadRequest(format!("Invalid file id: {:?}", id))
            }
            ReputationError::Storage(e) => AppError::Internal(format!("upload storage: {}", e)),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(err.body_text())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}
