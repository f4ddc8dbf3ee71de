//! Reputation lookup handlers

use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use triage_core::{
    BeginOutcome, CancelSignal, DetectionSummary, LookupOutcome, ReputationLookup,
    VirusTotalClient,
};

use super::read_file_part;
use crate::{
    error::{AppError, AppResult},
    AppState,
};

fn lookup(state: &AppState) -> AppResult<Arc<ReputationLookup<VirusTotalClient>>> {
    state.reputation.clone().ok_or(AppError::NotConfigured)
}

/// POST /virusTotal - cached verdict, or submit and hand back the analysis id
pub async fn submit(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<Value>)> {
    let lookup = lookup(&state)?;
    let artifact = read_file_part(multipart).await?;

    let (_, outcome) = lookup.begin(&artifact).await?;
    match outcome {
        BeginOutcome::CacheHit { report } => Ok((StatusCode::OK, Json(json!({ "hash": report })))),
        BeginOutcome::Submitted { analysis_id } => {
            tracing::info!("Submitted {} as analysis {}", artifact.file_name(), analysis_id);
            Ok((StatusCode::ACCEPTED, Json(json!({ "file_id": analysis_id }))))
        }
        BeginOutcome::ExternalError { status, .. } => Err(AppError::ExternalService {
            status,
            message: "Failed to scan the file".to_string(),
        }),
    }
}

/// GET /status/:file_id - proxy one analysis status query
pub async fn status(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> AppResult<Json<Value>> {
    let lookup = lookup(&state)?;
    let response = lookup.status(&file_id).await?;

    if !response.is_success() {
        return Err(AppError::ExternalService {
            status: response.status,
            message: format!("Failed to get status. Status code: {}", response.status),
        });
    }
    Ok(Json(response.body))
}

/// POST /virusTotal/scan - whole lookup on the server
///
/// The request future is dropped when the client disconnects, which also
/// stops polling.
pub async fn scan(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<Value>> {
    let lookup = lookup(&state)?;
    let artifact = read_file_part(multipart).await?;

    let (query, outcome) = lookup.run(&artifact, &CancelSignal::new()).await?;
    let summary: Option<DetectionSummary> = outcome.summary();

    match outcome {
        LookupOutcome::CacheHit { report } => Ok(Json(json!({
            "sha256": query.sha256,
            "hash": report,
            "summary": summary,
        }))),
        LookupOutcome::Completed { analysis_id, report } => Ok(Json(json!({
            "sha256": query.sha256,
            "file_id": analysis_id,
            "attempts": query.attempts,
            "report": report,
            "summary": summary,
        }))),
        LookupOutcome::TimedOut { analysis_id, .. } | LookupOutcome::Cancelled { analysis_id, .. } => {
            Err(AppError::Timeout { file_id: analysis_id })
        }
        LookupOutcome::ExternalError { status, message } => {
            Err(AppError::ExternalService { status, message })
        }
    }
}
