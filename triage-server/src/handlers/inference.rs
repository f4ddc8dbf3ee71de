//! Static inference handlers

use axum::{extract::{Multipart, State}, Json};
use serde_json::{json, Value};
use triage_core::StaticReport;

use super::read_file_part;
use crate::{error::AppResult, AppState};

/// POST /upload - classify one PE file
///
/// `{"result": 0|1}`; PE-gate failures are 400s.
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> AppResult<Json<Value>> {
    let artifact = read_file_part(multipart).await?;
    let engine = state.engine.clone();

    // Parsing is CPU-bound; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || engine.classify(&artifact)).await??;

    tracing::info!("Classified upload as {:?} ({:?})", result.label, result.confidence);
    Ok(Json(json!({ "result": result.label.as_int() })))
}

/// POST /analyze - descriptive static report, no classification
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<StaticReport>> {
    let artifact = read_file_part(multipart).await?;
    let policy = state.engine.policy();

    let report = tokio::task::spawn_blocking(move || StaticReport::analyze(&artifact, policy)).await?;
    Ok(Json(report))
}
