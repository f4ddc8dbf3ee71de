//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;
use triage_core::LayoutInfo;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    model: ModelStatus,
    reputation_enabled: bool,
}

#[derive(Serialize)]
pub struct ModelStatus {
    classifier: String,
    extraction_policy: &'static str,
    layout: LayoutInfo,
    loaded_at: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let metadata = state.engine.context().metadata();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        model: ModelStatus {
            classifier: metadata.classifier_kind.clone(),
            extraction_policy: state.engine.policy().as_str(),
            layout: metadata.layout.clone(),
            loaded_at: metadata.loaded_at.timestamp(),
        },
        reputation_enabled: state.reputation.is_some(),
    })
}
