//! PE Triage Server
//!
//! HTTP front end for static PE classification and reputation lookups.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        TRIAGE SERVER                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  /upload, /analyze          /virusTotal, /status, /scan      │
//! │  ┌───────────────────┐      ┌─────────────────────────────┐  │
//! │  │ InferenceEngine   │      │ ReputationLookup            │  │
//! │  │ extract → scale → │      │ hash → cache → submit →     │  │
//! │  │ classify          │      │ poll (async, cancellable)   │  │
//! │  └─────────┬─────────┘      └──────────────┬──────────────┘  │
//! │            ▼                               ▼                 │
//! │   Arc<ModelContext>                 VirusTotal API v3        │
//! │   (scaler.json, classifier.json)                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;


use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use triage_core::{InferenceEngine, ModelContext, ReputationLookup, VirusTotalClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "triage_server=debug,triage_core=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("PE Triage Server starting ({})...", config.environment);
    tracing::info!("Extraction policy: {}", config.extraction_policy.as_str());

    // Load model artifacts once; shared read-only from here on
    let ctx = ModelContext::load(&config.model_dir)
        .with_context(|| format!("failed to load model from {}", config.model_dir.display()))?;
    let engine = InferenceEngine::new(Arc::new(ctx), config.extraction_policy);

    std::fs::create_dir_all(&config.upload_dir)
        .with_context(|| format!("failed to create {}", config.upload_dir.display()))?;

    let reputation = match config.reputation() {
        Some(settings) => {
            let client = VirusTotalClient::new(&settings).context("failed to build HTTP client")?;
            tracing::info!("Reputation lookups via {}", client.base_url());
            Some(Arc::new(ReputationLookup::new(client, settings.poll, config.upload_dir.clone())))
        }
        None => {
            tracing::warn!("VIRUSTOTAL_API_KEY not set; reputation endpoints disabled");
            None
        }
    };

    // Build application state
    let state = AppState {
        config: config.clone(),
        engine,
        reputation,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: config::Config,
    pub engine: InferenceEngine,
    pub reputation: Option<Arc<ReputationLookup<VirusTotalClient>>>,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    let max_upload = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(handlers::health::check))
        // Static analysis
        .route("/upload", post(handlers::inference::upload))
        .route("/analyze", post(handlers::inference::analyze))
        // Reputation
        .route("/virusTotal", post(handlers::reputation::submit))
        .route("/virusTotal/scan", post(handlers::reputation::scan))
        .route("/status/:file_id", get(handlers::reputation::status))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
