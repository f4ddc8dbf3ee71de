//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use triage_core::constants::{
    DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_REPUTATION_URL,
};
use triage_core::{ExtractionPolicy, PollPolicy, ReputationConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Directory holding scaler.json and classifier.json
    pub model_dir: PathBuf,

    /// Scratch directory for staged uploads
    pub upload_dir: PathBuf,

    /// Request body limit in bytes
    pub max_upload_bytes: usize,

    pub extraction_policy: ExtractionPolicy,

    /// Reputation endpoints are disabled without a key
    pub virustotal_api_key: Option<String>,

    pub virustotal_base_url: String,

    pub poll_interval_secs: u64,

    pub poll_max_attempts: u32,

    /// Optional wall-clock limit for server-side polling
    pub poll_deadline_secs: Option<u64>,

    /// Per-request timeout towards the reputation service
    pub request_timeout_secs: u64,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: parse_var("PORT").unwrap_or(5000),

            model_dir: env::var("MODEL_DIR")
                .unwrap_or_else(|_| "model".to_string())
                .into(),

            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".to_string())
                .into(),

            max_upload_bytes: parse_var("MAX_UPLOAD_BYTES").unwrap_or(64 * 1024 * 1024),

            extraction_policy: env::var("EXTRACTION_POLICY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_default(),

            virustotal_api_key: env::var("VIRUSTOTAL_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),

            virustotal_base_url: env::var("VIRUSTOTAL_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_REPUTATION_URL.to_string()),

            poll_interval_secs: parse_var("REPUTATION_POLL_INTERVAL_SECS")
                .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),

            poll_max_attempts: parse_var("REPUTATION_MAX_ATTEMPTS")
                .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS),

            poll_deadline_secs: parse_var("REPUTATION_DEADLINE_SECS"),

            request_timeout_secs: parse_var("REPUTATION_TIMEOUT_SECS")
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_secs),
            max_attempts: self.poll_max_attempts,
            deadline: self.poll_deadline_secs.map(Duration::from_secs),
        }
    }

    /// Reputation settings, if an API key is configured
    pub fn reputation(&self) -> Option<ReputationConfig> {
        let api_key = self.virustotal_api_key.clone()?;
        Some(ReputationConfig {
            api_key,
            base_url: self.virustotal_base_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            poll: self.poll_policy(),
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
