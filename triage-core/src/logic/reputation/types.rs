//! Reputation Lookup Types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::constants::{
    default_poll_interval, DEFAULT_HTTP_TIMEOUT_SECS, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_REPUTATION_URL,
};

use super::summary::DetectionSummary;

// ============================================================================
// STATE MACHINE
// ============================================================================

/// Lifecycle of one lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReputationState {
    Hashing,
    CacheCheck,
    CacheHit,
    Submitting,
    Polling,
    Completed,
    TimedOut,
    ExternalError,
    Cancelled,
}

impl ReputationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReputationState::CacheHit
                | ReputationState::Completed
                | ReputationState::TimedOut
                | ReputationState::ExternalError
                | ReputationState::Cancelled
        )
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(&self, next: ReputationState) -> bool {
        use ReputationState::*;
        matches!(
            (self, next),
            (Hashing, CacheCheck)
                | (CacheCheck, CacheHit)
                | (CacheCheck, Submitting)
                | (CacheCheck, ExternalError)
                | (Submitting, Polling)
                | (Submitting, ExternalError)
                | (Polling, Completed)
                | (Polling, TimedOut)
                | (Polling, ExternalError)
                | (Polling, Cancelled)
        )
    }
}

/// Progress record for one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationQuery {
    pub sha256: String,
    pub state: ReputationState,
    /// Last status string reported by the service
    pub last_status: Option<String>,
    pub analysis_id: Option<String>,
    pub attempts: u32,
}

impl ReputationQuery {
    pub fn new(sha256: impl Into<String>) -> Self {
        Self {
            sha256: sha256.into(),
            state: ReputationState::Hashing,
            last_status: None,
            analysis_id: None,
            attempts: 0,
        }
    }

    /// Move to `next`, logging transitions the machine does not allow
    pub(crate) fn advance(&mut self, next: ReputationState) {
        if !self.state.can_transition_to(next) {
            log::error!(
                "Reputation lookup {}: unexpected transition {:?} -> {:?}",
                self.sha256,
                self.state,
                next
            );
        }
        log::debug!("Reputation lookup {}: {:?} -> {:?}", self.sha256, self.state, next);
        self.state = next;
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

/// Result of the hash → cache → submit phase
#[derive(Debug, Clone, PartialEq)]
pub enum BeginOutcome {
    /// The service already knows the file; body is the file object
    CacheHit { report: Value },
    /// Uploaded; poll with this analysis id
    Submitted { analysis_id: String },
    /// Submission refused by the service
    ExternalError { status: u16, message: String },
}

/// Terminal result of a full lookup
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    CacheHit { report: Value },
    Completed { analysis_id: String, report: Value },
    /// Attempt budget or deadline exhausted; the scan may still finish
    TimedOut { analysis_id: String, attempts: u32 },
    ExternalError { status: u16, message: String },
    /// Aborted by the caller; no further queries were issued
    Cancelled { analysis_id: String, attempts: u32 },
}

impl LookupOutcome {
    pub fn state(&self) -> ReputationState {
        match self {
            LookupOutcome::CacheHit { .. } => ReputationState::CacheHit,
            LookupOutcome::Completed { .. } => ReputationState::Completed,
            LookupOutcome::TimedOut { .. } => ReputationState::TimedOut,
            LookupOutcome::ExternalError { .. } => ReputationState::ExternalError,
            LookupOutcome::Cancelled { .. } => ReputationState::Cancelled,
        }
    }

    /// Detection summary for the report-carrying outcomes
    pub fn summary(&self) -> Option<DetectionSummary> {
        match self {
            LookupOutcome::CacheHit { report } => DetectionSummary::from_file_object(report),
            LookupOutcome::Completed { report, .. } => DetectionSummary::from_analysis(report),
            _ => None,
        }
    }
}

/// One reply from the reputation service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: u16,
    pub body: Value,
}

impl ServiceResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// `data.attributes.status` of an analysis object
    pub fn analysis_status(&self) -> Option<&str> {
        self.body
            .pointer("/data/attributes/status")
            .and_then(Value::as_str)
    }

    /// `data.id` of a submission reply
    pub fn data_id(&self) -> Option<&str> {
        self.body.pointer("/data/id").and_then(Value::as_str)
    }

    /// Upstream error text, when the body carries one
    pub fn error_message(&self) -> String {
        self.body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("reputation service returned status {}", self.status))
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("Reputation service not configured")]
    NotConfigured,

    #[error("Reputation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected reputation response: {0}")]
    InvalidResponse(String),

    #[error("Invalid analysis id: {0:?}")]
    InvalidAnalysisId(String),

    #[error("Upload storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type ReputationResult<T> = Result<T, ReputationError>;

/// Analysis ids are URL path segments: base64url plus `=` padding
pub fn is_valid_analysis_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'=' | b'_' | b'-'))
}

// ============================================================================
// CONFIG
// ============================================================================

/// Polling budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    /// Hard wall-clock limit, checked before each sleep
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            deadline: None,
        }
    }
}

/// Connection settings for the reputation service
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll: PollPolicy,
}

impl ReputationConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_REPUTATION_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            poll: PollPolicy::default(),
        }
    }
}
