//! Reputation Lookup - hash → cache check → submit → poll
//!
//! The staged upload lives only across the submission; polling needs just
//! the analysis id. Waiting between status queries is a tokio sleep, so a
//! lookup in progress never holds a worker thread.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};

use crate::constants::ANALYSIS_COMPLETED;
use crate::logic::upload::{RawArtifact, StagedUpload};

use super::client::ReputationService;
use super::types::{
    is_valid_analysis_id, BeginOutcome, LookupOutcome, PollPolicy, ReputationError, ReputationQuery, ReputationResult,
    ReputationState, ServiceResponse,
};

// ============================================================================
// CANCELLATION
// ============================================================================

/// Shared abort flag for a running lookup
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone: can no longer be cancelled
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LOOKUP
// ============================================================================

pub struct ReputationLookup<S> {
    service: S,
    policy: PollPolicy,
    upload_dir: PathBuf,
}

impl<S: ReputationService> ReputationLookup<S> {
    pub fn new(service: S, policy: PollPolicy, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            policy,
            upload_dir: upload_dir.into(),
        }
    }

    /// Hash the artifact, check the cache and submit on a miss.
    pub async fn begin(
        &self,
        artifact: &RawArtifact,
    ) -> ReputationResult<(ReputationQuery, BeginOutcome)> {
        let mut query = ReputationQuery::new(artifact.sha256());
        log::info!(
            "Reputation lookup for {} ({} bytes, sha256 {})",
            artifact.file_name(),
            artifact.len(),
            query.sha256
        );

        query.advance(ReputationState::CacheCheck);
        let cached = self
            .service
            .lookup_hash(&query.sha256)
            .await
            .inspect_err(|_| query.state = ReputationState::ExternalError)?;
        if cached.status == 200 {
            query.advance(ReputationState::CacheHit);
            let report = cached.body.get("data").cloned().unwrap_or(cached.body);
            return Ok((query, BeginOutcome::CacheHit { report }));
        }
        log::debug!("Cache miss for {} (status {})", query.sha256, cached.status);

        query.advance(ReputationState::Submitting);
        let submitted = self.submit(artifact).await;
        let response = match submitted {
            Ok(response) => response,
            Err(e) => {
                query.advance(ReputationState::ExternalError);
                return Err(e);
            }
        };

        if !response.is_success() {
            query.advance(ReputationState::ExternalError);
            log::error!("Submission of {} rejected with {}", query.sha256, response.status);
            return Ok((
                query,
                BeginOutcome::ExternalError {
                    status: response.status,
                    message: response.error_message(),
                },
            ));
        }

        let Some(analysis_id) = response
            .data_id()
            .filter(|id| is_valid_analysis_id(id))
            .map(str::to_string)
        else {
            query.advance(ReputationState::ExternalError);
            return Err(ReputationError::InvalidResponse(
                "submission reply has no usable data.id".to_string(),
            ));
        };
        query.analysis_id = Some(analysis_id.clone());
        query.advance(ReputationState::Polling);
        Ok((query, BeginOutcome::Submitted { analysis_id }))
    }

    /// Stage, submit, and release the upload whatever the reply
    async fn submit(&self, artifact: &RawArtifact) -> ReputationResult<ServiceResponse> {
        let staged = StagedUpload::stage(&self.upload_dir, artifact).await?;
        let bytes = staged.read_bytes().await?;
        let response = self.service.submit(staged.file_name(), bytes).await;

        if let Err(e) = staged.release() {
            log::warn!("Failed to remove staged upload: {}", e);
        }
        response
    }

    /// Poll the analysis of a submitted query until a terminal state.
    pub async fn poll(
        &self,
        query: &mut ReputationQuery,
        cancel: &CancelSignal,
    ) -> ReputationResult<LookupOutcome> {
        let Some(analysis_id) = query.analysis_id.clone() else {
            return Err(ReputationError::InvalidResponse(
                "no analysis id to poll".to_string(),
            ));
        };
        let started = Instant::now();

        while query.attempts < self.policy.max_attempts {
            if let Some(deadline) = self.policy.deadline {
                if started.elapsed() + self.policy.interval > deadline {
                    log::info!("Polling {} hit its deadline", analysis_id);
                    break;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(cancelled(query, analysis_id)),
                _ = sleep(self.policy.interval) => {}
            }

            query.attempts += 1;
            let response = tokio::select! {
                _ = cancel.cancelled() => return Ok(cancelled(query, analysis_id)),
                response = self.service.analysis_status(&analysis_id) => response,
            };
            let response = response.inspect_err(|_| query.state = ReputationState::ExternalError)?;

            if !response.is_success() {
                query.advance(ReputationState::ExternalError);
                log::error!("Status query for {} failed with {}", analysis_id, response.status);
                return Ok(LookupOutcome::ExternalError {
                    status: response.status,
                    message: response.error_message(),
                });
            }

            query.last_status = response.analysis_status().map(str::to_string);
            log::debug!(
                "Analysis {} attempt {}/{}: {:?}",
                analysis_id,
                query.attempts,
                self.policy.max_attempts,
                query.last_status
            );
            if query.last_status.as_deref() == Some(ANALYSIS_COMPLETED) {
                query.advance(ReputationState::Completed);
                return Ok(LookupOutcome::Completed {
                    analysis_id,
                    report: response.body,
                });
            }
        }

        query.advance(ReputationState::TimedOut);
        log::warn!("Analysis {} not completed after {} attempts", analysis_id, query.attempts);
        Ok(LookupOutcome::TimedOut {
            analysis_id,
            attempts: query.attempts,
        })
    }

    /// Full lookup: `begin` then `poll` on a cache miss.
    pub async fn run(
        &self,
        artifact: &RawArtifact,
        cancel: &CancelSignal,
    ) -> ReputationResult<(ReputationQuery, LookupOutcome)> {
        let (mut query, begun) = self.begin(artifact).await?;
        let outcome = match begun {
            BeginOutcome::CacheHit { report } => LookupOutcome::CacheHit { report },
            BeginOutcome::ExternalError { status, message } => {
                LookupOutcome::ExternalError { status, message }
            }
            BeginOutcome::Submitted { .. } => self.poll(&mut query, cancel).await?,
        };
        Ok((query, outcome))
    }

    /// One status query, passed through unchanged
    pub async fn status(&self, analysis_id: &str) -> ReputationResult<ServiceResponse> {
        if !is_valid_analysis_id(analysis_id) {
            return Err(ReputationError::InvalidAnalysisId(analysis_id.to_string()));
        }
        self.service.analysis_status(analysis_id).await
    }
}

fn cancelled(query: &mut ReputationQuery, analysis_id: String) -> LookupOutcome {
    query.advance(ReputationState::Cancelled);
    log::info!("Polling {} cancelled after {} attempts", analysis_id, query.attempts);
    LookupOutcome::Cancelled {
        analysis_id,
        attempts: query.attempts,
    }
}
