//! Reputation Module - external scan lookup
//!
//! # Components
//! - `types.rs`: states, outcomes, service replies, config
//! - `client.rs`: `ReputationService` seam + VirusTotal client
//! - `lookup.rs`: the hash → cache → submit → poll state machine
//! - `summary.rs`: detection counters from either report shape

pub mod types;
pub mod client;
pub mod lookup;
pub mod summary;

pub use client::{ReputationService, VirusTotalClient};
pub use lookup::{CancelSignal, ReputationLookup};
pub use summary::DetectionSummary;
pub use types::{
    BeginOutcome, LookupOutcome, PollPolicy, ReputationConfig, ReputationError, ReputationQuery,
    ReputationResult, ReputationState, ServiceResponse,
};
