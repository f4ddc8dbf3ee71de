//! triage-core - static PE triage and reputation engine.
//!
//! Provides entropy and PE structure analysis, the fixed feature layout the
//! model artifacts were fit on, normalize-then-classify inference, the
//! reputation lookup state machine, and scoped upload storage.

pub mod constants;
pub mod error;
pub mod logic;

pub use error::{TriageError, TriageResult};
pub use logic::entropy::shannon_entropy;
pub use logic::features::{
    extract_features, ExtendedFeatures, ExtractionPolicy, FeatureVector, LayoutInfo,
    StaticReport, FEATURE_COUNT, FEATURE_LAYOUT,
};
pub use logic::model::{
    ArtifactError, ClassificationResult, Classifier, ClassifierModel, InferenceEngine,
    InferenceOutcome, Label,
    ModelContext, NormalizedFeatureVector, Scaler, StandardScaler,
};
pub use logic::pe::{parse_pe, HeaderFault, PeRecord, PeValidity, ParsedPe};
pub use logic::reputation::{
    BeginOutcome, CancelSignal, DetectionSummary, LookupOutcome, PollPolicy, ReputationConfig,
    ReputationError, ReputationLookup, ReputationQuery, ReputationService, ReputationState,
    ServiceResponse, VirusTotalClient,
};
pub use logic::upload::{RawArtifact, StagedUpload};
