//! Error types shared by the static-analysis pipeline

use thiserror::Error;

use crate::logic::features::LayoutMismatchError;
use crate::logic::pe::HeaderFault;

/// Why an artifact could not be turned into a feature vector
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriageError {
    /// Leading bytes are not an executable image signature
    #[error("File is not a Portable Executable")]
    InvalidFormat,

    /// Executable signature present but the headers are inconsistent
    #[error("SUSPICIOUS FILE ALERT: File has an executable signature but an invalid PE header ({0})")]
    MalformedHeader(HeaderFault),

    /// A recognised PE whose feature could not be derived
    #[error("Feature extraction failed: {0}")]
    ExtractionFailure(String),
}

impl TriageError {
    /// Short machine-readable kind, used in logs and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            TriageError::InvalidFormat => "invalid_format",
            TriageError::MalformedHeader(_) => "malformed_header",
            TriageError::ExtractionFailure(_) => "extraction_failure",
        }
    }
}

pub type TriageResult<T> = Result<T, TriageError>;

/// Why a model artifact could not be loaded
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),

    #[error("Invalid artifact shape: {0}")]
    Shape(String),

    #[error("Scaler has non-finite or zero scale for '{feature}'")]
    DegenerateScale { feature: String },

    #[error("Invalid decision tree {tree}: {reason}")]
    InvalidTree { tree: usize, reason: String },
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;
