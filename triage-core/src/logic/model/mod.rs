//! Model Module - Static Inference
//!
//! Scaler and classifier artifacts are loaded once into an immutable
//! `ModelContext` and shared by every request through `Arc`.
//!
//! # Components
//! - `scaler.rs`: `Scaler` trait, `StandardScaler`
//! - `classifier.rs`: `Classifier` trait, random forest and logistic models
//! - `context.rs`: `ModelContext` (artifacts + metadata)
//! - `inference.rs`: `InferenceEngine` (extract → transform → predict)

use std::path::Path;

use serde::de::DeserializeOwned;

pub mod scaler;
pub mod classifier;
pub mod context;
pub mod inference;

pub use crate::error::{ArtifactError, ArtifactResult};
pub use classifier::{
    ClassificationResult, Classifier, ClassifierModel, DecisionTree, Label, LogisticModel,
    RandomForest,
};
pub use context::{ModelContext, ModelMetadata, CLASSIFIER_FILE, SCALER_FILE};
pub use inference::{InferenceEngine, InferenceOutcome};
pub use scaler::{NormalizedFeatureVector, Scaler, StandardScaler};

fn read_json<T: DeserializeOwned>(path: &Path) -> ArtifactResult<T> {
    let text = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Json {
        path: path.display().to_string(),
        source,
    })
}
