//! Model Context - immutable artifact bundle
//!
//! Built once at startup, then only ever read. Handlers hold it through
//! `Arc<ModelContext>`; nothing in here has interior mutability.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArtifactResult;
use crate::logic::features::LayoutInfo;

use super::classifier::{Classifier, ClassifierModel};
use super::scaler::{Scaler, StandardScaler};

pub const SCALER_FILE: &str = "scaler.json";
pub const CLASSIFIER_FILE: &str = "classifier.json";

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub source: String,
    pub classifier_kind: String,
    pub layout: LayoutInfo,
    pub loaded_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ModelContext {
    scaler: StandardScaler,
    classifier: ClassifierModel,
    metadata: ModelMetadata,
}

impl ModelContext {
    /// Load `scaler.json` and `classifier.json` from `dir`
    pub fn load(dir: &Path) -> ArtifactResult<Self> {
        log::info!("Loading model artifacts from {}", dir.display());
        let scaler = StandardScaler::load(&dir.join(SCALER_FILE))?;
        let classifier = ClassifierModel::load(&dir.join(CLASSIFIER_FILE))?;
        Ok(Self::build(scaler, classifier, dir.display().to_string()))
    }

    /// Assemble from artifacts already in memory
    pub fn new(scaler: StandardScaler, classifier: ClassifierModel) -> ArtifactResult<Self> {
        scaler.validate()?;
        classifier.validate()?;
        Ok(Self::build(scaler, classifier, "<memory>".to_string()))
    }

    fn build(scaler: StandardScaler, classifier: ClassifierModel, source: String) -> Self {
        let metadata = ModelMetadata {
            source,
            classifier_kind: classifier.kind().to_string(),
            layout: LayoutInfo::current(),
            loaded_at: Utc::now(),
        };
        log::info!(
            "Model ready: {} classifier, layout v{} ({:08x})",
            metadata.classifier_kind,
            metadata.layout.version,
            metadata.layout.hash
        );
        Self {
            scaler,
            classifier,
            metadata,
        }
    }

    pub fn scaler(&self) -> &dyn Scaler {
        &self.scaler
    }

    pub fn classifier(&self) -> &dyn Classifier {
        &self.classifier
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArtifactError;
    use crate::logic::features::{FEATURE_COUNT, FEATURE_LAYOUT};

    fn write_artifacts(dir: &Path, classifier: serde_json::Value) {
        let scaler = serde_json::json!({
            "feature_names": FEATURE_LAYOUT,
            "mean": vec![0.0; FEATURE_COUNT],
            "scale": vec![1.0; FEATURE_COUNT],
        });
        std::fs::write(dir.join(SCALER_FILE), scaler.to_string()).unwrap();
        std::fs::write(dir.join(CLASSIFIER_FILE), classifier.to_string()).unwrap();
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_artifacts(
            dir.path(),
            serde_json::json!({
                "kind": "logistic",
                "coefficients": vec![0.1; FEATURE_COUNT],
                "intercept": 0.0,
            }),
        );

        let ctx = ModelContext::load(dir.path()).unwrap();
        assert_eq!(ctx.metadata().classifier_kind, "logistic");
        assert_eq!(ctx.metadata().layout, LayoutInfo::current());
    }

    #[test]
    fn test_missing_and_corrupt_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(ModelContext::load(dir.path()), Err(ArtifactError::Io { .. })));

        write_artifacts(dir.path(), serde_json::json!({ "kind": "svm" }));
        assert!(matches!(ModelContext::load(dir.path()), Err(ArtifactError::Json { .. })));
    }
}
