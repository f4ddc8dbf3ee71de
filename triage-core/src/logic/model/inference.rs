//! Inference Engine - extract → transform → predict
//!
//! Stateless apart from the shared, read-only `ModelContext`; identical
//! bytes always produce the identical result.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TriageResult;
use crate::logic::features::{extract_features, ExtractionPolicy, FeatureVector};
use crate::logic::upload::RawArtifact;

use super::classifier::ClassificationResult;
use super::context::ModelContext;
use super::scaler::NormalizedFeatureVector;

/// Everything produced for one artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceOutcome {
    pub features: FeatureVector,
    pub normalized: NormalizedFeatureVector,
    pub result: ClassificationResult,
}

#[derive(Debug, Clone)]
pub struct InferenceEngine {
    ctx: Arc<ModelContext>,
    policy: ExtractionPolicy,
}

impl InferenceEngine {
    pub fn new(ctx: Arc<ModelContext>, policy: ExtractionPolicy) -> Self {
        Self { ctx, policy }
    }

    pub fn context(&self) -> &ModelContext {
        &self.ctx
    }

    pub fn policy(&self) -> ExtractionPolicy {
        self.policy
    }

    /// Label an uploaded artifact
    pub fn classify(&self, artifact: &RawArtifact) -> TriageResult<ClassificationResult> {
        self.infer(artifact.bytes()).map(|outcome| outcome.result)
    }

    /// Run the whole pipeline and keep the intermediate vectors
    pub fn infer(&self, data: &[u8]) -> TriageResult<InferenceOutcome> {
        let features = extract_features(data, self.policy)?;
        let normalized = self.ctx.scaler().transform(&features);
        let result = self.ctx.classifier().predict(&normalized);

        log::debug!(
            "Inference: {} -> {:?} ({:?})",
            features.to_log_entry(),
            result.label,
            result.confidence
        );

        Ok(InferenceOutcome {
            features,
            normalized,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TriageError;
    use crate::logic::features::FEATURE_COUNT;
    use crate::logic::model::{ClassifierModel, Label, LogisticModel, StandardScaler};
    use crate::logic::pe::fixtures::PeBuilder;

    /// Malicious exactly when the checksum is invalid
    fn checksum_engine(policy: ExtractionPolicy) -> InferenceEngine {
        let mut mean = [0.0; FEATURE_COUNT];
        mean[7] = 0.5;
        let scaler = StandardScaler::new(mean, [1.0; FEATURE_COUNT]).unwrap();
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[7] = 8.0;
        let classifier = ClassifierModel::Logistic(LogisticModel {
            coefficients,
            intercept: 0.0,
        });
        let ctx = ModelContext::new(scaler, classifier).unwrap();
        InferenceEngine::new(Arc::new(ctx), policy)
    }

    #[test]
    fn test_classify_follows_checksum() {
        let engine = checksum_engine(ExtractionPolicy::Strict);

        let good = PeBuilder::new()
            .section(".text", vec![0x90; 256])
            .with_valid_checksum()
            .build();
        let bad = PeBuilder::new().section(".text", vec![0x90; 256]).build();

        let result = engine.classify(&RawArtifact::new("good.exe", good)).unwrap();
        assert_eq!(result.label, Label::Benign);
        let result = engine.classify(&RawArtifact::new("bad.exe", bad)).unwrap();
        assert_eq!(result.label, Label::Malicious);
        assert!(result.confidence.unwrap() > 0.9);
    }

    #[test]
    fn test_same_sample_same_label() {
        let engine = checksum_engine(ExtractionPolicy::Strict);
        let artifact = RawArtifact::new(
            "sample.exe",
            PeBuilder::new()
                .section(".text", (0..200u8).collect())
                .import("USER32.dll", &["MessageBoxW"])
                .build(),
        );

        let first = engine.infer(artifact.bytes()).unwrap();
        for _ in 0..20 {
            assert_eq!(engine.infer(artifact.bytes()).unwrap(), first);
        }
    }

    #[test]
    fn test_rejections_propagate() {
        let engine = checksum_engine(ExtractionPolicy::Strict);
        assert_eq!(
            engine.classify(&RawArtifact::new("a.txt", b"just text".to_vec())),
            Err(TriageError::InvalidFormat)
        );
        assert!(matches!(
            engine.classify(&RawArtifact::new("b.exe", b"MZ".to_vec())),
            Err(TriageError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_degraded_vector_imputes_missing() {
        let engine = checksum_engine(ExtractionPolicy::Degraded);
        let mut image = PeBuilder::new().section(".text", vec![1; 64]).build();
        let size_field = PeBuilder::E_LFANEW as usize + 4 + 16;
        image[size_field..size_field + 2].copy_from_slice(&0xfff0u16.to_le_bytes());

        let outcome = engine.infer(&image).unwrap();
        assert_eq!(outcome.features.checksum_invalid, None);
        assert_eq!(outcome.normalized.get(7), Some(0.0));
        // sigmoid(0) = 0.5 rounds to malicious
        assert_eq!(outcome.result.label, Label::Malicious);
        assert_eq!(outcome.result.confidence, Some(0.5));
    }
}
