//! Scaler - per-feature affine normalization
//!
//! Parameters are fixed at fit time; `transform` never recomputes them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, ArtifactResult};
use crate::logic::features::{validate_feature_names, FeatureVector, FEATURE_COUNT, FEATURE_LAYOUT};

use super::read_json;

/// Scaled features in layout order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatureVector(pub [f64; FEATURE_COUNT]);

impl NormalizedFeatureVector {
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

/// Maps a raw feature vector into the space the classifier was fit in
pub trait Scaler: Send + Sync {
    fn transform(&self, features: &FeatureVector) -> NormalizedFeatureVector;
}

/// `(x - mean) / scale`, as fit by sklearn's StandardScaler.
///
/// Missing fields (degraded extraction) are imputed with the mean, which
/// normalizes to 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Build from parameters in layout order
    pub fn new(mean: [f64; FEATURE_COUNT], scale: [f64; FEATURE_COUNT]) -> ArtifactResult<Self> {
        let scaler = Self {
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        };
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let scaler: Self = read_json(path)?;
        scaler.validate()?;
        log::info!("Scaler loaded from {}", path.display());
        Ok(scaler)
    }

    pub fn from_json_str(json: &str) -> ArtifactResult<Self> {
        let scaler: Self = serde_json::from_str(json).map_err(|source| ArtifactError::Json {
            path: "<inline>".to_string(),
            source,
        })?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn validate(&self) -> ArtifactResult<()> {
        validate_feature_names(&self.feature_names)?;
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(ArtifactError::Shape(format!(
                "scaler expects {} means and scales, got {} and {}",
                FEATURE_COUNT,
                self.mean.len(),
                self.scale.len()
            )));
        }
        if let Some(i) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(ArtifactError::Shape(format!(
                "non-finite mean for '{}'",
                FEATURE_LAYOUT[i]
            )));
        }
        if let Some(i) = self.scale.iter().position(|s| !s.is_finite() || *s == 0.0) {
            return Err(ArtifactError::DegenerateScale {
                feature: FEATURE_LAYOUT[i].to_string(),
            });
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &FeatureVector) -> NormalizedFeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, value) in features.values().iter().enumerate() {
            out[i] = match value {
                Some(x) => (x - self.mean[i]) / self.scale[i],
                None => 0.0,
            };
        }
        NormalizedFeatureVector(out)
    }
}
