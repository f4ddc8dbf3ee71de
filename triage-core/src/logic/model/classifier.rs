//! Classifier - normalized vector → benign / malicious
//!
//! Two artifact kinds are understood:
//! - `random_forest`: sklearn decision trees in flattened array form
//! - `logistic`: linear model with a sigmoid link

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, ArtifactResult};
use crate::logic::features::FEATURE_COUNT;

use super::read_json;
use super::scaler::NormalizedFeatureVector;

/// sklearn marks leaves with child index -1
const TREE_LEAF: i64 = -1;
const N_CLASSES: usize = 2;

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Benign,
    Malicious,
}

impl Label {
    /// Class index as the model was trained (0 benign, 1 malicious)
    pub fn as_int(&self) -> u8 {
        match self {
            Label::Benign => 0,
            Label::Malicious => 1,
        }
    }

    fn from_index(index: usize) -> Self {
        if index == 1 { Label::Malicious } else { Label::Benign }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// Probability of `label`, in [0, 1]
    pub confidence: Option<f64>,
}

/// Maps a normalized vector to a label
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &NormalizedFeatureVector) -> ClassificationResult;
}

// ============================================================================
// RANDOM FOREST
// ============================================================================

/// One fitted tree. Arrays are indexed by node id; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights, `[benign, malicious]`
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, tree: usize) -> ArtifactResult<()> {
        let invalid = |reason: String| ArtifactError::InvalidTree { tree, reason };
        let n = self.children_left.len();
        if n == 0 {
            return Err(invalid("no nodes".to_string()));
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            return Err(invalid("node arrays differ in length".to_string()));
        }

        for node in 0..n {
            let (left, right) = (self.children_left[node], self.children_right[node]);
            if left == TREE_LEAF || right == TREE_LEAF {
                if left != right {
                    return Err(invalid(format!("node {} has a single child", node)));
                }
                let weights = &self.value[node];
                if weights.len() != N_CLASSES {
                    return Err(invalid(format!("leaf {} has {} class weights", node, weights.len())));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                    return Err(invalid(format!("leaf {} has degenerate weights", node)));
                }
                continue;
            }
            // Children strictly after the parent rules out cycles
            for child in [left, right] {
                if child <= node as i64 || child >= n as i64 {
                    return Err(invalid(format!("node {} has child {} out of range", node, child)));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature as usize >= FEATURE_COUNT {
                return Err(invalid(format!("node {} splits on feature {}", node, feature)));
            }
            if self.threshold[node].is_nan() {
                return Err(invalid(format!("node {} has NaN threshold", node)));
            }
        }
        Ok(())
    }

    /// Class probabilities at the leaf `x` falls into
    fn leaf_probabilities(&self, x: &[f64; FEATURE_COUNT]) -> [f64; N_CLASSES] {
        let mut node = 0usize;
        while self.children_left[node] != TREE_LEAF {
            let feature = self.feature[node] as usize;
            // Trees were fit on float32 inputs; thresholds are float64
            node = if f64::from(x[feature] as f32) <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let weights = &self.value[node];
        let total: f64 = weights.iter().sum();
        [weights[0] / total, weights[1] / total]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn validate(&self) -> ArtifactResult<()> {
        if self.trees.is_empty() {
            return Err(ArtifactError::Shape("random forest has no trees".to_string()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(i)?;
        }
        Ok(())
    }

    /// Mean of per-tree leaf probabilities
    pub fn predict_proba(&self, features: &NormalizedFeatureVector) -> [f64; N_CLASSES] {
        let mut sum = [0.0; N_CLASSES];
        for tree in &self.trees {
            let p = tree.leaf_probabilities(features.values());
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        [sum[0] / n, sum[1] / n]
    }
}

impl Classifier for RandomForest {
    fn predict(&self, features: &NormalizedFeatureVector) -> ClassificationResult {
        let proba = self.predict_proba(features);
        // Ties go to the lower class index
        let index = if proba[1] > proba[0] { 1 } else { 0 };
        ClassificationResult {
            label: Label::from_index(index),
            confidence: Some(proba[index]),
        }
    }
}

// ============================================================================
// LOGISTIC REGRESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticModel {
    pub fn validate(&self) -> ArtifactResult<()> {
        if self.coefficients.len() != FEATURE_COUNT {
            return Err(ArtifactError::Shape(format!(
                "logistic model has {} coefficients, expected {}",
                self.coefficients.len(),
                FEATURE_COUNT
            )));
        }
        if !self.intercept.is_finite() || self.coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ArtifactError::Shape("logistic model has non-finite weights".to_string()));
        }
        Ok(())
    }

    /// Probability of the malicious class
    pub fn probability(&self, features: &NormalizedFeatureVector) -> f64 {
        let z: f64 = self
            .coefficients
            .iter()
            .zip(features.values())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept;
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &NormalizedFeatureVector) -> ClassificationResult {
        let p = self.probability(features);
        let (label, confidence) = if p >= 0.5 {
            (Label::Malicious, p)
        } else {
            (Label::Benign, 1.0 - p)
        };
        ClassificationResult {
            label,
            confidence: Some(confidence),
        }
    }
}

// ============================================================================
// ARTIFACT ENUM
// ============================================================================

/// Classifier artifact as persisted, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest(RandomForest),
    Logistic(LogisticModel),
}

impl ClassifierModel {
    pub fn load(path: &Path) -> ArtifactResult<Self> {
        let model: Self = read_json(path)?;
        model.validate()?;
        log::info!("Classifier ({}) loaded from {}", model.kind(), path.display());
        Ok(model)
    }

    pub fn validate(&self) -> ArtifactResult<()> {
        match self {
            ClassifierModel::RandomForest(forest) => forest.validate(),
            ClassifierModel::Logistic(model) => model.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::RandomForest(_) => "random_forest",
            ClassifierModel::Logistic(_) => "logistic",
        }
    }
}

impl Classifier for ClassifierModel {
    fn predict(&self, features: &NormalizedFeatureVector) -> ClassificationResult {
        match self {
            ClassifierModel::RandomForest(forest) => forest.predict(features),
            ClassifierModel::Logistic(model) => model.predict(features),
        }
    }
}
