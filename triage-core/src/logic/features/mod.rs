//! Features Module - Feature Extraction Engine
//!
//! Turns a candidate PE image into the fixed eight-field vector the model
//! artifacts were fit on, and into the richer descriptive report.
//!
//! # Components
//! - `layout.rs`: authoritative feature order, version and hash
//! - `vector.rs`: `FeatureVector`
//! - `extractor.rs`: validity gate + `ExtractionPolicy`
//! - `report.rs`: `StaticReport` / `ExtendedFeatures`

pub mod layout;
pub mod vector;
pub mod extractor;
pub mod report;

#[cfg(test)]
mod tests;

pub use extractor::{extract_features, features_from_parsed, ExtractionPolicy};
pub use layout::{
    feature_index, layout_hash, validate_feature_names, LayoutInfo, LayoutMismatchError,
    FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION,
};
pub use report::{ExtendedFeatures, ImportEntry, SectionReport, StaticReport};
pub use vector::FeatureVector;
