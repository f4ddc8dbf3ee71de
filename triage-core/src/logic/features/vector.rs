//! Feature Vector - the fixed-order model input
//!
//! Named fields keep call sites readable; `values()` is the only place that
//! turns them into the ordered array the scaler consumes.

use serde::{Deserialize, Serialize};

use super::layout::{feature_index, layout_hash, FEATURE_COUNT, FEATURE_LAYOUT, FEATURE_VERSION};

/// Structural features of one artifact.
///
/// `entropy` and `length` are always known. The header-derived fields are
/// `None` only when the degraded extraction policy accepted a partial parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub entropy: f64,
    pub length: u64,
    pub number_of_sections: Option<u16>,
    pub time_date_stamp: Option<u32>,
    pub characteristics: Option<u16>,
    pub dll_characteristics: Option<u16>,
    pub import_count: Option<u32>,
    pub checksum_invalid: Option<bool>,
}

impl FeatureVector {
    /// Values in FEATURE_LAYOUT order
    pub fn values(&self) -> [Option<f64>; FEATURE_COUNT] {
        [
            Some(self.entropy),
            Some(self.length as f64),
            self.number_of_sections.map(f64::from),
            self.time_date_stamp.map(f64::from),
            self.characteristics.map(f64::from),
            self.dll_characteristics.map(f64::from),
            self.import_count.map(f64::from),
            self.checksum_invalid.map(|invalid| if invalid { 1.0 } else { 0.0 }),
        ]
    }

    /// True when no field is missing
    pub fn is_complete(&self) -> bool {
        self.values().iter().all(Option::is_some)
    }

    /// Names of the fields that are missing
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.values()
            .iter()
            .zip(FEATURE_LAYOUT)
            .filter(|(v, _)| v.is_none())
            .map(|(_, name)| *name)
            .collect()
    }

    pub fn get_by_name(&self, name: &str) -> Option<f64> {
        feature_index(name).and_then(|i| self.values()[i])
    }

    /// JSON form for debug logging
    pub fn to_log_entry(&self) -> serde_json::Value {
        serde_json::json!({
            "feature_version": FEATURE_VERSION,
            "layout_hash": layout_hash(),
            "values": self.values(),
        })
    }
}
