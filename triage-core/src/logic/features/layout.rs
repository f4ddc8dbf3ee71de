//! Feature Layout - Centralized Feature Definition
//!
//! **This file controls the feature schema the model artifacts were fit on.**
//!
//! ## Rules (NEVER break these):
//! 1. Add feature → increment FEATURE_VERSION
//! 2. Change order → increment FEATURE_VERSION
//! 3. Remove feature → increment FEATURE_VERSION
//!
//! Reordering without refitting the scaler and classifier silently corrupts
//! every prediction; the artifact loader compares names against this list.

use crc32fast::Hasher;
use serde::{Deserialize, Serialize};

// ============================================================================
// FEATURE VERSION
// ============================================================================

/// Current feature layout version
pub const FEATURE_VERSION: u8 = 1;

// ============================================================================
// FEATURE LAYOUT (Authoritative source)
// ============================================================================

/// Feature names in exact order they appear in the vector
pub const FEATURE_LAYOUT: &[&str] = &[
    "entropy",             // 0: Shannon entropy of the whole file (bits/byte)
    "length",              // 1: File size in bytes
    "number_of_sections",  // 2: COFF NumberOfSections
    "time_date_stamp",     // 3: COFF TimeDateStamp
    "characteristics",     // 4: COFF Characteristics
    "dll_characteristics", // 5: Optional header DllCharacteristics
    "import_count",        // 6: Total imported symbols across all libraries
    "checksum_invalid",    // 7: 1 if stored CheckSum != recomputed
];

/// Total number of features
/// IMPORTANT: Must match FEATURE_LAYOUT.len()!
pub const FEATURE_COUNT: usize = 8;

// ============================================================================
// LAYOUT HASH
// ============================================================================

/// CRC32 over the version and the ordered feature names
pub fn layout_hash() -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&[FEATURE_VERSION]);
    for name in FEATURE_LAYOUT {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    hasher.finalize()
}

// ============================================================================
// LAYOUT INFO
// ============================================================================

/// Complete layout information for serialization/logging
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub version: u8,
    pub hash: u32,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
}

impl LayoutInfo {
    pub fn current() -> Self {
        Self {
            version: FEATURE_VERSION,
            hash: layout_hash(),
            feature_count: FEATURE_COUNT,
            feature_names: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for LayoutInfo {
    fn default() -> Self {
        Self::current()
    }
}

// ============================================================================
// LAYOUT VALIDATION
// ============================================================================

/// Artifact feature names disagree with the compiled layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutMismatchError {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

impl std::fmt::Display for LayoutMismatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Feature layout mismatch: expected [{}] (v{}, hash {:08x}), got [{}]",
            self.expected.join(", "),
            FEATURE_VERSION,
            layout_hash(),
            self.actual.join(", ")
        )
    }
}

impl std::error::Error for LayoutMismatchError {}

/// Check that `names` lists exactly the layout, in order
pub fn validate_feature_names<S: AsRef<str>>(names: &[S]) -> Result<(), LayoutMismatchError> {
    let matches = names.len() == FEATURE_COUNT
        && names.iter().zip(FEATURE_LAYOUT).all(|(a, b)| a.as_ref() == *b);
    if matches {
        return Ok(());
    }
    Err(LayoutMismatchError {
        expected: FEATURE_LAYOUT.iter().map(|s| s.to_string()).collect(),
        actual: names.iter().map(|s| s.as_ref().to_string()).collect(),
    })
}

// ============================================================================
// FEATURE INDEX LOOKUP
// ============================================================================

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_LAYOUT.iter().position(|&n| n == name)
}

// ============================================================================
// TESTS
// ============================================================================
