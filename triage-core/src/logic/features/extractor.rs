//! Feature Extractor - bytes → FeatureVector
//!
//! Runs the PE validity gate and assembles the fixed-order vector.
//! Whether partial parses may produce a vector is an explicit policy.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TriageError, TriageResult};
use crate::logic::entropy::shannon_entropy;
use crate::logic::pe::{parse_pe, ImportDirectory, ParsedPe, PartialHeaders, PeRecord};

use super::vector::FeatureVector;

// ============================================================================
// POLICY
// ============================================================================

/// How to treat images the parser could only partly read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionPolicy {
    /// Reject malformed headers and unreadable import directories
    #[default]
    Strict,
    /// Accept partial parses; unknown fields stay `None` and are imputed
    /// with the scaler mean at inference time. Images whose COFF header
    /// could not be read are still rejected.
    Degraded,
}

impl ExtractionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionPolicy::Strict => "strict",
            ExtractionPolicy::Degraded => "degraded",
        }
    }
}

impl FromStr for ExtractionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(ExtractionPolicy::Strict),
            "degraded" => Ok(ExtractionPolicy::Degraded),
            other => Err(format!("unknown extraction policy '{}'", other)),
        }
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract the model features from a candidate image.
pub fn extract_features(data: &[u8], policy: ExtractionPolicy) -> TriageResult<FeatureVector> {
    let parsed = parse_pe(data);
    features_from_parsed(data, &parsed, policy)
}

/// Same as `extract_features` for an already parsed image
pub fn features_from_parsed(
    data: &[u8],
    parsed: &ParsedPe,
    policy: ExtractionPolicy,
) -> TriageResult<FeatureVector> {
    let entropy = shannon_entropy(data);
    let length = data.len() as u64;

    match parsed {
        ParsedPe::NotExecutable => {
            log::info!("Rejected {} byte artifact: not a PE image", length);
            Err(TriageError::InvalidFormat)
        }
        ParsedPe::Malformed { fault, partial } => match policy {
            ExtractionPolicy::Degraded if partial.number_of_sections.is_some() => {
                log::warn!("Degraded extraction on malformed header: {}", fault);
                Ok(from_partial(entropy, length, partial))
            }
            _ => {
                log::warn!("SUSPICIOUS: malformed PE header rejected: {}", fault);
                Err(TriageError::MalformedHeader(fault.clone()))
            }
        },
        ParsedPe::Valid(record) => from_record(entropy, length, record, policy),
    }
}

fn from_record(
    entropy: f64,
    length: u64,
    record: &PeRecord,
    policy: ExtractionPolicy,
) -> TriageResult<FeatureVector> {
    let import_count = match (&record.imports, policy) {
        (ImportDirectory::Unreadable { reason }, ExtractionPolicy::Strict) => {
            log::warn!("Import directory unreadable: {}", reason);
            return Err(TriageError::ExtractionFailure(format!(
                "import directory unreadable: {}",
                reason
            )));
        }
        _ => record.import_symbol_count(),
    };

    Ok(FeatureVector {
        entropy,
        length,
        number_of_sections: Some(record.number_of_sections),
        time_date_stamp: Some(record.time_date_stamp),
        characteristics: Some(record.characteristics),
        dll_characteristics: Some(record.dll_characteristics),
        import_count,
        checksum_invalid: Some(!record.checksum_valid()),
    })
}

fn from_partial(entropy: f64, length: u64, partial: &PartialHeaders) -> FeatureVector {
    FeatureVector {
        entropy,
        length,
        number_of_sections: partial.number_of_sections,
        time_date_stamp: partial.time_date_stamp,
        characteristics: partial.characteristics,
        dll_characteristics: partial.dll_characteristics,
        import_count: None,
        checksum_invalid: None,
    }
}
