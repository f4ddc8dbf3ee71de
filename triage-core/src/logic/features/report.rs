//! Static Report - descriptive analysis without classification
//!
//! Superset of the model features: section table, imports, anomalies and the
//! extra structural descriptors used when building training datasets.

use serde::{Deserialize, Serialize};

use crate::logic::entropy::shannon_entropy;
use crate::logic::pe::{
    parse_pe, HeaderFault, ImportListing, ImportedSymbol, ParseAnomaly, ParsedPe, PeRecord,
    PeValidity, SectionInfo,
};
use crate::logic::upload::RawArtifact;

use super::extractor::{features_from_parsed, ExtractionPolicy};
use super::vector::FeatureVector;

/// Structural descriptors beyond the model's eight features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFeatures {
    pub major_image_version: u16,
    pub dll_count: Option<u32>,
    pub import_count: Option<u32>,
    pub text_section_entropy: Option<f64>,
    pub suspicious_section_names: usize,
    pub non_suspicious_section_names: usize,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
}

impl ExtendedFeatures {
    /// `data` is the buffer `record` was parsed from
    pub fn from_record(record: &PeRecord, data: &[u8]) -> Self {
        let (suspicious, known) = record.section_name_counts();
        Self {
            major_image_version: record.major_image_version,
            dll_count: record.import_library_count(),
            import_count: record.import_symbol_count(),
            text_section_entropy: record.text_section_entropy(data),
            suspicious_section_names: suspicious,
            non_suspicious_section_names: known,
            size_of_initialized_data: record.size_of_initialized_data,
            size_of_uninitialized_data: record.size_of_uninitialized_data,
        }
    }
}

/// Section bytes hashed per report, as a multiple of the file length.
/// Sections may all claim the whole file; later ones then get no entropy.
const SECTION_ENTROPY_BUDGET: usize = 2;

/// Section table entry with the entropy of its raw data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    #[serde(flatten)]
    pub section: SectionInfo,
    /// `None` once the report's hashing budget is spent
    pub entropy: Option<f64>,
}

fn section_reports(record: &PeRecord, data: &[u8]) -> Vec<SectionReport> {
    let mut budget = data.len().saturating_mul(SECTION_ENTROPY_BUDGET);
    record
        .sections
        .iter()
        .map(|section| {
            let raw = record.section_data(section, data);
            let entropy = budget.checked_sub(raw.len()).map(|left| {
                budget = left;
                shannon_entropy(raw)
            });
            SectionReport {
                section: section.clone(),
                entropy,
            }
        })
        .collect()
}

/// One imported library, flattened for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub library: String,
    pub functions: Vec<String>,
}

/// Full static description of an uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticReport {
    pub file_name: String,
    pub sha256: String,
    pub length: u64,
    pub validity: PeValidity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<HeaderFault>,
    /// Model features, or why they could not be produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended: Option<ExtendedFeatures>,
    pub sections: Vec<SectionReport>,
    pub imports: Vec<ImportEntry>,
    /// Import listing stopped early on a bound
    pub imports_truncated: bool,
    pub anomalies: Vec<ParseAnomaly>,
}

impl StaticReport {
    /// Parse once and describe everything that could be read.
    pub fn analyze(artifact: &RawArtifact, policy: ExtractionPolicy) -> Self {
        let data = artifact.bytes();
        let parsed = parse_pe(data);

        let (features, rejection) = match features_from_parsed(data, &parsed, policy) {
            Ok(vector) => (Some(vector), None),
            Err(e) => (None, Some(e.to_string())),
        };

        let mut report = Self {
            file_name: artifact.file_name().to_string(),
            sha256: artifact.sha256(),
            length: data.len() as u64,
            validity: parsed.validity(),
            fault: None,
            features,
            rejection,
            extended: None,
            sections: Vec::new(),
            imports: Vec::new(),
            imports_truncated: false,
            anomalies: Vec::new(),
        };

        match parsed {
            ParsedPe::NotExecutable => {}
            ParsedPe::Malformed { fault, .. } => report.fault = Some(fault),
            ParsedPe::Valid(record) => {
                let record = *record;
                report.extended = Some(ExtendedFeatures::from_record(&record, data));
                report.sections = section_reports(&record, data);
                if let Some(listing) = record.import_listing(data) {
                    report.imports_truncated = listing.truncated;
                    report.imports = import_entries(listing);
                }
                report.anomalies = record.anomalies;
            }
        }

        report
    }

    /// True when the features could not be produced
    pub fn is_rejected(&self) -> bool {
        self.rejection.is_some()
    }
}

fn import_entries(listing: ImportListing) -> Vec<ImportEntry> {
    listing
        .libraries
        .into_iter()
        .map(|lib| ImportEntry {
            library: lib.name,
            functions: lib
                .symbols
                .into_iter()
                .map(|symbol| match symbol {
                    ImportedSymbol::Named(name) => name,
                    ImportedSymbol::Ordinal(ordinal) => format!("ordinal_{}", ordinal),
                })
                .collect(),
        })
        .collect()
}
