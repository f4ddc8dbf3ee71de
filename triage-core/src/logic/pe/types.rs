//! PE Parser Types

use serde::{Deserialize, Serialize};

use crate::constants::KNOWN_SECTION_NAMES;
use crate::logic::entropy::shannon_entropy;

use super::imports::ImportWalker;

// ============================================================================
// VALIDITY
// ============================================================================

/// Outcome class of the PE validity gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeValidity {
    NotExecutableFormat,
    MalformedPeHeader,
    Valid,
}

impl PeValidity {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeValidity::NotExecutableFormat => "not_executable_format",
            PeValidity::MalformedPeHeader => "malformed_pe_header",
            PeValidity::Valid => "valid",
        }
    }
}

/// Structural invariant a malformed image violated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum HeaderFault {
    TruncatedDosHeader { len: usize },
    LfanewOutOfBounds { e_lfanew: u32, len: usize },
    BadNtSignature,
    TruncatedFileHeader,
    TruncatedOptionalHeader { declared: u16 },
    UnknownOptionalMagic { magic: u16 },
    SectionTableOutOfBounds { offset: usize, count: u16 },
    SizeOfHeadersOutOfBounds { size_of_headers: u32, len: usize },
}

impl std::fmt::Display for HeaderFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderFault::TruncatedDosHeader { len } =>
                write!(f, "DOS header truncated at {} bytes", len),
            HeaderFault::LfanewOutOfBounds { e_lfanew, len } =>
                write!(f, "e_lfanew 0x{:x} points beyond {} byte file", e_lfanew, len),
            HeaderFault::BadNtSignature => write!(f, "invalid NT headers signature"),
            HeaderFault::TruncatedFileHeader => write!(f, "COFF file header truncated"),
            HeaderFault::TruncatedOptionalHeader { declared } =>
                write!(f, "optional header truncated (declared size {})", declared),
            HeaderFault::UnknownOptionalMagic { magic } =>
                write!(f, "unknown optional header magic 0x{:x}", magic),
            HeaderFault::SectionTableOutOfBounds { offset, count } =>
                write!(f, "section table of {} entries at 0x{:x} exceeds file", count, offset),
            HeaderFault::SizeOfHeadersOutOfBounds { size_of_headers, len } =>
                write!(f, "SizeOfHeaders 0x{:x} exceeds {} byte file", size_of_headers, len),
        }
    }
}

// ============================================================================
// PARSE RESULT
// ============================================================================

/// Header fields read before a structural fault was hit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialHeaders {
    pub number_of_sections: Option<u16>,
    pub time_date_stamp: Option<u32>,
    pub characteristics: Option<u16>,
    pub dll_characteristics: Option<u16>,
}

/// Result of parsing a candidate image
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPe {
    /// Leading signature is not `MZ`; nothing else was read
    NotExecutable,
    /// Signature present, headers inconsistent
    Malformed {
        fault: HeaderFault,
        partial: PartialHeaders,
    },
    /// Headers consistent; may still carry recoverable anomalies
    Valid(Box<PeRecord>),
}

impl ParsedPe {
    pub fn validity(&self) -> PeValidity {
        match self {
            ParsedPe::NotExecutable => PeValidity::NotExecutableFormat,
            ParsedPe::Malformed { .. } => PeValidity::MalformedPeHeader,
            ParsedPe::Valid(_) => PeValidity::Valid,
        }
    }

    pub fn record(&self) -> Option<&PeRecord> {
        match self {
            ParsedPe::Valid(record) => Some(record),
            _ => None,
        }
    }
}

// ============================================================================
// STRUCTURAL RECORD
// ============================================================================

/// Structural metadata of a parseable image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeRecord {
    pub machine: u16,
    pub is_pe32_plus: bool,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub characteristics: u16,
    pub major_image_version: u16,
    pub dll_characteristics: u16,
    pub size_of_initialized_data: u32,
    pub size_of_uninitialized_data: u32,
    pub size_of_headers: u32,
    pub file_alignment: u32,
    /// `CheckSum` as stored in the optional header
    pub stored_checksum: u32,
    /// Checksum recomputed over the whole file
    pub computed_checksum: u64,
    /// At most `MAX_SECTIONS` entries, even when `number_of_sections` is larger
    pub sections: Vec<SectionInfo>,
    pub imports: ImportDirectory,
    pub anomalies: Vec<ParseAnomaly>,
}

impl PeRecord {
    pub fn checksum_valid(&self) -> bool {
        self.stored_checksum as u64 == self.computed_checksum
    }

    pub fn section_names(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.name.clone()).collect()
    }

    /// Raw bytes of `section` that are present in `data`
    pub fn section_data<'a>(&self, section: &SectionInfo, data: &'a [u8]) -> &'a [u8] {
        let start = aligned_raw_pointer(section.pointer_to_raw_data, self.file_alignment) as usize;
        let end = start
            .saturating_add(section.size_of_raw_data as usize)
            .min(data.len());
        data.get(start..end).unwrap_or(&[])
    }

    /// Entropy of the first section whose name contains `.text`
    pub fn text_section_entropy(&self, data: &[u8]) -> Option<f64> {
        self.sections
            .iter()
            .find(|s| s.name.contains(".text"))
            .map(|s| shannon_entropy(self.section_data(s, data)))
    }

    /// (suspicious, non-suspicious) section name counts
    pub fn section_name_counts(&self) -> (usize, usize) {
        let known = self
            .sections
            .iter()
            .filter(|s| KNOWN_SECTION_NAMES.contains(&s.name.as_str()))
            .count();
        (self.sections.len() - known, known)
    }

    /// Total imported symbols, `Some(0)` when there is no import directory
    pub fn import_symbol_count(&self) -> Option<u32> {
        match &self.imports {
            ImportDirectory::Absent => Some(0),
            ImportDirectory::Parsed(summary) => Some(summary.symbol_count),
            ImportDirectory::Unreadable { .. } => None,
        }
    }

    /// Number of imported libraries, `Some(0)` when there is no import directory
    pub fn import_library_count(&self) -> Option<u32> {
        match &self.imports {
            ImportDirectory::Absent => Some(0),
            ImportDirectory::Parsed(summary) => Some(summary.library_count),
            ImportDirectory::Unreadable { .. } => None,
        }
    }

    /// Walk the import directory again, collecting library and symbol names.
    ///
    /// `data` must be the buffer this record was parsed from.
    pub fn import_listing(&self, data: &[u8]) -> Option<ImportListing> {
        let ImportDirectory::Parsed(summary) = &self.imports else {
            return None;
        };
        ImportWalker::new(data, &self.sections, self.file_alignment, self.is_pe32_plus)
            .list(summary.directory_rva)
            .ok()
    }
}

/// Loader rounds raw pointers down to 512 once FileAlignment is at least 512
pub(crate) fn aligned_raw_pointer(pointer: u32, file_alignment: u32) -> u32 {
    if file_alignment < 0x200 {
        pointer
    } else {
        pointer & !0x1ff
    }
}

/// One section table entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub characteristics: u32,
}

// ============================================================================
// IMPORTS
// ============================================================================

/// State of the import data directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ImportDirectory {
    /// No import directory entry
    Absent,
    Parsed(ImportSummary),
    /// Directory declared but cannot be located in the file
    Unreadable { reason: String },
}

/// Counts from one bounded walk; names are listed on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub directory_rva: u32,
    pub library_count: u32,
    pub symbol_count: u32,
    /// Walk stopped early on a bound, a shared table or an unreadable entry
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportListing {
    pub libraries: Vec<ImportedLibrary>,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedLibrary {
    pub name: String,
    pub symbols: Vec<ImportedSymbol>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportedSymbol {
    Named(String),
    Ordinal(u16),
}

// ============================================================================
// ANOMALIES
// ============================================================================

/// Recoverable irregularity noticed while parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "anomaly", rename_all = "snake_case")]
pub enum ParseAnomaly {
    OptionalHeaderUndersized { declared: u16 },
    DataDirectoriesTruncated { declared: u32, readable: u32 },
    /// Only the first `parsed` section headers were read
    SectionCountCapped { declared: u16, parsed: usize },
    SectionDataBeyondFile { section: String },
    ImportWalkTruncated,
}
