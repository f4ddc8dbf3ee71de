//! PE Module - Portable Executable structure parsing
//!
//! Distinguishes three outcomes for an arbitrary buffer:
//! - not an executable image at all (`NotExecutableFormat`)
//! - executable signature with inconsistent headers (`MalformedPeHeader`)
//! - parseable headers, possibly with recoverable anomalies (`Valid`)
//!
//! Header structures are decoded with `goblin::pe`; byte-level reads go
//! through scroll, the reader goblin's structures are built on.
//!
//! # Components
//! - `parser.rs`: staged header parse, section table, data directories
//! - `imports.rs`: bounded import directory walk
//! - `checksum.rs`: image checksum recomputation

pub mod checksum;
mod imports;
pub mod parser;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use checksum::pe_checksum;
pub use imports::{MAX_LIBRARIES, MAX_SYMBOLS};
pub use parser::{parse_pe, MAX_SECTIONS};
pub use types::{
    HeaderFault, ImportDirectory, ImportListing, ImportSummary, ImportedLibrary, ImportedSymbol,
    ParseAnomaly, ParsedPe, PartialHeaders, PeRecord, PeValidity, SectionInfo,
};
