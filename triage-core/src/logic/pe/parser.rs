//! PE header parser
//!
//! Header structures are decoded with goblin: the DOS header and NT
//! signature (`DosHeader`), the COFF file header (`CoffHeader`), the
//! optional header with its data directories (`OptionalHeader`) and each
//! section table entry (`SectionTable`). The stages run one at a time so a
//! fault still leaves the fields read before it, and the explicit bounds
//! checks between them decide which `HeaderFault` an image gets.
//!
//! goblin's whole-image `PE::parse` is not used: it resolves every import
//! and export eagerly with no limit on hostile tables.

use goblin::pe::header::{
    CoffHeader, DosHeader, PE_POINTER_OFFSET, SIZEOF_COFF_HEADER, SIZEOF_PE_MAGIC,
};
use goblin::pe::optional_header::{OptionalHeader, MAGIC_32, MAGIC_64};
use goblin::pe::section_table::{SectionTable, SIZEOF_SECTION_TABLE};
use scroll::{Pread, LE};

use super::checksum::{pe_checksum, CHECKSUM_FIELD_OFFSET};
use super::imports::ImportWalker;
use super::types::*;

// ============================================================================
// CONSTANTS
// ============================================================================

const DOS_MAGIC: &[u8; 2] = b"MZ";
const DOS_HEADER_SIZE: usize = 64;

/// Optional header bytes through `NumberOfRvaAndSizes`
const PE32_FIXED_FIELDS: usize = 96;
const PE32_PLUS_FIXED_FIELDS: usize = 112;
const MAX_DATA_DIRECTORIES: u32 = 16;
const DATA_DIRECTORY_SIZE: usize = 8;
const MAX_OPTIONAL_HEADER: usize =
    PE32_PLUS_FIXED_FIELDS + MAX_DATA_DIRECTORIES as usize * DATA_DIRECTORY_SIZE;

/// Section headers read per image; the rest are ignored
pub const MAX_SECTIONS: usize = 2048;

// ============================================================================
// PARSER
// ============================================================================

/// Parse `data` as a PE image. Never panics and never reads out of bounds.
///
/// Cost is linear in the file size: section data is not touched here and
/// the import walk runs under fixed budgets.
pub fn parse_pe(data: &[u8]) -> ParsedPe {
    if !data.starts_with(DOS_MAGIC) {
        return ParsedPe::NotExecutable;
    }

    let mut partial = PartialHeaders::default();
    match parse_headers(data, &mut partial) {
        Ok(record) => ParsedPe::Valid(Box::new(record)),
        Err(fault) => ParsedPe::Malformed { fault, partial },
    }
}

fn parse_headers(data: &[u8], partial: &mut PartialHeaders) -> Result<PeRecord, HeaderFault> {
    let len = data.len();
    if len < DOS_HEADER_SIZE {
        return Err(HeaderFault::TruncatedDosHeader { len });
    }

    // --- DOS header + NT signature ---
    let e_lfanew: u32 = data
        .pread_with(PE_POINTER_OFFSET as usize, LE)
        .map_err(|_| HeaderFault::TruncatedDosHeader { len })?;
    let signature_end = (e_lfanew as usize).checked_add(SIZEOF_PE_MAGIC);
    if signature_end.map_or(true, |end| end > len) {
        return Err(HeaderFault::LfanewOutOfBounds { e_lfanew, len });
    }
    let dos = DosHeader::parse(data).map_err(|e| {
        log::debug!("NT signature rejected: {}", e);
        HeaderFault::BadNtSignature
    })?;

    // --- COFF file header ---
    let coff_at = dos.pe_pointer as usize + SIZEOF_PE_MAGIC;
    let mut cursor = coff_at;
    let coff = CoffHeader::parse(data, &mut cursor).map_err(|_| HeaderFault::TruncatedFileHeader)?;
    partial.number_of_sections = Some(coff.number_of_sections);
    partial.time_date_stamp = Some(coff.time_date_stamp);
    partial.characteristics = Some(coff.characteristics);

    // --- Optional header ---
    let opt = coff_at + SIZEOF_COFF_HEADER;
    let mut anomalies = Vec::new();
    let (optional, is_pe32_plus) = read_optional_header(data, opt, &coff, &mut anomalies)?;
    let windows = &optional.windows_fields;
    partial.dll_characteristics = Some(windows.dll_characteristics);

    // --- Section table ---
    let number_of_sections = coff.number_of_sections;
    let table = opt + coff.size_of_optional_header as usize;
    let table_end = table + number_of_sections as usize * SIZEOF_SECTION_TABLE;
    if table_end > len {
        return Err(HeaderFault::SectionTableOutOfBounds { offset: table, count: number_of_sections });
    }
    if windows.size_of_headers as usize > len {
        return Err(HeaderFault::SizeOfHeadersOutOfBounds {
            size_of_headers: windows.size_of_headers,
            len,
        });
    }

    let parsed_count = (number_of_sections as usize).min(MAX_SECTIONS);
    if parsed_count < number_of_sections as usize {
        log::warn!("Section table declares {} entries; reading {}", number_of_sections, parsed_count);
        anomalies.push(ParseAnomaly::SectionCountCapped {
            declared: number_of_sections,
            parsed: parsed_count,
        });
    }
    let sections = (0..parsed_count)
        .map(|i| read_section(data, table + i * SIZEOF_SECTION_TABLE))
        .collect::<Result<Vec<_>, _>>()?;

    let mut record = PeRecord {
        machine: coff.machine,
        is_pe32_plus,
        number_of_sections,
        time_date_stamp: coff.time_date_stamp,
        characteristics: coff.characteristics,
        major_image_version: windows.major_image_version,
        dll_characteristics: windows.dll_characteristics,
        size_of_initialized_data: optional.standard_fields.size_of_initialized_data as u32,
        size_of_uninitialized_data: optional.standard_fields.size_of_uninitialized_data as u32,
        size_of_headers: windows.size_of_headers,
        file_alignment: windows.file_alignment,
        stored_checksum: windows.check_sum,
        computed_checksum: pe_checksum(data, opt + CHECKSUM_FIELD_OFFSET),
        sections,
        imports: ImportDirectory::Absent,
        anomalies,
    };

    let beyond_file: Vec<ParseAnomaly> = record
        .sections
        .iter()
        .filter(|s| record.section_data(s, data).len() < s.size_of_raw_data as usize)
        .map(|s| ParseAnomaly::SectionDataBeyondFile { section: s.name.clone() })
        .collect();
    record.anomalies.extend(beyond_file);

    // --- Imports ---
    if let Some(directory) = optional.data_directories.get_import_table() {
        let walker = ImportWalker::new(data, &record.sections, record.file_alignment, is_pe32_plus);
        record.imports = walker.summarize(directory.virtual_address, directory.size);
    }
    if matches!(&record.imports, ImportDirectory::Parsed(summary) if summary.truncated) {
        record.anomalies.push(ParseAnomaly::ImportWalkTruncated);
    }

    Ok(record)
}

/// Decode the optional header with goblin.
///
/// goblin rejects more than 16 data directories and a directory array cut
/// short by the file. Both are tolerated here: the header is copied into a
/// zeroed buffer with `NumberOfRvaAndSizes` clamped to the entries that fit
/// the file and the declared header size.
fn read_optional_header(
    data: &[u8],
    opt: usize,
    coff: &CoffHeader,
    anomalies: &mut Vec<ParseAnomaly>,
) -> Result<(OptionalHeader, bool), HeaderFault> {
    let declared = coff.size_of_optional_header;
    let truncated = HeaderFault::TruncatedOptionalHeader { declared };

    let magic: u16 = data.pread_with(opt, LE).map_err(|_| truncated.clone())?;
    let (is_pe32_plus, fixed) = match magic {
        MAGIC_32 => (false, PE32_FIXED_FIELDS),
        MAGIC_64 => (true, PE32_PLUS_FIXED_FIELDS),
        other => return Err(HeaderFault::UnknownOptionalMagic { magic: other }),
    };
    let available = data.get(opt..).unwrap_or(&[]);
    if available.len() < fixed {
        return Err(truncated);
    }
    if (declared as usize) < fixed {
        anomalies.push(ParseAnomaly::OptionalHeaderUndersized { declared });
    }

    let count_at = fixed - 4;
    let count: u32 = available.pread_with(count_at, LE).map_err(|_| truncated.clone())?;
    let room = (declared as usize).saturating_sub(fixed) / DATA_DIRECTORY_SIZE;
    let in_file = (available.len() - fixed) / DATA_DIRECTORY_SIZE;
    let readable = count.min(MAX_DATA_DIRECTORIES).min(room as u32).min(in_file as u32);
    if readable < count.min(MAX_DATA_DIRECTORIES) {
        anomalies.push(ParseAnomaly::DataDirectoriesTruncated { declared: count, readable });
    }

    let mut header = [0u8; MAX_OPTIONAL_HEADER];
    let copied = available.len().min(fixed + readable as usize * DATA_DIRECTORY_SIZE);
    header[..copied].copy_from_slice(&available[..copied]);
    header[count_at..fixed].copy_from_slice(&readable.to_le_bytes());

    let optional: OptionalHeader = header.pread_with(0, LE).map_err(|e| {
        log::debug!("Optional header rejected: {}", e);
        truncated
    })?;
    Ok((optional, is_pe32_plus))
}

/// One 40-byte section header; caller guarantees it lies inside `data`.
fn read_section(data: &[u8], at: usize) -> Result<SectionInfo, HeaderFault> {
    let out_of_bounds = || HeaderFault::SectionTableOutOfBounds { offset: at, count: 1 };
    let mut raw = [0u8; SIZEOF_SECTION_TABLE];
    raw.copy_from_slice(data.get(at..at + SIZEOF_SECTION_TABLE).ok_or_else(out_of_bounds)?);

    // `/N` names index the COFF string table, which images do not carry
    let mut name_bytes = [0u8; 8];
    name_bytes.copy_from_slice(&raw[..8]);
    if raw[0] == b'/' {
        raw[0] = 0;
    }
    let table = SectionTable::parse(&raw, &mut 0, 0).map_err(|_| out_of_bounds())?;

    let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
    Ok(SectionInfo {
        name: String::from_utf8_lossy(&name_bytes[..name_len]).into_owned(),
        virtual_size: table.virtual_size,
        virtual_address: table.virtual_address,
        size_of_raw_data: table.size_of_raw_data,
        pointer_to_raw_data: table.pointer_to_raw_data,
        characteristics: table.characteristics,
    })
}
