//! Import directory walker
//!
//! Descriptors are goblin `ImportDirectoryEntry` records and every RVA is
//! mapped with goblin's loader rules (`pe::utils::find_offset`). Thunks and
//! hint/name entries are read one word at a time with scroll.
//!
//! All pointers come from the file, so the walk runs under fixed budgets:
//! descriptors may share one huge thunk table and thunks may share one long
//! name. A table is walked at most once, the symbol total is capped by
//! `MAX_SYMBOLS` and by the file length, and listed name bytes never exceed
//! the file length.

use std::collections::HashSet;

use goblin::pe::import::{ImportDirectoryEntry, SIZEOF_IMPORT_DIRECTORY_ENTRY};
use goblin::pe::options::ParseOptions;
use goblin::pe::section_table::SectionTable;
use goblin::pe::utils::find_offset;
use scroll::{Pread, LE};

use super::types::{
    ImportDirectory, ImportListing, ImportSummary, ImportedLibrary, ImportedSymbol, SectionInfo,
};

pub const MAX_LIBRARIES: usize = 4096;
/// Symbol budget shared by all libraries of one image
pub const MAX_SYMBOLS: usize = 0x2000;
const MAX_NAME_LEN: usize = 0x200;

const ORDINAL_FLAG_32: u64 = 0x8000_0000;
const ORDINAL_FLAG_64: u64 = 0x8000_0000_0000_0000;
const HINT_NAME_RVA_MASK: u64 = 0x7fff_ffff;

/// One lookup table entry
enum Thunk<'a> {
    Named(&'a [u8]),
    Ordinal(u16),
}

/// Receives the walk; returning `false` stops it
trait ImportSink<'a> {
    fn library(&mut self, name: &'a [u8]) -> bool;
    fn symbol(&mut self, thunk: Thunk<'a>) -> bool;
}

#[derive(Debug, Default)]
struct WalkStats {
    libraries: u32,
    symbols: u32,
    truncated: bool,
}

/// Counting only; used while parsing
struct Counter;

impl<'a> ImportSink<'a> for Counter {
    fn library(&mut self, _: &'a [u8]) -> bool {
        true
    }

    fn symbol(&mut self, _: Thunk<'a>) -> bool {
        true
    }
}

/// Name collection for reports
struct Lister {
    libraries: Vec<ImportedLibrary>,
    name_budget: usize,
}

impl Lister {
    fn spend(&mut self, bytes: usize) -> bool {
        match self.name_budget.checked_sub(bytes) {
            Some(left) => {
                self.name_budget = left;
                true
            }
            None => false,
        }
    }
}

impl<'a> ImportSink<'a> for Lister {
    fn library(&mut self, name: &'a [u8]) -> bool {
        if !self.spend(name.len()) {
            return false;
        }
        self.libraries.push(ImportedLibrary {
            name: String::from_utf8_lossy(name).into_owned(),
            symbols: Vec::new(),
        });
        true
    }

    fn symbol(&mut self, thunk: Thunk<'a>) -> bool {
        let symbol = match thunk {
            Thunk::Named(name) => {
                if !self.spend(name.len()) {
                    return false;
                }
                ImportedSymbol::Named(String::from_utf8_lossy(name).into_owned())
            }
            Thunk::Ordinal(ordinal) => ImportedSymbol::Ordinal(ordinal),
        };
        if let Some(library) = self.libraries.last_mut() {
            library.symbols.push(symbol);
        }
        true
    }
}

/// RVA-resolving view of one image
pub(crate) struct ImportWalker<'a> {
    data: &'a [u8],
    sections: Vec<SectionTable>,
    file_alignment: u32,
    is_pe32_plus: bool,
    options: ParseOptions,
}

impl<'a> ImportWalker<'a> {
    pub(crate) fn new(
        data: &'a [u8],
        sections: &[SectionInfo],
        file_alignment: u32,
        is_pe32_plus: bool,
    ) -> Self {
        Self {
            data,
            sections: sections.iter().filter_map(mapping_table).collect(),
            file_alignment,
            is_pe32_plus,
            options: ParseOptions::default(),
        }
    }

    /// Count libraries and symbols of the directory at `rva`
    pub(crate) fn summarize(&self, rva: u32, size: u32) -> ImportDirectory {
        if rva == 0 || size == 0 {
            return ImportDirectory::Absent;
        }
        match self.walk(rva, &mut Counter) {
            Ok(stats) => {
                if stats.truncated {
                    log::debug!(
                        "Import walk truncated after {} libraries, {} symbols",
                        stats.libraries,
                        stats.symbols
                    );
                }
                ImportDirectory::Parsed(ImportSummary {
                    directory_rva: rva,
                    library_count: stats.libraries,
                    symbol_count: stats.symbols,
                    truncated: stats.truncated,
                })
            }
            Err(reason) => ImportDirectory::Unreadable { reason },
        }
    }

    /// Library and symbol names of the directory at `rva`
    pub(crate) fn list(&self, rva: u32) -> Result<ImportListing, String> {
        let mut lister = Lister {
            libraries: Vec::new(),
            name_budget: self.data.len(),
        };
        let stats = self.walk(rva, &mut lister)?;
        Ok(ImportListing {
            libraries: lister.libraries,
            truncated: stats.truncated,
        })
    }

    fn offset(&self, rva: u64) -> Option<usize> {
        find_offset(rva as usize, &self.sections, self.file_alignment, &self.options)
            .filter(|&offset| offset < self.data.len())
    }

    /// NUL-terminated name at `offset`, at most `MAX_NAME_LEN` bytes
    fn name_at(&self, offset: usize) -> Option<&'a [u8]> {
        let data: &'a [u8] = self.data;
        let window = data.get(offset..)?;
        let window = &window[..window.len().min(MAX_NAME_LEN)];
        let end = window.iter().position(|&b| b == 0)?;
        Some(&window[..end])
    }

    fn walk<S: ImportSink<'a>>(&self, rva: u32, sink: &mut S) -> Result<WalkStats, String> {
        let Some(mut offset) = self.offset(rva as u64) else {
            return Err(format!("import directory RVA 0x{:x} is not mapped", rva));
        };
        if self.data.pread_with::<ImportDirectoryEntry>(offset, LE).is_err() {
            return Err(format!("import descriptor at 0x{:x} is past end of file", offset));
        }

        let (entry_size, ordinal_flag) = if self.is_pe32_plus {
            (8, ORDINAL_FLAG_64)
        } else {
            (4, ORDINAL_FLAG_32)
        };
        let symbol_budget = MAX_SYMBOLS.min(self.data.len() / entry_size) as u32;
        let mut walked_tables = HashSet::new();
        let mut stats = WalkStats::default();

        'descriptors: for _ in 0..MAX_LIBRARIES {
            let Ok(descriptor) = self.data.gread_with::<ImportDirectoryEntry>(&mut offset, LE) else {
                stats.truncated = true;
                break;
            };
            if descriptor.import_lookup_table_rva == 0
                && descriptor.name_rva == 0
                && descriptor.import_address_table_rva == 0
            {
                return Ok(stats);
            }

            let table_rva = if descriptor.import_lookup_table_rva != 0 {
                descriptor.import_lookup_table_rva
            } else {
                descriptor.import_address_table_rva
            };
            // A table shared between descriptors is counted once
            if table_rva != 0 && !walked_tables.insert(table_rva) {
                stats.truncated = true;
                continue;
            }

            let name = self
                .offset(descriptor.name_rva as u64)
                .and_then(|at| self.name_at(at))
                .unwrap_or_default();
            if !sink.library(name) {
                stats.truncated = true;
                break;
            }
            stats.libraries += 1;
            if table_rva == 0 {
                continue;
            }

            let Some(mut at) = self.offset(table_rva as u64) else {
                stats.truncated = true;
                continue;
            };
            loop {
                let entry = if self.is_pe32_plus {
                    self.data.pread_with::<u64>(at, LE)
                } else {
                    self.data.pread_with::<u32>(at, LE).map(u64::from)
                };
                let Ok(entry) = entry else {
                    stats.truncated = true;
                    break;
                };
                if entry == 0 {
                    break;
                }
                if stats.symbols >= symbol_budget {
                    stats.truncated = true;
                    break 'descriptors;
                }

                let thunk = if entry & ordinal_flag != 0 {
                    Thunk::Ordinal((entry & 0xffff) as u16)
                } else {
                    // Hint/name entry: u16 hint, then the name
                    let name = self
                        .offset(entry & HINT_NAME_RVA_MASK)
                        .and_then(|at| at.checked_add(2))
                        .and_then(|at| self.name_at(at));
                    match name {
                        Some(name) => Thunk::Named(name),
                        None => {
                            stats.truncated = true;
                            break;
                        }
                    }
                };
                stats.symbols += 1;
                if !sink.symbol(thunk) {
                    stats.truncated = true;
                    break 'descriptors;
                }
                at += entry_size;
            }
        }

        // Descriptor budget spent without reaching the null terminator
        if self
            .data
            .pread_with::<ImportDirectoryEntry>(offset, LE)
            .is_ok_and(|next| !next.is_null())
        {
            stats.truncated = true;
        }
        Ok(stats)
    }
}

/// goblin view of a section for RVA mapping; `None` when the virtual range wraps
fn mapping_table(section: &SectionInfo) -> Option<SectionTable> {
    section.virtual_address.checked_add(section.virtual_size)?;
    Some(SectionTable {
        virtual_size: section.virtual_size,
        virtual_address: section.virtual_address,
        size_of_raw_data: section.size_of_raw_data,
        pointer_to_raw_data: section.pointer_to_raw_data,
        characteristics: section.characteristics,
        ..SectionTable::default()
    })
}
