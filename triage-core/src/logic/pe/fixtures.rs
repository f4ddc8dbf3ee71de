//! Synthetic PE images for tests
//!
//! Builds small but structurally complete PE32 / PE32+ files: DOS header,
//! NT headers, 16 data directories, a section table, raw section data and an
//! optional `.idata` section with a real import directory.

use super::checksum::{pe_checksum, CHECKSUM_FIELD_OFFSET};

const SECTION_ALIGNMENT: u32 = 0x1000;
const FILE_ALIGNMENT: u32 = 0x200;
const SIZE_OF_HEADERS: u32 = 0x400;

enum ImportSpec {
    Name(String),
    Ordinal(u16),
}

pub(crate) struct PeBuilder {
    pe32_plus: bool,
    timestamp: u32,
    characteristics: u16,
    dll_characteristics: u16,
    major_image_version: u16,
    sections: Vec<(String, Vec<u8>)>,
    imports: Vec<(String, Vec<ImportSpec>)>,
    valid_checksum: bool,
}

impl PeBuilder {
    pub(crate) const E_LFANEW: u32 = 0x80;
    pub(crate) const OPTIONAL_HEADER_OFFSET: usize = Self::E_LFANEW as usize + 4 + 20;

    pub(crate) fn new() -> Self {
        Self {
            pe32_plus: false,
            timestamp: 0x6000_0000,
            characteristics: 0x0102,
            dll_characteristics: 0x8160,
            major_image_version: 0,
            sections: Vec::new(),
            imports: Vec::new(),
            valid_checksum: false,
        }
    }

    pub(crate) fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    pub(crate) fn timestamp(mut self, value: u32) -> Self {
        self.timestamp = value;
        self
    }

    pub(crate) fn characteristics(mut self, value: u16) -> Self {
        self.characteristics = value;
        self
    }

    pub(crate) fn dll_characteristics(mut self, value: u16) -> Self {
        self.dll_characteristics = value;
        self
    }

    pub(crate) fn major_image_version(mut self, value: u16) -> Self {
        self.major_image_version = value;
        self
    }

    pub(crate) fn section(mut self, name: &str, data: Vec<u8>) -> Self {
        self.sections.push((name.to_string(), data));
        self
    }

    pub(crate) fn import(mut self, library: &str, functions: &[&str]) -> Self {
        let symbols = functions.iter().map(|f| ImportSpec::Name(f.to_string())).collect();
        self.imports.push((library.to_string(), symbols));
        self
    }

    pub(crate) fn ordinal_import(mut self, library: &str, ordinal: u16) -> Self {
        self.imports.push((library.to_string(), vec![ImportSpec::Ordinal(ordinal)]));
        self
    }

    pub(crate) fn with_valid_checksum(mut self) -> Self {
        self.valid_checksum = true;
        self
    }

    fn size_of_optional_header(pe32_plus: bool) -> usize {
        if pe32_plus { 240 } else { 224 }
    }

    /// File offset of section header `index`
    pub(crate) fn section_header_offset(pe32_plus: bool, index: usize) -> usize {
        Self::OPTIONAL_HEADER_OFFSET + Self::size_of_optional_header(pe32_plus) + index * 40
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let opt = Self::OPTIONAL_HEADER_OFFSET;
        let mut sections = self.sections;

        // Lay out user sections, then .idata
        let mut next_va = SECTION_ALIGNMENT;
        for (_, data) in &sections {
            next_va += align_up(data.len().max(1) as u32, SECTION_ALIGNMENT);
        }
        let import_dir = if self.imports.is_empty() {
            None
        } else {
            let (idata, dir_size) = build_idata(&self.imports, next_va, self.pe32_plus);
            sections.push((".idata".to_string(), idata));
            Some((next_va, dir_size))
        };

        let mut image = vec![0u8; SIZE_OF_HEADERS as usize];
        image[0..2].copy_from_slice(b"MZ");
        put_u32(&mut image, 0x3c, Self::E_LFANEW);

        let nt = Self::E_LFANEW as usize;
        image[nt..nt + 4].copy_from_slice(b"PE\0\0");
        let coff = nt + 4;
        put_u16(&mut image, coff, if self.pe32_plus { 0x8664 } else { 0x14c });
        put_u16(&mut image, coff + 2, sections.len() as u16);
        put_u32(&mut image, coff + 4, self.timestamp);
        put_u16(&mut image, coff + 16, Self::size_of_optional_header(self.pe32_plus) as u16);
        put_u16(&mut image, coff + 18, self.characteristics);

        put_u16(&mut image, opt, if self.pe32_plus { 0x20b } else { 0x10b });
        put_u32(&mut image, opt + 32, SECTION_ALIGNMENT);
        put_u32(&mut image, opt + 36, FILE_ALIGNMENT);
        put_u16(&mut image, opt + 44, self.major_image_version);
        put_u32(&mut image, opt + 60, SIZE_OF_HEADERS);
        put_u16(&mut image, opt + 68, 3);
        put_u16(&mut image, opt + 70, self.dll_characteristics);
        let (count_at, dirs_at) = if self.pe32_plus { (108, 112) } else { (92, 96) };
        put_u32(&mut image, opt + count_at, 16);
        if let Some((rva, size)) = import_dir {
            put_u32(&mut image, opt + dirs_at + 8, rva);
            put_u32(&mut image, opt + dirs_at + 12, size);
        }

        let mut va = SECTION_ALIGNMENT;
        let mut initialized = 0u32;
        for (index, (name, data)) in sections.iter().enumerate() {
            let header = Self::section_header_offset(self.pe32_plus, index);
            let raw_size = align_up(data.len() as u32, FILE_ALIGNMENT);
            let raw_ptr = image.len() as u32;

            let name_bytes = name.as_bytes();
            let n = name_bytes.len().min(8);
            image[header..header + n].copy_from_slice(&name_bytes[..n]);
            put_u32(&mut image, header + 8, data.len() as u32);
            put_u32(&mut image, header + 12, va);
            put_u32(&mut image, header + 16, raw_size);
            put_u32(&mut image, header + 20, raw_ptr);
            put_u32(&mut image, header + 36, 0x6000_0020);

            image.extend_from_slice(data);
            image.resize((raw_ptr + raw_size) as usize, 0);
            initialized += raw_size;
            va += align_up(data.len().max(1) as u32, SECTION_ALIGNMENT);
        }
        put_u32(&mut image, opt + 8, initialized);
        put_u32(&mut image, opt + 56, va);

        if self.valid_checksum {
            let checksum = pe_checksum(&image, opt + CHECKSUM_FIELD_OFFSET) as u32;
            put_u32(&mut image, opt + CHECKSUM_FIELD_OFFSET, checksum);
        }

        image
    }
}

/// Returns the section bytes and the size of the descriptor array.
fn build_idata(libs: &[(String, Vec<ImportSpec>)], base_rva: u32, pe32_plus: bool) -> (Vec<u8>, u32) {
    let entry = if pe32_plus { 8 } else { 4 };
    let descriptors = (libs.len() + 1) * 20;

    let mut cursor = descriptors;
    let mut thunk_at = Vec::new();
    for (_, symbols) in libs {
        thunk_at.push(cursor);
        cursor += (symbols.len() + 1) * entry;
    }
    let mut hint_at: Vec<Vec<Option<usize>>> = Vec::new();
    for (_, symbols) in libs {
        let mut offsets = Vec::new();
        for symbol in symbols {
            match symbol {
                ImportSpec::Name(name) => {
                    offsets.push(Some(cursor));
                    cursor += 2 + name.len() + 1;
                    cursor += cursor % 2;
                }
                ImportSpec::Ordinal(_) => offsets.push(None),
            }
        }
        hint_at.push(offsets);
    }
    let mut name_at = Vec::new();
    for (name, _) in libs {
        name_at.push(cursor);
        cursor += name.len() + 1;
    }

    let mut buf = vec![0u8; cursor];
    let rva = |local: usize| base_rva + local as u32;
    for (i, (name, symbols)) in libs.iter().enumerate() {
        let desc = i * 20;
        put_u32(&mut buf, desc, rva(thunk_at[i]));
        put_u32(&mut buf, desc + 12, rva(name_at[i]));
        put_u32(&mut buf, desc + 16, rva(thunk_at[i]));
        buf[name_at[i]..name_at[i] + name.len()].copy_from_slice(name.as_bytes());

        for (j, symbol) in symbols.iter().enumerate() {
            let slot = thunk_at[i] + j * entry;
            let value: u64 = match (symbol, hint_at[i][j]) {
                (ImportSpec::Name(fname), Some(at)) => {
                    buf[at + 2..at + 2 + fname.len()].copy_from_slice(fname.as_bytes());
                    rva(at) as u64
                }
                (ImportSpec::Ordinal(ordinal), _) => {
                    let flag = if pe32_plus { 1u64 << 63 } else { 1u64 << 31 };
                    flag | *ordinal as u64
                }
                (ImportSpec::Name(_), None) => unreachable!("named import without hint slot"),
            };
            if pe32_plus {
                buf[slot..slot + 8].copy_from_slice(&value.to_le_bytes());
            } else {
                put_u32(&mut buf, slot, value as u32);
            }
        }
    }

    (buf, descriptors as u32)
}

fn align_up(value: u32, alignment: u32) -> u32 {
    value.div_ceil(alignment) * alignment
}

fn put_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
