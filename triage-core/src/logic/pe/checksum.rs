//! PE image checksum
//!
//! Sum of little-endian 32-bit words (the last one zero-padded), skipping the
//! word that holds the stored `CheckSum`, folded to 16 bits, plus the file
//! length.

/// Offset of `CheckSum` inside the optional header (same for PE32 and PE32+)
pub const CHECKSUM_FIELD_OFFSET: usize = 0x40;

/// Recompute the checksum of `data`; `checksum_offset` is the file offset of
/// the stored `CheckSum` field.
pub fn pe_checksum(data: &[u8], checksum_offset: usize) -> u64 {
    let len = data.len();
    let words = len.div_ceil(4);
    let skip = checksum_offset / 4;

    let mut checksum: u64 = 0;
    for i in 0..words {
        if i == skip {
            continue;
        }
        let start = i * 4;
        let end = (start + 4).min(len);
        let mut word = [0u8; 4];
        word[..end - start].copy_from_slice(&data[start..end]);

        checksum += u32::from_le_bytes(word) as u64;
        if checksum >= 1 << 32 {
            checksum = (checksum & 0xffff_ffff) + (checksum >> 32);
        }
    }

    checksum = (checksum & 0xffff) + (checksum >> 16);
    checksum += checksum >> 16;
    checksum &= 0xffff;

    checksum + len as u64
}
