//! Shannon entropy over byte buffers
//!
//! Training-time features summed the per-byte terms in order of first
//! occurrence; the same order is kept here so the floating point result is
//! identical, not merely close.

/// Number of distinct byte values
const NUM_BINS: usize = 256;

/// Shannon entropy in bits per byte, `0.0 ..= 8.0`.
///
/// The empty buffer is defined to have entropy `0.0`.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0u64; NUM_BINS];
    let mut first_seen = Vec::with_capacity(NUM_BINS);
    for &b in data {
        if counts[b as usize] == 0 {
            first_seen.push(b);
        }
        counts[b as usize] += 1;
    }

    let total = data.len() as f64;
    let mut sum = 0.0f64;
    for b in first_seen {
        let p = counts[b as usize] as f64 / total;
        sum += p * p.log2();
    }

    if sum == 0.0 {
        0.0
    } else {
        -sum
    }
}
