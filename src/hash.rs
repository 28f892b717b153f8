//! Bucket keys for signature bands.
//!
//! A band key is a 64-bit FNV-1a hash over the band's raw values (little
//! endian), seeded with the band position. It depends only on the values and
//! their order, so it is identical across runs, threads and processes.

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

#[inline]
fn fnv1a(mut hash: u64, bytes: &[u8]) -> u64 {
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Bucket key of one band.
pub fn band_key(band_index: usize, band: &[u64]) -> u64 {
    let mut hash = fnv1a(FNV_OFFSET_BASIS, &(band_index as u64).to_le_bytes());
    for value in band {
        hash = fnv1a(hash, &value.to_le_bytes());
    }
    hash
}

/// Bucket keys of every band of `hash_values`, in band order.
///
/// `hash_values.len()` must be a multiple of `rows_per_band`; the index checks
/// the dimension before calling this.
pub fn band_keys(hash_values: &[u64], rows_per_band: usize) -> impl Iterator<Item = u64> + '_ {
    hash_values
        .chunks_exact(rows_per_band)
        .enumerate()
        .map(|(i, band)| band_key(i, band))
}
