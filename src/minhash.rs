//! MinHash signature generation.
//!
//! Each of the `num_perm` hash functions is a random linear permutation
//! `h_i(x) = (a_i * x + b_i) mod p` over the Mersenne prime `p = 2^61 - 1`,
//! applied to a 32-bit digest of the value. The signature keeps the minimum
//! of each `h_i` over the set, truncated to 32 bits. The permutations are
//! derived from the seed, so signatures with the same seed and length are
//! comparable and signatures with different seeds are not.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::signature::Signature;

const MERSENNE_PRIME: u64 = (1 << 61) - 1;
const MAX_HASH: u64 = (1 << 32) - 1;

/// Generates MinHash signatures for one hash family.
#[derive(Debug, Clone)]
pub struct MinHasher {
    seed: i64,
    permutations: Vec<(u64, u64)>,
}

impl MinHasher {
    /// Create a hasher producing signatures of `num_perm` values.
    pub fn new(num_perm: usize, seed: i64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let permutations = (0..num_perm)
            .map(|_| {
                (
                    rng.gen_range(1..MERSENNE_PRIME),
                    rng.gen_range(0..MERSENNE_PRIME),
                )
            })
            .collect();
        Self { seed, permutations }
    }

    pub fn seed(&self) -> i64 {
        self.seed
    }

    pub fn num_perm(&self) -> usize {
        self.permutations.len()
    }

    /// Signature of the set of `values`. Duplicates do not change the result.
    ///
    /// An empty set yields all values at the 32-bit maximum.
    pub fn signature<I, T>(&self, values: I) -> Signature
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut mins = vec![MAX_HASH; self.permutations.len()];
        for value in values {
            let hv = value_hash(value.as_ref());
            for (min, &(a, b)) in mins.iter_mut().zip(&self.permutations) {
                let h = permute(a, b, hv);
                if h < *min {
                    *min = h;
                }
            }
        }
        Signature::new(self.seed, mins)
    }
}

/// 32-bit digest of a value: the first four bytes of its SHA-256.
fn value_hash(bytes: &[u8]) -> u64 {
    let digest = Sha256::digest(bytes);
    u64::from(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
}

#[inline]
fn permute(a: u64, b: u64, hv: u64) -> u64 {
    let h = (u128::from(a) * u128::from(hv) + u128::from(b)) % u128::from(MERSENNE_PRIME);
    (h as u64) & MAX_HASH
}
