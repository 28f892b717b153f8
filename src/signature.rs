use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LshError, Result};

/// Opaque identifier of an indexed column.
///
/// Cheap to clone; query results hand out clones of the interned value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(Arc<str>);

impl ColumnId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ColumnId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl Borrow<str> for ColumnId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ColumnId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A MinHash signature: `k` hash values produced by the hash family `seed`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub seed: i64,
    pub hash_values: Vec<u64>,
}

impl Signature {
    pub fn new(seed: i64, hash_values: Vec<u64>) -> Self {
        Self { seed, hash_values }
    }

    /// Number of hash values (the signature dimension `k`).
    pub fn len(&self) -> usize {
        self.hash_values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hash_values.is_empty()
    }

    /// Estimate the Jaccard similarity of the underlying sets as the fraction
    /// of positions where both signatures agree.
    ///
    /// Both signatures must come from the same hash family and have the same
    /// length.
    pub fn jaccard(&self, other: &Signature) -> Result<f64> {
        if self.seed != other.seed {
            return Err(LshError::SeedMismatch {
                expected: self.seed,
                got: other.seed,
            });
        }
        if self.len() != other.len() {
            return Err(LshError::DimensionMismatch {
                expected: self.len(),
                got: other.len(),
            });
        }
        if self.is_empty() {
            return Err(LshError::ZeroDimension);
        }
        let matches = self
            .hash_values
            .iter()
            .zip(&other.hash_values)
            .filter(|(a, b)| a == b)
            .count();
        Ok(matches as f64 / self.len() as f64)
    }
}
