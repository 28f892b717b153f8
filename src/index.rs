use std::sync::Arc;

use hashbrown::HashMap;
use tracing::debug;

use crate::error::{LshError, Result};
use crate::hash::band_keys;
use crate::metrics::{MetricsCollector, MetricsSnapshot, QueryTimer};
use crate::signature::{ColumnId, Signature};
use crate::tuning::{optimal_params, BandingParams, ErrorWeights};

/// Upper bound on how many ids are reserved up front from `expected_items`.
pub const MAX_PRESIZED_ITEMS: usize = 1 << 20;

/// Configuration for the LSH index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexConfig {
    /// Signature length `k`.
    pub dim: usize,
    /// Hash family every indexed signature must come from.
    pub seed: i64,
    /// Jaccard similarity threshold in (0, 1) the banding is tuned for.
    pub threshold: f64,
    /// Expected number of signatures; only used to pre-size the id table,
    /// capped at [`MAX_PRESIZED_ITEMS`].
    pub expected_items: usize,
    /// Weights of false positives and false negatives when tuning.
    pub weights: ErrorWeights,
    /// Fixed band count instead of the tuned one. Must divide `dim`.
    pub num_bands: Option<usize>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dim: 256,
            seed: 43,
            threshold: 0.1,
            expected_items: 0,
            weights: ErrorWeights::default(),
            num_bands: None,
        }
    }
}

/// Lifecycle of an [`LshIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Accepting insertions; queries are rejected.
    Building,
    /// Finalized and immutable; accepting queries.
    Queryable,
}

/// Aggregate statistics about the index.
#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub num_ids: usize,
    pub dimension: usize,
    pub num_bands: usize,
    pub rows_per_band: usize,
    pub seed: i64,
    pub threshold: f64,
    pub total_buckets: usize,
    pub avg_bucket_size: f64,
    pub max_bucket_size: usize,
    pub memory_estimate_bytes: usize,
}

impl std::fmt::Display for IndexStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "LshIndex {{ ids: {}, k: {}, bands: {}x{}, seed: {}, threshold: {}, \
             buckets: {}, avg_bucket: {:.1}, max_bucket: {}, mem: ~{:.1}MB }}",
            self.num_ids,
            self.dimension,
            self.num_bands,
            self.rows_per_band,
            self.seed,
            self.threshold,
            self.total_buckets,
            self.avg_bucket_size,
            self.max_bucket_size,
            self.memory_estimate_bytes as f64 / (1024.0 * 1024.0),
        )
    }
}

/// One hash table per band: bucket key -> ordinals of the ids in that bucket.
type BandTable = HashMap<u64, Vec<usize>>;

// ---------------------------------------------------------------------------
// LshIndex
// ---------------------------------------------------------------------------

/// A MinHash LSH index over column signatures.
///
/// Populated with [`insert`](Self::insert) while building, sealed once with
/// [`finalize`](Self::finalize), then queried. Insertion and finalization
/// take `&mut self`; queries take `&self`, so a finalized index can be shared
/// behind an `Arc` by any number of readers without locking.
pub struct LshIndex {
    config: IndexConfig,
    params: BandingParams,
    state: IndexState,
    ids: Vec<ColumnId>,
    ordinals: HashMap<ColumnId, usize>,
    tables: Vec<BandTable>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl std::fmt::Debug for LshIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LshIndex")
            .field("num_ids", &self.ids.len())
            .field("state", &self.state)
            .field("params", &self.params)
            .field("config", &self.config)
            .field("has_metrics", &self.metrics.is_some())
            .finish()
    }
}

impl LshIndex {
    /// Start configuring an index with the builder pattern.
    pub fn builder() -> LshIndexBuilder {
        LshIndexBuilder::new()
    }

    /// Create an empty index in the building state.
    pub fn new(config: IndexConfig) -> Result<Self> {
        Self::new_with_metrics(config, false)
    }

    fn new_with_metrics(config: IndexConfig, enable_metrics: bool) -> Result<Self> {
        if config.dim == 0 {
            return Err(LshError::ZeroDimension);
        }
        if !(config.threshold > 0.0 && config.threshold < 1.0) {
            return Err(LshError::InvalidThreshold(config.threshold));
        }

        let params = match config.num_bands {
            Some(bands) => {
                if bands == 0 || config.dim % bands != 0 {
                    return Err(LshError::InvalidConfig(format!(
                        "num_bands {bands} does not divide dimension {}",
                        config.dim
                    )));
                }
                BandingParams::evaluate(config.threshold, bands, config.dim / bands)
            }
            None => optimal_params(config.dim, config.threshold, config.weights)?,
        };

        debug!(
            dim = config.dim,
            threshold = config.threshold,
            bands = params.num_bands,
            rows = params.rows_per_band,
            false_positive = params.false_positive,
            false_negative = params.false_negative,
            "configured banding"
        );

        // Only the id tables are pre-sized.
        let capacity = config.expected_items.min(MAX_PRESIZED_ITEMS);
        let tables = (0..params.num_bands).map(|_| HashMap::new()).collect();

        Ok(Self {
            ids: Vec::with_capacity(capacity),
            ordinals: HashMap::with_capacity(capacity),
            tables,
            params,
            state: IndexState::Building,
            metrics: enable_metrics.then(|| Arc::new(MetricsCollector::new())),
            config,
        })
    }

    fn check_signature(&self, signature: &Signature) -> Result<()> {
        if signature.len() != self.config.dim {
            return Err(LshError::DimensionMismatch {
                expected: self.config.dim,
                got: signature.len(),
            });
        }
        if signature.seed != self.config.seed {
            return Err(LshError::SeedMismatch {
                expected: self.config.seed,
                got: signature.seed,
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Add a signature under `id`.
    ///
    /// Inserting the same id with the same signature again leaves the index
    /// unchanged. Ids must be unique per signature; re-using an id for a
    /// different signature makes it a candidate for both.
    pub fn insert(&mut self, id: impl Into<ColumnId>, signature: &Signature) -> Result<()> {
        if self.state != IndexState::Building {
            return Err(LshError::NotBuilding);
        }
        self.check_signature(signature)?;

        let id = id.into();
        let ordinal = match self.ordinals.get(id.as_str()) {
            Some(&ordinal) => ordinal,
            None => {
                let ordinal = self.ids.len();
                self.ids.push(id.clone());
                self.ordinals.insert(id, ordinal);
                ordinal
            }
        };

        let keys = band_keys(&signature.hash_values, self.params.rows_per_band);
        for (table, key) in self.tables.iter_mut().zip(keys) {
            let bucket = table.entry(key).or_default();
            if bucket.last() != Some(&ordinal) {
                bucket.push(ordinal);
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_insert();
        }

        Ok(())
    }

    /// Seal the index: deduplicate buckets, release spare capacity and switch
    /// to the queryable state. A second call fails with
    /// [`LshError::AlreadyFinalized`].
    pub fn finalize(&mut self) -> Result<()> {
        if self.state == IndexState::Queryable {
            return Err(LshError::AlreadyFinalized);
        }

        for table in &mut self.tables {
            for bucket in table.values_mut() {
                bucket.sort_unstable();
                bucket.dedup();
                bucket.shrink_to_fit();
            }
            table.shrink_to_fit();
        }
        self.ids.shrink_to_fit();
        self.ordinals.shrink_to_fit();
        self.state = IndexState::Queryable;

        debug!(ids = self.ids.len(), "index finalized");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------

    /// Ids of every indexed signature that shares at least one band bucket
    /// with `signature`.
    ///
    /// The result is deduplicated and in no particular order. Candidates are
    /// not re-verified against the threshold. An empty vec means no band
    /// matched.
    pub fn query(&self, signature: &Signature) -> Result<Vec<ColumnId>> {
        if self.state != IndexState::Queryable {
            return Err(LshError::IndexNotReady);
        }
        self.check_signature(signature)?;

        let timer = self.metrics.as_ref().map(|_| QueryTimer::start());
        let (mut hits, mut misses) = (0, 0);

        let mut candidates: Vec<usize> = Vec::new();
        let keys = band_keys(&signature.hash_values, self.params.rows_per_band);
        for (table, key) in self.tables.iter().zip(keys) {
            match table.get(&key) {
                Some(bucket) => {
                    hits += 1;
                    candidates.extend_from_slice(bucket);
                }
                None => misses += 1,
            }
        }
        candidates.sort_unstable();
        candidates.dedup();

        let results: Vec<ColumnId> = candidates
            .into_iter()
            .map(|ordinal| self.ids[ordinal].clone())
            .collect();

        if let (Some(m), Some(t)) = (&self.metrics, timer) {
            m.record_query(results.len(), hits, misses, t.elapsed_ns());
        }

        Ok(results)
    }

    // ------------------------------------------------------------------
    // Accessors / stats
    // ------------------------------------------------------------------

    /// Number of distinct ids inserted.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no signature has been inserted.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Check whether an id has been inserted.
    pub fn contains(&self, id: &str) -> bool {
        self.ordinals.contains_key(id)
    }

    pub fn state(&self) -> IndexState {
        self.state
    }

    pub fn is_queryable(&self) -> bool {
        self.state == IndexState::Queryable
    }

    /// Signature length `k` every insert and query must match.
    pub fn dimension(&self) -> usize {
        self.config.dim
    }

    /// Hash family every insert and query must match.
    pub fn seed(&self) -> i64 {
        self.config.seed
    }

    pub fn params(&self) -> BandingParams {
        self.params
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Compute aggregate statistics about the index.
    pub fn stats(&self) -> IndexStats {
        let buckets = || self.tables.iter().flat_map(|t| t.values());
        let total_buckets: usize = self.tables.iter().map(|t| t.len()).sum();
        let total_entries: usize = buckets().map(|b| b.len()).sum();
        let max_bucket_size = buckets().map(|b| b.len()).max().unwrap_or(0);

        let avg_bucket_size = if total_buckets > 0 {
            total_entries as f64 / total_buckets as f64
        } else {
            0.0
        };

        let id_mem: usize = self
            .ids
            .iter()
            .map(|id| id.as_str().len() + 2 * std::mem::size_of::<usize>())
            .sum();
        let ordinal_mem = self.ids.len() * 3 * std::mem::size_of::<usize>();
        let table_mem = total_buckets * (std::mem::size_of::<u64>() + 24);
        let entry_mem = total_entries * std::mem::size_of::<usize>();

        IndexStats {
            num_ids: self.ids.len(),
            dimension: self.config.dim,
            num_bands: self.params.num_bands,
            rows_per_band: self.params.rows_per_band,
            seed: self.config.seed,
            threshold: self.config.threshold,
            total_buckets,
            avg_bucket_size,
            max_bucket_size,
            memory_estimate_bytes: id_mem + ordinal_mem + table_mem + entry_mem,
        }
    }

    /// Snapshot of runtime metrics (`None` if metrics were not enabled).
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.metrics.as_ref().map(|m| m.snapshot())
    }
}

// ---------------------------------------------------------------------------
// Parallel batch queries (behind `parallel` feature)
// ---------------------------------------------------------------------------

#[cfg(feature = "parallel")]
impl LshIndex {
    /// Query many signatures in parallel against the finalized index.
    ///
    /// Fails with the first error encountered, if any.
    pub fn par_query_batch(&self, signatures: &[Signature]) -> Result<Vec<Vec<ColumnId>>> {
        use rayon::prelude::*;

        signatures.par_iter().map(|s| self.query(s)).collect()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent builder for [`LshIndex`].
#[derive(Default)]
pub struct LshIndexBuilder {
    config: IndexConfig,
    enable_metrics: bool,
}

impl LshIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dim(mut self, dim: usize) -> Self {
        self.config.dim = dim;
        self
    }

    pub fn seed(mut self, seed: i64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn expected_items(mut self, n: usize) -> Self {
        self.config.expected_items = n;
        self
    }

    pub fn weights(mut self, weights: ErrorWeights) -> Self {
        self.config.weights = weights;
        self
    }

    /// Use exactly `n` bands instead of tuning for the threshold.
    pub fn num_bands(mut self, n: usize) -> Self {
        self.config.num_bands = Some(n);
        self
    }

    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Build the empty index, returning an error on invalid configuration.
    pub fn build(self) -> Result<LshIndex> {
        LshIndex::new_with_metrics(self.config, self.enable_metrics)
    }
}
