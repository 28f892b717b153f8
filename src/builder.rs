//! Fail-stop ingestion of a [`SignatureSource`] into a finalized [`LshIndex`].
//!
//! The first record fixes the index dimension and seed (unless pinned up
//! front). Any record that disagrees, and any source error, aborts the whole
//! build: no partially built index is ever returned.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::info;

use crate::error::LshError;
use crate::index::LshIndex;
use crate::signature::ColumnId;
use crate::source::{SignatureRecord, SignatureSource, SourceError};
use crate::tuning::{BandingParams, ErrorWeights};

/// Reasons a build is aborted.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("record #{position} ({id}) rejected: {source}")]
    Record {
        position: usize,
        id: ColumnId,
        #[source]
        source: LshError,
    },

    #[error("signature source failed after {records} records: {source}")]
    Source {
        records: usize,
        #[source]
        source: SourceError,
    },

    #[error("invalid index configuration: {0}")]
    Config(#[source] LshError),

    #[error("signature source is empty and no dimension and seed were configured")]
    EmptySource,
}

/// Summary of a completed build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub records: usize,
    pub dimension: usize,
    pub seed: i64,
    pub params: BandingParams,
    pub elapsed: Duration,
}

/// Drives a signature source into a new index and finalizes it.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    threshold: f64,
    weights: ErrorWeights,
    num_bands: Option<usize>,
    expected_dim: Option<usize>,
    expected_seed: Option<i64>,
    enable_metrics: bool,
    progress_interval: usize,
}

impl IndexBuilder {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            weights: ErrorWeights::default(),
            num_bands: None,
            expected_dim: None,
            expected_seed: None,
            enable_metrics: false,
            progress_interval: 100_000,
        }
    }

    pub fn weights(mut self, weights: ErrorWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn num_bands(mut self, n: usize) -> Self {
        self.num_bands = Some(n);
        self
    }

    /// Require every signature to have exactly `dim` values.
    pub fn expect_dimension(mut self, dim: usize) -> Self {
        self.expected_dim = Some(dim);
        self
    }

    /// Require every signature to come from hash family `seed`.
    pub fn expect_seed(mut self, seed: i64) -> Self {
        self.expected_seed = Some(seed);
        self
    }

    pub fn enable_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Log progress every `n` records; 0 disables progress logging.
    pub fn progress_interval(mut self, n: usize) -> Self {
        self.progress_interval = n;
        self
    }

    fn new_index(&self, dim: usize, seed: i64, expected_items: usize) -> Result<LshIndex, LshError> {
        let mut builder = LshIndex::builder()
            .dim(dim)
            .seed(seed)
            .threshold(self.threshold)
            .weights(self.weights)
            .expected_items(expected_items);
        if let Some(n) = self.num_bands {
            builder = builder.num_bands(n);
        }
        if self.enable_metrics {
            builder = builder.enable_metrics();
        }
        builder.build()
    }

    /// Consume `source` and return the finalized index.
    pub fn build<S>(&self, source: &mut S) -> Result<(LshIndex, BuildReport), BuildError>
    where
        S: SignatureSource + ?Sized,
    {
        let start = Instant::now();
        let count_hint = source.count_hint().unwrap_or(0);
        info!("indexing started, scanning {count_hint} signatures");

        let mut pending = next_record(source, 0)?;
        let (dim, seed) = match (&pending, self.expected_dim, self.expected_seed) {
            (_, Some(dim), Some(seed)) => (dim, seed),
            (Some(first), dim, seed) => (
                dim.unwrap_or(first.signature.len()),
                seed.unwrap_or(first.signature.seed),
            ),
            (None, _, _) => return Err(BuildError::EmptySource),
        };

        let mut index = self
            .new_index(dim, seed, count_hint)
            .map_err(BuildError::Config)?;
        let params = index.params();
        info!(
            dim,
            seed,
            bands = params.num_bands,
            rows = params.rows_per_band,
            "building LSH index"
        );

        let mut records = 0;
        while let Some(SignatureRecord { id, signature }) = pending {
            if let Err(source) = index.insert(id.clone(), &signature) {
                return Err(BuildError::Record {
                    position: records,
                    id,
                    source,
                });
            }
            records += 1;
            if self.progress_interval > 0 && records % self.progress_interval == 0 {
                info!("indexed {records}/{count_hint} signatures");
            }
            pending = next_record(source, records)?;
        }

        index.finalize().map_err(BuildError::Config)?;

        let elapsed = start.elapsed();
        info!("finished indexing {records} signatures in {elapsed:?}");

        Ok((
            index,
            BuildReport {
                records,
                dimension: dim,
                seed,
                params,
                elapsed,
            },
        ))
    }
}

fn next_record<S>(source: &mut S, records: usize) -> Result<Option<SignatureRecord>, BuildError>
where
    S: SignatureSource + ?Sized,
{
    source
        .next_record()
        .map_err(|source| BuildError::Source { records, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Signature;
    use crate::source::VecSource;

    struct FailingSource {
        remaining: Vec<SignatureRecord>,
    }

    impl SignatureSource for FailingSource {
        fn count_hint(&self) -> Option<usize> {
            None
        }

        fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError> {
            match self.remaining.pop() {
                Some(record) => Ok(Some(record)),
                None => Err(SourceError::Other("connection reset".into())),
            }
        }
    }

    struct InflatedHintSource(VecSource);

    impl SignatureSource for InflatedHintSource {
        fn count_hint(&self) -> Option<usize> {
            Some(usize::MAX / 2)
        }

        fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError> {
            self.0.next_record()
        }
    }

    #[test]
    fn test_inflated_count_hint_does_not_affect_build() {
        let mut source = InflatedHintSource(VecSource::new(vec![SignatureRecord::new(
            "a",
            7,
            vec![1, 2, 3, 4],
        )]));
        let (index, report) = IndexBuilder::new(0.5).build(&mut source).unwrap();
        assert_eq!(report.records, 1);
        assert!(index.contains("a"));
    }

    #[test]
    fn test_build_fixes_shape_from_first_record() {
        let mut source = VecSource::new(vec![
            SignatureRecord::new("a", 7, vec![1, 2, 3, 4]),
            SignatureRecord::new("b", 7, vec![1, 2, 9, 9]),
        ]);
        let (index, report) = IndexBuilder::new(0.5)
            .num_bands(2)
            .build(&mut source)
            .unwrap();
        assert!(index.is_queryable());
        assert_eq!(report.records, 2);
        assert_eq!(report.dimension, 4);
        assert_eq!(report.seed, 7);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_dimension_drift_aborts() {
        let mut source = VecSource::new(vec![
            SignatureRecord::new("a", 7, vec![1, 2, 3, 4]),
            SignatureRecord::new("b", 7, vec![1, 2]),
            SignatureRecord::new("c", 7, vec![1, 2, 3, 4]),
        ]);
        match IndexBuilder::new(0.5).build(&mut source) {
            Err(BuildError::Record {
                position,
                id,
                source: LshError::DimensionMismatch { expected: 4, got: 2 },
            }) => {
                assert_eq!(position, 1);
                assert_eq!(id.as_str(), "b");
            }
            other => panic!("expected dimension drift, got {:?}", other.map(|(_, r)| r)),
        }
    }

    #[test]
    fn test_seed_drift_aborts() {
        let mut source = VecSource::new(vec![
            SignatureRecord::new("a", 7, vec![1, 2, 3, 4]),
            SignatureRecord::new("b", 8, vec![1, 2, 3, 4]),
        ]);
        let err = IndexBuilder::new(0.5).build(&mut source).err().unwrap();
        assert!(
            matches!(
                err,
                BuildError::Record {
                    source: LshError::SeedMismatch { expected: 7, got: 8 },
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn test_source_failure_aborts() {
        let mut source = FailingSource {
            remaining: vec![SignatureRecord::new("a", 1, vec![1, 2])],
        };
        let err = IndexBuilder::new(0.5).build(&mut source).err().unwrap();
        assert!(
            matches!(err, BuildError::Source { records: 1, .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_pinned_shape_checks_first_record() {
        let mut source = VecSource::new(vec![SignatureRecord::new("a", 7, vec![1, 2, 3, 4])]);
        let err = IndexBuilder::new(0.5)
            .expect_dimension(8)
            .build(&mut source)
            .err()
            .unwrap();
        assert!(
            matches!(
                err,
                BuildError::Record {
                    position: 0,
                    source: LshError::DimensionMismatch { expected: 8, got: 4 },
                    ..
                }
            ),
            "got {err:?}"
        );
    }

    #[test]
    fn test_empty_source() {
        let err = IndexBuilder::new(0.5)
            .build(&mut VecSource::default())
            .err()
            .unwrap();
        assert!(matches!(err, BuildError::EmptySource));

        let (index, report) = IndexBuilder::new(0.5)
            .expect_dimension(4)
            .expect_seed(7)
            .build(&mut VecSource::default())
            .unwrap();
        assert_eq!(report.records, 0);
        assert!(index.is_queryable());
        assert!(index
            .query(&Signature::new(7, vec![1, 2, 3, 4]))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_invalid_threshold_is_config_error() {
        let mut source = VecSource::new(vec![SignatureRecord::new("a", 7, vec![1, 2])]);
        let err = IndexBuilder::new(1.5).build(&mut source).err().unwrap();
        assert!(matches!(err, BuildError::Config(LshError::InvalidThreshold(_))));
    }
}
