use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Lock-free counters for index activity.
///
/// Queries only touch atomics here, so recording never contends with other
/// readers of the finalized index.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inserts: AtomicU64,
    queries: AtomicU64,
    empty_results: AtomicU64,
    candidates_returned: AtomicU64,
    query_time_ns: AtomicU64,
    band_hits: AtomicU64,
    band_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one finished query with its candidate count and band lookups.
    pub fn record_query(&self, candidates: usize, hits: usize, misses: usize, duration_ns: u64) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if candidates == 0 {
            self.empty_results.fetch_add(1, Ordering::Relaxed);
        }
        self.candidates_returned
            .fetch_add(candidates as u64, Ordering::Relaxed);
        self.band_hits.fetch_add(hits as u64, Ordering::Relaxed);
        self.band_misses.fetch_add(misses as u64, Ordering::Relaxed);
        self.query_time_ns.fetch_add(duration_ns, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let queries = self.queries.load(Ordering::Relaxed);
        let hits = self.band_hits.load(Ordering::Relaxed);
        let misses = self.band_misses.load(Ordering::Relaxed);
        let per_query = |total: u64| {
            if queries > 0 {
                total as f64 / queries as f64
            } else {
                0.0
            }
        };

        MetricsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            queries,
            empty_results: self.empty_results.load(Ordering::Relaxed),
            avg_candidates_per_query: per_query(self.candidates_returned.load(Ordering::Relaxed)),
            avg_query_time_us: per_query(self.query_time_ns.load(Ordering::Relaxed)) / 1000.0,
            band_hit_rate: if hits + misses > 0 {
                hits as f64 / (hits + misses) as f64
            } else {
                0.0
            },
        }
    }
}

/// A point-in-time view of [`MetricsCollector`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSnapshot {
    pub inserts: u64,
    pub queries: u64,
    /// Queries whose candidate set was empty.
    pub empty_results: u64,
    pub avg_candidates_per_query: f64,
    pub avg_query_time_us: f64,
    /// Fraction of band lookups that found a bucket.
    pub band_hit_rate: f64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "inserts: {}, queries: {} ({} empty), avg candidates: {:.1}, avg query: {:.2}us, band hit rate: {:.1}%",
            self.inserts,
            self.queries,
            self.empty_results,
            self.avg_candidates_per_query,
            self.avg_query_time_us,
            self.band_hit_rate * 100.0,
        )
    }
}

pub(crate) struct QueryTimer {
    start: Instant,
}

impl QueryTimer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ns(&self) -> u64 {
        self.start.elapsed().as_nanos() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_averages() {
        let m = MetricsCollector::new();
        m.record_insert();
        m.record_insert();
        m.record_query(4, 2, 2, 2_000);
        m.record_query(0, 0, 4, 4_000);
        let s = m.snapshot();
        assert_eq!(s.inserts, 2);
        assert_eq!(s.queries, 2);
        assert_eq!(s.empty_results, 1);
        assert!((s.avg_candidates_per_query - 2.0).abs() < 1e-9);
        assert!((s.avg_query_time_us - 3.0).abs() < 1e-9);
        assert!((s.band_hit_rate - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_empty_snapshot() {
        let s = MetricsCollector::new().snapshot();
        assert_eq!(s.queries, 0);
        assert_eq!(s.avg_query_time_us, 0.0);
        assert_eq!(s.band_hit_rate, 0.0);
    }
}
