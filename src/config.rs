//! Command-line / environment configuration of the `lshserver` binary.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use crate::builder::IndexBuilder;
use crate::error::{LshError, Result};
use crate::service::DEFAULT_MAX_PAYLOAD_BYTES;

/// MinHash LSH query server.
///
/// Builds an index from a JSON-lines signature file, then answers
/// `POST /lsh/query` until terminated.
#[derive(Debug, Clone, Parser)]
#[command(name = "lshserver", version)]
pub struct ServerConfig {
    /// JSON-lines file with one `{"id", "minhash", "seed"}` record per line.
    #[arg(long, env = "LSH_SIGNATURES")]
    pub signatures: PathBuf,

    /// Jaccard similarity threshold the banding is tuned for.
    #[arg(long, env = "LSH_THRESHOLD", default_value_t = 0.1)]
    pub threshold: f64,

    /// Expected signature length; defaults to the first record's.
    #[arg(long, env = "LSH_MINHASH_SIZE")]
    pub minhash_size: Option<usize>,

    /// Expected hash family seed; defaults to the first record's.
    #[arg(long, env = "LSH_MINHASH_SEED", allow_hyphen_values = true)]
    pub minhash_seed: Option<i64>,

    /// Address to listen on.
    #[arg(long, env = "LSH_BIND", default_value = "0.0.0.0:8081")]
    pub bind: SocketAddr,

    /// Largest accepted request body in bytes.
    #[arg(long, env = "LSH_MAX_PAYLOAD_BYTES", default_value_t = DEFAULT_MAX_PAYLOAD_BYTES)]
    pub max_payload_bytes: usize,

    /// Log every N indexed records (0 disables).
    #[arg(long, default_value_t = 100_000)]
    pub progress_interval: usize,

    /// Collect query metrics, exposed at `GET /lsh/stats`.
    #[arg(long, env = "LSH_METRICS")]
    pub metrics: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, env = "LSH_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(LshError::InvalidThreshold(self.threshold));
        }
        if self.max_payload_bytes == 0 {
            return Err(LshError::InvalidConfig(
                "max_payload_bytes must be > 0".into(),
            ));
        }
        if self.minhash_size == Some(0) {
            return Err(LshError::ZeroDimension);
        }
        Ok(())
    }

    /// Index builder configured from these settings.
    pub fn index_builder(&self) -> IndexBuilder {
        let mut builder = IndexBuilder::new(self.threshold).progress_interval(self.progress_interval);
        if let Some(dim) = self.minhash_size {
            builder = builder.expect_dimension(dim);
        }
        if let Some(seed) = self.minhash_seed {
            builder = builder.expect_seed(seed);
        }
        if self.metrics {
            builder = builder.enable_metrics();
        }
        builder
    }
}
