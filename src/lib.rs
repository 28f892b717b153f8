//! # minhash_lsh
//!
//! An in-memory MinHash LSH index for approximate Jaccard set-similarity
//! search, and the HTTP service that answers queries against it.
//!
//! Columns are summarised as MinHash signatures. The index splits each
//! signature into bands, hashes every band into a bucket and returns, for a
//! query signature, every column that shares at least one bucket with it.
//! The band layout is tuned so that columns above a similarity threshold are
//! likely to be returned and columns below it are not.
//!
//! The index is built once and then sealed: after
//! [`LshIndex::finalize`] it is immutable and can be queried from any number
//! of threads through an `Arc` without locking.
//!
//! ## Quick start
//!
//! ```rust
//! use minhash_lsh::{LshIndex, MinHasher};
//!
//! let hasher = MinHasher::new(128, 43);
//! let a = hasher.signature(["red", "green", "blue", "cyan"]);
//! let b = hasher.signature(["red", "green", "blue", "magenta"]);
//!
//! let mut index = LshIndex::builder()
//!     .dim(128)
//!     .seed(43)
//!     .threshold(0.5)
//!     .build()
//!     .unwrap();
//! index.insert("colors.a", &a).unwrap();
//! index.insert("colors.b", &b).unwrap();
//! index.finalize().unwrap();
//!
//! let candidates = index.query(&a).unwrap();
//! assert!(candidates.iter().any(|id| id.as_str() == "colors.a"));
//! ```
//!
//! ## Feature flags
//!
//! | Flag       | Effect                                  |
//! |------------|-----------------------------------------|
//! | `parallel` | Parallel batch queries via rayon        |

pub mod builder;
pub mod config;
pub mod error;
pub mod hash;
pub mod index;
pub mod metrics;
pub mod minhash;
pub mod server;
pub mod service;
pub mod signature;
pub mod source;
pub mod tuning;

// Re-exports for convenience.
pub use builder::{BuildError, BuildReport, IndexBuilder};
pub use config::ServerConfig;
pub use error::{LshError, Result};
pub use index::{IndexConfig, IndexState, IndexStats, LshIndex, LshIndexBuilder};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use minhash::MinHasher;
pub use service::{QueryRejection, QueryRequest, QueryService, DEFAULT_MAX_PAYLOAD_BYTES};
pub use signature::{ColumnId, Signature};
pub use source::{JsonLinesSource, SignatureRecord, SignatureSource, SourceError, VecSource};
pub use tuning::{optimal_params, BandingParams, ErrorWeights};
