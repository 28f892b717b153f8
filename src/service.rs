//! Request validation in front of a finalized [`LshIndex`].
//!
//! A request body is size-checked, parsed and matched against the index's
//! dimension and seed before the index is consulted. Every rejection is
//! local to its request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::LshError;
use crate::index::LshIndex;
use crate::signature::{ColumnId, Signature};

/// Default cap on the raw request body: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Body of a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub seed: i64,
    #[serde(alias = "hashvalues")]
    pub minhash: Vec<u64>,
}

/// Why a query request was refused.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueryRejection {
    #[error("payload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("malformed request body: {0}")]
    Malformed(String),

    #[error("incorrect minhash size {got}, expecting {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("incorrect minhash seed {got}, expecting {expected}")]
    SeedMismatch { expected: i64, got: i64 },

    #[error("index is not ready")]
    IndexNotReady,

    #[error("index error: {0}")]
    Index(LshError),
}

impl QueryRejection {
    /// Short machine-readable name of the rejection.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryRejection::PayloadTooLarge { .. } => "payload_too_large",
            QueryRejection::Malformed(_) => "malformed_request",
            QueryRejection::DimensionMismatch { .. } => "dimension_mismatch",
            QueryRejection::SeedMismatch { .. } => "seed_mismatch",
            QueryRejection::IndexNotReady => "index_not_ready",
            QueryRejection::Index(_) => "index_error",
        }
    }
}

impl From<LshError> for QueryRejection {
    fn from(err: LshError) -> Self {
        match err {
            LshError::DimensionMismatch { expected, got } => {
                QueryRejection::DimensionMismatch { expected, got }
            }
            LshError::SeedMismatch { expected, got } => QueryRejection::SeedMismatch { expected, got },
            LshError::IndexNotReady => QueryRejection::IndexNotReady,
            other => QueryRejection::Index(other),
        }
    }
}

/// Validates queries and forwards them to a shared, finalized index.
#[derive(Debug, Clone)]
pub struct QueryService {
    index: Arc<LshIndex>,
    max_payload_bytes: usize,
}

impl QueryService {
    /// Wrap a finalized index. Fails with [`LshError::IndexNotReady`] if the
    /// index is still building.
    pub fn new(index: Arc<LshIndex>) -> Result<Self, LshError> {
        if !index.is_queryable() {
            return Err(LshError::IndexNotReady);
        }
        Ok(Self {
            index,
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        })
    }

    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    pub fn index(&self) -> &Arc<LshIndex> {
        &self.index
    }

    /// Size-check and parse a raw body.
    pub fn parse(&self, body: &[u8]) -> Result<QueryRequest, QueryRejection> {
        if body.len() > self.max_payload_bytes {
            return Err(QueryRejection::PayloadTooLarge {
                limit: self.max_payload_bytes,
            });
        }
        serde_json::from_slice(body).map_err(|e| QueryRejection::Malformed(e.to_string()))
    }

    /// Check a parsed request against the index's dimension and seed.
    pub fn validate(&self, request: QueryRequest) -> Result<Signature, QueryRejection> {
        let expected = self.index.dimension();
        if request.minhash.len() != expected {
            return Err(QueryRejection::DimensionMismatch {
                expected,
                got: request.minhash.len(),
            });
        }
        if request.seed != self.index.seed() {
            return Err(QueryRejection::SeedMismatch {
                expected: self.index.seed(),
                got: request.seed,
            });
        }
        Ok(Signature::new(request.seed, request.minhash))
    }

    /// Validate a parsed request and look up its candidates.
    pub fn query(&self, request: QueryRequest) -> Result<Vec<ColumnId>, QueryRejection> {
        let signature = self.validate(request)?;
        let candidates = self.index.query(&signature)?;
        debug!(candidates = candidates.len(), "lsh query");
        Ok(candidates)
    }

    /// Full request path: size cap, parse, validate, query.
    pub fn handle(&self, body: &[u8]) -> Result<Vec<ColumnId>, QueryRejection> {
        let request = self.parse(body)?;
        self.query(request)
    }
}
