//! Signature sources feeding the index builder.
//!
//! A source yields `(id, signature)` records until it reports end of stream
//! with `Ok(None)`. Any error ends the build; see [`crate::builder`].

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::signature::{ColumnId, Signature};

/// Errors raised while reading signatures.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed record on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("source failed: {0}")]
    Other(String),
}

/// One indexed column: its id and MinHash signature.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureRecord {
    pub id: ColumnId,
    pub signature: Signature,
}

impl SignatureRecord {
    pub fn new(id: impl Into<ColumnId>, seed: i64, hash_values: Vec<u64>) -> Self {
        Self {
            id: id.into(),
            signature: Signature::new(seed, hash_values),
        }
    }
}

/// A stream of signature records.
pub trait SignatureSource {
    /// Total number of records, if known. Only used for pre-sizing.
    fn count_hint(&self) -> Option<usize>;

    /// Next record, `Ok(None)` at end of stream.
    fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError>;
}

impl<S: SignatureSource + ?Sized> SignatureSource for Box<S> {
    fn count_hint(&self) -> Option<usize> {
        (**self).count_hint()
    }

    fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError> {
        (**self).next_record()
    }
}

// ---------------------------------------------------------------------------
// In-memory source
// ---------------------------------------------------------------------------

/// Records held in memory.
#[derive(Debug, Default)]
pub struct VecSource {
    records: std::vec::IntoIter<SignatureRecord>,
    len: usize,
}

impl VecSource {
    pub fn new(records: Vec<SignatureRecord>) -> Self {
        Self {
            len: records.len(),
            records: records.into_iter(),
        }
    }
}

impl FromIterator<SignatureRecord> for VecSource {
    fn from_iter<I: IntoIterator<Item = SignatureRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl SignatureSource for VecSource {
    fn count_hint(&self) -> Option<usize> {
        Some(self.len)
    }

    fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError> {
        Ok(self.records.next())
    }
}

// ---------------------------------------------------------------------------
// JSON lines source
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct JsonRecord {
    id: String,
    #[serde(alias = "hashvalues")]
    minhash: Vec<u64>,
    seed: i64,
}

/// Reads one JSON object per line:
///
/// ```text
/// {"id": "dataset-1/column-a", "minhash": [12, 98, ...], "seed": 43}
/// ```
///
/// Blank lines are skipped. A malformed line fails with
/// [`SourceError::Parse`] carrying its 1-based line number.
pub struct JsonLinesSource<R> {
    reader: R,
    line: usize,
    count_hint: Option<usize>,
    buf: String,
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            count_hint: None,
            buf: String::new(),
        }
    }

    pub fn with_count_hint(mut self, count: usize) -> Self {
        self.count_hint = Some(count);
        self
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// Open a JSON-lines file. The file is scanned once up front to count its
    /// records for the count hint.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let mut count = 0;
        for line in BufReader::new(File::open(path)?).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(Self::new(BufReader::new(File::open(path)?)).with_count_hint(count))
    }
}

impl<R: BufRead> SignatureSource for JsonLinesSource<R> {
    fn count_hint(&self) -> Option<usize> {
        self.count_hint
    }

    fn next_record(&mut self) -> Result<Option<SignatureRecord>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let text = self.buf.trim();
            if text.is_empty() {
                continue;
            }
            let record: JsonRecord = serde_json::from_str(text).map_err(|source| {
                SourceError::Parse {
                    line: self.line,
                    source,
                }
            })?;
            return Ok(Some(SignatureRecord::new(
                record.id,
                record.seed,
                record.minhash,
            )));
        }
    }
}
