//! Typed errors for the file loaders (source log CSV, JSONL manifests).
//!
//! Command-level code wraps these in `anyhow` with context; the loaders keep
//! a concrete type so callers and tests can match on the failure.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CorpusError>;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("CSV not found: {}", .0.display())]
    CsvNotFound(PathBuf),

    #[error("CSV has no header row: {}", .0.display())]
    CsvEmpty(PathBuf),

    #[error("no title-like column in CSV headers: {0:?}")]
    NoTitleColumn(Vec<String>),

    #[error("malformed CSV in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} is not valid UTF-8", .0.display())]
    NotUtf8(PathBuf),

    #[error("invalid JSON on line {line} of {}: {source}", .path.display())]
    ManifestLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("File operation failed for {}: {source}", .path.display())]
    FileOperation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CorpusError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CorpusError::FileOperation {
            path: path.into(),
            source,
        }
    }
}
