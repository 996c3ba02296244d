use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid metadata: {0}")]
    Metadata(String),

    #[error("Duplicate id in catalog: {0}")]
    DuplicateId(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index already exists: {0}")]
    IndexExists(String),

    #[error("Index not found: {0}")]
    IndexNotFound(String),

    #[error("Index backend error: {0}")]
    Backend(String),

    /// An upsert chunk failed. Entries from earlier chunks stay stored.
    #[error("Upsert of chunk {chunk} failed ({committed} entries already committed): {source}")]
    Index {
        chunk: usize,
        committed: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Batch {batch} failed: {source}")]
    Batch {
        batch: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
