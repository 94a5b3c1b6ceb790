//! Error types for hdpm-memory

use thiserror::Error;

/// Result type alias for hdpm-memory operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in hdpm-memory
#[derive(Error, Debug)]
pub enum Error {
    #[error("Trajectory has no steps")]
    EmptyTrajectory,

    #[error("Invalid outcome {0}: must be strictly positive or strictly negative")]
    InvalidOutcome(i32),

    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    #[error("Dangling reference: {0}")]
    DanglingReference(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Filing failed: {0}")]
    FilingFailed(#[source] Box<Error>),

    #[error("Pathway {pathway_id} is already linked to insight {insight_id}")]
    AlreadyLinked {
        pathway_id: String,
        insight_id: String,
    },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::DuplicateIdentifier(id.into())
    }

    pub fn dangling(msg: impl Into<String>) -> Self {
        Self::DanglingReference(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn filing_failed(source: Error) -> Self {
        Self::FilingFailed(Box::new(source))
    }

    pub fn invalid_snapshot(msg: impl Into<String>) -> Self {
        Self::InvalidSnapshot(msg.into())
    }

    pub fn scoring(msg: impl Into<String>) -> Self {
        Self::Scoring(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
