//! Custom error types for bindery

use crate::models::DocumentRef;
use thiserror::Error;

/// Main error type for bindery operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Ambiguous identifier '{name}': {} candidates", .candidates.len())]
    AmbiguousIdentifier {
        name: String,
        candidates: Vec<DocumentRef>,
    },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Ingestion already in progress for document {0}")]
    IngestionConflict(i64),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for bindery
pub type Result<T> = std::result::Result<T, Error>;
