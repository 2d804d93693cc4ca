//! Error types for catalog loading, table sources and recommendation queries

use crate::types::Feature;
use thiserror::Error;

/// The single recoverable failure of a recommendation query
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecommendError {
    #[error("Song '{0}' not found in the dataset.")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeightError {
    #[error("weight for {feature} must be a non-negative number, got {value}")]
    Invalid { feature: Feature, value: f64 },

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("expected FEATURE=WEIGHT, got '{0}'")]
    Malformed(String),
}

/// Failure while reading rows from a table source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The database rejected or failed the statement
    #[error("Database query error: {0}")]
    Query(String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown table '{0}'")]
    UnknownTable(String),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("dataset must be a JSON array of objects")]
    NotAnArray,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to fetch dataset: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("dataset service reported an error: {0}")]
    Service(String),

    #[error("dataset service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
