//! Error types for the procwatch library

use std::path::PathBuf;
use thiserror::Error;

/// Errors from detector lifecycle operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectorError {
    #[error("invalid process id {0}: a monitored process needs a non-zero pid")]
    InvalidPid(u32),
    #[error("detector was cleaned up and cannot be reused")]
    Destroyed,
}

/// Errors from exporting anomaly events
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no events to export")]
    NoEvents,
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from reading process metrics
#[derive(Debug, Error)]
pub enum SampleError {
    #[error("process {0} does not exist")]
    ProcessNotFound(u32),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}
