//! Error types for rust_sccv

use thiserror::Error;

/// Main error type for CV analysis operations
#[derive(Error, Debug)]
pub enum CvError {
    #[error("Invalid expression matrix: {reason}")]
    InvalidMatrix { reason: String },

    #[error("Invalid annotation: {reason}")]
    InvalidAnnotation { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Gene universe mismatch between {left} and {right}: {details}")]
    GeneUniverseMismatch {
        left: String,
        right: String,
        details: String,
    },

    #[error("Trend re-indexing failed: {reason}")]
    TrendReindex { reason: String },

    #[error("Unknown group '{group}'")]
    UnknownGroup { group: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

/// Result type alias for CV analysis operations
pub type Result<T> = std::result::Result<T, CvError>;
