//! Error types for annotation operations.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, AnnotationError>;

/// Errors that can occur while reconciling, recovering or exporting annotations.
#[derive(Error, Debug)]
pub enum AnnotationError {
    /// I/O error during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// A persisted annotation row could not be parsed
    #[error("Malformed record at line {line}: {message}")]
    MalformedRecord {
        /// 1-based line number in the source file (header is line 1)
        line: usize,
        /// Description of the problem
        message: String,
    },

    /// A label name or index is not part of the catalog
    #[error("Invalid label: {label}")]
    InvalidLabel {
        /// The offending label, as a name or an index
        label: String,
    },

    /// A reported point does not lie inside the region it was reported for
    #[error("Point ({x}, {y}) is outside {region}")]
    RegionMismatch {
        /// X coordinate of the point
        x: i64,
        /// Y coordinate of the point
        y: i64,
        /// Description of the region
        region: String,
    },

    /// Referenced image or annotation file is absent
    #[error("Missing resource: {path:?}")]
    MissingResource {
        /// Path (or remote name) that was expected
        path: PathBuf,
    },

    /// A viewport report entry is missing data or carries non-finite values
    #[error("Malformed viewport report entry {index}: {message}")]
    MalformedReport {
        /// Position of the entry in the report
        index: usize,
        /// Description of the problem
        message: String,
    },

    /// Patch grid parameters or layer dimensions are unusable
    #[error("Invalid geometry: {message}")]
    InvalidGeometry {
        /// Description of the problem
        message: String,
    },
}

impl AnnotationError {
    /// Create a malformed record error.
    pub fn malformed_record(line: usize, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line,
            message: message.into(),
        }
    }

    /// Create an invalid label error.
    pub fn invalid_label(label: impl ToString) -> Self {
        Self::InvalidLabel {
            label: label.to_string(),
        }
    }

    /// Create a missing resource error.
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingResource { path: path.into() }
    }

    /// Create a malformed report error.
    pub fn malformed_report(index: usize, message: impl Into<String>) -> Self {
        Self::MalformedReport {
            index,
            message: message.into(),
        }
    }

    /// Create an invalid geometry error.
    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            message: message.into(),
        }
    }
}
