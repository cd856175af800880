//! Error types for stroke processing.

use thiserror::Error;

/// Result type for stroke processing.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur before any request leaves the core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No strokes were supplied.
    #[error("no strokes to interpret")]
    EmptyInput,

    /// A stroke violates the point-array invariant.
    #[error("invalid stroke: {0}")]
    InvalidStroke(String),

    /// The stroke payload is still too large after simplification.
    #[error("stroke payload of {size} bytes exceeds the {limit} byte ceiling")]
    PayloadTooLarge {
        /// Estimated payload size in bytes.
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },
}
