//! Error types for Stridekit

use thiserror::Error;

/// Errors that can occur at the engine boundary
#[derive(Debug, Error)]
pub enum DetectError {
    /// The sample carried fewer than three acceleration components.
    /// Engine state is left untouched; callers should drop the sample
    /// and continue the stream.
    #[error("Invalid sample: expected 3 acceleration components, got {0}")]
    InvalidInput(usize),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
