//! RefPack error types

use thiserror::Error;

/// RefPack operation result type
pub type RefPackResult<T> = Result<T, RefPackError>;

/// RefPack-specific error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefPackError {
    /// The stream header is missing or has the wrong signature
    #[error("invalid RefPack header: {0}")]
    InvalidHeader(String),

    /// The token stream is inconsistent with itself or its declared sizes
    #[error("corrupt RefPack stream: {0}")]
    CorruptStream(String),

    /// Output length differs from the caller's declared size
    #[error("decompressed size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Size the caller expected
        expected: usize,
        /// Size the stream produced
        actual: usize,
    },

    /// Input is too large for the 24-bit size field
    #[error("input of {0} bytes exceeds the RefPack size limit")]
    TooLarge(usize),
}
