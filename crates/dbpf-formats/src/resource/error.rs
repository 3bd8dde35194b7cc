//! Error types for resource codecs

use crate::cursor::CursorError;
use thiserror::Error;

/// Resource codec result type
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Errors raised while decoding, encoding or editing one resource.
///
/// None of these affect the package as a whole: a scanner can report the
/// failing resource and move on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResourceError {
    /// The codec ran off the end of the resource's bytes
    #[error("truncated resource data: {0}")]
    Truncated(#[from] CursorError),

    /// A version field names a layout this codec does not know
    #[error("unknown {format} format version 0x{version:04X}")]
    UnknownFormatVersion {
        /// Resource format being decoded
        format: &'static str,
        /// Version found
        version: u32,
    },

    /// A setter was called on an item of a different type
    #[error("type mismatch on item {item:?}: item holds {actual}, setter expects {expected}")]
    TypeMismatch {
        /// Item name
        item: String,
        /// Type the setter writes
        expected: &'static str,
        /// Type the item holds
        actual: &'static str,
    },

    /// Structurally invalid content
    #[error("malformed resource: {0}")]
    Malformed(String),

    /// The embedded text document could not be parsed
    #[error("invalid property-set document: {0}")]
    Xml(String),

    /// Named item or field does not exist
    #[error("no such item: {0}")]
    NotFound(String),
}
