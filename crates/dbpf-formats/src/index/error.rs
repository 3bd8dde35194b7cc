//! Error types for header and index parsing

use crate::key::ResourceKey;
use thiserror::Error;

/// Index operation result type
pub type IndexResult<T> = Result<T, IndexError>;

/// Structural errors in the package header or resource index.
///
/// Every variant means the package itself cannot be opened.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Signature is not `DBPF`
    #[error("invalid package magic: expected [44 42 50 46], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Header version this engine cannot lay out
    #[error("unsupported package version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found
        major: u32,
        /// Minor version found
        minor: u32,
    },

    /// The same key appears twice in the index
    #[error("duplicate index entry for {0}")]
    DuplicateKey(ResourceKey),

    /// A structure ran past the bytes available for it
    #[error("truncated {what}: wanted {wanted} bytes, {available} available")]
    Truncated {
        /// Structure being read
        what: &'static str,
        /// Number of bytes needed
        wanted: usize,
        /// Number of bytes present
        available: usize,
    },

    /// The index size field disagrees with its record count
    #[error("index size {size} cannot hold {count} records of {record_size} bytes")]
    SizeMismatch {
        /// Declared index size
        size: u32,
        /// Declared record count
        count: u32,
        /// Record size for this index version
        record_size: usize,
    },

    /// A resource offset does not fit the 32-bit index field
    #[error("offset {offset} of {key} does not fit a 32-bit index record")]
    OffsetOverflow {
        /// Resource whose offset overflowed
        key: ResourceKey,
        /// Offending offset
        offset: u64,
    },

    /// Binary read/write error
    #[error("binary format error: {0}")]
    BinRw(#[from] binrw::Error),
}
