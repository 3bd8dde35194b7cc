//! Archive error types

use dbpf_formats::refpack::RefPackError;
use dbpf_formats::{IndexError, ResourceError, ResourceKey};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening, reading or rewriting an archive
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Header or index could not be parsed; the archive cannot be opened
    #[error("index error: {0}")]
    Index(#[from] IndexError),

    /// One resource failed to decode
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Compression failed while staging bytes
    #[error("compression error: {0}")]
    RefPack(#[from] RefPackError),

    /// Encoded payload length disagrees with the size recorded for it
    #[error("size consistency violated for {key}: recorded {recorded} bytes, encoded {actual}")]
    SizeConsistency {
        /// Resource being written
        key: ResourceKey,
        /// Size the index records
        recorded: usize,
        /// Bytes actually produced
        actual: usize,
    },

    /// Replacing the archive file failed, usually because another process holds it
    #[error("cannot replace {path}: {source}")]
    FileLocked {
        /// File that could not be replaced
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// No entry for the key
    #[error("resource {0} not found")]
    NotFound(ResourceKey),

    /// Payload larger than a 32-bit size field can record
    #[error("resource {key} is {size} bytes, larger than a package can store")]
    TooLarge {
        /// Resource being staged
        key: ResourceKey,
        /// Its size in bytes
        size: usize,
    },

    /// The archive was closed
    #[error("archive is closed")]
    Closed,

    /// The archive has no file path to update
    #[error("archive is not bound to a file")]
    NoPath,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl ArchiveError {
    /// Whether the failure is confined to a single resource
    ///
    /// Scanners can log these and move on to the next resource.
    pub const fn is_resource_local(&self) -> bool {
        matches!(
            self,
            Self::Resource(
                ResourceError::Truncated(_)
                    | ResourceError::UnknownFormatVersion { .. }
                    | ResourceError::Malformed(_)
                    | ResourceError::Xml(_)
            )
        )
    }
}

/// Result type for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_local_classification() {
        let local = ArchiveError::from(ResourceError::Malformed("bad".to_string()));
        assert!(local.is_resource_local());

        let mismatch = ArchiveError::from(ResourceError::TypeMismatch {
            item: "cost".to_string(),
            expected: "uint32",
            actual: "string",
        });
        assert!(!mismatch.is_resource_local());
        assert!(!ArchiveError::Closed.is_resource_local());
    }

    #[test]
    fn test_size_consistency_message() {
        let err = ArchiveError::SizeConsistency {
            key: ResourceKey::new(1, 2, 3, 4),
            recorded: 10,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "size consistency violated for 00000001-00000002-00000003-00000004: recorded 10 bytes, encoded 12"
        );
    }
}
