//! Index records

use crate::key::ResourceKey;
use serde::{Deserialize, Serialize};

/// Location and size information for one resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeInfo {
    /// Absolute offset of the stored bytes
    pub file_offset: u64,
    /// Number of bytes stored in the package
    pub stored_size: u32,
    /// Decompressed size, or 0 when stored uncompressed
    pub uncompressed_size: u32,
}

/// Transient entry state, never written to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryFlags {
    /// Added or replaced since the index was last marked clean
    pub new: bool,
    /// Removed from the index
    pub removed: bool,
}

/// One resource index record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// Resource identity
    pub key: ResourceKey,
    /// Absolute offset of the stored bytes
    pub file_offset: u64,
    /// Number of bytes stored in the package
    pub stored_size: u32,
    /// Decompressed size, or 0 when stored uncompressed
    pub uncompressed_size: u32,
    /// Transient state
    #[serde(skip)]
    pub flags: EntryFlags,
}

impl ResourceEntry {
    /// Create an entry from a key and its size information
    pub const fn new(key: ResourceKey, info: SizeInfo) -> Self {
        Self {
            key,
            file_offset: info.file_offset,
            stored_size: info.stored_size,
            uncompressed_size: info.uncompressed_size,
            flags: EntryFlags {
                new: false,
                removed: false,
            },
        }
    }

    /// Resource type identifier
    pub const fn type_id(&self) -> u32 {
        self.key.type_id
    }

    /// Whether the compression directory flags this entry as compressed
    pub const fn is_compressed(&self) -> bool {
        self.uncompressed_size != 0
    }

    /// Size of the resource once decompressed
    pub const fn logical_size(&self) -> u32 {
        if self.is_compressed() {
            self.uncompressed_size
        } else {
            self.stored_size
        }
    }

    /// Current size information
    pub const fn size_info(&self) -> SizeInfo {
        SizeInfo {
            file_offset: self.file_offset,
            stored_size: self.stored_size,
            uncompressed_size: self.uncompressed_size,
        }
    }
}
