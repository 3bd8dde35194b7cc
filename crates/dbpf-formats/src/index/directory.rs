//! Compression directory resource
//!
//! Index records hold only the stored size. The decompressed size of every
//! compressed resource lives in a separate resource (`CLST`) with one record
//! per compressed entry:
//!
//! ```text
//! type_id u32 | group_id u32 | instance_id u32 | [resource_id u32] | uncompressed_size u32
//! ```
//!
//! The resource sub-ID column follows the same rule as the index records.

use super::entry::ResourceEntry;
use super::error::{IndexError, IndexResult};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use binrw::Endian;

/// Type identifier of the compression directory
pub const DIRECTORY_TYPE_ID: u32 = 0xE86B1EEF;
/// Group identifier of the compression directory
pub const DIRECTORY_GROUP_ID: u32 = 0xE86B1EEF;
/// Instance identifier of the compression directory
pub const DIRECTORY_INSTANCE_ID: u32 = 0x286B1F03;

/// Key of the compression directory resource
pub const DIRECTORY_KEY: ResourceKey = ResourceKey::new(
    DIRECTORY_TYPE_ID,
    DIRECTORY_GROUP_ID,
    DIRECTORY_INSTANCE_ID,
    0,
);

/// Whether `key` names the compression directory
pub const fn is_directory_key(key: &ResourceKey) -> bool {
    key.type_id == DIRECTORY_TYPE_ID
        && key.group_id == DIRECTORY_GROUP_ID
        && key.instance_id == DIRECTORY_INSTANCE_ID
}

/// One directory record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Compressed resource
    pub key: ResourceKey,
    /// Its decompressed size
    pub uncompressed_size: u32,
}

/// Parsed compression directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionDirectory {
    /// Records in stored order
    pub records: Vec<DirectoryRecord>,
}

impl CompressionDirectory {
    /// Size of one record
    pub const fn record_size(with_resource_ids: bool) -> usize {
        if with_resource_ids { 20 } else { 16 }
    }

    /// Parse directory bytes
    pub fn parse(data: &[u8], with_resource_ids: bool) -> IndexResult<Self> {
        let record_size = Self::record_size(with_resource_ids);
        if data.len() % record_size != 0 {
            return Err(IndexError::Truncated {
                what: "compression directory",
                wanted: data.len().div_ceil(record_size) * record_size,
                available: data.len(),
            });
        }

        let mut reader = ByteReader::new(data);
        let mut records = Vec::with_capacity(data.len() / record_size);
        let truncated = |_| IndexError::Truncated {
            what: "compression directory",
            wanted: record_size,
            available: 0,
        };
        while !reader.is_at_end() {
            let type_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let group_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let instance_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let resource_id = if with_resource_ids {
                reader.read_u32(Endian::Little).map_err(truncated)?
            } else {
                0
            };
            let uncompressed_size = reader.read_u32(Endian::Little).map_err(truncated)?;
            records.push(DirectoryRecord {
                key: ResourceKey::new(type_id, group_id, instance_id, resource_id),
                uncompressed_size,
            });
        }
        Ok(Self { records })
    }

    /// Build a directory listing every compressed entry
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a ResourceEntry>) -> Self {
        let records = entries
            .into_iter()
            .filter(|entry| entry.is_compressed() && !is_directory_key(&entry.key))
            .map(|entry| DirectoryRecord {
                key: entry.key,
                uncompressed_size: entry.uncompressed_size,
            })
            .collect();
        Self { records }
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the directory lists nothing
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the directory
    pub fn to_bytes(&self, with_resource_ids: bool) -> Vec<u8> {
        let mut writer =
            ByteWriter::with_capacity(self.records.len() * Self::record_size(with_resource_ids));
        for record in &self.records {
            writer.write_u32(record.key.type_id, Endian::Little);
            writer.write_u32(record.key.group_id, Endian::Little);
            writer.write_u32(record.key.instance_id, Endian::Little);
            if with_resource_ids {
                writer.write_u32(record.key.resource_id, Endian::Little);
            }
            writer.write_u32(record.uncompressed_size, Endian::Little);
        }
        writer.into_inner()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::index::SizeInfo;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_entries_lists_compressed_only() {
        let compressed = ResourceEntry::new(
            ResourceKey::new(1, 2, 3, 4),
            SizeInfo {
                file_offset: 96,
                stored_size: 40,
                uncompressed_size: 400,
            },
        );
        let plain = ResourceEntry::new(
            ResourceKey::new(5, 6, 7, 0),
            SizeInfo {
                file_offset: 136,
                stored_size: 10,
                uncompressed_size: 0,
            },
        );
        let directory = CompressionDirectory::from_entries([&compressed, &plain]);
        assert_eq!(directory.len(), 1);

        let bytes = directory.to_bytes(true);
        assert_eq!(bytes.len(), 20);
        assert_eq!(
            CompressionDirectory::parse(&bytes, true).expect("Test operation should succeed"),
            directory
        );
    }

    #[test]
    fn test_sixteen_byte_records() {
        let mut bytes = Vec::new();
        for v in [1u32, 2, 3, 500] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let directory =
            CompressionDirectory::parse(&bytes, false).expect("Test operation should succeed");
        assert_eq!(directory.records[0].key, ResourceKey::new(1, 2, 3, 0));
        assert_eq!(directory.records[0].uncompressed_size, 500);
    }

    #[test]
    fn test_ragged_directory_is_rejected() {
        assert!(CompressionDirectory::parse(&[0u8; 21], true).is_err());
    }
}
