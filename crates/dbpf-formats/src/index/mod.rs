//! Resource index
//!
//! The index is an ordered list of fixed-size records, one per resource:
//!
//! ```text
//! type_id u32 | group_id u32 | instance_id u32 | [resource_id u32] | offset u32 | stored_size u32
//! ```
//!
//! The resource sub-ID column is present when the header's index minor
//! version is 2 or above. Decompressed sizes come from the
//! [compression directory](directory) and are attached after parsing.
//!
//! Order is significant: a rewrite emits resources in index order, so an
//! untouched package round-trips byte for byte. Added and replaced entries
//! move to the end.

mod directory;
mod entry;
mod error;

pub use directory::{
    CompressionDirectory, DIRECTORY_GROUP_ID, DIRECTORY_INSTANCE_ID, DIRECTORY_KEY,
    DIRECTORY_TYPE_ID, DirectoryRecord, is_directory_key,
};
pub use entry::{EntryFlags, ResourceEntry, SizeInfo};
pub use error::{IndexError, IndexResult};

use crate::cursor::{ByteReader, ByteWriter};
use crate::header::PackageHeader;
use crate::key::ResourceKey;
use binrw::Endian;
use std::collections::HashMap;
use tracing::debug;

/// Ordered resource index with key and identity-hash lookups
#[derive(Debug, Clone, Default)]
pub struct ResourceIndex {
    entries: Vec<ResourceEntry>,
    positions: HashMap<ResourceKey, usize>,
    hashes: HashMap<u64, ResourceKey>,
    removed: Vec<ResourceEntry>,
    dirty: bool,
}

impl ResourceIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `header.index_entry_count` records from the index block.
    ///
    /// `data` holds exactly the bytes at `header.index_offset`. A key that
    /// appears twice is a hard error.
    pub fn parse(data: &[u8], header: &PackageHeader) -> IndexResult<Self> {
        let record_size = header.index_record_size();
        let count = header.index_entry_count as usize;
        let needed = count * record_size;
        if (header.index_size as usize) < needed {
            return Err(IndexError::SizeMismatch {
                size: header.index_size,
                count: header.index_entry_count,
                record_size,
            });
        }
        if data.len() < needed {
            return Err(IndexError::Truncated {
                what: "index",
                wanted: needed,
                available: data.len(),
            });
        }

        let with_ids = header.has_resource_ids();
        let mut reader = ByteReader::new(&data[..needed]);
        let mut index = Self {
            entries: Vec::with_capacity(count),
            positions: HashMap::with_capacity(count),
            hashes: HashMap::with_capacity(count),
            ..Self::default()
        };
        let truncated = |_| IndexError::Truncated {
            what: "index record",
            wanted: record_size,
            available: 0,
        };

        for _ in 0..count {
            let type_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let group_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let instance_id = reader.read_u32(Endian::Little).map_err(truncated)?;
            let resource_id = if with_ids {
                reader.read_u32(Endian::Little).map_err(truncated)?
            } else {
                0
            };
            let offset = reader.read_u32(Endian::Little).map_err(truncated)?;
            let stored_size = reader.read_u32(Endian::Little).map_err(truncated)?;

            let key = ResourceKey::new(type_id, group_id, instance_id, resource_id);
            if index.positions.contains_key(&key) {
                return Err(IndexError::DuplicateKey(key));
            }
            index.positions.insert(key, index.entries.len());
            index.hashes.insert(key.tgir_hash(), key);
            index.entries.push(ResourceEntry::new(
                key,
                SizeInfo {
                    file_offset: u64::from(offset),
                    stored_size,
                    uncompressed_size: 0,
                },
            ));
        }

        debug!("Parsed {} index entries ({} bytes each)", count, record_size);
        Ok(index)
    }

    /// Attach decompressed sizes from a compression directory.
    ///
    /// Directory records for keys not in the index are ignored. Does not
    /// mark the index dirty.
    pub fn apply_directory(&mut self, directory: &CompressionDirectory) -> usize {
        let mut applied = 0;
        for record in &directory.records {
            if let Some(&pos) = self.positions.get(&record.key) {
                self.entries[pos].uncompressed_size = record.uncompressed_size;
                applied += 1;
            }
        }
        applied
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Live entries in index order
    pub fn entries(&self) -> &[ResourceEntry] {
        &self.entries
    }

    /// Entries removed since the last clean mark
    pub fn removed_entries(&self) -> &[ResourceEntry] {
        &self.removed
    }

    /// Find the entry for `key`
    pub fn lookup(&self, key: &ResourceKey) -> Option<&ResourceEntry> {
        self.positions.get(key).map(|&pos| &self.entries[pos])
    }

    /// Find an entry by its identity hash
    pub fn lookup_by_hash(&self, hash: u64) -> Option<&ResourceEntry> {
        self.hashes.get(&hash).and_then(|key| self.lookup(key))
    }

    /// Whether `key` has a live entry
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.positions.contains_key(key)
    }

    /// The compression directory entry, whatever its resource sub-ID
    pub fn directory_entry(&self) -> Option<&ResourceEntry> {
        self.entries
            .iter()
            .find(|entry| is_directory_key(&entry.key))
    }

    /// Entries of one type, in index order
    pub fn entries_of_type(&self, type_id: u32) -> Vec<&ResourceEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.key.type_id == type_id)
            .collect()
    }

    /// Insert or replace the entry for `key`.
    ///
    /// A replaced entry leaves its old position and is appended, the same
    /// as a new one. Marks the index dirty.
    pub fn upsert(&mut self, key: ResourceKey, info: SizeInfo) -> &ResourceEntry {
        if let Some(pos) = self.positions.remove(&key) {
            self.entries.remove(pos);
            self.reindex_from(pos);
        }
        let mut entry = ResourceEntry::new(key, info);
        entry.flags.new = true;
        self.positions.insert(key, self.entries.len());
        self.hashes.insert(key.tgir_hash(), key);
        self.entries.push(entry);
        self.dirty = true;
        &self.entries[self.entries.len() - 1]
    }

    /// Remove the entry for `key`, returning whether one existed
    pub fn remove(&mut self, key: &ResourceKey) -> bool {
        let Some(pos) = self.positions.remove(key) else {
            return false;
        };
        let mut entry = self.entries.remove(pos);
        self.reindex_from(pos);
        self.hashes.remove(&key.tgir_hash());
        entry.flags.removed = true;
        self.removed.push(entry);
        self.dirty = true;
        true
    }

    /// Update the decompressed size of an existing entry without moving it
    pub fn set_uncompressed_size(&mut self, key: &ResourceKey, size: u32) -> bool {
        match self.positions.get(key) {
            Some(&pos) => {
                if self.entries[pos].uncompressed_size != size {
                    self.entries[pos].uncompressed_size = size;
                    self.dirty = true;
                }
                true
            }
            None => false,
        }
    }

    /// Record where a rewrite placed an entry. Does not change dirtiness.
    pub fn relocate(&mut self, key: &ResourceKey, file_offset: u64, stored_size: u32) -> bool {
        match self.positions.get(key) {
            Some(&pos) => {
                self.entries[pos].file_offset = file_offset;
                self.entries[pos].stored_size = stored_size;
                true
            }
            None => false,
        }
    }

    /// Whether entries were added, removed or replaced since the last clean mark
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget pending changes
    pub fn mark_clean(&mut self) {
        self.dirty = false;
        self.removed.clear();
        for entry in &mut self.entries {
            entry.flags = EntryFlags::default();
        }
    }

    /// Byte size of the serialized index
    pub fn serialized_size(&self, with_resource_ids: bool) -> usize {
        self.entries.len() * if with_resource_ids { 24 } else { 20 }
    }

    /// Write every entry in current order
    pub fn serialize(&self, writer: &mut ByteWriter, with_resource_ids: bool) -> IndexResult<()> {
        for entry in &self.entries {
            let offset = u32::try_from(entry.file_offset).map_err(|_| IndexError::OffsetOverflow {
                key: entry.key,
                offset: entry.file_offset,
            })?;
            writer.write_u32(entry.key.type_id, Endian::Little);
            writer.write_u32(entry.key.group_id, Endian::Little);
            writer.write_u32(entry.key.instance_id, Endian::Little);
            if with_resource_ids {
                writer.write_u32(entry.key.resource_id, Endian::Little);
            }
            writer.write_u32(offset, Endian::Little);
            writer.write_u32(entry.stored_size, Endian::Little);
        }
        Ok(())
    }

    fn reindex_from(&mut self, start: usize) {
        for (pos, entry) in self.entries.iter().enumerate().skip(start) {
            self.positions.insert(entry.key, pos);
        }
    }
}
