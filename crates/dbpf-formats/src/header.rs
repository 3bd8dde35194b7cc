//! Package header (96 bytes, little-endian)

use crate::index::{IndexError, IndexResult};
use binrw::io::Cursor;
use binrw::{BinRead, BinWrite};

/// Size of the on-disk header
pub const HEADER_SIZE: usize = 96;

/// Index major version written by every known producer
pub const INDEX_MAJOR_VERSION: u32 = 7;

/// Index minor version from which records carry a resource sub-ID
pub const INDEX_MINOR_WITH_RESOURCE_ID: u32 = 2;

/// Package file header
///
/// The hole fields describe a free-space table ("extension block"). It is
/// parsed and reported but never written: rewrites pack resources
/// contiguously, so the hole fields are zeroed.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little, magic = b"DBPF")]
pub struct PackageHeader {
    /// Format major version (must be 1)
    pub major_version: u32,
    /// Format minor version
    pub minor_version: u32,
    /// Producer-defined major version
    pub user_major_version: u32,
    /// Producer-defined minor version
    pub user_minor_version: u32,
    /// Producer-defined flags
    pub flags: u32,
    /// Creation timestamp
    pub created: u32,
    /// Modification timestamp
    pub modified: u32,
    /// Index major version (7)
    pub index_major_version: u32,
    /// Number of index records
    pub index_entry_count: u32,
    /// Absolute offset of the index
    pub index_offset: u32,
    /// Byte size of the index
    pub index_size: u32,
    /// Number of hole records
    pub hole_count: u32,
    /// Absolute offset of the hole table
    pub hole_offset: u32,
    /// Byte size of the hole table
    pub hole_size: u32,
    /// Index minor version; 2 and above add a resource sub-ID column
    pub index_minor_version: u32,
    /// Reserved, preserved verbatim
    pub reserved: [u8; 32],
}

impl Default for PackageHeader {
    fn default() -> Self {
        Self {
            major_version: 1,
            minor_version: 1,
            user_major_version: 0,
            user_minor_version: 0,
            flags: 0,
            created: 0,
            modified: 0,
            index_major_version: INDEX_MAJOR_VERSION,
            index_entry_count: 0,
            index_offset: HEADER_SIZE as u32,
            index_size: 0,
            hole_count: 0,
            hole_offset: 0,
            hole_size: 0,
            index_minor_version: INDEX_MINOR_WITH_RESOURCE_ID,
            reserved: [0; 32],
        }
    }
}

impl PackageHeader {
    /// Parse and validate a header from the start of a package
    pub fn parse(data: &[u8]) -> IndexResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(IndexError::Truncated {
                what: "header",
                wanted: HEADER_SIZE,
                available: data.len(),
            });
        }
        if &data[..4] != b"DBPF" {
            let mut magic = [0u8; 4];
            magic.copy_from_slice(&data[..4]);
            return Err(IndexError::InvalidMagic(magic));
        }
        let header = Self::read(&mut Cursor::new(&data[..HEADER_SIZE]))?;
        header.validate()?;
        Ok(header)
    }

    /// Reject versions this engine cannot lay out
    pub fn validate(&self) -> IndexResult<()> {
        if self.major_version != 1 {
            return Err(IndexError::UnsupportedVersion {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        Ok(())
    }

    /// Serialize to exactly [`HEADER_SIZE`] bytes
    pub fn to_bytes(&self) -> IndexResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_SIZE));
        self.write(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Whether index records carry the resource sub-ID column
    pub const fn has_resource_ids(&self) -> bool {
        self.index_minor_version >= INDEX_MINOR_WITH_RESOURCE_ID
    }

    /// Size of one index record for this header
    pub const fn index_record_size(&self) -> usize {
        if self.has_resource_ids() { 24 } else { 20 }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_header_layout() {
        let header = PackageHeader {
            index_entry_count: 3,
            index_size: 72,
            ..PackageHeader::default()
        };
        let bytes = header.to_bytes().expect("Test operation should succeed");
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(&bytes[..4], b"DBPF");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());
        assert_eq!(&bytes[32..36], &7u32.to_le_bytes());
        assert_eq!(&bytes[36..40], &3u32.to_le_bytes());
        assert_eq!(&bytes[40..44], &96u32.to_le_bytes());
        assert_eq!(&bytes[60..64], &2u32.to_le_bytes());

        assert_eq!(PackageHeader::parse(&bytes).expect("Test operation should succeed"), header);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = PackageHeader::default().to_bytes().expect("Test operation should succeed");
        bytes[..4].copy_from_slice(b"DBPX");
        assert!(matches!(
            PackageHeader::parse(&bytes),
            Err(IndexError::InvalidMagic(m)) if &m == b"DBPX"
        ));
    }

    #[test]
    fn test_unsupported_major_version() {
        let header = PackageHeader {
            major_version: 2,
            ..PackageHeader::default()
        };
        let bytes = header.to_bytes().expect("Test operation should succeed");
        assert!(matches!(
            PackageHeader::parse(&bytes),
            Err(IndexError::UnsupportedVersion { major: 2, .. })
        ));
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            PackageHeader::parse(b"DBPF\x01\x00"),
            Err(IndexError::Truncated { .. })
        ));
    }

    #[test]
    fn test_record_size_follows_index_minor_version() {
        let mut header = PackageHeader::default();
        assert_eq!(header.index_record_size(), 24);
        header.index_minor_version = 1;
        assert!(!header.has_resource_ids());
        assert_eq!(header.index_record_size(), 20);
    }
}
