//! RefPack (QFS) compression used for package resources
//!
//! A compressed resource is stored as a 9-byte header followed by an LZ77
//! token stream:
//!
//! ```text
//! offset  size  field
//! 0       4     stored size of the whole payload, little-endian
//! 4       2     signature 0x10 0xFB
//! 6       3     decompressed size, big-endian
//! 9       ...   tokens
//! ```
//!
//! Tokens mix literal runs with back-references. Each copy command can
//! carry up to three literal bytes ahead of the copy itself:
//!
//! | first byte  | length | literals        | copy length | offset range |
//! |-------------|--------|-----------------|-------------|--------------|
//! | `0x00-0x7F` | 2      | `b0 & 3`        | 3-10        | 1-1024       |
//! | `0x80-0xBF` | 3      | `b1 >> 6`       | 4-67        | 1-16384      |
//! | `0xC0-0xDF` | 4      | `b0 & 3`        | 5-1028      | 1-131072     |
//! | `0xE0-0xFB` | 1      | 4-112           | -           | -            |
//! | `0xFC-0xFF` | 1      | `b0 & 3`, stop  | -           | -            |
//!
//! Packages carry a directory resource listing which entries are
//! compressed. Some producers omit it, so [`is_probably_compressed`] offers
//! an advisory check on the first nine payload bytes.

mod compress;
mod decompress;
mod error;

pub use compress::compress;
pub use decompress::decompress;
pub use error::{RefPackError, RefPackResult};

use crate::cursor::ByteReader;
use binrw::Endian;

/// Signature bytes following the stored-size field
pub const REFPACK_MAGIC: [u8; 2] = [0x10, 0xFB];

/// Size of the stream header preceding the tokens
pub const REFPACK_HEADER_SIZE: usize = 9;

/// Largest decompressed size the 24-bit field can describe
pub const MAX_UNCOMPRESSED_SIZE: usize = 0x00FF_FFFF;

/// Parsed RefPack stream header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefPackHeader {
    /// Stored size of the compressed payload, header included
    pub compressed_size: u32,
    /// Decompressed size declared by the stream
    pub uncompressed_size: u32,
}

impl RefPackHeader {
    /// Parse the header from the first nine bytes of a payload
    pub fn parse(head: &[u8]) -> RefPackResult<Self> {
        let mut reader = ByteReader::new(head);
        let short = |_| RefPackError::InvalidHeader(format!("need 9 bytes, got {}", head.len()));
        let compressed_size = reader.read_u32(Endian::Little).map_err(short)?;
        let magic = reader.read_bytes(2).map_err(short)?;
        if magic != REFPACK_MAGIC {
            return Err(RefPackError::InvalidHeader(format!(
                "signature {magic:02X?} is not {REFPACK_MAGIC:02X?}"
            )));
        }
        let uncompressed_size = reader.read_u24(Endian::Big).map_err(short)?;
        Ok(Self {
            compressed_size,
            uncompressed_size,
        })
    }
}

/// Guess whether a payload recorded as uncompressed actually holds a
/// RefPack stream.
///
/// True when the first four bytes repeat the entry's stored size, the
/// signature follows, and the declared decompressed size is larger than
/// the token area. Callers must still fall back to the raw bytes when
/// decompression fails.
pub fn is_probably_compressed(stored_size: u32, head: &[u8]) -> bool {
    if (stored_size as usize) <= REFPACK_HEADER_SIZE {
        return false;
    }
    match RefPackHeader::parse(head) {
        Ok(header) => {
            header.compressed_size == stored_size
                && header.uncompressed_size > stored_size - REFPACK_HEADER_SIZE as u32
        }
        Err(_) => false,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn head(stored: u32, magic: [u8; 2], declared: u32) -> Vec<u8> {
        let mut out = stored.to_le_bytes().to_vec();
        out.extend_from_slice(&magic);
        out.extend_from_slice(&declared.to_be_bytes()[1..]);
        out
    }

    #[test]
    fn test_header_parse() {
        let header = RefPackHeader::parse(&head(40, REFPACK_MAGIC, 0x012345))
            .expect("Test operation should succeed");
        assert_eq!(header.compressed_size, 40);
        assert_eq!(header.uncompressed_size, 0x012345);
    }

    #[test]
    fn test_header_rejects_bad_signature() {
        assert!(matches!(
            RefPackHeader::parse(&head(40, [0x10, 0xFA], 100)),
            Err(RefPackError::InvalidHeader(_))
        ));
        assert!(RefPackHeader::parse(&[0x28, 0, 0]).is_err());
    }

    #[test]
    fn test_heuristic_accepts_plausible_stream() {
        assert!(is_probably_compressed(40, &head(40, REFPACK_MAGIC, 200)));
    }

    #[test]
    fn test_heuristic_rejects_mismatches() {
        // Stored size does not match
        assert!(!is_probably_compressed(41, &head(40, REFPACK_MAGIC, 200)));
        // Declared size too small to be worth compressing
        assert!(!is_probably_compressed(40, &head(40, REFPACK_MAGIC, 31)));
        // Wrong signature
        assert!(!is_probably_compressed(40, &head(40, [0xFB, 0x10], 200)));
        // Too small to hold a header and any tokens
        assert!(!is_probably_compressed(9, &head(9, REFPACK_MAGIC, 200)));
    }
}
