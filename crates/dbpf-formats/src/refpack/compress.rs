//! Greedy RefPack encoder

use super::error::{RefPackError, RefPackResult};
use super::{MAX_UNCOMPRESSED_SIZE, REFPACK_MAGIC};
use crate::cursor::ByteWriter;
use binrw::Endian;

const HASH_BITS: u32 = 16;
const MAX_CHAIN: usize = 48;
const MAX_DISTANCE: usize = 131_072;
const MAX_COPY: usize = 1028;
const MAX_LITERAL_RUN: usize = 112;
const NONE: usize = usize::MAX;

/// Compress `input` into a RefPack payload, header included.
///
/// The stored-size field at the start of the output matches the returned
/// length, so the result can be written to a package as-is.
pub fn compress(input: &[u8]) -> RefPackResult<Vec<u8>> {
    if input.len() > MAX_UNCOMPRESSED_SIZE {
        return Err(RefPackError::TooLarge(input.len()));
    }

    let mut out = ByteWriter::with_capacity(input.len() / 2 + 16);
    out.write_u32(0, Endian::Little);
    out.write_bytes(&REFPACK_MAGIC);
    out.write_u24(input.len() as u32, Endian::Big);

    let mut matcher = Matcher::new(input);
    let mut literal_start = 0;
    let mut pos = 0;

    while pos < input.len() {
        match matcher.find(pos) {
            Some((len, distance)) => {
                emit_literal_runs(&mut out, input, &mut literal_start, pos);
                emit_copy(&mut out, &input[literal_start..pos], len, distance - 1);
                for p in pos..pos + len {
                    matcher.insert(p);
                }
                pos += len;
                literal_start = pos;
            }
            None => {
                matcher.insert(pos);
                pos += 1;
            }
        }
    }

    emit_literal_runs(&mut out, input, &mut literal_start, input.len());
    let trailing = &input[literal_start..];
    out.write_u8(0xFC | trailing.len() as u8);
    out.write_bytes(trailing);

    let mut bytes = out.into_inner();
    let total = bytes.len() as u32;
    bytes[..4].copy_from_slice(&total.to_le_bytes());
    Ok(bytes)
}

/// Flush whole four-byte literal groups, leaving 0..=3 bytes pending
fn emit_literal_runs(out: &mut ByteWriter, input: &[u8], start: &mut usize, end: usize) {
    while end - *start >= 4 {
        let run = (end - *start).min(MAX_LITERAL_RUN) & !3;
        out.write_u8(0xE0 | ((run >> 2) - 1) as u8);
        out.write_bytes(&input[*start..*start + run]);
        *start += run;
    }
}

fn emit_copy(out: &mut ByteWriter, literals: &[u8], len: usize, offset: usize) {
    let plain = literals.len();
    if len <= 10 && offset < 1024 {
        out.write_u8((((offset >> 3) & 0x60) | ((len - 3) << 2) | plain) as u8);
        out.write_u8((offset & 0xFF) as u8);
    } else if len <= 67 && offset < 16384 {
        out.write_u8((0x80 | (len - 4)) as u8);
        out.write_u8(((plain << 6) | (offset >> 8)) as u8);
        out.write_u8((offset & 0xFF) as u8);
    } else {
        out.write_u8(
            (0xC0 | ((offset >> 12) & 0x10) | (((len - 5) >> 6) & 0x0C) | plain) as u8,
        );
        out.write_u8(((offset >> 8) & 0xFF) as u8);
        out.write_u8((offset & 0xFF) as u8);
        out.write_u8(((len - 5) & 0xFF) as u8);
    }
    out.write_bytes(literals);
}

/// Whether some command form can express a copy of `len` at `offset`
const fn encodable(len: usize, offset: usize) -> bool {
    (len >= 3 && len <= 10 && offset < 1024)
        || (len >= 4 && len <= 67 && offset < 16384)
        || (len >= 5 && len <= MAX_COPY && offset < MAX_DISTANCE)
}

/// Hash-chain match finder over three-byte prefixes
struct Matcher<'a> {
    input: &'a [u8],
    head: Vec<usize>,
    prev: Vec<usize>,
}

impl<'a> Matcher<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            head: vec![NONE; 1 << HASH_BITS],
            prev: vec![NONE; input.len()],
        }
    }

    fn hash(&self, pos: usize) -> Option<usize> {
        let bytes = self.input.get(pos..pos + 3)?;
        let key = u32::from(bytes[0]) << 16 | u32::from(bytes[1]) << 8 | u32::from(bytes[2]);
        Some((key.wrapping_mul(2_654_435_761) >> (32 - HASH_BITS)) as usize)
    }

    fn insert(&mut self, pos: usize) {
        if let Some(h) = self.hash(pos) {
            self.prev[pos] = self.head[h];
            self.head[h] = pos;
        }
    }

    /// Longest encodable match for `pos`, as (length, distance)
    fn find(&self, pos: usize) -> Option<(usize, usize)> {
        let h = self.hash(pos)?;
        let limit = (self.input.len() - pos).min(MAX_COPY);
        let mut best: Option<(usize, usize)> = None;
        let mut candidate = self.head[h];
        let mut depth = 0;

        while candidate != NONE && depth < MAX_CHAIN {
            let distance = pos - candidate;
            if distance > MAX_DISTANCE {
                break;
            }
            let len = self.input[candidate..]
                .iter()
                .zip(&self.input[pos..pos + limit])
                .take_while(|(a, b)| a == b)
                .count();
            if encodable(len, distance - 1) && best.is_none_or(|(best_len, _)| len > best_len) {
                best = Some((len, distance));
                if len == limit {
                    break;
                }
            }
            candidate = self.prev[candidate];
            depth += 1;
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::super::{RefPackHeader, decompress};
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_empty_input() {
        let packed = compress(&[]).expect("Test operation should succeed");
        assert_eq!(packed, vec![10, 0, 0, 0, 0x10, 0xFB, 0, 0, 0, 0xFC]);
        assert!(decompress(&packed, 0).expect("Test operation should succeed").is_empty());
    }

    #[test]
    fn test_repetitive_input_shrinks() {
        let input: Vec<u8> = b"Sofa-".iter().copied().cycle().take(4000).collect();
        let packed = compress(&input).expect("Test operation should succeed");
        assert!(packed.len() < input.len() / 10);

        let header = RefPackHeader::parse(&packed).expect("Test operation should succeed");
        assert_eq!(header.compressed_size as usize, packed.len());
        assert_eq!(header.uncompressed_size as usize, input.len());
        assert_eq!(decompress(&packed, 4000).expect("Test operation should succeed"), input);
    }

    #[test]
    fn test_long_distance_copy() {
        let mut input: Vec<u8> = (0..20_000u32).map(|i| (i.wrapping_mul(7919) >> 3) as u8).collect();
        let prefix = input[..2000].to_vec();
        input.extend_from_slice(&prefix);
        let packed = compress(&input).expect("Test operation should succeed");
        assert_eq!(
            decompress(&packed, input.len() as u32).expect("Test operation should succeed"),
            input
        );
    }

    #[test]
    fn test_too_large() {
        let input = vec![0u8; MAX_UNCOMPRESSED_SIZE + 1];
        assert_eq!(
            compress(&input),
            Err(RefPackError::TooLarge(MAX_UNCOMPRESSED_SIZE + 1))
        );
    }

    proptest! {
        #[test]
        fn prop_decompress_inverts_compress(input in proptest::collection::vec(0u8..6, 0..3000)) {
            let packed = compress(&input).unwrap();
            prop_assert_eq!(decompress(&packed, input.len() as u32).unwrap(), input);
        }
    }
}
