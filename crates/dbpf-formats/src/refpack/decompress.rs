//! RefPack token stream decoder

use super::error::{RefPackError, RefPackResult};
use super::{REFPACK_HEADER_SIZE, RefPackHeader};

/// Decompress a RefPack payload (header included) into exactly
/// `declared_size` bytes.
///
/// Every literal run and back-reference is bounds-checked against both the
/// input and the declared output size; a stream that would overrun either
/// fails with [`RefPackError::CorruptStream`].
pub fn decompress(data: &[u8], declared_size: u32) -> RefPackResult<Vec<u8>> {
    let header = RefPackHeader::parse(data)?;
    if header.uncompressed_size != declared_size {
        return Err(RefPackError::SizeMismatch {
            expected: declared_size as usize,
            actual: header.uncompressed_size as usize,
        });
    }

    let size = declared_size as usize;
    let mut out = Vec::with_capacity(size);
    let mut pos = REFPACK_HEADER_SIZE;

    while pos < data.len() {
        let cc = data[pos] as usize;
        let (plain, copy, offset, width) = if cc >= 0xFC {
            (cc & 0x03, 0, 0, 1)
        } else if cc >= 0xE0 {
            (((cc & 0x1F) + 1) << 2, 0, 0, 1)
        } else if cc >= 0xC0 {
            let [b1, b2, b3] = operands::<3>(data, pos)?;
            (
                cc & 0x03,
                ((cc & 0x0C) << 6) + b3 + 5,
                ((cc & 0x10) << 12) + (b1 << 8) + b2,
                4,
            )
        } else if cc >= 0x80 {
            let [b1, b2] = operands::<2>(data, pos)?;
            (b1 >> 6, (cc & 0x3F) + 4, ((b1 & 0x3F) << 8) + b2, 3)
        } else {
            let [b1] = operands::<1>(data, pos)?;
            (cc & 0x03, ((cc & 0x1C) >> 2) + 3, ((cc & 0x60) << 3) + b1, 2)
        };
        pos += width;

        // Literals precede the copy
        let literal_end = pos + plain;
        if literal_end > data.len() {
            return Err(RefPackError::CorruptStream(format!(
                "literal run of {plain} bytes at input offset {pos} runs past end of input"
            )));
        }
        if out.len() + plain > size {
            return Err(RefPackError::CorruptStream(format!(
                "literal run of {plain} bytes overflows declared size {size}"
            )));
        }
        out.extend_from_slice(&data[pos..literal_end]);
        pos = literal_end;

        if copy > 0 {
            let distance = offset + 1;
            if distance > out.len() {
                return Err(RefPackError::CorruptStream(format!(
                    "back-reference distance {distance} exceeds {} bytes of output",
                    out.len()
                )));
            }
            if out.len() + copy > size {
                return Err(RefPackError::CorruptStream(format!(
                    "copy of {copy} bytes overflows declared size {size}"
                )));
            }
            // Byte-by-byte: source and destination may overlap
            let start = out.len() - distance;
            for i in 0..copy {
                let byte = out[start + i];
                out.push(byte);
            }
        }

        if cc >= 0xFC {
            break;
        }
    }

    if out.len() != size {
        return Err(RefPackError::CorruptStream(format!(
            "stream produced {} bytes, declared {size}",
            out.len()
        )));
    }
    Ok(out)
}

fn operands<const N: usize>(data: &[u8], pos: usize) -> RefPackResult<[usize; N]> {
    let bytes = data.get(pos + 1..pos + 1 + N).ok_or_else(|| {
        RefPackError::CorruptStream(format!("command at input offset {pos} is cut short"))
    })?;
    let mut out = [0usize; N];
    for (slot, &b) in out.iter_mut().zip(bytes) {
        *slot = b as usize;
    }
    Ok(out)
}
