//! Bounds-checked primitive reader and writer over in-memory buffers
//!
//! Every read takes its byte order explicitly. Package files are
//! little-endian at rest, but several embedded formats store individual
//! fields big-endian (the RefPack size field being the obvious one), so a
//! single global mode is not enough.
//!
//! Reads never run past the end of the buffer they were given: an overrun
//! returns [`CursorError::Truncated`] describing where it happened.

use binrw::Endian;
use thiserror::Error;

/// Cursor operation result type
pub type CursorResult<T> = Result<T, CursorError>;

/// Errors raised while reading primitives from a buffer
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    /// A read wanted more bytes than the buffer holds
    #[error("truncated data at offset {offset}: wanted {wanted} bytes, {available} available")]
    Truncated {
        /// Position of the failed read
        offset: usize,
        /// Number of bytes requested
        wanted: usize,
        /// Number of bytes left in the buffer
        available: usize,
    },

    /// A length field could not describe a valid string
    #[error("invalid length field: {0}")]
    InvalidLength(String),
}

/// Sequential reader over a borrowed byte slice
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of `data`
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current read position
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Total length of the underlying buffer
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the underlying buffer is empty
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes left between the position and the end of the buffer
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Whether the whole buffer has been consumed
    pub const fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Move to an absolute position; positions past the end are an error
    pub fn seek(&mut self, pos: usize) -> CursorResult<()> {
        if pos > self.data.len() {
            return Err(CursorError::Truncated {
                offset: pos,
                wanted: 0,
                available: 0,
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `n` bytes
    pub fn skip(&mut self, n: usize) -> CursorResult<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Borrow the next `n` bytes and advance past them
    pub fn read_bytes(&mut self, n: usize) -> CursorResult<&'a [u8]> {
        let available = self.remaining();
        if n > available {
            return Err(CursorError::Truncated {
                offset: self.pos,
                wanted: n,
                available,
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Borrow everything from the position to the end of the buffer
    pub fn read_rest(&mut self) -> &'a [u8] {
        let start = self.pos.min(self.data.len());
        self.pos = self.data.len();
        &self.data[start..]
    }

    fn read_array<const N: usize>(&mut self) -> CursorResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> CursorResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Read a `u16` in the given byte order
    pub fn read_u16(&mut self, endian: Endian) -> CursorResult<u16> {
        let buf = self.read_array::<2>()?;
        Ok(match endian {
            Endian::Little => u16::from_le_bytes(buf),
            Endian::Big => u16::from_be_bytes(buf),
        })
    }

    /// Read a 24-bit unsigned integer in the given byte order
    pub fn read_u24(&mut self, endian: Endian) -> CursorResult<u32> {
        let [a, b, c] = self.read_array::<3>()?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes([a, b, c, 0]),
            Endian::Big => u32::from_be_bytes([0, a, b, c]),
        })
    }

    /// Read a `u32` in the given byte order
    pub fn read_u32(&mut self, endian: Endian) -> CursorResult<u32> {
        let buf = self.read_array::<4>()?;
        Ok(match endian {
            Endian::Little => u32::from_le_bytes(buf),
            Endian::Big => u32::from_be_bytes(buf),
        })
    }

    /// Read an `i32` in the given byte order
    pub fn read_i32(&mut self, endian: Endian) -> CursorResult<i32> {
        self.read_u32(endian).map(|v| v as i32)
    }

    /// Read an `f32` in the given byte order
    pub fn read_f32(&mut self, endian: Endian) -> CursorResult<f32> {
        self.read_u32(endian).map(f32::from_bits)
    }

    /// Read a `u64` in the given byte order
    pub fn read_u64(&mut self, endian: Endian) -> CursorResult<u64> {
        let buf = self.read_array::<8>()?;
        Ok(match endian {
            Endian::Little => u64::from_le_bytes(buf),
            Endian::Big => u64::from_be_bytes(buf),
        })
    }

    /// Read a fixed-width field and return the text before the first NUL
    pub fn read_fixed_string(&mut self, width: usize) -> CursorResult<String> {
        let bytes = self.read_bytes(width)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Read bytes up to (and consuming) a NUL terminator
    ///
    /// A missing terminator is a truncation, not an implicit end of string.
    pub fn read_null_terminated(&mut self) -> CursorResult<String> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let Some(len) = rest.iter().position(|&b| b == 0) else {
            return Err(CursorError::Truncated {
                offset: self.pos,
                wanted: rest.len() + 1,
                available: rest.len(),
            });
        };
        let bytes = self.read_bytes(len)?;
        self.pos += 1;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a string prefixed with a `u32` byte length
    pub fn read_length_prefixed(&mut self, endian: Endian) -> CursorResult<String> {
        let len = self.read_u32(endian)? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Read a string prefixed with a 7-bit encoded variable length
    pub fn read_var_string(&mut self) -> CursorResult<String> {
        let start = self.pos;
        let mut len: u32 = 0;
        let mut shift = 0u32;
        loop {
            let b = self.read_u8()?;
            len |= u32::from(b & 0x7F) << shift;
            if b & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift > 28 {
                return Err(CursorError::InvalidLength(format!(
                    "variable length prefix at offset {start} exceeds five bytes"
                )));
            }
        }
        let bytes = self.read_bytes(len as usize)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Growable writer mirroring [`ByteReader`]
#[derive(Debug, Clone, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty writer with room for `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append one byte
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// Append a `u16` in the given byte order
    pub fn write_u16(&mut self, value: u16, endian: Endian) {
        match endian {
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
        }
    }

    /// Append the low 24 bits of `value` in the given byte order
    pub fn write_u24(&mut self, value: u32, endian: Endian) {
        match endian {
            Endian::Little => self.write_bytes(&value.to_le_bytes()[..3]),
            Endian::Big => self.write_bytes(&value.to_be_bytes()[1..]),
        }
    }

    /// Append a `u32` in the given byte order
    pub fn write_u32(&mut self, value: u32, endian: Endian) {
        match endian {
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
        }
    }

    /// Append an `i32` in the given byte order
    pub fn write_i32(&mut self, value: i32, endian: Endian) {
        self.write_u32(value as u32, endian);
    }

    /// Append an `f32` in the given byte order
    pub fn write_f32(&mut self, value: f32, endian: Endian) {
        self.write_u32(value.to_bits(), endian);
    }

    /// Append a `u64` in the given byte order
    pub fn write_u64(&mut self, value: u64, endian: Endian) {
        match endian {
            Endian::Little => self.write_bytes(&value.to_le_bytes()),
            Endian::Big => self.write_bytes(&value.to_be_bytes()),
        }
    }

    /// Append `value` truncated or NUL-padded to exactly `width` bytes
    pub fn write_fixed_string(&mut self, value: &str, width: usize) {
        let bytes = value.as_bytes();
        let take = bytes.len().min(width);
        self.write_bytes(&bytes[..take]);
        self.buf.resize(self.buf.len() + (width - take), 0);
    }

    /// Append `value` followed by a NUL terminator
    pub fn write_null_terminated(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
        self.write_u8(0);
    }

    /// Append `value` prefixed with its `u32` byte length
    pub fn write_length_prefixed(&mut self, value: &str, endian: Endian) {
        self.write_u32(value.len() as u32, endian);
        self.write_bytes(value.as_bytes());
    }

    /// Append `value` prefixed with a 7-bit encoded variable length
    pub fn write_var_string(&mut self, value: &str) {
        let mut len = value.len() as u32;
        while len >= 0x80 {
            self.write_u8((len as u8 & 0x7F) | 0x80);
            len >>= 7;
        }
        self.write_u8(len as u8);
        self.write_bytes(value.as_bytes());
    }
}

/// Encoded size of a 7-bit length-prefixed string
pub fn var_string_len(value: &str) -> usize {
    let mut len = value.len();
    let mut prefix = 1;
    while len >= 0x80 {
        prefix += 1;
        len >>= 7;
    }
    prefix + value.len()
}
