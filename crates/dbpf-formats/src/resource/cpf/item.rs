//! Typed property-set items

use crate::cursor::{ByteReader, ByteWriter};
use crate::resource::error::{ResourceError, ResourceResult};
use binrw::Endian;

/// Item type tags as stored in the binary form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyType {
    /// Unsigned 32-bit integer
    UInt,
    /// Signed 32-bit integer
    Int,
    /// 32-bit float
    Float,
    /// Boolean
    Bool,
    /// Length-prefixed string
    String,
    /// Unrecognised tag; the value is kept as four raw bytes
    Other(u32),
}

impl PropertyType {
    /// Tag for unsigned integers
    pub const UINT_TAG: u32 = 0xEB61E4F7;
    /// Tag for strings
    pub const STRING_TAG: u32 = 0x0B8BEA18;
    /// Tag for floats
    pub const FLOAT_TAG: u32 = 0xABC78708;
    /// Tag for booleans
    pub const BOOL_TAG: u32 = 0xCBA908E1;
    /// Tag for signed integers
    pub const INT_TAG: u32 = 0x0C264712;

    /// Map a stored tag to a type
    pub const fn from_tag(tag: u32) -> Self {
        match tag {
            Self::UINT_TAG => Self::UInt,
            Self::STRING_TAG => Self::String,
            Self::FLOAT_TAG => Self::Float,
            Self::BOOL_TAG => Self::Bool,
            Self::INT_TAG => Self::Int,
            other => Self::Other(other),
        }
    }

    /// Stored tag for this type
    pub const fn tag(self) -> u32 {
        match self {
            Self::UInt => Self::UINT_TAG,
            Self::String => Self::STRING_TAG,
            Self::Float => Self::FLOAT_TAG,
            Self::Bool => Self::BOOL_TAG,
            Self::Int => Self::INT_TAG,
            Self::Other(tag) => tag,
        }
    }

    /// Short type name used in messages and exports
    pub const fn name(self) -> &'static str {
        match self {
            Self::UInt => "uint32",
            Self::Int => "int32",
            Self::Float => "float32",
            Self::Bool => "boolean",
            Self::String => "string",
            Self::Other(_) => "unknown",
        }
    }
}

/// Value held by one item
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Unsigned 32-bit integer
    UInt(u32),
    /// Signed 32-bit integer
    Int(i32),
    /// 32-bit float
    Float(f32),
    /// Boolean as its stored byte; only 1 reads as true
    Bool(u8),
    /// String
    String(String),
    /// Value of an unrecognised type
    Other {
        /// Stored tag
        tag: u32,
        /// Raw value bytes
        raw: [u8; 4],
    },
}

impl PropertyValue {
    /// Boolean value in its canonical stored form
    pub const fn bool(value: bool) -> Self {
        Self::Bool(value as u8)
    }

    /// Type of this value
    pub const fn kind(&self) -> PropertyType {
        match self {
            Self::UInt(_) => PropertyType::UInt,
            Self::Int(_) => PropertyType::Int,
            Self::Float(_) => PropertyType::Float,
            Self::Bool(_) => PropertyType::Bool,
            Self::String(_) => PropertyType::String,
            Self::Other { tag, .. } => PropertyType::Other(*tag),
        }
    }

    /// Zero value of a type, used for freshly added items
    pub fn default_for(kind: PropertyType) -> Self {
        match kind {
            PropertyType::UInt => Self::UInt(0),
            PropertyType::Int => Self::Int(0),
            PropertyType::Float => Self::Float(0.0),
            PropertyType::Bool => Self::Bool(0),
            PropertyType::String => Self::String(String::new()),
            PropertyType::Other(tag) => Self::Other { tag, raw: [0; 4] },
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::String(s) => 4 + s.len(),
            Self::Bool(_) => 1,
            _ => 4,
        }
    }
}

/// A named, typed property
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyItem {
    name: String,
    value: PropertyValue,
    dirty: bool,
}

impl PropertyItem {
    /// Create a clean item
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            dirty: false,
        }
    }

    /// Item name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stored type
    pub const fn kind(&self) -> PropertyType {
        self.value.kind()
    }

    /// Stored value
    pub const fn value(&self) -> &PropertyValue {
        &self.value
    }

    /// Whether a setter changed this item since the last clean mark
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Forget pending changes
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Value as an unsigned integer
    ///
    /// Signed integers are reinterpreted bit for bit, floats are rounded to
    /// the nearest integer (ties to even) and saturated, strings are parsed
    /// as decimal with 0 on failure.
    pub fn as_u32(&self) -> u32 {
        match &self.value {
            PropertyValue::UInt(v) => *v,
            PropertyValue::Int(v) => *v as u32,
            PropertyValue::Float(v) => v.round_ties_even() as u32,
            PropertyValue::Bool(v) => u32::from(*v == 1),
            PropertyValue::String(s) => s.trim().parse().unwrap_or(0),
            PropertyValue::Other { raw, .. } => u32::from_le_bytes(*raw),
        }
    }

    /// Value as a signed integer, with the same conversions as [`Self::as_u32`]
    pub fn as_i32(&self) -> i32 {
        match &self.value {
            PropertyValue::UInt(v) => *v as i32,
            PropertyValue::Int(v) => *v,
            PropertyValue::Float(v) => v.round_ties_even() as i32,
            PropertyValue::Bool(v) => i32::from(*v == 1),
            PropertyValue::String(s) => s.trim().parse().unwrap_or(0),
            PropertyValue::Other { raw, .. } => i32::from_le_bytes(*raw),
        }
    }

    /// Value as a float
    ///
    /// Unsigned integers convert through their signed reinterpretation.
    pub fn as_f32(&self) -> f32 {
        match &self.value {
            PropertyValue::UInt(v) => *v as i32 as f32,
            PropertyValue::Int(v) => *v as f32,
            PropertyValue::Float(v) => *v,
            PropertyValue::Bool(v) => f32::from(u8::from(*v == 1)),
            PropertyValue::String(s) => s.trim().parse().unwrap_or(0.0),
            PropertyValue::Other { raw, .. } => f32::from_le_bytes(*raw),
        }
    }

    /// Value as a boolean; numbers are true when non-zero
    pub fn as_bool(&self) -> bool {
        match &self.value {
            PropertyValue::UInt(v) => *v != 0,
            PropertyValue::Int(v) => *v != 0,
            PropertyValue::Float(v) => *v != 0.0,
            PropertyValue::Bool(v) => *v == 1,
            PropertyValue::String(s) => s.trim().parse::<u8>().is_ok_and(|v| v != 0),
            PropertyValue::Other { raw, .. } => raw.iter().any(|&b| b != 0),
        }
    }

    /// Value formatted by its stored type: integers as `0x`-prefixed eight
    /// digit hex, floats in decimal, booleans as `true`/`false`.
    pub fn as_string(&self) -> String {
        match &self.value {
            PropertyValue::UInt(v) => format!("0x{v:08X}"),
            PropertyValue::Int(v) => format!("0x{:08X}", *v as u32),
            PropertyValue::Float(v) => v.to_string(),
            PropertyValue::Bool(v) => (*v == 1).to_string(),
            PropertyValue::String(s) => s.clone(),
            PropertyValue::Other { raw, .. } => format!("0x{:08X}", u32::from_le_bytes(*raw)),
        }
    }

    fn check(&self, expected: PropertyType) -> ResourceResult<()> {
        if self.kind() == expected {
            Ok(())
        } else {
            Err(ResourceError::TypeMismatch {
                item: self.name.clone(),
                expected: expected.name(),
                actual: self.kind().name(),
            })
        }
    }

    fn store(&mut self, value: PropertyValue) {
        self.value = value;
        self.dirty = true;
    }

    /// Set an unsigned integer item
    pub fn set_u32(&mut self, value: u32) -> ResourceResult<()> {
        self.check(PropertyType::UInt)?;
        self.store(PropertyValue::UInt(value));
        Ok(())
    }

    /// Set a signed integer item
    pub fn set_i32(&mut self, value: i32) -> ResourceResult<()> {
        self.check(PropertyType::Int)?;
        self.store(PropertyValue::Int(value));
        Ok(())
    }

    /// Set a float item
    pub fn set_f32(&mut self, value: f32) -> ResourceResult<()> {
        self.check(PropertyType::Float)?;
        self.store(PropertyValue::Float(value));
        Ok(())
    }

    /// Set a boolean item
    pub fn set_bool(&mut self, value: bool) -> ResourceResult<()> {
        self.check(PropertyType::Bool)?;
        self.store(PropertyValue::bool(value));
        Ok(())
    }

    /// Set a string item
    pub fn set_string(&mut self, value: impl Into<String>) -> ResourceResult<()> {
        self.check(PropertyType::String)?;
        self.store(PropertyValue::String(value.into()));
        Ok(())
    }

    pub(super) fn read(reader: &mut ByteReader<'_>) -> ResourceResult<Self> {
        let kind = PropertyType::from_tag(reader.read_u32(Endian::Little)?);
        let name = reader.read_length_prefixed(Endian::Little)?;
        let value = match kind {
            PropertyType::UInt => PropertyValue::UInt(reader.read_u32(Endian::Little)?),
            PropertyType::Int => PropertyValue::Int(reader.read_i32(Endian::Little)?),
            PropertyType::Float => PropertyValue::Float(reader.read_f32(Endian::Little)?),
            PropertyType::Bool => PropertyValue::Bool(reader.read_u8()?),
            PropertyType::String => {
                PropertyValue::String(reader.read_length_prefixed(Endian::Little)?)
            }
            PropertyType::Other(tag) => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(reader.read_bytes(4)?);
                PropertyValue::Other { tag, raw }
            }
        };
        Ok(Self::new(name, value))
    }

    pub(super) fn encoded_len(&self) -> usize {
        4 + 4 + self.name.len() + self.value.encoded_len()
    }

    pub(super) fn write(&self, writer: &mut ByteWriter) {
        writer.write_u32(self.kind().tag(), Endian::Little);
        writer.write_length_prefixed(&self.name, Endian::Little);
        match &self.value {
            PropertyValue::UInt(v) => writer.write_u32(*v, Endian::Little),
            PropertyValue::Int(v) => writer.write_i32(*v, Endian::Little),
            PropertyValue::Float(v) => writer.write_f32(*v, Endian::Little),
            PropertyValue::Bool(v) => writer.write_u8(*v),
            PropertyValue::String(s) => writer.write_length_prefixed(s, Endian::Little),
            PropertyValue::Other { raw, .. } => writer.write_bytes(raw),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercions() {
        let item = PropertyItem::new("ratio", PropertyValue::Float(2.5));
        assert_eq!(item.as_i32(), 2);
        assert_eq!(item.as_u32(), 2);
        assert_eq!(PropertyItem::new("r", PropertyValue::Float(3.5)).as_i32(), 4);

        let negative = PropertyItem::new("n", PropertyValue::Int(-1));
        assert_eq!(negative.as_u32(), u32::MAX);
        assert_eq!(negative.as_f32(), -1.0);

        let text = PropertyItem::new("s", PropertyValue::String(" 42 ".into()));
        assert_eq!(text.as_u32(), 42);
        assert_eq!(PropertyItem::new("s", PropertyValue::String("x".into())).as_i32(), 0);
    }

    #[test]
    fn test_string_formatting_by_native_type() {
        assert_eq!(PropertyItem::new("c", PropertyValue::UInt(500)).as_string(), "0x000001F4");
        assert_eq!(PropertyItem::new("c", PropertyValue::Int(-2)).as_string(), "0xFFFFFFFE");
        assert_eq!(PropertyItem::new("f", PropertyValue::Float(1.25)).as_string(), "1.25");
        assert_eq!(PropertyItem::new("b", PropertyValue::bool(true)).as_string(), "true");
    }

    #[test]
    fn test_setters_are_strict() {
        let mut item = PropertyItem::new("cost", PropertyValue::UInt(1));
        let err = item.set_i32(5).unwrap_err();
        assert_eq!(
            err,
            ResourceError::TypeMismatch {
                item: "cost".into(),
                expected: "int32",
                actual: "uint32"
            }
        );
        assert!(!item.is_dirty());

        item.set_u32(5).expect("Test operation should succeed");
        assert!(item.is_dirty());
        assert_eq!(item.as_u32(), 5);
    }

    #[test]
    fn test_unknown_tag_keeps_raw_bytes() {
        let mut writer = ByteWriter::new();
        writer.write_u32(0x1234_5678, Endian::Little);
        writer.write_length_prefixed("odd", Endian::Little);
        writer.write_bytes(&[1, 2, 3, 4]);
        let bytes = writer.into_inner();

        let item = PropertyItem::read(&mut ByteReader::new(&bytes)).expect("Test operation should succeed");
        assert_eq!(item.kind(), PropertyType::Other(0x1234_5678));
        assert_eq!(item.encoded_len(), bytes.len());

        let mut out = ByteWriter::new();
        item.write(&mut out);
        assert_eq!(out.into_inner(), bytes);
    }

    #[test]
    fn test_odd_bool_byte_is_kept() {
        let mut writer = ByteWriter::new();
        writer.write_u32(PropertyType::BOOL_TAG, Endian::Little);
        writer.write_length_prefixed("visible", Endian::Little);
        writer.write_u8(0x02);
        let bytes = writer.into_inner();

        let mut item = PropertyItem::read(&mut ByteReader::new(&bytes)).expect("Test operation should succeed");
        assert!(!item.as_bool());
        assert_eq!(item.as_string(), "false");

        let mut out = ByteWriter::new();
        item.write(&mut out);
        assert_eq!(out.into_inner(), bytes);

        item.set_bool(true).expect("Test operation should succeed");
        assert_eq!(item.value(), &PropertyValue::Bool(1));
    }
}
