//! `cDataListExtension` block
//!
//! A version, then an embedded `cExtension` holding a tree of named, typed
//! values. The extension has no version of its own and follows the block's.
//! Arrays nest further values.

use super::shape::BlockHeader;
use crate::cursor::{ByteReader, ByteWriter, var_string_len};
use crate::resource::error::{ResourceError, ResourceResult};
use binrw::Endian;
use serde_json::{Value, json};

/// Block id of `cDataListExtension`
pub const DATA_LIST_BLOCK_ID: u32 = 0x6A83_6D56;

/// Deepest array nesting accepted when decoding
pub const MAX_EXTENSION_DEPTH: usize = 32;

/// Block versions from this one on give the extension a name
const VERSION_WITH_NAME: u32 = 4;

/// Typed value of an extension item
#[derive(Debug, Clone, PartialEq)]
pub enum ExtensionValue {
    /// Type 0x02
    Int(i32),
    /// Type 0x03
    Float(f32),
    /// Type 0x05
    Translation([f32; 3]),
    /// Type 0x06
    String(String),
    /// Type 0x07
    Array(Vec<ExtensionItem>),
    /// Type 0x08
    Rotation([f32; 4]),
    /// Type 0x09
    Binary(Vec<u8>),
}

impl ExtensionValue {
    /// Stored type byte
    pub const fn type_code(&self) -> u8 {
        match self {
            Self::Int(_) => 0x02,
            Self::Float(_) => 0x03,
            Self::Translation(_) => 0x05,
            Self::String(_) => 0x06,
            Self::Array(_) => 0x07,
            Self::Rotation(_) => 0x08,
            Self::Binary(_) => 0x09,
        }
    }

    fn read(reader: &mut ByteReader<'_>, type_code: u8, depth: usize) -> ResourceResult<Self> {
        Ok(match type_code {
            0x02 => Self::Int(reader.read_i32(Endian::Little)?),
            0x03 => Self::Float(reader.read_f32(Endian::Little)?),
            0x05 => Self::Translation([
                reader.read_f32(Endian::Little)?,
                reader.read_f32(Endian::Little)?,
                reader.read_f32(Endian::Little)?,
            ]),
            0x06 => Self::String(reader.read_var_string()?),
            0x07 => {
                if depth >= MAX_EXTENSION_DEPTH {
                    return Err(ResourceError::Malformed(format!(
                        "extension arrays nested deeper than {MAX_EXTENSION_DEPTH}"
                    )));
                }
                Self::Array(read_items(reader, depth + 1)?)
            }
            0x08 => Self::Rotation([
                reader.read_f32(Endian::Little)?,
                reader.read_f32(Endian::Little)?,
                reader.read_f32(Endian::Little)?,
                reader.read_f32(Endian::Little)?,
            ]),
            0x09 => {
                let len = reader.read_i32(Endian::Little)?;
                let len = usize::try_from(len).map_err(|_| {
                    ResourceError::Malformed(format!("negative binary length {len}"))
                })?;
                Self::Binary(reader.read_bytes(len)?.to_vec())
            }
            other => {
                return Err(ResourceError::Malformed(format!(
                    "unknown extension value type 0x{other:02X}"
                )));
            }
        })
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Int(_) | Self::Float(_) => 4,
            Self::Translation(_) => 12,
            Self::Rotation(_) => 16,
            Self::String(s) => var_string_len(s),
            Self::Array(items) => 4 + items.iter().map(ExtensionItem::encoded_len).sum::<usize>(),
            Self::Binary(bytes) => 4 + bytes.len(),
        }
    }

    fn write(&self, writer: &mut ByteWriter) {
        match self {
            Self::Int(v) => writer.write_i32(*v, Endian::Little),
            Self::Float(v) => writer.write_f32(*v, Endian::Little),
            Self::Translation(v) => v.iter().for_each(|f| writer.write_f32(*f, Endian::Little)),
            Self::Rotation(v) => v.iter().for_each(|f| writer.write_f32(*f, Endian::Little)),
            Self::String(s) => writer.write_var_string(s),
            Self::Array(items) => write_items(writer, items),
            Self::Binary(bytes) => {
                writer.write_i32(bytes.len() as i32, Endian::Little);
                writer.write_bytes(bytes);
            }
        }
    }

    fn to_export_tree(&self) -> Value {
        match self {
            Self::Int(v) => json!(v),
            Self::Float(v) => json!(v),
            Self::Translation(v) => json!(v),
            Self::Rotation(v) => json!(v),
            Self::String(s) => json!(s),
            Self::Array(items) => {
                Value::Array(items.iter().map(ExtensionItem::to_export_tree).collect())
            }
            Self::Binary(bytes) => json!({ "binary_bytes": bytes.len() }),
        }
    }
}

/// Named value inside an extension
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionItem {
    /// Item name
    pub name: String,
    /// Item value
    pub value: ExtensionValue,
}

impl ExtensionItem {
    fn read(reader: &mut ByteReader<'_>, depth: usize) -> ResourceResult<Self> {
        let type_code = reader.read_u8()?;
        let name = reader.read_var_string()?;
        let value = ExtensionValue::read(reader, type_code, depth)?;
        Ok(Self { name, value })
    }

    fn encoded_len(&self) -> usize {
        1 + var_string_len(&self.name) + self.value.encoded_len()
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_u8(self.value.type_code());
        writer.write_var_string(&self.name);
        self.value.write(writer);
    }

    fn to_export_tree(&self) -> Value {
        json!({ "name": self.name, "value": self.value.to_export_tree() })
    }
}

fn read_items(reader: &mut ByteReader<'_>, depth: usize) -> ResourceResult<Vec<ExtensionItem>> {
    let count = reader.read_u32(Endian::Little)?;
    // Every item takes at least a type byte and a name length
    if (count as usize).saturating_mul(2) > reader.remaining() {
        return Err(ResourceError::Malformed(format!(
            "{count} extension items do not fit in {} bytes",
            reader.remaining()
        )));
    }
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        items.push(ExtensionItem::read(reader, depth)?);
    }
    Ok(items)
}

fn write_items(writer: &mut ByteWriter, items: &[ExtensionItem]) {
    writer.write_u32(items.len() as u32, Endian::Little);
    for item in items {
        item.write(writer);
    }
}

/// Decoded `cDataListExtension` block
#[derive(Debug, Clone, PartialEq)]
pub struct DataListExtension {
    /// Block header as stored in the container
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Header of the embedded `cExtension`
    pub extension_header: BlockHeader,
    /// Extension type byte
    pub type_code: u8,
    /// Extension name, present from version 4
    pub name: Option<String>,
    /// Top-level values
    pub items: Vec<ExtensionItem>,
}

impl DataListExtension {
    /// Parse the body that follows `header`
    pub(crate) fn read(reader: &mut ByteReader<'_>, header: BlockHeader) -> ResourceResult<Self> {
        let version = reader.read_u32(Endian::Little)?;
        let extension_header = BlockHeader::read(reader)?;
        let type_code = reader.read_u8()?;
        let name = if version >= VERSION_WITH_NAME {
            Some(reader.read_var_string()?)
        } else {
            None
        };
        let items = read_items(reader, 0)?;
        Ok(Self {
            header,
            version,
            extension_header,
            type_code,
            name,
            items,
        })
    }

    /// First top-level value named `name`
    pub fn get(&self, name: &str) -> Option<&ExtensionValue> {
        self.items
            .iter()
            .find(|item| item.name == name)
            .map(|item| &item.value)
    }

    pub(crate) fn encoded_len(&self) -> usize {
        self.header.encoded_len()
            + 4
            + self.extension_header.encoded_len()
            + 1
            + self.name.as_deref().map_or(0, var_string_len)
            + 4
            + self.items.iter().map(ExtensionItem::encoded_len).sum::<usize>()
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        self.extension_header.write(writer);
        writer.write_u8(self.type_code);
        if let Some(name) = &self.name {
            writer.write_var_string(name);
        }
        write_items(writer, &self.items);
    }

    pub(crate) fn to_export_tree(&self) -> Value {
        let items: Vec<Value> = self.items.iter().map(ExtensionItem::to_export_tree).collect();
        json!({
            "block": self.header.name,
            "version": self.version,
            "name": self.name,
            "items": items,
        })
    }
}
