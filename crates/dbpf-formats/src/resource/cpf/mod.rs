//! Property sets: ordered, named, typed key/value items
//!
//! Binary layout:
//!
//! ```text
//! signature   6 bytes  E0 50 E7 CB 02 00
//! count       u32
//! item        count times:
//!   type tag  u32
//!   name      u32 length + bytes
//!   value     string: u32 length + bytes, boolean: 1 byte, otherwise 4 bytes
//! ```
//!
//! Without the signature the bytes are treated as a text document (see
//! [`escape_bare_ampersands`] and [`SkippedItem`]). Both forms decode to the
//! same item list; encoding always produces the binary form.

mod item;
mod xml;

pub use item::{PropertyItem, PropertyType, PropertyValue};
pub use xml::{SkippedItem, escape_bare_ampersands};

use super::error::{ResourceError, ResourceResult};
use super::{DecodeOptions, Resource};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde::Serialize;
use serde_json::{Value, json};

/// Signature opening the binary form
pub const PROPERTY_SET_SIGNATURE: [u8; 6] = [0xE0, 0x50, 0xE7, 0xCB, 0x02, 0x00];

/// Smallest possible binary item: tag, empty name, one-byte boolean
const MIN_ITEM_SIZE: usize = 9;

/// Wire form a property set was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceForm {
    /// Signature-prefixed binary form
    Binary,
    /// Text document fallback
    Text,
}

/// Decoded property set
#[derive(Debug, Clone, PartialEq)]
pub struct PropertySet {
    key: ResourceKey,
    items: Vec<PropertyItem>,
    skipped: Vec<SkippedItem>,
    source: SourceForm,
    items_added: bool,
}

impl PropertySet {
    /// Create an empty property set
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            items: Vec::new(),
            skipped: Vec::new(),
            source: SourceForm::Binary,
            items_added: false,
        }
    }

    /// Decode either wire form
    pub fn decode(key: ResourceKey, data: &[u8], options: &DecodeOptions) -> ResourceResult<Self> {
        if data.starts_with(&PROPERTY_SET_SIGNATURE) {
            let mut reader = ByteReader::new(data);
            reader.skip(PROPERTY_SET_SIGNATURE.len())?;
            let count = reader.read_u32(Endian::Little)? as usize;
            let mut items = Vec::with_capacity(count.min(reader.remaining() / MIN_ITEM_SIZE));
            for _ in 0..count {
                items.push(PropertyItem::read(&mut reader)?);
            }
            Ok(Self {
                items,
                ..Self::new(key)
            })
        } else {
            let (items, skipped) = xml::parse_document(data, options)?;
            Ok(Self {
                key,
                items,
                skipped,
                source: SourceForm::Text,
                items_added: false,
            })
        }
    }

    /// Items in stored order
    pub fn items(&self) -> &[PropertyItem] {
        &self.items
    }

    /// Items the text decoder had to skip
    pub fn skipped(&self) -> &[SkippedItem] {
        &self.skipped
    }

    /// Wire form this set was decoded from
    pub const fn source_form(&self) -> SourceForm {
        self.source
    }

    /// First item with the given name
    pub fn item(&self, name: &str) -> Option<&PropertyItem> {
        self.items.iter().find(|item| item.name() == name)
    }

    /// First item with the given name, for editing
    pub fn item_mut(&mut self, name: &str) -> Option<&mut PropertyItem> {
        self.items.iter_mut().find(|item| item.name() == name)
    }

    fn require_mut(&mut self, name: &str) -> ResourceResult<&mut PropertyItem> {
        self.item_mut(name)
            .ok_or_else(|| ResourceError::NotFound(name.to_string()))
    }

    /// Append an item; the set becomes dirty
    pub fn add_item(&mut self, item: PropertyItem) -> &mut PropertyItem {
        self.items_added = true;
        self.items.push(item);
        let last = self.items.len() - 1;
        &mut self.items[last]
    }

    /// Existing item with this name, or a new zero-valued item of `kind`
    pub fn get_or_add_item(&mut self, name: &str, kind: PropertyType) -> &mut PropertyItem {
        match self.items.iter().position(|item| item.name() == name) {
            Some(pos) => &mut self.items[pos],
            None => self.add_item(PropertyItem::new(name, PropertyValue::default_for(kind))),
        }
    }

    /// Item value as an unsigned integer
    pub fn get_u32(&self, name: &str) -> Option<u32> {
        self.item(name).map(PropertyItem::as_u32)
    }

    /// Item value as a signed integer
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.item(name).map(PropertyItem::as_i32)
    }

    /// Item value as a float
    pub fn get_f32(&self, name: &str) -> Option<f32> {
        self.item(name).map(PropertyItem::as_f32)
    }

    /// Item value as a boolean
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.item(name).map(PropertyItem::as_bool)
    }

    /// Item value formatted as a string
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.item(name).map(PropertyItem::as_string)
    }

    /// Set an existing unsigned integer item
    pub fn set_u32(&mut self, name: &str, value: u32) -> ResourceResult<()> {
        self.require_mut(name)?.set_u32(value)
    }

    /// Set an existing signed integer item
    pub fn set_i32(&mut self, name: &str, value: i32) -> ResourceResult<()> {
        self.require_mut(name)?.set_i32(value)
    }

    /// Set an existing float item
    pub fn set_f32(&mut self, name: &str, value: f32) -> ResourceResult<()> {
        self.require_mut(name)?.set_f32(value)
    }

    /// Set an existing boolean item
    pub fn set_bool(&mut self, name: &str, value: bool) -> ResourceResult<()> {
        self.require_mut(name)?.set_bool(value)
    }

    /// Set an existing string item
    pub fn set_string(&mut self, name: &str, value: impl Into<String>) -> ResourceResult<()> {
        self.require_mut(name)?.set_string(value)
    }

    /// The `name` item, when it holds a string
    pub fn name(&self) -> Option<&str> {
        match self.item("name").map(PropertyItem::value) {
            Some(PropertyValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl Resource for PropertySet {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        PROPERTY_SET_SIGNATURE.len()
            + 4
            + self.items.iter().map(PropertyItem::encoded_len).sum::<usize>()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&PROPERTY_SET_SIGNATURE);
        writer.write_u32(self.items.len() as u32, Endian::Little);
        for item in &self.items {
            item.write(writer);
        }
    }

    fn is_dirty(&self) -> bool {
        self.items_added || self.items.iter().any(PropertyItem::is_dirty)
    }

    fn mark_clean(&mut self) {
        self.items_added = false;
        for item in &mut self.items {
            item.mark_clean();
        }
    }

    fn display_name(&self) -> Option<String> {
        self.name().map(str::to_string)
    }

    fn to_export_tree(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| {
                let value = match item.value() {
                    PropertyValue::UInt(v) => json!(v),
                    PropertyValue::Int(v) => json!(v),
                    PropertyValue::Float(v) => json!(v),
                    PropertyValue::Bool(v) => json!(*v == 1),
                    PropertyValue::String(s) => json!(s),
                    PropertyValue::Other { .. } => json!(item.as_string()),
                };
                json!({
                    "name": item.name(),
                    "type": item.kind().name(),
                    "typeTag": format!("0x{:08X}", item.kind().tag()),
                    "value": value,
                })
            })
            .collect();
        json!({
            "format": "property-set",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "source": self.source,
            "items": items,
            "skipped": self.skipped,
        })
    }
}
