//! String tables (STR#, CTSS, TTAS)
//!
//! After the 64-byte name: a `u16` format marker (`0xFFFD`), a `u16` item
//! count, then per item a language byte, a NUL-terminated title and a
//! NUL-terminated description. Items for different languages are
//! interleaved; numbering restarts for each language.

use super::error::{ResourceError, ResourceResult};
use super::{NAME_FIELD_SIZE, Resource};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde_json::{Value, json};
use std::collections::BTreeSet;

/// Format marker written by every supported producer
pub const STRING_TABLE_FORMAT: u16 = 0xFFFD;

/// Display name of a language byte
pub const fn language_name(language: u8) -> &'static str {
    match language {
        1 => "English (US)",
        2 => "English (UK)",
        3 => "French",
        4 => "German",
        5 => "Italian",
        6 => "Spanish",
        7 => "Dutch",
        8 => "Danish",
        9 => "Swedish",
        10 => "Norwegian",
        11 => "Finnish",
        12 => "Hebrew",
        13 => "Russian",
        14 => "Portuguese",
        15 => "Japanese",
        16 => "Polish",
        17 => "Simplified Chinese",
        18 => "Traditional Chinese",
        19 => "Thai",
        20 => "Korean",
        _ => "Unknown",
    }
}

/// One localised string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringItem {
    language: u8,
    title: String,
    description: String,
    dirty: bool,
}

impl StringItem {
    /// Create a clean item
    pub fn new(language: u8, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            language,
            title: title.into(),
            description: description.into(),
            dirty: false,
        }
    }

    /// Language byte
    pub const fn language(&self) -> u8 {
        self.language
    }

    /// Main text
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Secondary text
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Whether the item changed since the last clean mark
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn encoded_len(&self) -> usize {
        1 + self.title.len() + 1 + self.description.len() + 1
    }
}

/// Decoded string table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    key: ResourceKey,
    name_field: [u8; NAME_FIELD_SIZE],
    items: Vec<StringItem>,
    trailing: Vec<u8>,
    items_added: bool,
}

impl StringTable {
    /// Decode a string table
    pub fn decode(key: ResourceKey, data: &[u8]) -> ResourceResult<Self> {
        let mut reader = ByteReader::new(data);
        let mut name_field = [0u8; NAME_FIELD_SIZE];
        name_field.copy_from_slice(reader.read_bytes(NAME_FIELD_SIZE)?);

        let format = reader.read_u16(Endian::Little)?;
        if format != STRING_TABLE_FORMAT {
            return Err(ResourceError::UnknownFormatVersion {
                format: "STR#",
                version: u32::from(format),
            });
        }
        let count = reader.read_u16(Endian::Little)?;
        let mut items = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let language = reader.read_u8()?;
            let title = reader.read_null_terminated()?;
            let description = reader.read_null_terminated()?;
            items.push(StringItem::new(language, title, description));
        }

        Ok(Self {
            key,
            name_field,
            items,
            trailing: reader.read_rest().to_vec(),
            items_added: false,
        })
    }

    /// Table name
    pub fn name(&self) -> String {
        let end = self
            .name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name_field[..end]).into_owned()
    }

    /// Every item in stored order
    pub fn items(&self) -> &[StringItem] {
        &self.items
    }

    /// Languages present, ascending
    pub fn languages(&self) -> Vec<u8> {
        let set: BTreeSet<u8> = self.items.iter().map(StringItem::language).collect();
        set.into_iter().collect()
    }

    /// Items of one language, in per-language index order
    pub fn strings_for(&self, language: u8) -> Vec<&StringItem> {
        self.items
            .iter()
            .filter(|item| item.language == language)
            .collect()
    }

    /// The `index`-th string of a language
    pub fn get(&self, language: u8, index: usize) -> Option<&StringItem> {
        self.items
            .iter()
            .filter(|item| item.language == language)
            .nth(index)
    }

    fn check_text(text: &str) -> ResourceResult<()> {
        if text.contains('\0') {
            return Err(ResourceError::Malformed(format!(
                "string table text {text:?} contains a NUL byte"
            )));
        }
        Ok(())
    }

    fn get_mut(&mut self, language: u8, index: usize) -> ResourceResult<&mut StringItem> {
        self.items
            .iter_mut()
            .filter(|item| item.language == language)
            .nth(index)
            .ok_or_else(|| {
                ResourceError::NotFound(format!("string {index} for language {language}"))
            })
    }

    /// Replace the title of an existing string
    pub fn set_title(&mut self, language: u8, index: usize, title: &str) -> ResourceResult<()> {
        Self::check_text(title)?;
        let item = self.get_mut(language, index)?;
        item.title = title.to_string();
        item.dirty = true;
        Ok(())
    }

    /// Replace the description of an existing string
    pub fn set_description(
        &mut self,
        language: u8,
        index: usize,
        description: &str,
    ) -> ResourceResult<()> {
        Self::check_text(description)?;
        let item = self.get_mut(language, index)?;
        item.description = description.to_string();
        item.dirty = true;
        Ok(())
    }

    /// Append a string, returning its per-language index
    pub fn add_string(&mut self, language: u8, title: &str, description: &str) -> ResourceResult<usize> {
        Self::check_text(title)?;
        Self::check_text(description)?;
        if self.items.len() >= usize::from(u16::MAX) {
            return Err(ResourceError::Malformed(
                "string count exceeds 65535".to_string(),
            ));
        }
        let index = self.strings_for(language).len();
        self.items.push(StringItem::new(language, title, description));
        self.items_added = true;
        Ok(index)
    }
}

impl Resource for StringTable {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        NAME_FIELD_SIZE
            + 4
            + self.items.iter().map(StringItem::encoded_len).sum::<usize>()
            + self.trailing.len()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.name_field);
        writer.write_u16(STRING_TABLE_FORMAT, Endian::Little);
        writer.write_u16(self.items.len() as u16, Endian::Little);
        for item in &self.items {
            writer.write_u8(item.language);
            writer.write_null_terminated(&item.title);
            writer.write_null_terminated(&item.description);
        }
        writer.write_bytes(&self.trailing);
    }

    fn is_dirty(&self) -> bool {
        self.items_added || self.items.iter().any(StringItem::is_dirty)
    }

    fn mark_clean(&mut self) {
        self.items_added = false;
        for item in &mut self.items {
            item.dirty = false;
        }
    }

    fn display_name(&self) -> Option<String> {
        Some(self.name())
    }

    fn to_export_tree(&self) -> Value {
        let languages: Vec<Value> = self
            .languages()
            .into_iter()
            .map(|language| {
                let strings: Vec<Value> = self
                    .strings_for(language)
                    .iter()
                    .map(|item| json!({"title": item.title, "description": item.description}))
                    .collect();
                json!({
                    "id": language,
                    "name": language_name(language),
                    "strings": strings,
                })
            })
            .collect();
        json!({
            "format": "string-table",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "name": self.name(),
            "languages": languages,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_fixed_string("Catalog Strings", NAME_FIELD_SIZE);
        w.write_u16(STRING_TABLE_FORMAT, Endian::Little);
        w.write_u16(3, Endian::Little);
        for (lang, title, desc) in [(1, "Sofa", "Comfy"), (3, "Canapé", ""), (1, "Chair", "")] {
            w.write_u8(lang);
            w.write_null_terminated(title);
            w.write_null_terminated(desc);
        }
        w.into_inner()
    }

    fn key() -> ResourceKey {
        ResourceKey::new(types::STR, 0x7FD46CD0, 0x0085, 0)
    }

    #[test]
    fn test_decode_groups_by_language() {
        let strings = StringTable::decode(key(), &table()).expect("Test operation should succeed");
        assert_eq!(strings.name(), "Catalog Strings");
        assert_eq!(strings.languages(), vec![1, 3]);
        assert_eq!(strings.get(1, 1).map(StringItem::title), Some("Chair"));
        assert_eq!(strings.get(3, 0).map(StringItem::title), Some("Canapé"));
        assert!(strings.get(3, 1).is_none());
        assert_eq!(strings.to_bytes(), table());
    }

    #[test]
    fn test_edits() {
        let mut strings = StringTable::decode(key(), &table()).expect("Test operation should succeed");
        strings.set_title(1, 0, "Couch").expect("Test operation should succeed");
        assert!(strings.is_dirty());
        assert!(strings.set_title(9, 0, "x").is_err());

        strings.mark_clean();
        assert!(!strings.is_dirty());
        assert_eq!(strings.add_string(3, "Chaise", "").expect("Test operation should succeed"), 1);
        assert!(strings.is_dirty());

        let bytes = strings.to_bytes();
        assert_eq!(bytes.len(), strings.encoded_len());
        let decoded = StringTable::decode(key(), &bytes).expect("Test operation should succeed");
        assert_eq!(decoded.get(1, 0).map(StringItem::title), Some("Couch"));
        assert_eq!(decoded.strings_for(3).len(), 2);
    }

    #[test]
    fn test_text_with_nul_is_rejected() {
        let mut strings = StringTable::decode(key(), &table()).expect("Test operation should succeed");
        assert!(matches!(
            strings.set_title(1, 0, "Co\0uch"),
            Err(ResourceError::Malformed(_))
        ));
        assert!(strings.set_description(1, 1, "a\0b").is_err());
        assert!(strings.add_string(1, "ok", "\0").is_err());
        assert!(!strings.is_dirty());
        assert_eq!(strings.to_bytes(), table());
    }

    #[test]
    fn test_unknown_format_marker() {
        let mut bytes = table();
        bytes[NAME_FIELD_SIZE] = 0xFE;
        assert!(matches!(
            StringTable::decode(key(), &bytes),
            Err(ResourceError::UnknownFormatVersion { version: 0xFFFE, .. })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        let bytes = table();
        assert!(matches!(
            StringTable::decode(key(), &bytes[..bytes.len() - 1]),
            Err(ResourceError::Truncated(_))
        ));
    }
}
