//! Text form of property sets
//!
//! Some producers write property sets as a markup document instead of the
//! binary form:
//!
//! ```xml
//! <cGZPropertySetString>
//!   <AnyUint32 key="cost">500</AnyUint32>
//!   <AnyString key="name">Sofa</AnyString>
//! </cGZPropertySetString>
//! ```
//!
//! Known-bad producers leave bare `&` characters in text and write items
//! that do not parse. Both are handled according to [`DecodeOptions`];
//! skipped items are reported, never dropped silently.

use super::item::{PropertyItem, PropertyValue};
use crate::resource::DecodeOptions;
use crate::resource::error::{ResourceError, ResourceResult};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::borrow::Cow;
use tracing::warn;

const ROOT_ELEMENT: &str = "cGZPropertySetString";
const PREDEFINED_ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "apos;"];

/// An item the text decoder could not use
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    /// Element name as written
    pub element: String,
    /// Value of the `key` attribute, when present
    pub key: Option<String>,
    /// Why the item was skipped
    pub reason: String,
}

/// Escape every `&` that does not start a valid character or predefined
/// entity reference.
pub fn escape_bare_ampersands(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    let mut rest = text;
    while let Some(at) = rest.find('&') {
        out.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        if is_reference(tail) {
            out.push('&');
        } else {
            out.push_str("&amp;");
        }
        rest = tail;
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn is_reference(tail: &str) -> bool {
    if PREDEFINED_ENTITIES.iter().any(|e| tail.starts_with(e)) {
        return true;
    }
    let Some(numeric) = tail.strip_prefix('#') else {
        return false;
    };
    let (digits, radix) = match numeric.strip_prefix('x') {
        Some(hex) => (hex, 16),
        None => (numeric, 10),
    };
    let Some(end) = digits.find(';') else {
        return false;
    };
    end > 0 && digits[..end].chars().all(|c| c.is_digit(radix))
}

struct PendingItem {
    element: String,
    key: Option<String>,
    text: String,
    depth: usize,
    error: Option<String>,
}

impl PendingItem {
    fn start(element: &BytesStart<'_>, depth: usize) -> Self {
        let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
        let (key, error) = match element.try_get_attribute("key") {
            Ok(Some(attr)) => match attr.unescape_value() {
                Ok(value) => (Some(value.into_owned()), None),
                Err(e) => (None, Some(format!("unreadable key attribute: {e}"))),
            },
            Ok(None) => (None, Some("missing key attribute".to_string())),
            Err(e) => (None, Some(format!("unreadable attributes: {e}"))),
        };
        Self {
            element: name,
            key,
            text: String::new(),
            depth,
            error,
        }
    }

    fn finish(self) -> Result<PropertyItem, SkippedItem> {
        let parsed = match (&self.error, &self.key) {
            (Some(reason), _) => Err(reason.clone()),
            (None, None) => Err("missing key attribute".to_string()),
            (None, Some(_)) => parse_value(&self.element, &self.text),
        };
        match (parsed, self.key) {
            (Ok(value), Some(key)) => Ok(PropertyItem::new(key, value)),
            (Ok(_), None) => Err(SkippedItem {
                element: self.element,
                key: None,
                reason: "missing key attribute".to_string(),
            }),
            (Err(reason), key) => Err(SkippedItem {
                element: self.element,
                key,
                reason,
            }),
        }
    }
}

fn parse_value(element: &str, text: &str) -> Result<PropertyValue, String> {
    let trimmed = text.trim();
    let bad = |e: &dyn std::fmt::Display| format!("cannot parse {trimmed:?} as {element}: {e}");
    match element.trim().to_ascii_lowercase().as_str() {
        "anyuint32" => {
            let value = if trimmed.contains('-') {
                trimmed.parse::<i32>().map(|v| v as u32).map_err(|e| bad(&e))?
            } else if let Some(hex) = hex_digits(trimmed) {
                u32::from_str_radix(hex, 16).map_err(|e| bad(&e))?
            } else {
                trimmed.parse::<u32>().map_err(|e| bad(&e))?
            };
            Ok(PropertyValue::UInt(value))
        }
        "anyint32" | "anysint32" => {
            let value = if let Some(hex) = hex_digits(trimmed) {
                u32::from_str_radix(hex, 16).map(|v| v as i32).map_err(|e| bad(&e))?
            } else {
                trimmed.parse::<i32>().map_err(|e| bad(&e))?
            };
            Ok(PropertyValue::Int(value))
        }
        "anystring" => Ok(PropertyValue::String(text.to_string())),
        "anyfloat32" => trimmed
            .parse::<f32>()
            .map(PropertyValue::Float)
            .map_err(|e| bad(&e)),
        "anyboolean" => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(PropertyValue::bool(true)),
            "false" => Ok(PropertyValue::bool(false)),
            _ => trimmed
                .parse::<i32>()
                .map(|v| PropertyValue::bool(v != 0))
                .map_err(|e| bad(&e)),
        },
        _ => Err(format!("unknown element <{element}>")),
    }
}

fn hex_digits(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

/// Parse a text-form document into items plus the items it had to skip
pub(super) fn parse_document(
    data: &[u8],
    options: &DecodeOptions,
) -> ResourceResult<(Vec<PropertyItem>, Vec<SkippedItem>)> {
    let raw = String::from_utf8_lossy(data);
    let raw = raw.trim_start_matches('\u{feff}');
    let text = if options.escape_bare_ampersands {
        escape_bare_ampersands(raw)
    } else {
        Cow::Borrowed(raw)
    };

    let mut reader = Reader::from_str(&text);
    let mut items = Vec::new();
    let mut skipped = Vec::new();
    let mut depth = 0usize;
    let mut root_depth: Option<usize> = None;
    let mut seen_root = false;
    let mut current: Option<PendingItem> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(ResourceError::Xml(format!(
                    "{e} (at byte {})",
                    reader.buffer_position()
                )));
            }
        };
        match event {
            Event::Start(e) => {
                depth += 1;
                if root_depth.is_none() && e.local_name().as_ref() == ROOT_ELEMENT.as_bytes() {
                    root_depth = Some(depth);
                    seen_root = true;
                } else if current.is_none() && root_depth.is_some_and(|root| depth == root + 1) {
                    current = Some(PendingItem::start(&e, depth));
                }
            }
            Event::Empty(e) => {
                if current.is_none() && root_depth.is_some_and(|root| depth == root) {
                    let item = PendingItem::start(&e, depth + 1);
                    accept(item.finish(), options, &mut items, &mut skipped)?;
                } else if root_depth.is_none() && e.local_name().as_ref() == ROOT_ELEMENT.as_bytes()
                {
                    seen_root = true;
                }
            }
            Event::Text(t) => {
                if let Some(item) = current.as_mut() {
                    match t.unescape() {
                        Ok(s) => item.text.push_str(&s),
                        Err(e) => item.error = Some(format!("unreadable text: {e}")),
                    }
                }
            }
            Event::CData(c) => {
                if let Some(item) = current.as_mut() {
                    item.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if current.as_ref().is_some_and(|item| item.depth == depth) {
                    if let Some(item) = current.take() {
                        accept(item.finish(), options, &mut items, &mut skipped)?;
                    }
                } else if root_depth == Some(depth) {
                    root_depth = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            // Comments, declarations and processing instructions carry no items
            _ => {}
        }
    }

    if !seen_root {
        return Err(ResourceError::Xml(format!(
            "no <{ROOT_ELEMENT}> element found"
        )));
    }
    Ok((items, skipped))
}

fn accept(
    result: Result<PropertyItem, SkippedItem>,
    options: &DecodeOptions,
    items: &mut Vec<PropertyItem>,
    skipped: &mut Vec<SkippedItem>,
) -> ResourceResult<()> {
    match result {
        Ok(item) => items.push(item),
        Err(skip) if options.skip_malformed_items => {
            warn!(
                "Skipping property-set item <{}> key={:?}: {}",
                skip.element, skip.key, skip.reason
            );
            skipped.push(skip);
        }
        Err(skip) => {
            return Err(ResourceError::Malformed(format!(
                "item <{}> key={:?}: {}",
                skip.element, skip.key, skip.reason
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resource::cpf::PropertyType;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_escape_keeps_valid_references() {
        assert_eq!(
            escape_bare_ampersands("Tom & Jerry &amp; &#38; &#x26; &nbsp;"),
            "Tom &amp; Jerry &amp; &#38; &#x26; &amp;nbsp;"
        );
        assert!(matches!(escape_bare_ampersands("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_parses_every_item_type() {
        let doc = br#"<?xml version="1.0" encoding="utf-8"?>
<cGZPropertySetString version="1">
  <!-- produced by a catalog tool -->
  <AnyUint32 key="cost">0x1F4</AnyUint32>
  <AnyUint32 key="neg">-1</AnyUint32>
  <AnySint32 key="offset">-12</AnySint32>
  <AnyString key="name">Rock &amp; Roll</AnyString>
  <AnyFloat32 key="scale">1.5</AnyFloat32>
  <AnyBoolean key="visible">True</AnyBoolean>
  <AnyBoolean key="hidden">0</AnyBoolean>
</cGZPropertySetString>"#;
        let (items, skipped) =
            parse_document(doc, &DecodeOptions::default()).expect("Test operation should succeed");
        assert!(skipped.is_empty());
        let values: Vec<_> = items.iter().map(|i| (i.name(), i.value().clone())).collect();
        assert_eq!(
            values,
            vec![
                ("cost", PropertyValue::UInt(500)),
                ("neg", PropertyValue::UInt(u32::MAX)),
                ("offset", PropertyValue::Int(-12)),
                ("name", PropertyValue::String("Rock & Roll".into())),
                ("scale", PropertyValue::Float(1.5)),
                ("visible", PropertyValue::bool(true)),
                ("hidden", PropertyValue::bool(false)),
            ]
        );
        assert!(items.iter().all(|i| !i.is_dirty()));
    }

    #[test]
    fn test_bare_ampersand_and_malformed_item() {
        let doc = b"<cGZPropertySetString>\
<AnyString key=\"title\">Salt & Pepper</AnyString>\
<AnyUint32 key=\"broken\">twelve</AnyUint32>\
<AnyInt32>7</AnyInt32>\
<AnyInt32 key=\"ok\">7</AnyInt32>\
</cGZPropertySetString>";
        let (items, skipped) =
            parse_document(doc, &DecodeOptions::default()).expect("Test operation should succeed");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_string(), "Salt & Pepper");
        assert_eq!(items[1].kind(), PropertyType::Int);

        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0].key.as_deref(), Some("broken"));
        assert_eq!(skipped[1].key, None);
    }

    #[test]
    fn test_strict_options() {
        let doc = b"<cGZPropertySetString><AnyUint32 key=\"x\">nope</AnyUint32></cGZPropertySetString>";
        let strict = DecodeOptions {
            skip_malformed_items: false,
            ..DecodeOptions::default()
        };
        assert!(matches!(parse_document(doc, &strict), Err(ResourceError::Malformed(_))));

        let doc = b"<cGZPropertySetString><AnyString key=\"x\">a & b</AnyString></cGZPropertySetString>";
        let no_escape = DecodeOptions {
            escape_bare_ampersands: false,
            ..DecodeOptions::default()
        };
        let (items, skipped) =
            parse_document(doc, &no_escape).expect("Test operation should succeed");
        assert!(items.is_empty());
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn test_unknown_element_is_reported() {
        let doc = b"<cGZPropertySetString><AnyDouble key=\"d\">1.0</AnyDouble></cGZPropertySetString>";
        let (items, skipped) =
            parse_document(doc, &DecodeOptions::default()).expect("Test operation should succeed");
        assert!(items.is_empty());
        assert_eq!(skipped[0].element, "AnyDouble");
    }

    #[test]
    fn test_not_a_property_document() {
        assert!(matches!(
            parse_document(b"<other/>", &DecodeOptions::default()),
            Err(ResourceError::Xml(_))
        ));
        assert!(parse_document(b"\x00\x01garbage<", &DecodeOptions::default()).is_err());
    }
}
