//! Typed resource payloads
//!
//! Each modelled resource type decodes into one variant of [`Payload`].
//! Every variant implements [`Resource`]: it can report its encoded size
//! ahead of time, encode itself, and track whether it changed since it was
//! decoded or last marked clean.
//!
//! Types without a codec are not errors; the archive hands them out as
//! opaque bytes. See [`CodecRegistry`] for the type dispatch.

pub mod behaviour;
pub mod cpf;
mod error;
pub mod neighbourhood;
pub mod objd;
pub mod rcol;
mod registry;
pub mod string_table;

pub use behaviour::Behaviour;
pub use cpf::PropertySet;
pub use error::{ResourceError, ResourceResult};
pub use neighbourhood::Neighbourhood;
pub use objd::ObjectDefinition;
pub use rcol::SceneGraph;
pub use registry::{Codec, CodecRegistry, CodecRegistryBuilder, DecodeFn};
pub use string_table::StringTable;

use crate::cursor::ByteWriter;
use crate::key::ResourceKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Width of the name field that opens many fixed-layout resources
pub const NAME_FIELD_SIZE: usize = 64;

/// Common capabilities of every decoded resource
pub trait Resource {
    /// Identity of the resource
    fn key(&self) -> ResourceKey;

    /// Exact number of bytes [`Resource::encode`] will write
    fn encoded_len(&self) -> usize;

    /// Append the binary form to `writer`
    fn encode(&self, writer: &mut ByteWriter);

    /// Whether the resource changed since it was decoded or marked clean
    fn is_dirty(&self) -> bool;

    /// Forget pending changes
    fn mark_clean(&mut self);

    /// Structured view for export and inspection tools
    fn to_export_tree(&self) -> Value;

    /// Human readable name stored inside the resource, if any
    fn display_name(&self) -> Option<String> {
        None
    }

    /// Encode into a fresh buffer
    fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.encoded_len());
        self.encode(&mut writer);
        writer.into_inner()
    }
}

/// Recovery policy for tolerant decoders
///
/// Only the property-set text form consults these today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Escape `&` characters that do not start a valid reference
    pub escape_bare_ampersands: bool,
    /// Skip items that fail to parse instead of failing the whole resource
    pub skip_malformed_items: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            escape_bare_ampersands: true,
            skip_malformed_items: true,
        }
    }
}

impl DecodeOptions {
    /// Options that reject anything the producer got wrong
    pub const fn strict() -> Self {
        Self {
            escape_bare_ampersands: false,
            skip_malformed_items: false,
        }
    }
}

/// A decoded resource of any modelled type
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Property set (GZPS, XOBJ, ...)
    PropertySet(PropertySet),
    /// Object definition (OBJD)
    ObjectDefinition(ObjectDefinition),
    /// Behaviour program (BHAV)
    Behaviour(Behaviour),
    /// String table (STR#, CTSS, TTAS)
    StringTable(StringTable),
    /// Scene graph container (SHPE, TXMT, ...)
    SceneGraph(SceneGraph),
    /// Neighbourhood memories (NGBH), read-only
    Neighbourhood(Neighbourhood),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            Payload::PropertySet($inner) => $body,
            Payload::ObjectDefinition($inner) => $body,
            Payload::Behaviour($inner) => $body,
            Payload::StringTable($inner) => $body,
            Payload::SceneGraph($inner) => $body,
            Payload::Neighbourhood($inner) => $body,
        }
    };
}

impl Payload {
    /// Short name of the variant
    pub const fn format_name(&self) -> &'static str {
        match self {
            Self::PropertySet(_) => "property-set",
            Self::ObjectDefinition(_) => "object-definition",
            Self::Behaviour(_) => "behaviour",
            Self::StringTable(_) => "string-table",
            Self::SceneGraph(_) => "scene-graph",
            Self::Neighbourhood(_) => "neighbourhood",
        }
    }

    /// Property set view, if this is one
    pub fn as_property_set(&self) -> Option<&PropertySet> {
        match self {
            Self::PropertySet(set) => Some(set),
            _ => None,
        }
    }

    /// Mutable property set view, if this is one
    pub fn as_property_set_mut(&mut self) -> Option<&mut PropertySet> {
        match self {
            Self::PropertySet(set) => Some(set),
            _ => None,
        }
    }
}

impl Resource for Payload {
    fn key(&self) -> ResourceKey {
        dispatch!(self, inner => inner.key())
    }

    fn encoded_len(&self) -> usize {
        dispatch!(self, inner => inner.encoded_len())
    }

    fn encode(&self, writer: &mut ByteWriter) {
        dispatch!(self, inner => inner.encode(writer));
    }

    fn is_dirty(&self) -> bool {
        dispatch!(self, inner => inner.is_dirty())
    }

    fn mark_clean(&mut self) {
        dispatch!(self, inner => inner.mark_clean());
    }

    fn to_export_tree(&self) -> Value {
        dispatch!(self, inner => inner.to_export_tree())
    }

    fn display_name(&self) -> Option<String> {
        dispatch!(self, inner => inner.display_name())
    }
}

impl From<PropertySet> for Payload {
    fn from(value: PropertySet) -> Self {
        Self::PropertySet(value)
    }
}

impl From<ObjectDefinition> for Payload {
    fn from(value: ObjectDefinition) -> Self {
        Self::ObjectDefinition(value)
    }
}

impl From<Behaviour> for Payload {
    fn from(value: Behaviour) -> Self {
        Self::Behaviour(value)
    }
}

impl From<StringTable> for Payload {
    fn from(value: StringTable) -> Self {
        Self::StringTable(value)
    }
}

impl From<SceneGraph> for Payload {
    fn from(value: SceneGraph) -> Self {
        Self::SceneGraph(value)
    }
}

impl From<Neighbourhood> for Payload {
    fn from(value: Neighbourhood) -> Self {
        Self::Neighbourhood(value)
    }
}
