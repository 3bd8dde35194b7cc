//! Type-to-codec dispatch table

use super::error::ResourceResult;
use super::{
    Behaviour, DecodeOptions, Neighbourhood, ObjectDefinition, Payload, PropertySet, SceneGraph,
    StringTable,
};
use crate::key::ResourceKey;
use crate::types;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

/// Decoder turning a resource's bytes into a payload
pub type DecodeFn = fn(ResourceKey, &[u8], &DecodeOptions) -> ResourceResult<Payload>;

/// One registered codec
///
/// Encoding needs no entry here: every payload encodes itself through
/// [`Resource::encode`](super::Resource::encode).
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    /// Type identifier handled
    pub type_id: u32,
    /// Short type name
    pub name: &'static str,
    /// Decoder
    pub decode: DecodeFn,
}

/// Immutable mapping from type identifier to codec
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<u32, Codec>,
}

/// Builder for [`CodecRegistry`]
#[derive(Debug, Clone, Default)]
pub struct CodecRegistryBuilder {
    codecs: HashMap<u32, Codec>,
}

impl CodecRegistryBuilder {
    /// Register `decode` for `type_id`, replacing any earlier registration
    #[must_use]
    pub fn register(mut self, type_id: u32, name: &'static str, decode: DecodeFn) -> Self {
        self.codecs.insert(
            type_id,
            Codec {
                type_id,
                name,
                decode,
            },
        );
        self
    }

    /// Register the same decoder for several types, named from the type table
    #[must_use]
    pub fn register_all(mut self, type_ids: &[u32], decode: DecodeFn) -> Self {
        for &type_id in type_ids {
            let name = types::type_name(type_id).unwrap_or("????");
            self = self.register(type_id, name, decode);
        }
        self
    }

    /// Freeze the table
    pub fn build(self) -> CodecRegistry {
        CodecRegistry {
            codecs: self.codecs,
        }
    }
}

fn decode_property_set(
    key: ResourceKey,
    data: &[u8],
    options: &DecodeOptions,
) -> ResourceResult<Payload> {
    PropertySet::decode(key, data, options).map(Payload::from)
}

fn decode_object_definition(
    key: ResourceKey,
    data: &[u8],
    _: &DecodeOptions,
) -> ResourceResult<Payload> {
    ObjectDefinition::decode(key, data).map(Payload::from)
}

fn decode_behaviour(
    key: ResourceKey,
    data: &[u8],
    _: &DecodeOptions,
) -> ResourceResult<Payload> {
    Behaviour::decode(key, data).map(Payload::from)
}

fn decode_string_table(
    key: ResourceKey,
    data: &[u8],
    _: &DecodeOptions,
) -> ResourceResult<Payload> {
    StringTable::decode(key, data).map(Payload::from)
}

fn decode_scene_graph(
    key: ResourceKey,
    data: &[u8],
    _: &DecodeOptions,
) -> ResourceResult<Payload> {
    SceneGraph::decode(key, data).map(Payload::from)
}

fn decode_neighbourhood(
    key: ResourceKey,
    data: &[u8],
    _: &DecodeOptions,
) -> ResourceResult<Payload> {
    Neighbourhood::decode(key, data).map(Payload::from)
}

static STANDARD: LazyLock<Arc<CodecRegistry>> = LazyLock::new(|| {
    Arc::new(
        CodecRegistry::builder()
            .register_all(types::PROPERTY_SET_TYPES, decode_property_set)
            .register(types::OBJD, "OBJD", decode_object_definition)
            .register(types::BHAV, "BHAV", decode_behaviour)
            .register_all(&[types::STR, types::CTSS, types::TTAS], decode_string_table)
            .register_all(types::SCENE_GRAPH_TYPES, decode_scene_graph)
            .register(types::NGBH, "NGBH", decode_neighbourhood)
            .build(),
    )
});

impl CodecRegistry {
    /// Start an empty table
    pub fn builder() -> CodecRegistryBuilder {
        CodecRegistryBuilder::default()
    }

    /// Shared table with every codec this crate provides
    pub fn standard() -> Arc<Self> {
        Arc::clone(&STANDARD)
    }

    /// Codec for a type
    pub fn get(&self, type_id: u32) -> Option<&Codec> {
        self.codecs.get(&type_id)
    }

    /// Whether a type has a codec
    pub fn is_registered(&self, type_id: u32) -> bool {
        self.codecs.contains_key(&type_id)
    }

    /// Registered type identifiers, sorted
    pub fn registered_types(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.codecs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Decode with the codec for `key.type_id`; `None` for unregistered types
    pub fn decode(
        &self,
        key: ResourceKey,
        data: &[u8],
        options: &DecodeOptions,
    ) -> Option<ResourceResult<Payload>> {
        self.codecs
            .get(&key.type_id)
            .map(|codec| (codec.decode)(key, data, options))
    }
}
