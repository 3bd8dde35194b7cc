//! Scene graph containers (RCOL)
//!
//! An RCOL resource is a list of references to other resources followed
//! by a table of block class ids and then the blocks themselves:
//!
//! ```text
//! [0xFFFF0001]            optional marker, links then carry a resource id
//! u32 link count
//! links                   group, instance, [resource], type
//! u32 block count
//! u32 block ids
//! blocks                  var-string name, u32 id, body
//! ```
//!
//! `cShape`, `cResourceNode` and `cDataListExtension` bodies are modelled.
//! Decoding stops at the first block of any other class and the bytes from
//! there on are carried verbatim, so encoding reproduces them exactly.

mod data_list;
mod resource_node;
mod shape;

pub use data_list::{
    DATA_LIST_BLOCK_ID, DataListExtension, ExtensionItem, ExtensionValue, MAX_EXTENSION_DEPTH,
};
pub use resource_node::{
    CompositionTreeNode, RESOURCE_NODE_BLOCK_ID, ResourceNode, ResourceNodeBody, ResourceNodeItem,
};
pub use shape::{
    BlockHeader, GraphExtension, ObjectGraphNode, PART_DATA_SIZE, ReferentNode, SHAPE_BLOCK_ID,
    SgResource, Shape, ShapeItem, ShapeItemDetail, ShapePart,
};

use super::Resource;
use super::error::{ResourceError, ResourceResult};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde_json::{Value, json};
use tracing::debug;

/// Marker announcing links with a resource id
pub const LINK_VERSION_MARKER: u32 = 0xFFFF_0001;

/// Reference from a scene graph to another resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RcolLink {
    /// Group of the target
    pub group_id: u32,
    /// Instance of the target
    pub instance_id: u32,
    /// Resource id of the target, when the container stores one
    pub resource_id: Option<u32>,
    /// Type of the target
    pub type_id: u32,
}

impl RcolLink {
    /// Target as a resource key
    pub const fn to_key(&self) -> ResourceKey {
        let resource_id = match self.resource_id {
            Some(id) => id,
            None => 0,
        };
        ResourceKey::new(self.type_id, self.group_id, self.instance_id, resource_id)
    }
}

/// A modelled block
#[derive(Debug, Clone, PartialEq)]
pub enum RcolBlock {
    /// `cShape`
    Shape(Shape),
    /// `cResourceNode`
    ResourceNode(ResourceNode),
    /// `cDataListExtension`
    DataListExtension(DataListExtension),
}

impl RcolBlock {
    fn encoded_len(&self) -> usize {
        match self {
            Self::Shape(shape) => shape.encoded_len(),
            Self::ResourceNode(node) => node.encoded_len(),
            Self::DataListExtension(ext) => ext.encoded_len(),
        }
    }

    fn write(&self, writer: &mut ByteWriter) {
        match self {
            Self::Shape(shape) => shape.write(writer),
            Self::ResourceNode(node) => node.write(writer),
            Self::DataListExtension(ext) => ext.write(writer),
        }
    }

    fn to_export_tree(&self) -> Value {
        match self {
            Self::Shape(shape) => shape.to_export_tree(),
            Self::ResourceNode(node) => node.to_export_tree(),
            Self::DataListExtension(ext) => ext.to_export_tree(),
        }
    }
}

/// Decoded RCOL container
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    key: ResourceKey,
    has_marker: bool,
    links: Vec<RcolLink>,
    block_ids: Vec<u32>,
    blocks: Vec<RcolBlock>,
    tail: Vec<u8>,
    dirty: bool,
}

impl SceneGraph {
    /// Decode a scene graph container
    pub fn decode(key: ResourceKey, data: &[u8]) -> ResourceResult<Self> {
        let mut reader = ByteReader::new(data);

        let mut count = reader.read_u32(Endian::Little)?;
        let has_marker = count == LINK_VERSION_MARKER;
        if has_marker {
            count = reader.read_u32(Endian::Little)?;
        }
        let record = if has_marker { 16 } else { 12 };
        if (count as usize).saturating_mul(record) > reader.remaining() {
            return Err(ResourceError::Malformed(format!(
                "{count} links do not fit in {} bytes",
                reader.remaining()
            )));
        }
        let mut links = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let group_id = reader.read_u32(Endian::Little)?;
            let instance_id = reader.read_u32(Endian::Little)?;
            let resource_id = if has_marker {
                Some(reader.read_u32(Endian::Little)?)
            } else {
                None
            };
            let type_id = reader.read_u32(Endian::Little)?;
            links.push(RcolLink {
                group_id,
                instance_id,
                resource_id,
                type_id,
            });
        }

        let count = reader.read_u32(Endian::Little)?;
        if (count as usize).saturating_mul(4) > reader.remaining() {
            return Err(ResourceError::Malformed(format!(
                "{count} block ids do not fit in {} bytes",
                reader.remaining()
            )));
        }
        let mut block_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            block_ids.push(reader.read_u32(Endian::Little)?);
        }

        let mut blocks = Vec::new();
        for _ in 0..block_ids.len() {
            let start = reader.position();
            let header = BlockHeader::read(&mut reader)?;
            let block = match header.block_id {
                SHAPE_BLOCK_ID => RcolBlock::Shape(Shape::read(&mut reader, header)?),
                RESOURCE_NODE_BLOCK_ID => {
                    RcolBlock::ResourceNode(ResourceNode::read(&mut reader, header)?)
                }
                DATA_LIST_BLOCK_ID => {
                    RcolBlock::DataListExtension(DataListExtension::read(&mut reader, header)?)
                }
                _ => {
                    debug!(
                        "Keeping {} bytes from block '{}' (0x{:08X}) of {} verbatim",
                        data.len() - start,
                        header.name,
                        header.block_id,
                        key
                    );
                    reader.seek(start)?;
                    break;
                }
            };
            blocks.push(block);
        }

        Ok(Self {
            key,
            has_marker,
            links,
            block_ids,
            blocks,
            tail: reader.read_rest().to_vec(),
            dirty: false,
        })
    }

    /// References to other resources
    pub fn links(&self) -> &[RcolLink] {
        &self.links
    }

    /// Class ids of every block, modelled or not
    pub fn block_ids(&self) -> &[u32] {
        &self.block_ids
    }

    /// Blocks decoded before the first unmodelled one
    pub fn blocks(&self) -> &[RcolBlock] {
        &self.blocks
    }

    /// Bytes kept verbatim after the modelled blocks
    pub fn opaque_tail(&self) -> &[u8] {
        &self.tail
    }

    /// Decoded shapes
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.blocks.iter().filter_map(|block| match block {
            RcolBlock::Shape(shape) => Some(shape),
            _ => None,
        })
    }

    fn shapes_mut(&mut self) -> impl Iterator<Item = &mut Shape> {
        self.blocks.iter_mut().filter_map(|block| match block {
            RcolBlock::Shape(shape) => Some(shape),
            _ => None,
        })
    }

    /// Decoded resource nodes
    pub fn resource_nodes(&self) -> impl Iterator<Item = &ResourceNode> {
        self.blocks.iter().filter_map(|block| match block {
            RcolBlock::ResourceNode(node) => Some(node),
            _ => None,
        })
    }

    /// Decoded data list extensions
    pub fn data_lists(&self) -> impl Iterator<Item = &DataListExtension> {
        self.blocks.iter().filter_map(|block| match block {
            RcolBlock::DataListExtension(ext) => Some(ext),
            _ => None,
        })
    }

    /// Rename a mesh subset in every shape; returns the number of parts changed
    pub fn rename_subset(&mut self, old: &str, new: &str) -> usize {
        let renamed: usize = self.shapes_mut().map(|s| s.rename_subset(old, new)).sum();
        if renamed > 0 {
            self.dirty = true;
        }
        renamed
    }

    /// Material bound to `subset` in the first shape that has it
    pub fn subset_material(&self, subset: &str) -> Option<&str> {
        self.shapes().find_map(|s| s.subset_material(subset))
    }

    /// Bind a material to a subset in every shape
    pub fn set_subset_material(&mut self, subset: &str, material: &str) -> ResourceResult<()> {
        let changed: usize = self
            .shapes_mut()
            .map(|s| s.set_subset_material(subset, material))
            .sum();
        if changed == 0 {
            return Err(ResourceError::NotFound(format!("subset '{subset}'")));
        }
        self.dirty = true;
        Ok(())
    }

    /// Set the primary level of detail on every shape that stores one
    pub fn set_lod(&mut self, lod: u32) -> ResourceResult<()> {
        let updated = self
            .shapes_mut()
            .map(|s| s.set_lod(lod))
            .filter(|&set| set)
            .count();
        if updated == 0 {
            return Err(ResourceError::NotFound("shape with a LOD list".to_string()));
        }
        self.dirty = true;
        Ok(())
    }
}

impl Resource for SceneGraph {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        let marker = if self.has_marker { 4 } else { 0 };
        let link = if self.has_marker { 16 } else { 12 };
        marker
            + 4
            + self.links.len() * link
            + 4
            + self.block_ids.len() * 4
            + self.blocks.iter().map(RcolBlock::encoded_len).sum::<usize>()
            + self.tail.len()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        if self.has_marker {
            writer.write_u32(LINK_VERSION_MARKER, Endian::Little);
        }
        writer.write_u32(self.links.len() as u32, Endian::Little);
        for link in &self.links {
            writer.write_u32(link.group_id, Endian::Little);
            writer.write_u32(link.instance_id, Endian::Little);
            if self.has_marker {
                writer.write_u32(link.resource_id.unwrap_or(0), Endian::Little);
            }
            writer.write_u32(link.type_id, Endian::Little);
        }
        writer.write_u32(self.block_ids.len() as u32, Endian::Little);
        for id in &self.block_ids {
            writer.write_u32(*id, Endian::Little);
        }
        for block in &self.blocks {
            block.write(writer);
        }
        writer.write_bytes(&self.tail);
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn display_name(&self) -> Option<String> {
        self.blocks.iter().find_map(|block| match block {
            RcolBlock::Shape(shape) => Some(shape.resource.file_name.clone()),
            RcolBlock::ResourceNode(node) => node.name().map(str::to_string),
            RcolBlock::DataListExtension(_) => None,
        })
    }

    fn to_export_tree(&self) -> Value {
        let links: Vec<String> = self.links.iter().map(|l| l.to_key().to_string()).collect();
        let block_ids: Vec<String> = self
            .block_ids
            .iter()
            .map(|id| format!("0x{id:08X}"))
            .collect();
        let blocks: Vec<Value> = self.blocks.iter().map(RcolBlock::to_export_tree).collect();
        json!({
            "format": "scene-graph",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "links": links,
            "block_ids": block_ids,
            "blocks": blocks,
            "opaque_tail_bytes": self.tail.len(),
        })
    }
}
