//! `cResourceNode` block
//!
//! The node opens with a version and a type code. Type code 1 nodes embed a
//! `cSGResource`, a `cCompositionTreeNode` and a `cObjectGraphNode`, then a
//! byte-counted list of child references. Type code 0 nodes embed only the
//! graph node and a single child reference. Both end with a `u32`.

use super::shape::{BlockHeader, ObjectGraphNode, SgResource};
use crate::cursor::{ByteReader, ByteWriter};
use crate::resource::error::{ResourceError, ResourceResult};
use binrw::Endian;
use serde_json::{Value, json};

/// Block id of `cResourceNode`
pub const RESOURCE_NODE_BLOCK_ID: u32 = 0xE519_C933;

/// Reference from a resource node to one of its child blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceNodeItem {
    /// Leading flags
    pub flags: u16,
    /// Packed reference; the top byte is the child block index
    pub reference: i32,
}

impl ResourceNodeItem {
    const SIZE: usize = 6;

    fn read(reader: &mut ByteReader<'_>) -> ResourceResult<Self> {
        Ok(Self {
            flags: reader.read_u16(Endian::Little)?,
            reference: reader.read_i32(Endian::Little)?,
        })
    }

    fn write(self, writer: &mut ByteWriter) {
        writer.write_u16(self.flags, Endian::Little);
        writer.write_i32(self.reference, Endian::Little);
    }

    /// Index of the referenced block within the container
    pub const fn child_block(self) -> u8 {
        (self.reference >> 24) as u8
    }
}

/// `cCompositionTreeNode`: version plus an embedded graph node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionTreeNode {
    /// Sub-block header
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Embedded `cObjectGraphNode`
    pub graph: ObjectGraphNode,
}

impl CompositionTreeNode {
    fn read(reader: &mut ByteReader<'_>) -> ResourceResult<Self> {
        let header = BlockHeader::read(reader)?;
        let version = reader.read_u32(Endian::Little)?;
        let graph = ObjectGraphNode::read(reader)?;
        Ok(Self {
            header,
            version,
            graph,
        })
    }

    fn encoded_len(&self) -> usize {
        self.header.encoded_len() + 4 + self.graph.encoded_len()
    }

    fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        self.graph.write(writer);
    }
}

/// Type-code dependent part of a resource node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceNodeBody {
    /// Type code 1
    Tree {
        /// Embedded `cSGResource`
        resource: SgResource,
        /// Embedded `cCompositionTreeNode`
        tree: CompositionTreeNode,
        /// Embedded `cObjectGraphNode`
        graph: ObjectGraphNode,
        /// Child references
        items: Vec<ResourceNodeItem>,
        /// Value after the child list
        extra: i32,
    },
    /// Type code 0
    Graph {
        /// Embedded `cObjectGraphNode`
        graph: ObjectGraphNode,
        /// The only child reference
        item: ResourceNodeItem,
    },
}

/// Decoded `cResourceNode` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNode {
    /// Block header as stored in the container
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Type-code dependent content
    pub body: ResourceNodeBody,
    /// Closing value
    pub trailer: i32,
}

impl ResourceNode {
    /// Parse the body that follows `header`
    pub(crate) fn read(reader: &mut ByteReader<'_>, header: BlockHeader) -> ResourceResult<Self> {
        let version = reader.read_u32(Endian::Little)?;
        let type_code = reader.read_u8()?;
        let body = match type_code {
            1 => {
                let resource = SgResource::read(reader)?;
                let tree = CompositionTreeNode::read(reader)?;
                let graph = ObjectGraphNode::read(reader)?;
                let count = reader.read_u8()?;
                let mut items = Vec::with_capacity(usize::from(count));
                for _ in 0..count {
                    items.push(ResourceNodeItem::read(reader)?);
                }
                let extra = reader.read_i32(Endian::Little)?;
                ResourceNodeBody::Tree {
                    resource,
                    tree,
                    graph,
                    items,
                    extra,
                }
            }
            0 => ResourceNodeBody::Graph {
                graph: ObjectGraphNode::read(reader)?,
                item: ResourceNodeItem::read(reader)?,
            },
            other => {
                return Err(ResourceError::Malformed(format!(
                    "unknown cResourceNode type code 0x{other:02X} (version 0x{version:04X})"
                )));
            }
        };
        let trailer = reader.read_i32(Endian::Little)?;
        Ok(Self {
            header,
            version,
            body,
            trailer,
        })
    }

    /// Stored type code
    pub const fn type_code(&self) -> u8 {
        match self.body {
            ResourceNodeBody::Tree { .. } => 1,
            ResourceNodeBody::Graph { .. } => 0,
        }
    }

    /// The node's object graph
    pub const fn graph(&self) -> &ObjectGraphNode {
        match &self.body {
            ResourceNodeBody::Tree { graph, .. } | ResourceNodeBody::Graph { graph, .. } => graph,
        }
    }

    /// Scene graph name: the resource name, else the graph node's file name
    pub fn name(&self) -> Option<&str> {
        match &self.body {
            ResourceNodeBody::Tree { resource, .. } => Some(resource.file_name.as_str()),
            ResourceNodeBody::Graph { graph, .. } => graph.file_name.as_deref(),
        }
    }

    /// Indices of the child blocks this node references
    pub fn child_blocks(&self) -> Vec<u8> {
        match &self.body {
            ResourceNodeBody::Tree { items, .. } => {
                items.iter().map(|item| item.child_block()).collect()
            }
            ResourceNodeBody::Graph { item, .. } => vec![item.child_block()],
        }
    }

    /// Bytes written by [`ResourceNode::write`], header included
    pub(crate) fn encoded_len(&self) -> usize {
        let body = match &self.body {
            ResourceNodeBody::Tree {
                resource,
                tree,
                graph,
                items,
                ..
            } => {
                resource.encoded_len()
                    + tree.encoded_len()
                    + graph.encoded_len()
                    + 1
                    + items.len() * ResourceNodeItem::SIZE
                    + 4
            }
            ResourceNodeBody::Graph { graph, .. } => graph.encoded_len() + ResourceNodeItem::SIZE,
        };
        self.header.encoded_len() + 4 + 1 + body + 4
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        writer.write_u8(self.type_code());
        match &self.body {
            ResourceNodeBody::Tree {
                resource,
                tree,
                graph,
                items,
                extra,
            } => {
                resource.write(writer);
                tree.write(writer);
                graph.write(writer);
                writer.write_u8(items.len() as u8);
                for item in items {
                    item.write(writer);
                }
                writer.write_i32(*extra, Endian::Little);
            }
            ResourceNodeBody::Graph { graph, item } => {
                graph.write(writer);
                item.write(writer);
            }
        }
        writer.write_i32(self.trailer, Endian::Little);
    }

    pub(crate) fn to_export_tree(&self) -> Value {
        json!({
            "block": self.header.name,
            "version": self.version,
            "type_code": self.type_code(),
            "name": self.name(),
            "graph_node": self.graph().file_name,
            "child_blocks": self.child_blocks(),
        })
    }
}
