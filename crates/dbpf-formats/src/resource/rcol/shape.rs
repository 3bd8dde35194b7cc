//! `cShape` block and the sub-blocks it embeds

use crate::cursor::{ByteReader, ByteWriter, CursorResult, var_string_len};
use binrw::Endian;
use serde_json::{Value, json};

/// Block id of `cShape`
pub const SHAPE_BLOCK_ID: u32 = 0xFC6E_B1F7;

/// Size of the opaque trailer on every shape part
pub const PART_DATA_SIZE: usize = 9;

/// Name and id that precede every block body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    /// Class name, e.g. `cShape`
    pub name: String,
    /// Class id
    pub block_id: u32,
}

impl BlockHeader {
    pub(crate) fn read(reader: &mut ByteReader<'_>) -> CursorResult<Self> {
        let name = reader.read_var_string()?;
        let block_id = reader.read_u32(Endian::Little)?;
        Ok(Self { name, block_id })
    }

    pub(crate) fn encoded_len(&self) -> usize {
        var_string_len(&self.name) + 4
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) {
        writer.write_var_string(&self.name);
        writer.write_u32(self.block_id, Endian::Little);
    }
}

/// `cSGResource`: carries the scene graph file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SgResource {
    /// Sub-block header
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Scene graph file name
    pub file_name: String,
}

impl SgResource {
    pub(super) fn read(reader: &mut ByteReader<'_>) -> CursorResult<Self> {
        let header = BlockHeader::read(reader)?;
        let version = reader.read_u32(Endian::Little)?;
        let file_name = reader.read_var_string()?;
        Ok(Self {
            header,
            version,
            file_name,
        })
    }

    pub(super) fn encoded_len(&self) -> usize {
        self.header.encoded_len() + 4 + var_string_len(&self.file_name)
    }

    pub(super) fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        writer.write_var_string(&self.file_name);
    }
}

/// `cReferentNode`: version only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferentNode {
    /// Sub-block header
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
}

impl ReferentNode {
    fn read(reader: &mut ByteReader<'_>) -> CursorResult<Self> {
        let header = BlockHeader::read(reader)?;
        let version = reader.read_u32(Endian::Little)?;
        Ok(Self { header, version })
    }

    fn encoded_len(&self) -> usize {
        self.header.encoded_len() + 4
    }

    fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
    }
}

/// Extension reference inside a `cObjectGraphNode`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphExtension {
    /// Enabled flag
    pub enabled: u8,
    /// Dependency flag
    pub dependent: u8,
    /// Index of the referenced block
    pub index: u32,
}

/// `cObjectGraphNode`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectGraphNode {
    /// Sub-block header
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Extension references
    pub extensions: Vec<GraphExtension>,
    /// Node file name, present in version 4
    pub file_name: Option<String>,
}

impl ObjectGraphNode {
    const VERSION_WITH_NAME: u32 = 4;

    pub(super) fn read(reader: &mut ByteReader<'_>) -> CursorResult<Self> {
        let header = BlockHeader::read(reader)?;
        let version = reader.read_u32(Endian::Little)?;
        let count = reader.read_u32(Endian::Little)?;
        let mut extensions = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            extensions.push(GraphExtension {
                enabled: reader.read_u8()?,
                dependent: reader.read_u8()?,
                index: reader.read_u32(Endian::Little)?,
            });
        }
        let file_name = if version == Self::VERSION_WITH_NAME {
            Some(reader.read_var_string()?)
        } else {
            None
        };
        Ok(Self {
            header,
            version,
            extensions,
            file_name,
        })
    }

    pub(super) fn encoded_len(&self) -> usize {
        self.header.encoded_len()
            + 8
            + self.extensions.len() * 6
            + self.file_name.as_deref().map_or(0, var_string_len)
    }

    pub(super) fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        writer.write_u32(self.extensions.len() as u32, Endian::Little);
        for ext in &self.extensions {
            writer.write_u8(ext.enabled);
            writer.write_u8(ext.dependent);
            writer.write_u32(ext.index, Endian::Little);
        }
        if let Some(name) = &self.file_name {
            writer.write_var_string(name);
        }
    }
}

/// Version-dependent tail of a shape item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeItemDetail {
    /// Versions 6 and 7
    Numeric {
        /// First field
        value: i32,
        /// Second field
        flag: u8,
    },
    /// Later versions reference a mesh by name
    Named(String),
}

/// Mesh reference of a shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeItem {
    /// Leading integer
    pub value: i32,
    /// Leading flag
    pub flag: u8,
    /// Remainder
    pub detail: ShapeItemDetail,
}

impl ShapeItem {
    fn read(reader: &mut ByteReader<'_>, version: u32) -> CursorResult<Self> {
        let value = reader.read_i32(Endian::Little)?;
        let flag = reader.read_u8()?;
        let detail = if Shape::has_numeric_items(version) {
            ShapeItemDetail::Numeric {
                value: reader.read_i32(Endian::Little)?,
                flag: reader.read_u8()?,
            }
        } else {
            ShapeItemDetail::Named(reader.read_var_string()?)
        };
        Ok(Self {
            value,
            flag,
            detail,
        })
    }

    fn encoded_len(&self) -> usize {
        5 + match &self.detail {
            ShapeItemDetail::Numeric { .. } => 5,
            ShapeItemDetail::Named(name) => var_string_len(name),
        }
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_i32(self.value, Endian::Little);
        writer.write_u8(self.flag);
        match &self.detail {
            ShapeItemDetail::Numeric { value, flag } => {
                writer.write_i32(*value, Endian::Little);
                writer.write_u8(*flag);
            }
            ShapeItemDetail::Named(name) => writer.write_var_string(name),
        }
    }

    /// Mesh name, if this item carries one
    pub fn file_name(&self) -> Option<&str> {
        match &self.detail {
            ShapeItemDetail::Named(name) => Some(name),
            ShapeItemDetail::Numeric { .. } => None,
        }
    }
}

/// Subset to material binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePart {
    /// Mesh subset name
    pub subset: String,
    /// Material definition name
    pub material: String,
    data: [u8; PART_DATA_SIZE],
}

impl ShapePart {
    fn read(reader: &mut ByteReader<'_>) -> CursorResult<Self> {
        let subset = reader.read_var_string()?;
        let material = reader.read_var_string()?;
        let mut data = [0u8; PART_DATA_SIZE];
        data.copy_from_slice(reader.read_bytes(PART_DATA_SIZE)?);
        Ok(Self {
            subset,
            material,
            data,
        })
    }

    fn encoded_len(&self) -> usize {
        var_string_len(&self.subset) + var_string_len(&self.material) + PART_DATA_SIZE
    }

    fn write(&self, writer: &mut ByteWriter) {
        writer.write_var_string(&self.subset);
        writer.write_var_string(&self.material);
        writer.write_bytes(&self.data);
    }
}

/// Decoded `cShape` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    /// Block header as stored in the container
    pub header: BlockHeader,
    /// Block version
    pub version: u32,
    /// Embedded `cSGResource`
    pub resource: SgResource,
    /// Embedded `cReferentNode`
    pub referent: ReferentNode,
    /// Embedded `cObjectGraphNode`
    pub graph: ObjectGraphNode,
    lods: Vec<u32>,
    items: Vec<ShapeItem>,
    parts: Vec<ShapePart>,
}

impl Shape {
    const VERSION_WITHOUT_LODS: u32 = 6;

    const fn has_numeric_items(version: u32) -> bool {
        matches!(version, 6 | 7)
    }

    const fn has_lods(&self) -> bool {
        self.version != Self::VERSION_WITHOUT_LODS
    }

    /// Parse the body that follows `header`
    pub(crate) fn read(reader: &mut ByteReader<'_>, header: BlockHeader) -> CursorResult<Self> {
        let version = reader.read_u32(Endian::Little)?;
        let resource = SgResource::read(reader)?;
        let referent = ReferentNode::read(reader)?;
        let graph = ObjectGraphNode::read(reader)?;

        let mut lods = Vec::new();
        if version != Self::VERSION_WITHOUT_LODS {
            let count = reader.read_u32(Endian::Little)?;
            for _ in 0..count {
                lods.push(reader.read_u32(Endian::Little)?);
            }
        }

        let count = reader.read_u32(Endian::Little)?;
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(ShapeItem::read(reader, version)?);
        }

        let count = reader.read_u32(Endian::Little)?;
        let mut parts = Vec::new();
        for _ in 0..count {
            parts.push(ShapePart::read(reader)?);
        }

        Ok(Self {
            header,
            version,
            resource,
            referent,
            graph,
            lods,
            items,
            parts,
        })
    }

    /// Bytes written by [`Shape::write`], header included
    pub(crate) fn encoded_len(&self) -> usize {
        let lods = if self.has_lods() {
            4 + self.lods.len() * 4
        } else {
            0
        };
        self.header.encoded_len()
            + 4
            + self.resource.encoded_len()
            + self.referent.encoded_len()
            + self.graph.encoded_len()
            + lods
            + 4
            + self.items.iter().map(ShapeItem::encoded_len).sum::<usize>()
            + 4
            + self.parts.iter().map(ShapePart::encoded_len).sum::<usize>()
    }

    pub(crate) fn write(&self, writer: &mut ByteWriter) {
        self.header.write(writer);
        writer.write_u32(self.version, Endian::Little);
        self.resource.write(writer);
        self.referent.write(writer);
        self.graph.write(writer);
        if self.has_lods() {
            writer.write_u32(self.lods.len() as u32, Endian::Little);
            for lod in &self.lods {
                writer.write_u32(*lod, Endian::Little);
            }
        }
        writer.write_u32(self.items.len() as u32, Endian::Little);
        for item in &self.items {
            item.write(writer);
        }
        writer.write_u32(self.parts.len() as u32, Endian::Little);
        for part in &self.parts {
            part.write(writer);
        }
    }

    /// Primary level of detail, 0 when the list is empty
    pub fn lod(&self) -> u32 {
        self.lods.first().copied().unwrap_or(0)
    }

    /// Set the primary level of detail
    ///
    /// Returns false for version 6 shapes, which store no LOD list.
    pub fn set_lod(&mut self, lod: u32) -> bool {
        if !self.has_lods() {
            return false;
        }
        match self.lods.first_mut() {
            Some(first) => *first = lod,
            None => self.lods.push(lod),
        }
        true
    }

    /// Mesh references
    pub fn items(&self) -> &[ShapeItem] {
        &self.items
    }

    /// Subset to material bindings
    pub fn parts(&self) -> &[ShapePart] {
        &self.parts
    }

    /// Rename every part bound to `old`; returns how many changed
    pub fn rename_subset(&mut self, old: &str, new: &str) -> usize {
        let mut renamed = 0;
        for part in self.parts.iter_mut().filter(|p| p.subset == old) {
            part.subset = new.to_string();
            renamed += 1;
        }
        renamed
    }

    /// Material bound to `subset`
    pub fn subset_material(&self, subset: &str) -> Option<&str> {
        self.parts
            .iter()
            .find(|p| p.subset == subset)
            .map(|p| p.material.as_str())
    }

    /// Bind `material` to every part of `subset`; returns how many changed
    pub fn set_subset_material(&mut self, subset: &str, material: &str) -> usize {
        let mut changed = 0;
        for part in self.parts.iter_mut().filter(|p| p.subset == subset) {
            part.material = material.to_string();
            changed += 1;
        }
        changed
    }

    pub(crate) fn to_export_tree(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| match &item.detail {
                ShapeItemDetail::Numeric { value, flag } => json!({
                    "value": item.value,
                    "flag": item.flag,
                    "detail": [value, flag],
                }),
                ShapeItemDetail::Named(name) => json!({
                    "value": item.value,
                    "flag": item.flag,
                    "file_name": name,
                }),
            })
            .collect();
        let parts: Vec<Value> = self
            .parts
            .iter()
            .map(|p| json!({"subset": p.subset, "material": p.material}))
            .collect();
        json!({
            "block": self.header.name,
            "version": self.version,
            "file_name": self.resource.file_name,
            "graph_node": self.graph.file_name,
            "lods": self.lods,
            "items": items,
            "parts": parts,
        })
    }
}
