//! Resource type identifiers and their display names
//!
//! One immutable table built on first use. Tooling uses it to label and
//! filter resources; the codec registry uses the same identifiers.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Behaviour program
pub const BHAV: u32 = 0x42484156;
/// Behaviour constants
pub const BCON: u32 = 0x42434F4E;
/// Catalog description strings
pub const CTSS: u32 = 0x43545353;
/// Semi-global reference
pub const GLOB: u32 = 0x474C4F42;
/// Object definition
pub const OBJD: u32 = 0x4F424A44;
/// Object functions
pub const OBJF: u32 = 0x4F424A66;
/// Text list
pub const STR: u32 = 0x53545223;
/// Tree label names
pub const TPRP: u32 = 0x54505250;
/// Constant labels
pub const TRCN: u32 = 0x5452434E;
/// Pie menu functions
pub const TTAB: u32 = 0x54544142;
/// Pie menu strings
pub const TTAS: u32 = 0x54544173;
/// Neighbourhood memories
pub const NGBH: u32 = 0x4E474248;

/// Property set: skin / outfit
pub const GZPS: u32 = 0xEBCF3E27;
/// Property set: outfit binning
pub const BINX: u32 = 0x0C560F39;
/// Property set: build/buy object
pub const XOBJ: u32 = 0xCCA8E925;
/// Property set: floor
pub const XFLR: u32 = 0x4DCADB7E;
/// Property set: fence
pub const XFNC: u32 = 0x2CB230B8;
/// Property set: roof
pub const XROF: u32 = 0xACA8EA06;
/// Property set: wall
pub const XWNT: u32 = 0xED7D7B4D;
/// Property set: mesh overlay
pub const XMOL: u32 = 0x0C1FE246;
/// Property set: tool
pub const XTOL: u32 = 0x2C1FD8A1;
/// Property set: hair tone
pub const XHTN: u32 = 0x8C1580B5;
/// Property set: skin tone
pub const XSTN: u32 = 0x4C158081;
/// Property set: material override
pub const MMAT: u32 = 0x4C697E5A;
/// Property set: sim DNA
pub const SDNA: u32 = 0xEBFEE33F;

/// Scene graph: shape
pub const SHPE: u32 = 0xFC6EB1F7;
/// Scene graph: resource node
pub const CRES: u32 = 0xE519C933;
/// Scene graph: geometric node
pub const GMND: u32 = 0x7BA3838C;
/// Scene graph: geometric data container
pub const GMDC: u32 = 0xAC4F8687;
/// Scene graph: material definition
pub const TXMT: u32 = 0x49596978;
/// Scene graph: texture image
pub const TXTR: u32 = 0x1C4A276C;
/// Scene graph: point light
pub const LPNT: u32 = 0xC9C81BA9;

/// Compression directory
pub const CLST: u32 = crate::index::DIRECTORY_TYPE_ID;

/// Property-set types sharing the property-set codec
pub const PROPERTY_SET_TYPES: &[u32] = &[
    GZPS, BINX, XOBJ, XFLR, XFNC, XROF, XWNT, XMOL, XTOL, XHTN, XSTN, MMAT, SDNA,
];

/// Types stored in the scene-graph container layout
pub const SCENE_GRAPH_TYPES: &[u32] = &[SHPE, CRES, GMND, GMDC, TXMT, TXTR, LPNT];

/// Types whose bytes start with a 64-byte name field
pub const NAMED_BLOCK_TYPES: &[u32] = &[
    BHAV, BCON, CTSS, GLOB, OBJD, OBJF, STR, TPRP, TRCN, TTAB, TTAS,
];

/// One row of the type table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    /// Type identifier
    pub type_id: u32,
    /// Short tag shown in listings
    pub name: &'static str,
    /// Human readable description
    pub description: &'static str,
}

const TYPE_TABLE: &[TypeInfo] = &[
    TypeInfo { type_id: BCON, name: "BCON", description: "Behaviour Constants" },
    TypeInfo { type_id: BHAV, name: "BHAV", description: "Behaviour Function" },
    TypeInfo { type_id: BINX, name: "BINX", description: "Binary Index" },
    TypeInfo { type_id: CLST, name: "CLST", description: "Compressed File Directory" },
    TypeInfo { type_id: CRES, name: "CRES", description: "Resource Node" },
    TypeInfo { type_id: CTSS, name: "CTSS", description: "Catalog Description" },
    TypeInfo { type_id: GLOB, name: "GLOB", description: "Global Data" },
    TypeInfo { type_id: GMDC, name: "GMDC", description: "Geometric Data Container" },
    TypeInfo { type_id: GMND, name: "GMND", description: "Geometric Node" },
    TypeInfo { type_id: GZPS, name: "GZPS", description: "Property Set" },
    TypeInfo { type_id: LPNT, name: "LPNT", description: "Point Light" },
    TypeInfo { type_id: MMAT, name: "MMAT", description: "Material Override" },
    TypeInfo { type_id: NGBH, name: "NGBH", description: "Neighbourhood Data" },
    TypeInfo { type_id: OBJD, name: "OBJD", description: "Object Data" },
    TypeInfo { type_id: OBJF, name: "OBJF", description: "Object Functions" },
    TypeInfo { type_id: SDNA, name: "SDNA", description: "Sim DNA" },
    TypeInfo { type_id: SHPE, name: "SHPE", description: "Shape" },
    TypeInfo { type_id: STR, name: "STR#", description: "Text Lists" },
    TypeInfo { type_id: TPRP, name: "TPRP", description: "Edith SimAntics Behaviour Labels" },
    TypeInfo { type_id: TRCN, name: "TRCN", description: "Behaviour Constant Labels" },
    TypeInfo { type_id: TTAB, name: "TTAB", description: "Pie Menu Functions" },
    TypeInfo { type_id: TTAS, name: "TTAS", description: "Pie Menu Strings" },
    TypeInfo { type_id: TXMT, name: "TXMT", description: "Material Definition" },
    TypeInfo { type_id: TXTR, name: "TXTR", description: "Texture Image" },
    TypeInfo { type_id: XFLR, name: "XFLR", description: "Floor XML" },
    TypeInfo { type_id: XFNC, name: "XFNC", description: "Fence XML" },
    TypeInfo { type_id: XHTN, name: "XHTN", description: "Hair Tone XML" },
    TypeInfo { type_id: XMOL, name: "XMOL", description: "Mesh Overlay XML" },
    TypeInfo { type_id: XOBJ, name: "XOBJ", description: "Object XML" },
    TypeInfo { type_id: XROF, name: "XROF", description: "Roof XML" },
    TypeInfo { type_id: XSTN, name: "XSTN", description: "Skin Tone XML" },
    TypeInfo { type_id: XTOL, name: "XTOL", description: "Tool XML" },
    TypeInfo { type_id: XWNT, name: "XWNT", description: "Wall XML" },
];

struct TypeTable {
    by_id: HashMap<u32, &'static TypeInfo>,
    by_name: HashMap<String, &'static TypeInfo>,
}

static TYPES: LazyLock<TypeTable> = LazyLock::new(|| TypeTable {
    by_id: TYPE_TABLE.iter().map(|info| (info.type_id, info)).collect(),
    by_name: TYPE_TABLE
        .iter()
        .map(|info| (info.name.to_ascii_uppercase(), info))
        .collect(),
});

/// Short name of a type, if known
pub fn type_name(type_id: u32) -> Option<&'static str> {
    TYPES.by_id.get(&type_id).map(|info| info.name)
}

/// Full table row for a type, if known
pub fn type_info(type_id: u32) -> Option<&'static TypeInfo> {
    TYPES.by_id.get(&type_id).copied()
}

/// Type identifier for a short name, case-insensitively
pub fn type_id_by_name(name: &str) -> Option<u32> {
    TYPES
        .by_name
        .get(&name.trim().to_ascii_uppercase())
        .map(|info| info.type_id)
}

/// Every known type, ordered by short name
pub fn known_types() -> &'static [TypeInfo] {
    TYPE_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_both_directions() {
        assert_eq!(type_name(OBJD), Some("OBJD"));
        assert_eq!(type_id_by_name("str#"), Some(STR));
        assert_eq!(type_id_by_name(" gzps "), Some(GZPS));
        assert_eq!(type_name(0x12345678), None);
        assert_eq!(type_id_by_name("NOPE"), None);
    }

    #[test]
    fn test_table_has_unique_ids_and_names() {
        let ids: std::collections::HashSet<_> = known_types().iter().map(|t| t.type_id).collect();
        let names: std::collections::HashSet<_> = known_types().iter().map(|t| t.name).collect();
        assert_eq!(ids.len(), known_types().len());
        assert_eq!(names.len(), known_types().len());
    }

    #[test]
    fn test_every_codec_type_is_named() {
        for id in PROPERTY_SET_TYPES.iter().chain(SCENE_GRAPH_TYPES) {
            assert!(type_name(*id).is_some(), "missing name for {id:08X}");
        }
    }
}
