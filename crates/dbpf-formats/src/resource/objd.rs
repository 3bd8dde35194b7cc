//! Object definitions (OBJD)
//!
//! A 64-byte name followed by a flat table of little-endian `u16` fields.
//! Table length varies between game versions, so fields past the end are
//! simply absent. An odd trailing byte is kept as-is.

use super::error::{ResourceError, ResourceResult};
use super::{NAME_FIELD_SIZE, Resource};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde_json::{Map, Value, json};

/// Named positions in the object definition field table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum ObjdField {
    Version1,
    Version2,
    InitialStackSize,
    DefaultWallAdjacentFlags,
    DefaultPlacementFlags,
    DefaultWallPlacementFlags,
    DefaultAllowedHeightFlags,
    InteractionTableId,
    InteractionGroup,
    Type,
    MultiTileMasterId,
    MultiTileSubIndex,
    UseDefaultPlacementFlags,
    LookAtScore,
    Guid1,
    Guid2,
    ItemIsUnlockable,
    CatalogUseFlags,
    Price,
    BodyStringsId,
    SlotsId,
    DiagonalSelectorGuid1,
    DiagonalSelectorGuid2,
    GridAlignedSelectorGuid1,
    GridAlignedSelectorGuid2,
    ObjectOwnershipFlags,
    IgnoreGlobalSimFieldInCASLot,
    CannotMoveOutWith,
    Hauntable,
    ProxyGuid1,
    ProxyGuid2,
    SlotGroup,
    AspirationFlags,
    MemoryType,
    IgnoreQuarterTilePlacement,
    InitialDepreciation,
    DailyDepreciation,
    SelfDepreciating,
    DepreciationLimit,
    RoomSortFlags,
    FunctionSortFlags,
    CatalogueStringsId,
    IsGlobalSimObject,
    ToolTipNameType,
    TemplateVersion,
    NicenessMultiplier,
    NoDuplicateOnPlacement,
    WantCategory,
    NoNewNameFromTemplate,
    ObjectVersion,
    DefaultThumbnailId,
    MotiveEffectsId,
    JobObjectGuid1,
    JobObjectGuid2,
    CatalogPopupId,
    IgnoreCurrentModelIndexInIcons,
    LevelOffset,
    ShadowType,
    NumAttributes,
    NumberOfObjectArrays,
    ForSaleFlags,
    FrontDirection,
    Unused62,
    MultiTileLeadObject,
    ValidEPFlags1,
    ValidEPFlags2,
    ChairEntryFlags,
    TileWidth,
    InhibitSuitCopying,
    BuildModeType,
    OriginalGuid1,
    OriginalGuid2,
    DefaultGraphic,
    NotSureAnyMore,
    BuildModeSubsort,
    SelectorCategory,
    SelectorSubCategory,
    FootprintMask,
    ExtendFootprint,
    ObjectSize,
    Unused80,
    Unused81,
    RatingHunger,
    RatingComfort,
    RatingHygiene,
    RatingBladder,
    RatingEnergy,
    RatingFun,
    RatingRoom,
    RatingSkillFlags,
    NumTypeAttributes,
    MiscFlags,
    Unused92,
    Unused93,
    FunctionSubSort,
    DowntownSort,
    KeepBuying,
    HolidaySort,
    ResetLotAction,
    GraphicObjectType,
    CommunitySort,
    DreamFlags,
    ThumbnailFlags,
    RatingScratch,
    RatingChew,
    Unused105,
    Unused106,
    Requirements,
}

impl ObjdField {
    /// Every field, in table order
    pub const ALL: [Self; 108] = [
        Self::Version1,
        Self::Version2,
        Self::InitialStackSize,
        Self::DefaultWallAdjacentFlags,
        Self::DefaultPlacementFlags,
        Self::DefaultWallPlacementFlags,
        Self::DefaultAllowedHeightFlags,
        Self::InteractionTableId,
        Self::InteractionGroup,
        Self::Type,
        Self::MultiTileMasterId,
        Self::MultiTileSubIndex,
        Self::UseDefaultPlacementFlags,
        Self::LookAtScore,
        Self::Guid1,
        Self::Guid2,
        Self::ItemIsUnlockable,
        Self::CatalogUseFlags,
        Self::Price,
        Self::BodyStringsId,
        Self::SlotsId,
        Self::DiagonalSelectorGuid1,
        Self::DiagonalSelectorGuid2,
        Self::GridAlignedSelectorGuid1,
        Self::GridAlignedSelectorGuid2,
        Self::ObjectOwnershipFlags,
        Self::IgnoreGlobalSimFieldInCASLot,
        Self::CannotMoveOutWith,
        Self::Hauntable,
        Self::ProxyGuid1,
        Self::ProxyGuid2,
        Self::SlotGroup,
        Self::AspirationFlags,
        Self::MemoryType,
        Self::IgnoreQuarterTilePlacement,
        Self::InitialDepreciation,
        Self::DailyDepreciation,
        Self::SelfDepreciating,
        Self::DepreciationLimit,
        Self::RoomSortFlags,
        Self::FunctionSortFlags,
        Self::CatalogueStringsId,
        Self::IsGlobalSimObject,
        Self::ToolTipNameType,
        Self::TemplateVersion,
        Self::NicenessMultiplier,
        Self::NoDuplicateOnPlacement,
        Self::WantCategory,
        Self::NoNewNameFromTemplate,
        Self::ObjectVersion,
        Self::DefaultThumbnailId,
        Self::MotiveEffectsId,
        Self::JobObjectGuid1,
        Self::JobObjectGuid2,
        Self::CatalogPopupId,
        Self::IgnoreCurrentModelIndexInIcons,
        Self::LevelOffset,
        Self::ShadowType,
        Self::NumAttributes,
        Self::NumberOfObjectArrays,
        Self::ForSaleFlags,
        Self::FrontDirection,
        Self::Unused62,
        Self::MultiTileLeadObject,
        Self::ValidEPFlags1,
        Self::ValidEPFlags2,
        Self::ChairEntryFlags,
        Self::TileWidth,
        Self::InhibitSuitCopying,
        Self::BuildModeType,
        Self::OriginalGuid1,
        Self::OriginalGuid2,
        Self::DefaultGraphic,
        Self::NotSureAnyMore,
        Self::BuildModeSubsort,
        Self::SelectorCategory,
        Self::SelectorSubCategory,
        Self::FootprintMask,
        Self::ExtendFootprint,
        Self::ObjectSize,
        Self::Unused80,
        Self::Unused81,
        Self::RatingHunger,
        Self::RatingComfort,
        Self::RatingHygiene,
        Self::RatingBladder,
        Self::RatingEnergy,
        Self::RatingFun,
        Self::RatingRoom,
        Self::RatingSkillFlags,
        Self::NumTypeAttributes,
        Self::MiscFlags,
        Self::Unused92,
        Self::Unused93,
        Self::FunctionSubSort,
        Self::DowntownSort,
        Self::KeepBuying,
        Self::HolidaySort,
        Self::ResetLotAction,
        Self::GraphicObjectType,
        Self::CommunitySort,
        Self::DreamFlags,
        Self::ThumbnailFlags,
        Self::RatingScratch,
        Self::RatingChew,
        Self::Unused105,
        Self::Unused106,
        Self::Requirements,
    ];

    /// Position in the field table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Field name as shown in exports
    pub const fn name(self) -> &'static str {
        match self {
            Self::Version1 => "Version1",
            Self::Version2 => "Version2",
            Self::InitialStackSize => "InitialStackSize",
            Self::DefaultWallAdjacentFlags => "DefaultWallAdjacentFlags",
            Self::DefaultPlacementFlags => "DefaultPlacementFlags",
            Self::DefaultWallPlacementFlags => "DefaultWallPlacementFlags",
            Self::DefaultAllowedHeightFlags => "DefaultAllowedHeightFlags",
            Self::InteractionTableId => "InteractionTableId",
            Self::InteractionGroup => "InteractionGroup",
            Self::Type => "Type",
            Self::MultiTileMasterId => "MultiTileMasterId",
            Self::MultiTileSubIndex => "MultiTileSubIndex",
            Self::UseDefaultPlacementFlags => "UseDefaultPlacementFlags",
            Self::LookAtScore => "LookAtScore",
            Self::Guid1 => "Guid1",
            Self::Guid2 => "Guid2",
            Self::ItemIsUnlockable => "ItemIsUnlockable",
            Self::CatalogUseFlags => "CatalogUseFlags",
            Self::Price => "Price",
            Self::BodyStringsId => "BodyStringsId",
            Self::SlotsId => "SlotsId",
            Self::DiagonalSelectorGuid1 => "DiagonalSelectorGuid1",
            Self::DiagonalSelectorGuid2 => "DiagonalSelectorGuid2",
            Self::GridAlignedSelectorGuid1 => "GridAlignedSelectorGuid1",
            Self::GridAlignedSelectorGuid2 => "GridAlignedSelectorGuid2",
            Self::ObjectOwnershipFlags => "ObjectOwnershipFlags",
            Self::IgnoreGlobalSimFieldInCASLot => "IgnoreGlobalSimFieldInCASLot",
            Self::CannotMoveOutWith => "CannotMoveOutWith",
            Self::Hauntable => "Hauntable",
            Self::ProxyGuid1 => "ProxyGuid1",
            Self::ProxyGuid2 => "ProxyGuid2",
            Self::SlotGroup => "SlotGroup",
            Self::AspirationFlags => "AspirationFlags",
            Self::MemoryType => "MemoryType",
            Self::IgnoreQuarterTilePlacement => "IgnoreQuarterTilePlacement",
            Self::InitialDepreciation => "InitialDepreciation",
            Self::DailyDepreciation => "DailyDepreciation",
            Self::SelfDepreciating => "SelfDepreciating",
            Self::DepreciationLimit => "DepreciationLimit",
            Self::RoomSortFlags => "RoomSortFlags",
            Self::FunctionSortFlags => "FunctionSortFlags",
            Self::CatalogueStringsId => "CatalogueStringsId",
            Self::IsGlobalSimObject => "IsGlobalSimObject",
            Self::ToolTipNameType => "ToolTipNameType",
            Self::TemplateVersion => "TemplateVersion",
            Self::NicenessMultiplier => "NicenessMultiplier",
            Self::NoDuplicateOnPlacement => "NoDuplicateOnPlacement",
            Self::WantCategory => "WantCategory",
            Self::NoNewNameFromTemplate => "NoNewNameFromTemplate",
            Self::ObjectVersion => "ObjectVersion",
            Self::DefaultThumbnailId => "DefaultThumbnailId",
            Self::MotiveEffectsId => "MotiveEffectsId",
            Self::JobObjectGuid1 => "JobObjectGuid1",
            Self::JobObjectGuid2 => "JobObjectGuid2",
            Self::CatalogPopupId => "CatalogPopupId",
            Self::IgnoreCurrentModelIndexInIcons => "IgnoreCurrentModelIndexInIcons",
            Self::LevelOffset => "LevelOffset",
            Self::ShadowType => "ShadowType",
            Self::NumAttributes => "NumAttributes",
            Self::NumberOfObjectArrays => "NumberOfObjectArrays",
            Self::ForSaleFlags => "ForSaleFlags",
            Self::FrontDirection => "FrontDirection",
            Self::Unused62 => "Unused62",
            Self::MultiTileLeadObject => "MultiTileLeadObject",
            Self::ValidEPFlags1 => "ValidEPFlags1",
            Self::ValidEPFlags2 => "ValidEPFlags2",
            Self::ChairEntryFlags => "ChairEntryFlags",
            Self::TileWidth => "TileWidth",
            Self::InhibitSuitCopying => "InhibitSuitCopying",
            Self::BuildModeType => "BuildModeType",
            Self::OriginalGuid1 => "OriginalGuid1",
            Self::OriginalGuid2 => "OriginalGuid2",
            Self::DefaultGraphic => "DefaultGraphic",
            Self::NotSureAnyMore => "NotSureAnyMore",
            Self::BuildModeSubsort => "BuildModeSubsort",
            Self::SelectorCategory => "SelectorCategory",
            Self::SelectorSubCategory => "SelectorSubCategory",
            Self::FootprintMask => "FootprintMask",
            Self::ExtendFootprint => "ExtendFootprint",
            Self::ObjectSize => "ObjectSize",
            Self::Unused80 => "Unused80",
            Self::Unused81 => "Unused81",
            Self::RatingHunger => "RatingHunger",
            Self::RatingComfort => "RatingComfort",
            Self::RatingHygiene => "RatingHygiene",
            Self::RatingBladder => "RatingBladder",
            Self::RatingEnergy => "RatingEnergy",
            Self::RatingFun => "RatingFun",
            Self::RatingRoom => "RatingRoom",
            Self::RatingSkillFlags => "RatingSkillFlags",
            Self::NumTypeAttributes => "NumTypeAttributes",
            Self::MiscFlags => "MiscFlags",
            Self::Unused92 => "Unused92",
            Self::Unused93 => "Unused93",
            Self::FunctionSubSort => "FunctionSubSort",
            Self::DowntownSort => "DowntownSort",
            Self::KeepBuying => "KeepBuying",
            Self::HolidaySort => "HolidaySort",
            Self::ResetLotAction => "ResetLotAction",
            Self::GraphicObjectType => "GraphicObjectType",
            Self::CommunitySort => "CommunitySort",
            Self::DreamFlags => "DreamFlags",
            Self::ThumbnailFlags => "ThumbnailFlags",
            Self::RatingScratch => "RatingScratch",
            Self::RatingChew => "RatingChew",
            Self::Unused105 => "Unused105",
            Self::Unused106 => "Unused106",
            Self::Requirements => "Requirements",
        }
    }
}

/// Decoded object definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDefinition {
    key: ResourceKey,
    name_field: [u8; NAME_FIELD_SIZE],
    fields: Vec<u16>,
    trailing: Option<u8>,
    dirty: bool,
}

impl ObjectDefinition {
    /// Decode an object definition
    pub fn decode(key: ResourceKey, data: &[u8]) -> ResourceResult<Self> {
        let mut reader = ByteReader::new(data);
        let mut name_field = [0u8; NAME_FIELD_SIZE];
        name_field.copy_from_slice(reader.read_bytes(NAME_FIELD_SIZE)?);

        let mut fields = Vec::with_capacity(reader.remaining() / 2);
        while reader.remaining() >= 2 {
            fields.push(reader.read_u16(Endian::Little)?);
        }
        let trailing = if reader.is_at_end() {
            None
        } else {
            Some(reader.read_u8()?)
        };

        Ok(Self {
            key,
            name_field,
            fields,
            trailing,
            dirty: false,
        })
    }

    /// Object name (text before the first NUL of the name field)
    pub fn name(&self) -> String {
        let end = self
            .name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name_field[..end]).into_owned()
    }

    /// Replace the name, truncated to the field width
    pub fn set_name(&mut self, name: &str) {
        let mut writer = ByteWriter::with_capacity(NAME_FIELD_SIZE);
        writer.write_fixed_string(name, NAME_FIELD_SIZE);
        self.name_field.copy_from_slice(writer.as_slice());
        self.dirty = true;
    }

    /// Number of fields present
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Raw field table
    pub fn fields(&self) -> &[u16] {
        &self.fields
    }

    /// Value of a field, if the table is long enough
    pub fn field(&self, field: ObjdField) -> Option<u16> {
        self.fields.get(field.index()).copied()
    }

    /// Overwrite a field that exists in the table
    pub fn set_field(&mut self, field: ObjdField, value: u16) -> ResourceResult<()> {
        let slot = self
            .fields
            .get_mut(field.index())
            .ok_or_else(|| ResourceError::NotFound(field.name().to_string()))?;
        *slot = value;
        self.dirty = true;
        Ok(())
    }

    /// Object GUID assembled from its two halves
    pub fn guid(&self) -> Option<u32> {
        let low = self.field(ObjdField::Guid1)?;
        let high = self.field(ObjdField::Guid2)?;
        Some((u32::from(high) << 16) | u32::from(low))
    }

    /// Store a new object GUID
    pub fn set_guid(&mut self, guid: u32) -> ResourceResult<()> {
        self.set_field(ObjdField::Guid1, (guid & 0xFFFF) as u16)?;
        self.set_field(ObjdField::Guid2, (guid >> 16) as u16)
    }
}

impl Resource for ObjectDefinition {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        NAME_FIELD_SIZE + self.fields.len() * 2 + usize::from(self.trailing.is_some())
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.name_field);
        for &value in &self.fields {
            writer.write_u16(value, Endian::Little);
        }
        if let Some(byte) = self.trailing {
            writer.write_u8(byte);
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn mark_clean(&mut self) {
        self.dirty = false;
    }

    fn display_name(&self) -> Option<String> {
        Some(self.name())
    }

    fn to_export_tree(&self) -> Value {
        let mut fields = Map::new();
        for field in ObjdField::ALL {
            if let Some(value) = self.field(field) {
                fields.insert(field.name().to_string(), json!(value));
            }
        }
        json!({
            "format": "object-definition",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "name": self.name(),
            "guid": self.guid().map(|g| format!("0x{g:08X}")),
            "fieldCount": self.fields.len(),
            "fields": fields,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample(field_count: usize, odd: bool) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_fixed_string("Sofa - Plaid", NAME_FIELD_SIZE);
        for i in 0..field_count {
            w.write_u16(i as u16, Endian::Little);
        }
        if odd {
            w.write_u8(0xAA);
        }
        w.into_inner()
    }

    fn key() -> ResourceKey {
        ResourceKey::new(types::OBJD, 0x7FD46CD0, 0x41A7, 0)
    }

    #[test]
    fn test_decode_fields_and_guid() {
        let mut bytes = sample(ObjdField::ALL.len(), false);
        // Guid1 = 0xBEEF, Guid2 = 0xDEAD
        let at = NAME_FIELD_SIZE + ObjdField::Guid1.index() * 2;
        bytes[at..at + 4].copy_from_slice(&[0xEF, 0xBE, 0xAD, 0xDE]);

        let objd = ObjectDefinition::decode(key(), &bytes).expect("Test operation should succeed");
        assert_eq!(objd.name(), "Sofa - Plaid");
        assert_eq!(objd.field(ObjdField::Price), Some(ObjdField::Price.index() as u16));
        assert_eq!(objd.guid(), Some(0xDEADBEEF));
        assert_eq!(objd.to_bytes(), bytes);
    }

    #[test]
    fn test_odd_trailing_byte_survives() {
        let bytes = sample(20, true);
        let objd = ObjectDefinition::decode(key(), &bytes).expect("Test operation should succeed");
        assert_eq!(objd.field_count(), 20);
        assert_eq!(objd.encoded_len(), bytes.len());
        assert_eq!(objd.to_bytes(), bytes);
    }

    #[test]
    fn test_short_table() {
        let mut objd =
            ObjectDefinition::decode(key(), &sample(10, false)).expect("Test operation should succeed");
        assert_eq!(objd.field(ObjdField::Guid1), None);
        assert!(matches!(
            objd.set_field(ObjdField::Price, 1),
            Err(ResourceError::NotFound(_))
        ));
        assert!(!objd.is_dirty());
    }

    #[test]
    fn test_edits_mark_dirty() {
        let mut objd = ObjectDefinition::decode(key(), &sample(ObjdField::ALL.len(), false))
            .expect("Test operation should succeed");
        objd.set_guid(0x12345678).expect("Test operation should succeed");
        assert!(objd.is_dirty());
        assert_eq!(objd.guid(), Some(0x12345678));

        objd.mark_clean();
        objd.set_name("Renamed");
        assert!(objd.is_dirty());
        let decoded =
            ObjectDefinition::decode(key(), &objd.to_bytes()).expect("Test operation should succeed");
        assert_eq!(decoded.name(), "Renamed");
    }

    #[test]
    fn test_name_field_is_required() {
        assert!(matches!(
            ObjectDefinition::decode(key(), &[0u8; 63]),
            Err(ResourceError::Truncated(_))
        ));
    }
}
