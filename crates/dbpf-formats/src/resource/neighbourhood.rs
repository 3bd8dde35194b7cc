//! Neighbourhood memories (NGBH)
//!
//! Decoded for inspection only. The payload keeps the bytes it was decoded
//! from and encodes them back unchanged; nothing in it can be edited.
//!
//! ```text
//! unknown           u32
//! version           u32
//! castaway block    32 bytes, only in the Castaway version
//! unknown           u32
//! height            u32
//! width             u32
//! zone name         i32 length, bytes
//! reserved          20 bytes from Nightlife on, 24 before
//! global slots      2 slots
//! lot slots         i32 count, instance slots
//! family slots      i32 count, instance slots
//! sim slots         i32 count, instance slots
//! ```
//!
//! A slot is two item lists, each an `i32` count followed by items. An
//! instance slot prefixes a slot with a `u32` instance id. Items are:
//!
//! ```text
//! flags             u16, from Nightlife on
//! guid              u32
//! inventory number  u32, from Nightlife on
//! data              i32 count, u16 values
//! ```

use super::Resource;
use super::error::{ResourceError, ResourceResult};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde_json::{Value, json};

/// Version written by Nightlife; later versions carry item flags
pub const VERSION_NIGHTLIFE: u32 = 0xAD;
/// Version written by the Castaway releases
pub const VERSION_CASTAWAY: u32 = 0xD3;

/// Number of global slots
pub const GLOBAL_SLOT_COUNT: usize = 2;

/// One memory or token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourhoodItem {
    /// Item flags, zero before Nightlife
    pub flags: u16,
    /// Object GUID
    pub guid: u32,
    /// Inventory number, zero before Nightlife
    pub inventory_number: u32,
    /// Item data
    pub data: Vec<u16>,
}

/// Two lists of items
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighbourhoodSlot {
    /// First list
    pub items_a: Vec<NeighbourhoodItem>,
    /// Second list
    pub items_b: Vec<NeighbourhoodItem>,
}

impl NeighbourhoodSlot {
    /// Every item in both lists
    pub fn items(&self) -> impl Iterator<Item = &NeighbourhoodItem> {
        self.items_a.iter().chain(&self.items_b)
    }
}

/// Slot belonging to one lot, family or sim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceSlot {
    /// Lot, family or sim instance
    pub instance_id: u32,
    /// Items
    pub slot: NeighbourhoodSlot,
}

/// Decoded NGBH resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbourhood {
    key: ResourceKey,
    version: u32,
    width: u32,
    height: u32,
    zone_name: String,
    global_slots: Vec<NeighbourhoodSlot>,
    lot_slots: Vec<InstanceSlot>,
    family_slots: Vec<InstanceSlot>,
    sim_slots: Vec<InstanceSlot>,
    raw: Vec<u8>,
}

struct SlotReader<'a, 'b> {
    reader: &'b mut ByteReader<'a>,
    nightlife: bool,
}

impl SlotReader<'_, '_> {
    fn count(&mut self, min_size: usize, what: &str) -> ResourceResult<usize> {
        let count = self.reader.read_i32(Endian::Little)?;
        let count = usize::try_from(count)
            .map_err(|_| ResourceError::Malformed(format!("negative {what} count {count}")))?;
        if count.saturating_mul(min_size) > self.reader.remaining() {
            return Err(ResourceError::Malformed(format!(
                "{count} {what} entries do not fit in {} bytes",
                self.reader.remaining()
            )));
        }
        Ok(count)
    }

    fn item(&mut self) -> ResourceResult<NeighbourhoodItem> {
        let flags = if self.nightlife {
            self.reader.read_u16(Endian::Little)?
        } else {
            0
        };
        let guid = self.reader.read_u32(Endian::Little)?;
        let inventory_number = if self.nightlife {
            self.reader.read_u32(Endian::Little)?
        } else {
            0
        };
        let count = self.count(2, "item data")?;
        let mut data = Vec::with_capacity(count);
        for _ in 0..count {
            data.push(self.reader.read_u16(Endian::Little)?);
        }
        Ok(NeighbourhoodItem {
            flags,
            guid,
            inventory_number,
            data,
        })
    }

    fn items(&mut self) -> ResourceResult<Vec<NeighbourhoodItem>> {
        let min_size = if self.nightlife { 14 } else { 8 };
        let count = self.count(min_size, "item")?;
        (0..count).map(|_| self.item()).collect()
    }

    fn slot(&mut self) -> ResourceResult<NeighbourhoodSlot> {
        Ok(NeighbourhoodSlot {
            items_a: self.items()?,
            items_b: self.items()?,
        })
    }

    fn instance_slots(&mut self, what: &str) -> ResourceResult<Vec<InstanceSlot>> {
        let count = self.count(12, what)?;
        (0..count)
            .map(|_| -> ResourceResult<InstanceSlot> {
                Ok(InstanceSlot {
                    instance_id: self.reader.read_u32(Endian::Little)?,
                    slot: self.slot()?,
                })
            })
            .collect()
    }
}

impl Neighbourhood {
    /// Decode a neighbourhood resource
    pub fn decode(key: ResourceKey, data: &[u8]) -> ResourceResult<Self> {
        let mut reader = ByteReader::new(data);
        reader.skip(4)?;
        let version = reader.read_u32(Endian::Little)?;
        if version == VERSION_CASTAWAY {
            reader.skip(0x20)?;
        }
        reader.skip(4)?;
        let height = reader.read_u32(Endian::Little)?;
        let width = reader.read_u32(Endian::Little)?;

        let len = reader.read_i32(Endian::Little)?;
        let len = usize::try_from(len)
            .map_err(|_| ResourceError::Malformed(format!("negative zone name length {len}")))?;
        let zone_name = String::from_utf8_lossy(reader.read_bytes(len)?)
            .trim_end_matches('\0')
            .to_string();

        let nightlife = version >= VERSION_NIGHTLIFE;
        reader.skip(if nightlife { 0x14 } else { 0x18 })?;

        let mut slots = SlotReader {
            reader: &mut reader,
            nightlife,
        };
        let global_slots = (0..GLOBAL_SLOT_COUNT)
            .map(|_| slots.slot())
            .collect::<ResourceResult<Vec<_>>>()?;
        let lot_slots = slots.instance_slots("lot slot")?;
        let family_slots = slots.instance_slots("family slot")?;
        let sim_slots = slots.instance_slots("sim slot")?;

        Ok(Self {
            key,
            version,
            width,
            height,
            zone_name,
            global_slots,
            lot_slots,
            family_slots,
            sim_slots,
            raw: data.to_vec(),
        })
    }

    /// Stored version
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Grid width and height
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Zone name
    pub fn zone_name(&self) -> &str {
        &self.zone_name
    }

    /// The two neighbourhood-wide slots
    pub fn global_slots(&self) -> &[NeighbourhoodSlot] {
        &self.global_slots
    }

    /// Per-lot slots
    pub fn lot_slots(&self) -> &[InstanceSlot] {
        &self.lot_slots
    }

    /// Per-family slots
    pub fn family_slots(&self) -> &[InstanceSlot] {
        &self.family_slots
    }

    /// Per-sim slots
    pub fn sim_slots(&self) -> &[InstanceSlot] {
        &self.sim_slots
    }

    /// Slot of one sim
    pub fn sim_slot(&self, instance_id: u32) -> Option<&NeighbourhoodSlot> {
        self.sim_slots
            .iter()
            .find(|s| s.instance_id == instance_id)
            .map(|s| &s.slot)
    }
}

fn slot_tree(slot: &NeighbourhoodSlot) -> Value {
    let guids = |items: &[NeighbourhoodItem]| -> Vec<String> {
        items.iter().map(|i| format!("0x{:08X}", i.guid)).collect()
    };
    json!({ "itemsA": guids(&slot.items_a), "itemsB": guids(&slot.items_b) })
}

fn instance_tree(slots: &[InstanceSlot]) -> Vec<Value> {
    slots
        .iter()
        .map(|s| {
            json!({
                "instance": format!("0x{:04X}", s.instance_id),
                "slot": slot_tree(&s.slot),
            })
        })
        .collect()
}

impl Resource for Neighbourhood {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        self.raw.len()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        writer.write_bytes(&self.raw);
    }

    fn is_dirty(&self) -> bool {
        false
    }

    fn mark_clean(&mut self) {}

    fn display_name(&self) -> Option<String> {
        Some(self.zone_name.clone())
    }

    fn to_export_tree(&self) -> Value {
        let globals: Vec<Value> = self.global_slots.iter().map(slot_tree).collect();
        json!({
            "format": "neighbourhood",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "version": format!("0x{:04X}", self.version),
            "zoneName": self.zone_name,
            "width": self.width,
            "height": self.height,
            "global": globals,
            "lots": instance_tree(&self.lot_slots),
            "families": instance_tree(&self.family_slots),
            "sims": instance_tree(&self.sim_slots),
        })
    }
}
