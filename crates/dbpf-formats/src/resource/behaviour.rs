//! Behaviour programs (BHAV)
//!
//! Layout after the 64-byte name:
//!
//! ```text
//! format            u16   0x8000..=0x8009
//! instruction count u16
//! tree type         u8
//! argument count    u8
//! local count       u8
//! header flag       u8
//! tree version      i32
//! cache flags       u8    only when format > 0x8008
//! instructions      layout depends on format, see InstructionLayout
//! ```

use super::error::{ResourceError, ResourceResult};
use super::{NAME_FIELD_SIZE, Resource};
use crate::cursor::{ByteReader, ByteWriter};
use crate::key::ResourceKey;
use crate::types;
use binrw::Endian;
use serde::Serialize;
use serde_json::{Value, json};

/// Oldest format understood
pub const MIN_FORMAT: u16 = 0x8000;
/// Newest format understood
pub const MAX_FORMAT: u16 = 0x8009;

/// Per-format instruction layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionLayout {
    /// 1-byte targets, 8 operand bytes (formats before 0x8003)
    Short,
    /// 1-byte targets, 16 operand bytes (0x8003, 0x8004)
    Wide,
    /// 1-byte targets, node version, 16 operand bytes (0x8005, 0x8006)
    Versioned,
    /// 2-byte targets, node version, 16 operand bytes (0x8007 onwards)
    Extended,
}

impl InstructionLayout {
    /// Layout used by a format
    pub const fn for_format(format: u16) -> Self {
        if format < 0x8003 {
            Self::Short
        } else if format < 0x8005 {
            Self::Wide
        } else if format < 0x8007 {
            Self::Versioned
        } else {
            Self::Extended
        }
    }

    /// Encoded size of one instruction
    pub const fn size(self) -> usize {
        match self {
            Self::Short => 12,
            Self::Wide => 20,
            Self::Versioned => 21,
            Self::Extended => 23,
        }
    }

    const fn operand_len(self) -> usize {
        match self {
            Self::Short => 8,
            _ => 16,
        }
    }
}

/// Program header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BehaviourHeader {
    /// Format version
    pub format: u16,
    /// Tree type
    pub tree_type: u8,
    /// Number of arguments
    pub arg_count: u8,
    /// Number of local variables
    pub local_count: u8,
    /// Header flag
    pub header_flag: u8,
    /// Tree version
    pub tree_version: i32,
    /// Cache flags, stored only by formats after 0x8008
    pub cache_flags: u8,
}

impl BehaviourHeader {
    fn encoded_len(&self) -> usize {
        12 + usize::from(self.format > 0x8008)
    }
}

/// One instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Instruction {
    /// Primitive or function to call
    pub opcode: u16,
    /// Target when the call returns true (raw stored value)
    pub true_target: u16,
    /// Target when the call returns false (raw stored value)
    pub false_target: u16,
    /// Node version, stored from format 0x8005
    pub node_version: u8,
    /// Operand bytes; short-layout programs use the first eight
    pub operands: [u8; 16],
}

impl Instruction {
    fn read(reader: &mut ByteReader<'_>, layout: InstructionLayout) -> ResourceResult<Self> {
        let opcode = reader.read_u16(Endian::Little)?;
        let (true_target, false_target) = if layout == InstructionLayout::Extended {
            (reader.read_u16(Endian::Little)?, reader.read_u16(Endian::Little)?)
        } else {
            (u16::from(reader.read_u8()?), u16::from(reader.read_u8()?))
        };
        let node_version = match layout {
            InstructionLayout::Versioned | InstructionLayout::Extended => reader.read_u8()?,
            _ => 0,
        };
        let mut operands = [0u8; 16];
        let len = layout.operand_len();
        operands[..len].copy_from_slice(reader.read_bytes(len)?);
        Ok(Self {
            opcode,
            true_target,
            false_target,
            node_version,
            operands,
        })
    }

    fn write(&self, writer: &mut ByteWriter, layout: InstructionLayout) {
        writer.write_u16(self.opcode, Endian::Little);
        if layout == InstructionLayout::Extended {
            writer.write_u16(self.true_target, Endian::Little);
            writer.write_u16(self.false_target, Endian::Little);
        } else {
            writer.write_u8(self.true_target as u8);
            writer.write_u8(self.false_target as u8);
        }
        if matches!(
            layout,
            InstructionLayout::Versioned | InstructionLayout::Extended
        ) {
            writer.write_u8(self.node_version);
        }
        writer.write_bytes(&self.operands[..layout.operand_len()]);
    }
}

/// Decoded behaviour program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Behaviour {
    key: ResourceKey,
    name_field: [u8; NAME_FIELD_SIZE],
    header: BehaviourHeader,
    instructions: Vec<Instruction>,
    trailing: Vec<u8>,
    dirty: bool,
}

impl Behaviour {
    /// Decode a behaviour program
    pub fn decode(key: ResourceKey, data: &[u8]) -> ResourceResult<Self> {
        let mut reader = ByteReader::new(data);
        let mut name_field = [0u8; NAME_FIELD_SIZE];
        name_field.copy_from_slice(reader.read_bytes(NAME_FIELD_SIZE)?);

        let format = reader.read_u16(Endian::Little)?;
        if !(MIN_FORMAT..=MAX_FORMAT).contains(&format) {
            return Err(ResourceError::UnknownFormatVersion {
                format: "BHAV",
                version: u32::from(format),
            });
        }
        let count = reader.read_u16(Endian::Little)?;
        let tree_type = reader.read_u8()?;
        let arg_count = reader.read_u8()?;
        let local_count = reader.read_u8()?;
        let header_flag = reader.read_u8()?;
        let tree_version = reader.read_i32(Endian::Little)?;
        let cache_flags = if format > 0x8008 { reader.read_u8()? } else { 0 };
        let header = BehaviourHeader {
            format,
            tree_type,
            arg_count,
            local_count,
            header_flag,
            tree_version,
            cache_flags,
        };

        let layout = InstructionLayout::for_format(format);
        let mut instructions = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            instructions.push(Instruction::read(&mut reader, layout)?);
        }

        Ok(Self {
            key,
            name_field,
            header,
            instructions,
            trailing: reader.read_rest().to_vec(),
            dirty: false,
        })
    }

    /// Program name
    pub fn name(&self) -> String {
        let end = self
            .name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_FIELD_SIZE);
        String::from_utf8_lossy(&self.name_field[..end]).into_owned()
    }

    /// Program header
    pub const fn header(&self) -> &BehaviourHeader {
        &self.header
    }

    /// Instructions in program order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Instruction for editing; marks the program dirty
    pub fn instruction_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        let instruction = self.instructions.get_mut(index)?;
        self.dirty = true;
        Some(instruction)
    }

    /// Append an instruction
    pub fn push_instruction(&mut self, instruction: Instruction) -> ResourceResult<()> {
        if self.instructions.len() >= usize::from(u16::MAX) {
            return Err(ResourceError::Malformed(
                "instruction count exceeds 65535".to_string(),
            ));
        }
        self.instructions.push(instruction);
        self.dirty = true;
        Ok(())
    }

    /// Instruction layout of this program
    pub const fn layout(&self) -> InstructionLayout {
        InstructionLayout::for_format(self.header.format)
    }
}

impl Resource for Behaviour {
    fn key(&self) -> ResourceKey {
        self.key
    }

    fn encoded_len(&self) -> usize {
        NAME_FIELD_SIZE
            + self.header.encoded_len()
            + self.instructions.len() * self.layout().size()
            + self.trailing.len()
    }

    fn encode(&self, writer: &mut ByteWriter) {
        let header = &self.header;
        writer.write_bytes(&self.name_field);
        writer.write_u16(header.format, Endian::Little);
        writer.write_u16(self.instructions.len() as u16, Endian::Little);
        writer.write_u8(header.tree_type);
        writer.write_u8(header.arg_count);
        writer.write_u8(header.local_count);
        writer.write_u8(header.header_flag);
        writer.write_i32(header.tree_version, Endian::Little);
        if header.format > 0x8008 {
            writer.write_u8(header.cache_flags);
        }
        let layout = self.layout();
        for instruction in &self.instructions {
            instruction.write(writer, layout);
        }
        writer.write_bytes(&self.trailing);
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
        let operand_len = self.layout().operand_len();
        let instructions: Vec<Value> = self
            .instructions
            .iter()
            .map(|i| {
                json!({
                    "opcode": format!("0x{:04X}", i.opcode),
                    "trueTarget": format!("0x{:04X}", i.true_target),
                    "falseTarget": format!("0x{:04X}", i.false_target),
                    "nodeVersion": i.node_version,
                    "operands": &i.operands[..operand_len],
                })
            })
            .collect();
        json!({
            "format": "behaviour",
            "type": types::type_name(self.key.type_id),
            "key": self.key.to_string(),
            "name": self.name(),
            "header": {
                "format": format!("0x{:04X}", self.header.format),
                "treeType": self.header.tree_type,
                "argCount": self.header.arg_count,
                "localCount": self.header.local_count,
                "headerFlag": self.header.header_flag,
                "treeVersion": self.header.tree_version,
                "cacheFlags": self.header.cache_flags,
            },
            "instructions": instructions,
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn program(format: u16, count: u16) -> Vec<u8> {
        let layout = InstructionLayout::for_format(format);
        let mut w = ByteWriter::new();
        w.write_fixed_string("Function - Init", NAME_FIELD_SIZE);
        w.write_u16(format, Endian::Little);
        w.write_u16(count, Endian::Little);
        w.write_bytes(&[1, 2, 3, 0]);
        w.write_i32(-5, Endian::Little);
        if format > 0x8008 {
            w.write_u8(0x40);
        }
        for i in 0..count {
            let inst = Instruction {
                opcode: 0x0100 + i,
                true_target: 0xFD,
                false_target: u16::from(layout == InstructionLayout::Extended) * 0xFFFC + 1,
                node_version: if matches!(layout, InstructionLayout::Short | InstructionLayout::Wide) {
                    0
                } else {
                    1
                },
                operands: [i as u8; 16],
            };
            inst.write(&mut w, layout);
        }
        w.into_inner()
    }

    fn key() -> ResourceKey {
        ResourceKey::new(types::BHAV, 0x7FD46CD0, 0x1001, 0)
    }

    #[test]
    fn test_every_layout_round_trips() {
        for format in MIN_FORMAT..=MAX_FORMAT {
            let bytes = program(format, 3);
            let bhav = Behaviour::decode(key(), &bytes).expect("Test operation should succeed");
            assert_eq!(bhav.instructions().len(), 3, "format {format:04X}");
            assert_eq!(bhav.encoded_len(), bytes.len(), "format {format:04X}");
            assert_eq!(bhav.to_bytes(), bytes, "format {format:04X}");
        }
    }

    #[test]
    fn test_header_fields() {
        let bhav = Behaviour::decode(key(), &program(0x8009, 1)).expect("Test operation should succeed");
        assert_eq!(bhav.name(), "Function - Init");
        let header = bhav.header();
        assert_eq!((header.arg_count, header.local_count), (2, 3));
        assert_eq!(header.tree_version, -5);
        assert_eq!(header.cache_flags, 0x40);
        assert_eq!(bhav.instructions()[0].false_target, 0xFFFD);
    }

    #[test]
    fn test_short_layout_operands() {
        let bhav = Behaviour::decode(key(), &program(0x8002, 2)).expect("Test operation should succeed");
        assert_eq!(bhav.layout(), InstructionLayout::Short);
        assert_eq!(&bhav.instructions()[1].operands[..8], &[1; 8]);
        assert_eq!(&bhav.instructions()[1].operands[8..], &[0; 8]);
    }

    #[test]
    fn test_unknown_format() {
        let mut bytes = program(0x8007, 0);
        bytes[NAME_FIELD_SIZE..NAME_FIELD_SIZE + 2].copy_from_slice(&0x9000u16.to_le_bytes());
        assert!(matches!(
            Behaviour::decode(key(), &bytes),
            Err(ResourceError::UnknownFormatVersion { version: 0x9000, .. })
        ));
    }

    #[test]
    fn test_missing_instructions_are_truncation() {
        let bytes = program(0x8007, 2);
        assert!(matches!(
            Behaviour::decode(key(), &bytes[..bytes.len() - 5]),
            Err(ResourceError::Truncated(_))
        ));
    }

    #[test]
    fn test_editing_marks_dirty() {
        let mut bhav = Behaviour::decode(key(), &program(0x8007, 1)).expect("Test operation should succeed");
        assert!(!bhav.is_dirty());
        if let Some(inst) = bhav.instruction_mut(0) {
            inst.opcode = 0x0002;
        }
        bhav.push_instruction(Instruction::default())
            .expect("Test operation should succeed");
        assert!(bhav.is_dirty());

        let decoded = Behaviour::decode(key(), &bhav.to_bytes()).expect("Test operation should succeed");
        assert_eq!(decoded.instructions().len(), 2);
        assert_eq!(decoded.instructions()[0].opcode, 0x0002);
    }
}
