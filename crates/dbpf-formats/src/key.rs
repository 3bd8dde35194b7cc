//! Resource identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Four-part resource identity: type, group, instance and resource sub-ID.
///
/// Equality and hashing are structural. Ordering follows the field order and
/// is only used for deterministic listings.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct ResourceKey {
    /// Resource type identifier
    pub type_id: u32,
    /// Group identifier
    pub group_id: u32,
    /// Instance identifier
    pub instance_id: u32,
    /// Resource sub-ID (zero in packages without the extra index column)
    pub resource_id: u32,
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl ResourceKey {
    /// Create a key from its four parts
    pub const fn new(type_id: u32, group_id: u32, instance_id: u32, resource_id: u32) -> Self {
        Self {
            type_id,
            group_id,
            instance_id,
            resource_id,
        }
    }

    /// Stable 64-bit identity hash (FNV-1a over the little-endian fields)
    pub fn tgir_hash(&self) -> u64 {
        [self.type_id, self.group_id, self.instance_id, self.resource_id]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .fold(FNV_OFFSET_BASIS, |hash, byte| {
                (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
            })
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08X}-{:08X}-{:08X}-{:08X}",
            self.type_id, self.group_id, self.instance_id, self.resource_id
        )
    }
}

/// Error returned when a `T-G-I-R` string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource key {0:?}: expected four hex fields separated by '-'")]
pub struct ParseKeyError(String);

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    /// Parse `TTTTTTTT-GGGGGGGG-IIIIIIII[-RRRRRRRR]`, fields in hex with an
    /// optional `0x` prefix. A missing sub-ID reads as zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s
            .split('-')
            .map(|part| {
                let part = part.trim();
                let digits = part
                    .strip_prefix("0x")
                    .or_else(|| part.strip_prefix("0X"))
                    .unwrap_or(part);
                u32::from_str_radix(digits, 16)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseKeyError(s.to_string()))?;

        match fields.as_slice() {
            [t, g, i] => Ok(Self::new(*t, *g, *i, 0)),
            [t, g, i, r] => Ok(Self::new(*t, *g, *i, *r)),
            _ => Err(ParseKeyError(s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse_agree() {
        let key = ResourceKey::new(0xEBCF3E27, 0x7FD46CD0, 0x1234, 1);
        let text = key.to_string();
        assert_eq!(text, "EBCF3E27-7FD46CD0-00001234-00000001");
        assert_eq!(text.parse::<ResourceKey>().expect("Test operation should succeed"), key);
    }

    #[test]
    fn test_parse_accepts_prefix_and_three_fields() {
        let key: ResourceKey = "0x4F424A44-0x1-0x80".parse().expect("Test operation should succeed");
        assert_eq!(key, ResourceKey::new(0x4F424A44, 1, 0x80, 0));
        assert!("1-2".parse::<ResourceKey>().is_err());
        assert!("zz-1-2-3".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn test_hash_is_structural() {
        let a = ResourceKey::new(1, 2, 3, 4);
        assert_eq!(a.tgir_hash(), ResourceKey::new(1, 2, 3, 4).tgir_hash());
        assert_ne!(a.tgir_hash(), ResourceKey::new(1, 2, 4, 3).tgir_hash());
    }
}
