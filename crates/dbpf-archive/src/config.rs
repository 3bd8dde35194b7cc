//! Archive configuration

use crate::error::{ArchiveError, ArchiveResult};
use dbpf_formats::DecodeOptions;
use serde::{Deserialize, Serialize};

/// Behaviour switches for an [`Archive`](crate::Archive)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Try to decompress entries the directory does not flag as compressed
    /// when their first bytes look like a RefPack header
    pub detect_unflagged_compression: bool,

    /// Recovery policy handed to resource decoders
    pub decode: DecodeOptions,

    /// Suffix of the temporary file written by an update
    pub temp_suffix: String,

    /// Suffix of the backup copy made by an update
    pub backup_suffix: String,

    /// Flush the temporary file to disk before replacing the archive
    pub sync_on_update: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            detect_unflagged_compression: true,
            decode: DecodeOptions::default(),
            temp_suffix: ".temp".to_string(),
            backup_suffix: ".bak".to_string(),
            sync_on_update: true,
        }
    }
}

impl ArchiveConfig {
    /// Load a configuration document
    pub fn from_json(json: &str) -> ArchiveResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ArchiveError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Enable or disable the unflagged-compression heuristic
    #[must_use]
    pub const fn with_compression_detection(mut self, enable: bool) -> Self {
        self.detect_unflagged_compression = enable;
        self
    }

    /// Set the decoder recovery policy
    #[must_use]
    pub const fn with_decode_options(mut self, options: DecodeOptions) -> Self {
        self.decode = options;
        self
    }

    /// Set the temporary file suffix
    #[must_use]
    pub fn with_temp_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.temp_suffix = suffix.into();
        self
    }

    /// Set the backup file suffix
    #[must_use]
    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    /// Enable or disable fsync before replacement
    #[must_use]
    pub const fn with_sync_on_update(mut self, enable: bool) -> Self {
        self.sync_on_update = enable;
        self
    }

    /// Check that the update suffixes produce usable, distinct sibling paths
    pub fn validate(&self) -> ArchiveResult<()> {
        for (what, suffix) in [("temp", &self.temp_suffix), ("backup", &self.backup_suffix)] {
            if suffix.is_empty() {
                return Err(ArchiveError::Config(format!("{what} suffix is empty")));
            }
            if suffix.contains(['/', '\\']) {
                return Err(ArchiveError::Config(format!(
                    "{what} suffix '{suffix}' contains a path separator"
                )));
            }
        }
        if self.temp_suffix == self.backup_suffix {
            return Err(ArchiveError::Config(
                "temp and backup suffixes must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ArchiveConfig::default();
        assert!(config.detect_unflagged_compression);
        assert!(config.decode.skip_malformed_items);
        assert_eq!(config.temp_suffix, ".temp");
        assert_eq!(config.backup_suffix, ".bak");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = ArchiveConfig::from_json(
            r#"{"detect_unflagged_compression": false, "decode": {"skip_malformed_items": false}}"#,
        )
        .expect("Test operation should succeed");
        assert!(!config.detect_unflagged_compression);
        assert!(!config.decode.skip_malformed_items);
        assert!(config.decode.escape_bare_ampersands);
        assert_eq!(config.backup_suffix, ".bak");
    }

    #[test]
    fn test_validation_rejects_bad_suffixes() {
        assert!(ArchiveConfig::default().with_temp_suffix("").validate().is_err());
        assert!(ArchiveConfig::default().with_backup_suffix("/x").validate().is_err());
        assert!(
            ArchiveConfig::default()
                .with_backup_suffix(".temp")
                .validate()
                .is_err()
        );
        assert!(ArchiveConfig::from_json(r#"{"temp_suffix": ""}"#).is_err());
        assert!(ArchiveConfig::from_json("not json").is_err());
    }
}
