//! Subcommand implementations
//!
//! Each command opens its own archive, prints to the supplied writer and
//! reports failures through `anyhow` with the offending path or key
//! attached.

use crate::OutputFormat;
use anyhow::{Context, Result, anyhow, bail};
use dbpf_archive::{Archive, ArchiveConfig, ArchiveError, Fetched};
use dbpf_formats::resource::Resource;
use dbpf_formats::{ResourceEntry, ResourceKey, is_directory_key, types};
use serde::Serialize;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// One row of `dbpf list`
#[derive(Debug, Clone, Serialize)]
pub struct ListRow {
    /// `T-G-I-R` key
    pub key: String,
    /// Short type name, if known
    pub type_name: Option<&'static str>,
    /// Bytes stored in the package
    pub stored_size: u32,
    /// Decompressed size
    pub size: u32,
    /// Whether the directory lists the entry as compressed
    pub compressed: bool,
    /// Name stored inside the resource
    pub name: Option<String>,
}

fn open(path: &Path, config: ArchiveConfig) -> Result<Archive> {
    Archive::open_with(path, config).with_context(|| format!("Failed to open {}", path.display()))
}

/// Resolve a `--type` argument: a short name or a hex id
pub fn parse_type(name: &str) -> Result<u32> {
    if let Some(id) = types::type_id_by_name(name) {
        return Ok(id);
    }
    let digits = name
        .strip_prefix("0x")
        .or_else(|| name.strip_prefix("0X"))
        .unwrap_or(name);
    u32::from_str_radix(digits, 16).map_err(|_| anyhow!("unknown resource type {name:?}"))
}

/// `dbpf list`
pub fn list(
    path: &Path,
    type_filter: Option<&str>,
    config: ArchiveConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let type_id = type_filter.map(parse_type).transpose()?;
    let mut archive = open(path, config)?;
    let entries: Vec<ResourceEntry> = match type_id {
        Some(type_id) => archive.entries_of_type(type_id).into_iter().copied().collect(),
        None => archive.entries().to_vec(),
    };

    let mut rows = Vec::with_capacity(entries.len());
    for entry in &entries {
        let name = if is_directory_key(&entry.key) {
            None
        } else {
            match archive.display_name(&entry.key) {
                Ok(name) => name,
                Err(err) if err.is_resource_local() => {
                    warn!("Skipping name of {}: {}", entry.key, err);
                    None
                }
                Err(err) => return Err(err.into()),
            }
        };
        rows.push(ListRow {
            key: entry.key.to_string(),
            type_name: types::type_name(entry.key.type_id),
            stored_size: entry.stored_size,
            size: entry.logical_size(),
            compressed: entry.is_compressed(),
            name,
        });
    }
    debug!("Listing {} of {} entries", rows.len(), archive.resource_count());

    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&rows)?)?,
        OutputFormat::Text => {
            for row in &rows {
                writeln!(
                    out,
                    "{}  {:<4}  {:>9}  {:>9}  {}  {}",
                    row.key,
                    row.type_name.unwrap_or("????"),
                    row.stored_size,
                    row.size,
                    if row.compressed { "C" } else { "-" },
                    row.name.as_deref().unwrap_or("")
                )?;
            }
            writeln!(out, "{} resources", rows.len())?;
        }
    }
    Ok(())
}

/// `dbpf show`
pub fn show(
    path: &Path,
    key: &ResourceKey,
    config: ArchiveConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let mut archive = open(path, config)?;
    let tree = match archive
        .get(key)
        .with_context(|| format!("Failed to read {key}"))?
    {
        Some(Fetched::Payload(payload)) => payload.to_export_tree(),
        Some(Fetched::Staged(bytes)) => opaque_tree(key, bytes.len()),
        Some(Fetched::Opaque(bytes)) => opaque_tree(key, bytes.len()),
        None => bail!("{key} is not in {}", path.display()),
    };
    let text = match format {
        OutputFormat::Text => serde_json::to_string_pretty(&tree)?,
        OutputFormat::Json => serde_json::to_string(&tree)?,
    };
    writeln!(out, "{text}")?;
    Ok(())
}

fn opaque_tree(key: &ResourceKey, size: usize) -> serde_json::Value {
    json!({
        "format": "opaque",
        "type": types::type_name(key.type_id),
        "key": key.to_string(),
        "size": size,
    })
}

/// `dbpf extract`
pub fn extract(
    path: &Path,
    key: &ResourceKey,
    dest: &Path,
    config: ArchiveConfig,
    out: &mut impl Write,
) -> Result<()> {
    let mut archive = open(path, config)?;
    let bytes = match archive.read_bytes(key) {
        Ok(bytes) => bytes,
        Err(ArchiveError::NotFound(_)) => bail!("{key} is not in {}", path.display()),
        Err(err) => {
            return Err(anyhow::Error::from(err).context(format!("Failed to read {key}")));
        }
    };
    fs::write(dest, &bytes).with_context(|| format!("Failed to write {}", dest.display()))?;
    info!("Extracted {} to {}", key, dest.display());
    writeln!(out, "Wrote {} bytes to {}", bytes.len(), dest.display())?;
    Ok(())
}

/// `dbpf verify`
///
/// Fails when the rewritten package differs from the file. Packages laid
/// out by other tools (index after the data, holes) legitimately differ.
pub fn verify(
    path: &Path,
    config: ArchiveConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    let original = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut archive = open(path, config)?;
    let rewritten = archive
        .rewrite_to_vec()
        .with_context(|| format!("Failed to rewrite {}", path.display()))?;

    let first_difference = original
        .iter()
        .zip(&rewritten)
        .position(|(a, b)| a != b)
        .or_else(|| {
            (original.len() != rewritten.len()).then_some(original.len().min(rewritten.len()))
        });

    match format {
        OutputFormat::Json => writeln!(
            out,
            "{}",
            json!({
                "path": path.display().to_string(),
                "resources": archive.resource_count(),
                "original_size": original.len(),
                "rewritten_size": rewritten.len(),
                "identical": first_difference.is_none(),
                "first_difference": first_difference,
            })
        )?,
        OutputFormat::Text => match first_difference {
            None => writeln!(
                out,
                "{}: {} resources, {} bytes, rewrite is identical",
                path.display(),
                archive.resource_count(),
                original.len()
            )?,
            Some(offset) => writeln!(
                out,
                "{}: rewrite differs at byte {} ({} bytes on disk, {} rewritten)",
                path.display(),
                offset,
                original.len(),
                rewritten.len()
            )?,
        },
    }

    if let Some(offset) = first_difference {
        bail!("{} does not round-trip (first difference at byte {offset})", path.display());
    }
    Ok(())
}

/// `dbpf types`
pub fn type_table(format: OutputFormat, out: &mut impl Write) -> Result<()> {
    let table = types::known_types();
    match format {
        OutputFormat::Json => {
            let rows: Vec<_> = table
                .iter()
                .map(|info| {
                    json!({
                        "type_id": format!("0x{:08X}", info.type_id),
                        "name": info.name,
                        "description": info.description,
                    })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string(&rows)?)?;
        }
        OutputFormat::Text => {
            for info in table {
                writeln!(
                    out,
                    "{:08X}  {:<4}  {}",
                    info.type_id, info.name, info.description
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_accepts_names_and_ids() {
        assert_eq!(parse_type("gzps").expect("Test operation should succeed"), types::GZPS);
        assert_eq!(
            parse_type("0x4F424A44").expect("Test operation should succeed"),
            types::OBJD
        );
        assert!(parse_type("nonsense").is_err());
    }

    #[test]
    fn test_types_lists_table() {
        let mut out = Vec::new();
        type_table(OutputFormat::Text, &mut out).expect("Test operation should succeed");
        let text = String::from_utf8(out).expect("Test operation should succeed");
        assert!(text.contains("4F424A44  OBJD"));
        assert_eq!(text.lines().count(), types::known_types().len());
    }
}
