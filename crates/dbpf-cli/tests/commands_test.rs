//! Command tests against packages written by the archive engine.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use clap::Parser;
use dbpf_archive::Archive;
use dbpf_cli::{Cli, run};
use dbpf_formats::resource::PropertySet;
use dbpf_formats::resource::cpf::{PropertyItem, PropertyValue};
use dbpf_formats::{ResourceKey, types};
use pretty_assertions::assert_eq;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SOFA: &str = "EBCF3E27-7FD46CD0-00001234-00000000";
const BLOB: &str = "0BADF00D-00000001-00000001-00000000";

fn blob_bytes() -> Vec<u8> {
    b"blob ".repeat(64)
}

fn create_package(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("objects.package");
    let key: ResourceKey = SOFA.parse().expect("Valid key");
    let mut set = PropertySet::new(key);
    set.add_item(PropertyItem::new("name", PropertyValue::String("Sofa".to_string())));
    set.add_item(PropertyItem::new("cost", PropertyValue::UInt(500)));

    let mut archive = Archive::create(&path).expect("Failed to start package");
    archive.commit(set.into(), true).expect("Failed to stage property set");
    archive
        .commit_compressed(BLOB.parse().expect("Valid key"), &blob_bytes())
        .expect("Failed to stage blob");
    archive.update(false).expect("Failed to write package");
    path
}

fn dbpf(args: &[&str]) -> anyhow::Result<String> {
    let cli = Cli::try_parse_from(std::iter::once("dbpf").chain(args.iter().copied()))
        .expect("Arguments should parse");
    let mut out = Vec::new();
    run(&cli, &mut out)?;
    Ok(String::from_utf8(out).expect("Output is UTF-8"))
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("Temp paths are UTF-8")
}

#[test]
fn test_list_shows_every_resource() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);

    let text = dbpf(&["list", arg(&path)]).expect("list should succeed");
    let sofa_line = text
        .lines()
        .find(|line| line.starts_with(SOFA))
        .expect("sofa listed");
    assert!(sofa_line.contains("GZPS"));
    assert!(sofa_line.ends_with("Sofa"));
    let blob_line = text
        .lines()
        .find(|line| line.starts_with(BLOB))
        .expect("blob listed");
    assert!(blob_line.contains("  C  "));
    assert!(text.ends_with("3 resources\n"));
}

#[test]
fn test_list_filters_by_type_as_json() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);

    let text = dbpf(&["list", arg(&path), "--type", "gzps", "-o", "json"]).expect("list should succeed");
    let rows: Value = serde_json::from_str(&text).expect("Output is JSON");
    let rows = rows.as_array().expect("Output is an array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["key"], SOFA);
    assert_eq!(rows[0]["name"], "Sofa");
    assert_eq!(rows[0]["compressed"], false);

    assert!(dbpf(&["list", arg(&path), "--type", "nonsense"]).is_err());
}

#[test]
fn test_show_prints_export_tree() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);

    let text = dbpf(&["show", arg(&path), SOFA]).expect("show should succeed");
    let tree: Value = serde_json::from_str(&text).expect("Output is JSON");
    assert_eq!(tree["format"], "property-set");
    assert_eq!(tree["type"], types::type_name(types::GZPS).expect("GZPS is known"));
    assert_eq!(tree["items"][1]["value"], 500);

    let text = dbpf(&["show", arg(&path), BLOB]).expect("show should succeed");
    let tree: Value = serde_json::from_str(&text).expect("Output is JSON");
    assert_eq!(tree["format"], "opaque");
    assert_eq!(tree["size"], blob_bytes().len());

    assert!(dbpf(&["show", arg(&path), "1-2-3-4"]).is_err());
}

#[test]
fn test_extract_writes_decompressed_bytes() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let dest = dir.path().join("blob.bin");

    let text = dbpf(&["extract", arg(&path), BLOB, arg(&dest)]).expect("extract should succeed");
    assert!(text.starts_with(&format!("Wrote {} bytes", blob_bytes().len())));
    assert_eq!(fs::read(&dest).expect("Failed to read extracted file"), blob_bytes());

    assert!(dbpf(&["extract", arg(&path), "1-2-3-4", arg(&dest)]).is_err());
}

#[test]
fn test_verify_round_trips_engine_output() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);

    let text = dbpf(&["verify", arg(&path)]).expect("verify should succeed");
    assert!(text.contains("rewrite is identical"));

    // Trailing bytes no index entry covers are not carried over
    let mut data = fs::read(&path).expect("Failed to read package");
    data.extend_from_slice(b"trailing garbage");
    fs::write(&path, &data).expect("Failed to write package");
    assert!(dbpf(&["verify", arg(&path)]).is_err());
}

#[test]
fn test_config_file_is_applied() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"temp_suffix": ""}"#).expect("Failed to write config");

    let err = dbpf(&["list", arg(&path), "--config", arg(&config)]).expect_err("empty suffix is rejected");
    assert!(format!("{err:#}").contains("Invalid configuration"));
}

#[test]
fn test_types_prints_table() {
    let text = dbpf(&["types"]).expect("types should succeed");
    assert!(text.lines().any(|line| line.starts_with("53545223  STR#")));
}
