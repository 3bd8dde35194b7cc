//! File-backed archive tests: create, update, backups and replace failures.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use dbpf_archive::{Archive, ArchiveConfig, ArchiveError, Fetched, sibling_path};
use dbpf_formats::resource::cpf::{PropertyItem, PropertyValue};
use dbpf_formats::resource::{Payload, PropertySet, Resource};
use dbpf_formats::{ResourceKey, types};
use pretty_assertions::assert_eq;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn sofa_key() -> ResourceKey {
    ResourceKey::new(types::GZPS, 0x7FD46CD0, 0x0000_1001, 0)
}

fn sofa() -> Payload {
    let mut set = PropertySet::new(sofa_key());
    set.add_item(PropertyItem::new("name", PropertyValue::String("Sofa".to_string())));
    set.add_item(PropertyItem::new("cost", PropertyValue::UInt(500)));
    set.into()
}

/// Create a package on disk holding one property set and one opaque blob.
fn create_package(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("objects.package");
    let mut archive = Archive::create(&path).expect("Failed to start package");
    archive.commit(sofa(), true).expect("Failed to stage property set");
    archive
        .commit_compressed(ResourceKey::new(0x0BAD_F00D, 1, 1, 0), &b"blob ".repeat(64))
        .expect("Failed to stage blob");
    let outcome = archive.update(false).expect("Failed to write package");
    assert!(outcome.replaced());
    path
}

fn cost(archive: &mut Archive, key: &ResourceKey) -> u32 {
    match archive.get(key).expect("Failed to read resource") {
        Some(Fetched::Payload(Payload::PropertySet(set))) => {
            set.get_u32("cost").expect("cost item present")
        }
        other => panic!("unexpected lookup result {other:?}"),
    }
}

fn set_cost(archive: &mut Archive, value: u32) {
    match archive.get(&sofa_key()).expect("Failed to read resource") {
        Some(Fetched::Payload(Payload::PropertySet(set))) => {
            set.set_u32("cost", value).expect("Failed to set cost");
        }
        other => panic!("unexpected lookup result {other:?}"),
    }
    assert!(archive.commit_cached(&sofa_key(), false).expect("Failed to commit"));
}

fn temp_and_backup(path: &Path) -> (PathBuf, PathBuf) {
    (sibling_path(path, ".temp"), sibling_path(path, ".bak"))
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    assert!(matches!(Archive::create(&path), Err(ArchiveError::Io(_))));
}

#[test]
fn test_update_replaces_file_and_reopens() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let (temp, backup) = temp_and_backup(&path);

    let mut archive = Archive::open(&path).expect("Failed to open package");
    assert_eq!(archive.resource_count(), 3);
    assert_eq!(cost(&mut archive, &sofa_key()), 500);

    set_cost(&mut archive, 750);
    let outcome = archive.update(false).expect("Failed to update package");
    assert!(outcome.replaced());
    assert!(outcome.backup_path.is_none());
    assert!(!temp.exists());
    assert!(!backup.exists());

    // The archive now reads the new file
    assert!(archive.is_open());
    assert!(!archive.is_dirty());
    assert_eq!(cost(&mut archive, &sofa_key()), 750);
    let mut fresh = Archive::open(&path).expect("Failed to open package");
    assert_eq!(cost(&mut fresh, &sofa_key()), 750);
}

#[test]
fn test_update_with_backup_keeps_previous_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let original = fs::read(&path).expect("Failed to read package");

    let mut archive = Archive::open(&path).expect("Failed to open package");
    set_cost(&mut archive, 900);
    let outcome = archive.update(true).expect("Failed to update package");

    let backup = outcome.backup_path.expect("backup requested");
    assert_eq!(backup, sibling_path(&path, ".bak"));
    assert_eq!(fs::read(&backup).expect("Failed to read backup"), original);
    assert_ne!(fs::read(&path).expect("Failed to read package"), original);
}

#[test]
fn test_locked_replace_degrades_without_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let (temp, backup) = temp_and_backup(&path);
    let original = fs::read(&path).expect("Failed to read package");

    let mut archive = Archive::open(&path).expect("Failed to open package");
    set_cost(&mut archive, 1234);
    let outcome = archive
        .update_using(true, |_, _| {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file is open in another process",
            ))
        })
        .expect("Update must not fail when only the replace step does");

    assert!(outcome.backup_path.is_none());
    assert!(matches!(
        outcome.replace_error,
        Some(ArchiveError::FileLocked { .. })
    ));
    assert!(backup.exists());
    assert!(temp.exists());

    // Reopened from the untouched original
    assert_eq!(fs::read(&path).expect("Failed to read package"), original);
    assert!(archive.is_open());
    assert_eq!(cost(&mut archive, &sofa_key()), 500);

    // The rewritten package sits at the temporary path
    let mut rewritten = Archive::open(&temp).expect("Failed to open temporary package");
    assert_eq!(cost(&mut rewritten, &sofa_key()), 1234);
}

#[test]
fn test_failed_backup_leaves_archive_open() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let (temp, backup) = temp_and_backup(&path);
    let original = fs::read(&path).expect("Failed to read package");
    fs::create_dir(&backup).expect("Failed to create directory");

    let mut archive = Archive::open(&path).expect("Failed to open package");
    set_cost(&mut archive, 321);
    assert!(matches!(archive.update(true), Err(ArchiveError::Io(_))));

    assert!(archive.is_open());
    assert!(archive.is_dirty());
    assert!(!temp.exists());
    assert_eq!(fs::read(&path).expect("Failed to read package"), original);

    // Staged edit survives and lands once the backup slot is free
    fs::remove_dir(&backup).expect("Failed to remove directory");
    let outcome = archive.update(true).expect("Failed to update package");
    assert!(outcome.replaced());
    assert_eq!(cost(&mut archive, &sofa_key()), 321);
}

#[test]
fn test_custom_suffixes() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let config = ArchiveConfig::default()
        .with_temp_suffix(".new")
        .with_backup_suffix(".orig")
        .with_sync_on_update(false);

    let mut archive = Archive::open_with(&path, config).expect("Failed to open package");
    set_cost(&mut archive, 1);
    let outcome = archive.update(true).expect("Failed to update package");
    assert_eq!(outcome.backup_path, Some(sibling_path(&path, ".orig")));
    assert!(!sibling_path(&path, ".new").exists());
}

#[test]
fn test_in_memory_archive_has_no_path() {
    let mut archive = Archive::from_reader(io::Cursor::new(
        Archive::<io::Cursor<Vec<u8>>>::new()
            .rewrite_to_vec()
            .expect("Failed to build empty package"),
    ))
    .expect("Failed to read empty package");
    assert_eq!(archive.resource_count(), 0);
    assert!(archive.path().is_none());
    archive.close();
}

#[test]
fn test_rewrite_records_encoded_sizes() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = create_package(&dir);
    let mut archive = Archive::open(&path).expect("Failed to open package");
    set_cost(&mut archive, 42);

    let expected = sofa_key();
    let encoded_len = archive
        .get_payload(&expected)
        .expect("Failed to read resource")
        .map(|payload| payload.encoded_len())
        .expect("payload cached");

    let summary = archive.rewrite(&mut Vec::new()).expect("Failed to rewrite");
    assert_eq!(summary.encoded, 1);
    let entry = summary
        .entries
        .iter()
        .find(|entry| entry.key == expected)
        .expect("entry written");
    assert_eq!(entry.stored_size as usize, encoded_len);
    assert!(!entry.is_compressed());
}

#[test]
fn test_open_rejects_garbage() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("garbage.package");
    fs::write(&path, b"not a package at all").expect("Failed to write file");
    assert!(matches!(Archive::open(&path), Err(ArchiveError::Index(_))));

    let mut bad_magic = vec![0u8; 96];
    bad_magic[..4].copy_from_slice(b"DBPX");
    fs::write(&path, &bad_magic).expect("Failed to write file");
    assert!(matches!(Archive::open(&path), Err(ArchiveError::Index(_))));
}

proptest::proptest! {
    #[test]
    fn prop_staged_resources_survive_rewrite(
        resources in proptest::collection::btree_map(
            0u32..64,
            (proptest::collection::vec(proptest::prelude::any::<u8>(), 1..512), proptest::prelude::any::<bool>()),
            1..12,
        )
    ) {
        let mut archive = Archive::<io::Cursor<Vec<u8>>>::new();
        for (instance, (bytes, compress)) in &resources {
            let key = ResourceKey::new(0x0BAD_F00D, 0, *instance, 0);
            if *compress {
                archive.commit_compressed(key, bytes).unwrap();
            } else {
                archive.commit_raw(key, bytes.clone()).unwrap();
            }
        }
        let written = archive.rewrite_to_vec().unwrap();

        let mut reread = Archive::from_reader(io::Cursor::new(written.clone())).unwrap();
        for (instance, (bytes, _)) in &resources {
            let key = ResourceKey::new(0x0BAD_F00D, 0, *instance, 0);
            proptest::prop_assert_eq!(&reread.read_bytes(&key).unwrap(), bytes);
        }
        proptest::prop_assert_eq!(reread.rewrite_to_vec().unwrap(), written);
    }
}
