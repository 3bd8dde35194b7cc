//! End-to-end parsing of a hand-assembled package: header, index,
//! compression directory, RefPack payloads and typed decoding.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use binrw::Endian;
use dbpf_formats::cursor::ByteWriter;
use dbpf_formats::refpack;
use dbpf_formats::resource::cpf::{PROPERTY_SET_SIGNATURE, PropertyType};
use dbpf_formats::resource::string_table::STRING_TABLE_FORMAT;
use dbpf_formats::resource::{
    CodecRegistry, DecodeOptions, NAME_FIELD_SIZE, Payload, Resource, ResourceError,
};
use dbpf_formats::{
    CompressionDirectory, DIRECTORY_KEY, HEADER_SIZE, PackageHeader, ResourceIndex, ResourceKey,
    SizeInfo, types,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn sofa_key() -> ResourceKey {
    ResourceKey::new(types::GZPS, 0x7FD46CD0, 0x0000_1234, 0)
}

fn strings_key() -> ResourceKey {
    ResourceKey::new(types::STR, 0x7FD46CD0, 0x0000_0085, 0)
}

fn sofa_bytes() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_bytes(&PROPERTY_SET_SIGNATURE);
    w.write_u32(2, Endian::Little);
    w.write_u32(PropertyType::UINT_TAG, Endian::Little);
    w.write_length_prefixed("cost", Endian::Little);
    w.write_u32(500, Endian::Little);
    w.write_u32(PropertyType::STRING_TAG, Endian::Little);
    w.write_length_prefixed("name", Endian::Little);
    w.write_length_prefixed("Sofa", Endian::Little);
    w.into_inner()
}

fn string_table_bytes() -> Vec<u8> {
    let mut w = ByteWriter::new();
    w.write_fixed_string("Catalog Strings", NAME_FIELD_SIZE);
    w.write_u16(STRING_TABLE_FORMAT, Endian::Little);
    w.write_u16(3, Endian::Little);
    for (language, title, description) in [
        (1u8, "Comfy Sofa", "Seats two"),
        (3, "Canape", ""),
        (1, "Second line", ""),
    ] {
        w.write_u8(language);
        w.write_null_terminated(title);
        w.write_null_terminated(description);
    }
    w.into_inner()
}

/// Lay out header, index, payloads and an optional directory the way a
/// producer would: index right after the header, payloads after it.
fn assemble(resources: &[(ResourceKey, Vec<u8>, u32)], with_directory: bool) -> Vec<u8> {
    let mut index = ResourceIndex::new();
    let with_ids = true;
    let mut all: Vec<(ResourceKey, Vec<u8>, u32)> = resources.to_vec();
    if with_directory {
        let mut staged = ResourceIndex::new();
        for (key, bytes, uncompressed) in resources {
            staged.upsert(
                *key,
                SizeInfo {
                    file_offset: 0,
                    stored_size: bytes.len() as u32,
                    uncompressed_size: *uncompressed,
                },
            );
        }
        let directory = CompressionDirectory::from_entries(staged.entries());
        all.push((DIRECTORY_KEY, directory.to_bytes(with_ids), 0));
    }

    let index_size = all.len() * 24;
    let mut offset = (HEADER_SIZE + index_size) as u64;
    for (key, bytes, uncompressed) in &all {
        index.upsert(
            *key,
            SizeInfo {
                file_offset: offset,
                stored_size: bytes.len() as u32,
                uncompressed_size: *uncompressed,
            },
        );
        offset += bytes.len() as u64;
    }

    let header = PackageHeader {
        index_entry_count: all.len() as u32,
        index_size: index_size as u32,
        ..PackageHeader::default()
    };
    let mut out = header.to_bytes().expect("Failed to write header");
    let mut writer = ByteWriter::new();
    index.serialize(&mut writer, with_ids).expect("Failed to write index");
    out.extend_from_slice(writer.as_slice());
    for (_, bytes, _) in &all {
        out.extend_from_slice(bytes);
    }
    out
}

/// Parse a package and return every resource's logical bytes
fn read_all(data: &[u8]) -> (PackageHeader, ResourceIndex, Vec<(ResourceKey, Vec<u8>)>) {
    let header = PackageHeader::parse(data).expect("Failed to parse header");
    let start = header.index_offset as usize;
    let mut index =
        ResourceIndex::parse(&data[start..start + header.index_size as usize], &header)
            .expect("Failed to parse index");

    if let Some(entry) = index.lookup(&DIRECTORY_KEY).copied() {
        let at = entry.file_offset as usize;
        let directory = CompressionDirectory::parse(
            &data[at..at + entry.stored_size as usize],
            header.has_resource_ids(),
        )
        .expect("Failed to parse directory");
        index.apply_directory(&directory);
    }

    let resources = index
        .entries()
        .iter()
        .filter(|entry| entry.key != DIRECTORY_KEY)
        .map(|entry| {
            let at = entry.file_offset as usize;
            let stored = &data[at..at + entry.stored_size as usize];
            let bytes = if entry.is_compressed() {
                refpack::decompress(stored, entry.uncompressed_size).expect("Failed to decompress")
            } else {
                stored.to_vec()
            };
            (entry.key, bytes)
        })
        .collect();
    (header, index, resources)
}

#[test]
fn test_package_with_directory_decodes_every_resource() {
    let sofa = sofa_bytes();
    let packed = refpack::compress(&sofa).expect("Failed to compress");
    let strings = string_table_bytes();
    let blob = b"opaque".to_vec();
    let blob_key = ResourceKey::new(0x0BAD_F00D, 0, 1, 0);

    let data = assemble(
        &[
            (sofa_key(), packed, sofa.len() as u32),
            (strings_key(), strings.clone(), 0),
            (blob_key, blob.clone(), 0),
        ],
        true,
    );
    let (header, index, resources) = read_all(&data);
    assert_eq!(header.index_entry_count, 4);
    assert!(index.lookup(&sofa_key()).expect("sofa indexed").is_compressed());
    assert!(!index.lookup(&strings_key()).expect("strings indexed").is_compressed());

    let registry = CodecRegistry::standard();
    let options = DecodeOptions::default();
    let mut decoded = 0;
    for (key, bytes) in &resources {
        match registry.decode(*key, bytes, &options) {
            Some(Ok(Payload::PropertySet(set))) => {
                assert_eq!(set.get_string("cost").as_deref(), Some("0x000001F4"));
                assert_eq!(set.to_bytes(), sofa);
                decoded += 1;
            }
            Some(Ok(Payload::StringTable(table))) => {
                assert_eq!(table.name(), "Catalog Strings");
                assert_eq!(table.strings_for(1).len(), 2);
                assert_eq!(table.get(3, 0).map(|item| item.title()), Some("Canape"));
                assert_eq!(table.to_bytes(), strings);
                decoded += 1;
            }
            Some(other) => panic!("unexpected decode result {other:?}"),
            None => assert_eq!((*key, bytes.as_slice()), (blob_key, blob.as_slice())),
        }
    }
    assert_eq!(decoded, 2);
}

#[test]
fn test_package_without_directory_reads_raw() {
    let sofa = sofa_bytes();
    let data = assemble(&[(sofa_key(), sofa.clone(), 0)], false);
    let (_, index, resources) = read_all(&data);
    assert!(index.lookup(&DIRECTORY_KEY).is_none());
    assert_eq!(resources, vec![(sofa_key(), sofa)]);
}

#[test]
fn test_unflagged_refpack_payload_is_recognised() {
    let sofa = sofa_bytes().repeat(4);
    let packed = refpack::compress(&sofa).expect("Failed to compress");
    assert!(refpack::is_probably_compressed(packed.len() as u32, &packed));
    assert!(!refpack::is_probably_compressed(sofa.len() as u32, &sofa));
}

#[test]
fn test_index_with_duplicate_key_is_rejected() {
    let sofa = sofa_bytes();
    let mut data = assemble(
        &[
            (sofa_key(), sofa.clone(), 0),
            (ResourceKey::new(types::GZPS, 0x7FD46CD0, 0x0000_1235, 0), sofa, 0),
        ],
        false,
    );
    // Overwrite the second record's instance with the first one's
    let second = HEADER_SIZE + 24 + 8;
    data[second..second + 4].copy_from_slice(&0x0000_1234u32.to_le_bytes());

    let header = PackageHeader::parse(&data).expect("Failed to parse header");
    let result = ResourceIndex::parse(&data[HEADER_SIZE..], &header);
    assert!(matches!(result, Err(dbpf_formats::IndexError::DuplicateKey(key)) if key == sofa_key()));
}

#[test]
fn test_corrupt_payload_is_a_local_error() {
    let registry = CodecRegistry::standard();
    let sofa = sofa_bytes();
    let result = registry
        .decode(sofa_key(), &sofa[..sofa.len() - 3], &DecodeOptions::default())
        .expect("property sets are registered");
    assert!(matches!(result, Err(ResourceError::Truncated(_))));
}

#[test]
fn test_every_registered_type_has_a_name() {
    let registry = CodecRegistry::standard();
    for type_id in registry.registered_types() {
        assert!(
            types::type_name(type_id).is_some(),
            "{type_id:08X} has a codec but no name"
        );
    }
}

proptest! {
    #[test]
    fn prop_refpack_round_trip(data in proptest::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), any::<u8>()], 0..4096)) {
        let packed = refpack::compress(&data).unwrap();
        let unpacked = refpack::decompress(&packed, data.len() as u32).unwrap();
        prop_assert_eq!(unpacked, data);
    }
}
