#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for MPQ archive reading using synthetic archives
//!
//! Archives are produced by the writer in `common` with encrypted tables,
//! then opened from memory and from disk.

mod common;

use common::{IMPLODED_SAMPLE, IMPLODED_SAMPLE_PLAIN, MpqBuilder, Storage, payload};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::{Read, Seek, SeekFrom, Write};
use worldstone_archive::compression::{BZIP2, PKWARE, ZLIB};
use worldstone_archive::mpq::BlockFlags;
use worldstone_archive::{Archive, ArchiveError, ArchiveOptions, ByteStream, ErrorKind};

fn open(data: Vec<u8>) -> Archive {
    Archive::from_bytes(data, ArchiveOptions::default()).unwrap()
}

#[test]
fn test_two_entry_archive_round_trip() {
    let small = b"hello, sanctuary".to_vec();
    let data = MpqBuilder::new()
        .file("data\\global\\small.txt", &small, Storage::Plain)
        .file("data\\global\\big.bin", &payload(3000, 1), Storage::ZlibSectors)
        .build();
    let archive = open(data);

    assert_eq!(archive.block_count(), 2);
    let index = archive.find("data\\global\\small.txt").unwrap();
    assert_eq!(index, 0);
    assert_eq!(archive.read_entry(index).unwrap(), small);

    let mut stream = archive.open_entry(index).unwrap();
    assert_eq!(stream.len(), small.len() as u64);
    assert_eq!(stream.read_vec(5).unwrap(), b"hello");
    assert!(stream.read_vec(100).is_err());
}

#[test]
fn test_lookup_is_case_and_separator_insensitive() {
    let data = MpqBuilder::new()
        .file("Data\\Global\\Excel\\Armor.txt", b"armor", Storage::Plain)
        .build();
    let archive = open(data);
    assert!(archive.exists("data/global/excel/armor.txt"));
    assert!(archive.exists("DATA\\GLOBAL\\EXCEL\\ARMOR.TXT"));
    assert!(!archive.exists("data\\global\\excel\\weapons.txt"));

    let err = archive.find("data\\global\\excel\\weapons.txt").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_zlib_sectors_decompress_and_cache() {
    let content = payload(2000, 9);
    let data = MpqBuilder::new()
        .sector_size_shift(0)
        .file("multi.bin", &content, Storage::ZlibSectors)
        .build();
    let archive = open(data);
    let mut stream = archive.open_file("multi.bin").unwrap();
    assert_eq!(stream.sector_count(), 4);
    assert_eq!(stream.cached_sectors(), 0);

    stream.seek_to(1100).unwrap();
    let inner = stream.read_vec(200).unwrap();
    assert_eq!(inner, content[1100..1300]);
    assert_eq!(stream.cached_sectors(), 1);

    // Crossing into an already cached sector loads one more
    stream.seek_to(1000).unwrap();
    let across = stream.read_vec(100).unwrap();
    assert_eq!(across, content[1000..1100]);
    assert_eq!(stream.cached_sectors(), 2);

    stream.seek(SeekFrom::Start(0)).unwrap();
    let mut all = Vec::new();
    stream.read_to_end(&mut all).unwrap();
    assert_eq!(all, content);
    assert_eq!(stream.cached_sectors(), 4);
}

#[test]
fn test_single_unit_is_deterministic() {
    let content = payload(700, 3);
    let data = MpqBuilder::new()
        .file("unit.bin", &content, Storage::ZlibSingleUnit)
        .file("plain-unit.bin", &content, Storage::PlainSingleUnit)
        .build();
    let archive = open(data);

    let first = archive.read_file("unit.bin").unwrap();
    let second = archive.read_file("unit.bin").unwrap();
    assert_eq!(first, content);
    assert_eq!(first, second);
    assert_eq!(archive.read_file("plain-unit.bin").unwrap(), content);
    assert!(archive.block(0).unwrap().flags.is_single_unit());
}

#[test]
fn test_pkware_sector_and_imploded_unit() {
    let mut tagged = vec![8u8, 0, 0, 0, 17, 0, 0, 0, PKWARE];
    tagged.extend_from_slice(&IMPLODED_SAMPLE);
    let data = MpqBuilder::new()
        .file(
            "tagged.txt",
            IMPLODED_SAMPLE_PLAIN,
            Storage::Raw {
                stored: tagged,
                flags: BlockFlags::EXISTS | BlockFlags::COMPRESS,
            },
        )
        .file(
            "imploded.txt",
            IMPLODED_SAMPLE_PLAIN,
            Storage::Raw {
                stored: IMPLODED_SAMPLE.to_vec(),
                flags: BlockFlags::EXISTS | BlockFlags::IMPLODE | BlockFlags::SINGLE_UNIT,
            },
        )
        .build();
    let archive = open(data);
    assert_eq!(archive.read_file("tagged.txt").unwrap(), IMPLODED_SAMPLE_PLAIN);
    assert_eq!(archive.read_file("imploded.txt").unwrap(), IMPLODED_SAMPLE_PLAIN);
}

#[test]
fn test_unsupported_entries_fail_cleanly() {
    let mut bzip = vec![8u8, 0, 0, 0, 13, 0, 0, 0, BZIP2];
    bzip.extend_from_slice(&[0xAA; 4]);
    let data = MpqBuilder::new()
        .file(
            "encrypted.bin",
            &[0u8; 16],
            Storage::Raw {
                stored: vec![0u8; 16],
                flags: BlockFlags::EXISTS | BlockFlags::ENCRYPTED,
            },
        )
        .file(
            "bzip2.bin",
            &[0u8; 32],
            Storage::Raw {
                stored: bzip,
                flags: BlockFlags::EXISTS | BlockFlags::COMPRESS,
            },
        )
        .build();
    let archive = open(data);

    let err = archive.open_file("encrypted.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);

    let err = archive.read_file("bzip2.bin").unwrap_err();
    assert!(matches!(err, ArchiveError::UnsupportedCompression(BZIP2)));
    assert_eq!(err.kind(), ErrorKind::UnsupportedFeature);
}

#[test]
fn test_sector_size_mismatch_is_corrupt() {
    // Entry declares 64 bytes but the zlib data only holds 40
    let mut stored = vec![8u8, 0, 0, 0];
    let sector = common::compress_sector(&[5u8; 40]);
    assert_eq!(sector[0], ZLIB);
    stored.extend_from_slice(&(8 + sector.len() as u32).to_le_bytes());
    stored.extend_from_slice(&sector);
    let data = MpqBuilder::new()
        .file(
            "short.bin",
            &[5u8; 64],
            Storage::Raw {
                stored,
                flags: BlockFlags::EXISTS | BlockFlags::COMPRESS,
            },
        )
        .build();
    let archive = open(data);
    let err = archive.read_file("short.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);
}

#[test]
fn test_bad_sector_table_is_corrupt() {
    let stored = vec![8u8, 0, 0, 0, 4, 0, 0, 0, 0xFF, 0xFF];
    let data = MpqBuilder::new()
        .file(
            "bad.bin",
            &[0u8; 16],
            Storage::Raw {
                stored,
                flags: BlockFlags::EXISTS | BlockFlags::COMPRESS,
            },
        )
        .build();
    let archive = open(data);
    let err = archive.open_file("bad.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);
}

#[test]
fn test_truncated_archives() {
    // Empty block table
    let data = MpqBuilder::new()
        .file("a", b"a", Storage::Plain)
        .block_count_override(0)
        .build();
    let err = Archive::from_bytes(data, ArchiveOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);

    // Tables cut off
    let mut data = MpqBuilder::new().file("a", b"abc", Storage::Plain).build();
    data.truncate(data.len() - 8);
    let err = Archive::from_bytes(data, ArchiveOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);

    // Entry claims more stored bytes than the file holds
    let data = MpqBuilder::new()
        .file("a", b"abc", Storage::Plain)
        .declare_compressed_size(1 << 20)
        .build();
    let archive = open(data);
    let err = archive.open_file("a").unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::CorruptData | ErrorKind::TruncatedData
    ));
}

#[test]
fn test_invalid_hash_table_size() {
    let data = MpqBuilder::new()
        .hash_table_size(12)
        .file("a", b"a", Storage::Plain)
        .build();
    let err = Archive::from_bytes(data, ArchiveOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CorruptData);
}

#[test]
fn test_not_an_archive() {
    let err = Archive::from_bytes(vec![0u8; 4096], ArchiveOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_header_after_prefix_and_v1() {
    let data = MpqBuilder::new()
        .prefix(1024)
        .version(1)
        .file("x.txt", b"x", Storage::Plain)
        .build();
    let archive = open(data);
    assert_eq!(archive.header_offset(), 1024);
    assert_eq!(archive.header().format_version, 1);
    assert_eq!(archive.read_file("x.txt").unwrap(), b"x");
}

#[test]
fn test_locale_selection() {
    let data = MpqBuilder::new()
        .file_with_locale("speech.txt", b"neutral", Storage::Plain, 0)
        .file_with_locale("speech.txt", b"deutsch", Storage::Plain, 0x407)
        .build();
    let archive = open(data.clone());
    assert_eq!(archive.read_file("speech.txt").unwrap(), b"neutral");
    let index = archive.find_with_locale("speech.txt", 0x407).unwrap();
    assert_eq!(archive.read_entry(index).unwrap(), b"deutsch");

    let german = Archive::from_bytes(data, ArchiveOptions::new().with_locale(0x407)).unwrap();
    assert_eq!(german.read_file("speech.txt").unwrap(), b"deutsch");
}

#[test]
fn test_deleted_slot_does_not_stop_probing() {
    let name = "data\\global\\items\\invhaxe.dc6";
    let size = 16usize;
    let start = worldstone_archive::mpq::hash_string(
        name,
        worldstone_archive::mpq::HashType::TableOffset,
    ) as usize
        & (size - 1);
    let data = MpqBuilder::new()
        .deleted_slot(start)
        .file(name, b"axe", Storage::Plain)
        .build();
    let archive = open(data);
    assert!(archive.hash_entries()[start].is_deleted());
    assert_eq!(archive.read_file(name).unwrap(), b"axe");
}

#[test]
fn test_listfile() {
    let data = MpqBuilder::new()
        .with_listfile()
        .file("a.txt", b"a", Storage::Plain)
        .file("dir\\b.txt", b"b", Storage::ZlibSectors)
        .build();
    let archive = open(data);
    let names = archive.list_files().unwrap();
    assert_eq!(names, vec!["a.txt", "dir\\b.txt", "(listfile)"]);
    for name in &names {
        assert!(archive.exists(name), "{name}");
    }
}

#[test]
fn test_open_from_disk_with_and_without_mmap() {
    let content = payload(5000, 4);
    let data = MpqBuilder::new()
        .file("disk.bin", &content, Storage::ZlibSectors)
        .build();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();
    file.flush().unwrap();

    for use_mmap in [true, false] {
        let options = ArchiveOptions::new().with_mmap(use_mmap);
        let archive = Archive::open_with(file.path(), options).unwrap();
        assert_eq!(archive.path(), Some(file.path()));
        assert_eq!(archive.read_file("disk.bin").unwrap(), content);
    }
}

#[test]
fn test_archive_shared_between_threads() {
    let data = MpqBuilder::new()
        .file("a.bin", &payload(4000, 1), Storage::ZlibSectors)
        .file("b.bin", &payload(4000, 2), Storage::ZlibSectors)
        .build();
    let archive = open(data);

    let handles: Vec<_> = ["a.bin", "b.bin"]
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let archive = archive.clone();
            std::thread::spawn(move || {
                let bytes = archive.read_file(name).unwrap();
                assert_eq!(bytes, payload(4000, i as u8 + 1));
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

proptest! {
    #[test]
    fn prop_every_inserted_name_is_found(count in 1usize..=16) {
        // A completely full table forces long probe chains and wrap-around
        let names: Vec<String> = (0..count).map(|i| format!("data\\file{i:03}.bin")).collect();
        let mut builder = MpqBuilder::new().hash_table_size(count.next_power_of_two() as u32);
        for (i, name) in names.iter().enumerate() {
            builder = builder.file(name, &[i as u8], Storage::Plain);
        }
        let archive = open(builder.build());
        for (i, name) in names.iter().enumerate() {
            prop_assert_eq!(archive.find(name).unwrap(), i);
        }
        prop_assert!(archive.find("data\\missing.bin").is_err());
    }

    #[test]
    fn prop_garbage_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let mut data = MpqBuilder::new()
            .file("a.bin", &payload(600, 1), Storage::ZlibSectors)
            .build();
        // Overwrite the stored data with noise, keep header and tables
        let end = bytes.len().min(data.len().saturating_sub(32 + 16 * 16 + 16));
        data[32..32 + end].copy_from_slice(&bytes[..end]);
        if let Ok(archive) = Archive::from_bytes(data, ArchiveOptions::default()) {
            let _ = archive.read_file("a.bin");
        }
        let _ = Archive::from_bytes(bytes, ArchiveOptions::default());
    }
}
