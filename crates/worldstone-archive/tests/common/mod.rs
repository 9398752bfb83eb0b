#![allow(dead_code)]
//! In-test MPQ writer
//!
//! Produces small archives with properly encrypted hash and block tables so
//! the reader can be exercised without shipping game data.

use flate2::Compression;
use flate2::write::ZlibEncoder;
use std::io::Write;
use worldstone_archive::compression::ZLIB;
use worldstone_archive::mpq::crypto::{
    BLOCK_TABLE_KEY, HASH_TABLE_KEY, HashType, encrypt_block, hash_string,
};
use worldstone_archive::mpq::tables::{HASH_ENTRY_DELETED, HASH_ENTRY_EMPTY};
use worldstone_archive::mpq::BlockFlags;

/// The PKWARE DCL sample "AIAIAIAIAIAIA" (binary mode, 1 KiB dictionary)
pub const IMPLODED_SAMPLE: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F];
pub const IMPLODED_SAMPLE_PLAIN: &[u8] = b"AIAIAIAIAIAIA";

/// How an entry is stored
#[derive(Debug, Clone)]
pub enum Storage {
    /// Uncompressed sectors
    Plain,
    /// Uncompressed, single unit
    PlainSingleUnit,
    /// zlib-tagged sectors with an offset table
    ZlibSectors,
    /// One zlib-tagged unit
    ZlibSingleUnit,
    /// Stored bytes and flags written verbatim
    Raw { stored: Vec<u8>, flags: u32 },
}

#[derive(Debug, Clone)]
struct Entry {
    name: String,
    data: Vec<u8>,
    storage: Storage,
    locale: u16,
    /// Declared stored size override
    compressed_size: Option<u32>,
}

/// Builder for small MPQ archives
#[derive(Debug, Clone)]
pub struct MpqBuilder {
    sector_size_shift: u16,
    hash_table_size: u32,
    prefix: usize,
    version: u16,
    entries: Vec<Entry>,
    deleted_slots: Vec<usize>,
    block_count_override: Option<u32>,
    listfile: bool,
}

impl Default for MpqBuilder {
    fn default() -> Self {
        Self {
            sector_size_shift: 3,
            hash_table_size: 16,
            prefix: 0,
            version: 0,
            entries: Vec::new(),
            deleted_slots: Vec::new(),
            block_count_override: None,
            listfile: false,
        }
    }
}

impl MpqBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sector_size_shift(mut self, shift: u16) -> Self {
        self.sector_size_shift = shift;
        self
    }

    pub fn hash_table_size(mut self, size: u32) -> Self {
        self.hash_table_size = size;
        self
    }

    /// Junk bytes before the header, rounded by the caller to 512
    pub fn prefix(mut self, bytes: usize) -> Self {
        self.prefix = bytes;
        self
    }

    pub fn version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    pub fn with_listfile(mut self) -> Self {
        self.listfile = true;
        self
    }

    /// Mark a hash slot as deleted
    pub fn deleted_slot(mut self, slot: usize) -> Self {
        self.deleted_slots.push(slot);
        self
    }

    /// Declare a block count in the header that differs from the real one
    pub fn block_count_override(mut self, count: u32) -> Self {
        self.block_count_override = Some(count);
        self
    }

    pub fn file(self, name: &str, data: &[u8], storage: Storage) -> Self {
        self.file_with_locale(name, data, storage, 0)
    }

    pub fn file_with_locale(mut self, name: &str, data: &[u8], storage: Storage, locale: u16) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            storage,
            locale,
            compressed_size: None,
        });
        self
    }

    /// Last added entry declares `size` stored bytes
    pub fn declare_compressed_size(mut self, size: u32) -> Self {
        if let Some(entry) = self.entries.last_mut() {
            entry.compressed_size = Some(size);
        }
        self
    }

    fn sector_size(&self) -> usize {
        512 << self.sector_size_shift
    }

    pub fn build(&self) -> Vec<u8> {
        let mut entries = self.entries.clone();
        if self.listfile {
            let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
            let listing = format!("{}\r\n(listfile)\r\n", names.join("\r\n"));
            entries.push(Entry {
                name: "(listfile)".to_string(),
                data: listing.into_bytes(),
                storage: Storage::ZlibSectors,
                locale: 0,
                compressed_size: None,
            });
        }

        let header_size = if self.version >= 1 { 0x2C } else { 0x20 };
        let mut body = Vec::new();
        let mut blocks = Vec::new();
        for entry in &entries {
            let offset = (header_size + body.len()) as u32;
            let (stored, flags) = self.store(entry);
            let compressed_size = entry.compressed_size.unwrap_or(stored.len() as u32);
            blocks.push([offset, compressed_size, entry.data.len() as u32, flags]);
            body.extend_from_slice(&stored);
        }

        let size = self.hash_table_size as usize;
        let mut hash = vec![[HASH_ENTRY_EMPTY; 4]; size];
        for &slot in &self.deleted_slots {
            hash[slot] = [HASH_ENTRY_EMPTY, HASH_ENTRY_EMPTY, HASH_ENTRY_EMPTY, HASH_ENTRY_DELETED];
        }
        for (index, entry) in entries.iter().enumerate() {
            let start = hash_string(&entry.name, HashType::TableOffset) as usize & (size - 1);
            let slot = (0..size)
                .map(|step| (start + step) & (size - 1))
                .find(|&slot| hash[slot][3] == HASH_ENTRY_EMPTY)
                .expect("hash table full");
            hash[slot] = [
                hash_string(&entry.name, HashType::NameA),
                hash_string(&entry.name, HashType::NameB),
                u32::from(entry.locale),
                index as u32,
            ];
        }

        let hash_offset = header_size + body.len();
        let mut hash_words: Vec<u32> = hash.iter().flatten().copied().collect();
        encrypt_block(&mut hash_words, HASH_TABLE_KEY);
        let block_offset = hash_offset + hash_words.len() * 4;
        let mut block_words: Vec<u32> = blocks.iter().flatten().copied().collect();
        encrypt_block(&mut block_words, BLOCK_TABLE_KEY);
        let archive_size = block_offset + block_words.len() * 4;

        let mut out = vec![0u8; self.prefix];
        out.extend_from_slice(b"MPQ\x1A");
        out.extend_from_slice(&(header_size as u32).to_le_bytes());
        out.extend_from_slice(&(archive_size as u32).to_le_bytes());
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.sector_size_shift.to_le_bytes());
        out.extend_from_slice(&(hash_offset as u32).to_le_bytes());
        out.extend_from_slice(&(block_offset as u32).to_le_bytes());
        out.extend_from_slice(&self.hash_table_size.to_le_bytes());
        let block_count = self.block_count_override.unwrap_or(blocks.len() as u32);
        out.extend_from_slice(&block_count.to_le_bytes());
        if self.version >= 1 {
            out.extend_from_slice(&0u64.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
            out.extend_from_slice(&0u16.to_le_bytes());
        }
        out.extend_from_slice(&body);
        for word in hash_words.iter().chain(&block_words) {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    fn store(&self, entry: &Entry) -> (Vec<u8>, u32) {
        let exists = BlockFlags::EXISTS;
        match &entry.storage {
            Storage::Plain => (entry.data.clone(), exists),
            Storage::PlainSingleUnit => (entry.data.clone(), exists | BlockFlags::SINGLE_UNIT),
            Storage::ZlibSingleUnit => (
                compress_sector(&entry.data),
                exists | BlockFlags::COMPRESS | BlockFlags::SINGLE_UNIT,
            ),
            Storage::ZlibSectors => {
                let sectors: Vec<Vec<u8>> = entry
                    .data
                    .chunks(self.sector_size())
                    .map(compress_sector)
                    .collect();
                let mut offsets = vec![((sectors.len() + 1) * 4) as u32];
                for sector in &sectors {
                    let last = *offsets.last().unwrap_or(&0);
                    offsets.push(last + sector.len() as u32);
                }
                let mut stored: Vec<u8> = offsets.iter().flat_map(|o| o.to_le_bytes()).collect();
                for sector in sectors {
                    stored.extend(sector);
                }
                (stored, exists | BlockFlags::COMPRESS)
            }
            Storage::Raw { stored, flags } => (stored.clone(), *flags),
        }
    }
}

/// zlib-tag a sector, keeping it raw when compression does not help
pub fn compress_sector(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    let compressed = encoder.finish().unwrap();
    if compressed.len() + 1 >= data.len() {
        return data.to_vec();
    }
    let mut out = vec![ZLIB];
    out.extend(compressed);
    out
}

/// Deterministic test payload
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (((i * 7 + usize::from(seed)) % 13) as u8).wrapping_add((i / 97) as u8))
        .collect()
}
