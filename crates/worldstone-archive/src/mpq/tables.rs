//! Hash and block tables
//!
//! Both tables are stored encrypted with fixed keys. The hash table maps a
//! name (through two check hashes) to a block index; the block table locates
//! each entry's data and describes how it is stored.

use super::crypto::{HashType, decrypt_bytes, hash_string};
use crate::error::ArchiveResult;
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;
use tracing::trace;

/// Size of one hash table entry on disk
pub const HASH_ENTRY_SIZE: usize = 16;

/// Size of one block table entry on disk
pub const BLOCK_ENTRY_SIZE: usize = 16;

/// Block index of a slot that was never used; ends a probe sequence
pub const HASH_ENTRY_EMPTY: u32 = 0xFFFF_FFFF;

/// Block index of a deleted slot; probing continues past it
pub const HASH_ENTRY_DELETED: u32 = 0xFFFF_FFFE;

/// Locale of entries that apply to every language
pub const LOCALE_NEUTRAL: u16 = 0;

/// Platform of entries that apply to every platform
pub const PLATFORM_DEFAULT: u16 = 0;

/// One slot of the hash table
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct HashEntry {
    /// `hash_string(name, NameA)`
    pub name_a: u32,
    /// `hash_string(name, NameB)`
    pub name_b: u32,
    /// Windows LANGID of this variant
    pub locale: u16,
    /// Target platform, 0 for all
    pub platform: u16,
    /// Index into the block table, or one of the empty/deleted markers
    pub block_index: u32,
}

impl HashEntry {
    /// Slot has never held an entry
    pub fn is_empty(&self) -> bool {
        self.block_index == HASH_ENTRY_EMPTY
    }

    /// Slot held an entry that was removed
    pub fn is_deleted(&self) -> bool {
        self.block_index == HASH_ENTRY_DELETED
    }
}

/// Block flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockFlags(pub u32);

impl BlockFlags {
    /// PKWARE DCL imploded, no per-sector tag byte
    pub const IMPLODE: u32 = 0x0000_0100;
    /// Sectors carry a compression tag byte
    pub const COMPRESS: u32 = 0x0000_0200;
    /// Data is encrypted with a key derived from the name
    pub const ENCRYPTED: u32 = 0x0001_0000;
    /// Encryption key adjusted by the block offset
    pub const FIX_KEY: u32 = 0x0002_0000;
    /// Patch file
    pub const PATCH_FILE: u32 = 0x0010_0000;
    /// Stored as one unit instead of sectors
    pub const SINGLE_UNIT: u32 = 0x0100_0000;
    /// Deletion marker
    pub const DELETE_MARKER: u32 = 0x0200_0000;
    /// A CRC entry follows the sector offset table
    pub const SECTOR_CRC: u32 = 0x0400_0000;
    /// Entry is valid
    pub const EXISTS: u32 = 0x8000_0000;

    /// Raw value
    pub fn bits(self) -> u32 {
        self.0
    }

    /// True when every bit of `flag` is set
    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    /// Any of the compression flags
    pub fn is_compressed(self) -> bool {
        self.0 & (Self::IMPLODE | Self::COMPRESS) != 0
    }

    /// Encrypted entry
    pub fn is_encrypted(self) -> bool {
        self.contains(Self::ENCRYPTED)
    }

    /// Single-unit entry
    pub fn is_single_unit(self) -> bool {
        self.contains(Self::SINGLE_UNIT)
    }

    /// Entry holds readable data
    pub fn exists(self) -> bool {
        self.contains(Self::EXISTS) && !self.contains(Self::DELETE_MARKER)
    }
}

impl std::fmt::Display for BlockFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(u32, &str); 9] = [
            (BlockFlags::IMPLODE, "implode"),
            (BlockFlags::COMPRESS, "compress"),
            (BlockFlags::ENCRYPTED, "encrypted"),
            (BlockFlags::FIX_KEY, "fix-key"),
            (BlockFlags::PATCH_FILE, "patch"),
            (BlockFlags::SINGLE_UNIT, "single-unit"),
            (BlockFlags::DELETE_MARKER, "deleted"),
            (BlockFlags::SECTOR_CRC, "sector-crc"),
            (BlockFlags::EXISTS, "exists"),
        ];
        let mut first = true;
        for (bit, name) in NAMES {
            if self.contains(bit) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

/// Block table entry as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
struct RawBlockEntry {
    file_pos: u32,
    compressed_size: u32,
    file_size: u32,
    flags: u32,
}

/// One entry of the block table, with its offset widened by the hi-block table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    /// Offset of the entry data relative to the archive header
    pub offset: u64,
    /// Stored size, including any sector offset table
    pub compressed_size: u32,
    /// Size after decompression
    pub file_size: u32,
    /// Storage flags
    pub flags: BlockFlags,
}

/// Decrypt and parse `count` hash table entries
pub fn parse_hash_table(mut raw: Vec<u8>, count: usize, key: u32) -> ArchiveResult<Vec<HashEntry>> {
    raw.truncate(count * HASH_ENTRY_SIZE);
    decrypt_bytes(&mut raw, key);
    let mut cursor = Cursor::new(raw);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        entries.push(cursor.read_le::<HashEntry>()?);
    }
    Ok(entries)
}

/// Decrypt and parse `count` block table entries.
///
/// `hi_offsets` holds the optional high 16 bits of every block offset.
pub fn parse_block_table(
    mut raw: Vec<u8>,
    count: usize,
    key: u32,
    hi_offsets: Option<&[u16]>,
) -> ArchiveResult<Vec<BlockEntry>> {
    raw.truncate(count * BLOCK_ENTRY_SIZE);
    decrypt_bytes(&mut raw, key);
    let mut cursor = Cursor::new(raw);
    let mut entries = Vec::with_capacity(count);
    for index in 0..count {
        let entry = cursor.read_le::<RawBlockEntry>()?;
        let hi = hi_offsets
            .and_then(|table| table.get(index))
            .map_or(0, |&hi| u64::from(hi));
        entries.push(BlockEntry {
            offset: (hi << 32) | u64::from(entry.file_pos),
            compressed_size: entry.compressed_size,
            file_size: entry.file_size,
            flags: BlockFlags(entry.flags),
        });
    }
    Ok(entries)
}

/// Locate `name` in a hash table whose size is a power of two.
///
/// Probing starts at the slot given by the table-offset hash and walks
/// forward one slot at a time, wrapping around, until a never-used slot or
/// until every slot has been visited. Deleted slots are skipped. Among the
/// entries matching both check hashes and the platform, an exact `locale`
/// match wins over a neutral one, which wins over any other locale.
///
/// Returns the hash table slot of the best match.
pub fn lookup(table: &[HashEntry], name: &str, locale: u16, platform: u16) -> Option<usize> {
    if table.is_empty() {
        return None;
    }
    let mask = table.len() - 1;
    let start = hash_string(name, HashType::TableOffset) as usize & mask;
    let name_a = hash_string(name, HashType::NameA);
    let name_b = hash_string(name, HashType::NameB);

    let mut neutral = None;
    let mut fallback = None;
    let mut probes = 0usize;

    for step in 0..table.len() {
        let slot = (start + step) & mask;
        let entry = &table[slot];
        probes += 1;
        if entry.is_empty() {
            break;
        }
        if entry.is_deleted() || entry.name_a != name_a || entry.name_b != name_b {
            continue;
        }
        if entry.platform != PLATFORM_DEFAULT && entry.platform != platform {
            continue;
        }
        if entry.locale == locale {
            trace!("lookup {name}: exact locale match in slot {slot} after {probes} probes");
            return Some(slot);
        }
        if entry.locale == LOCALE_NEUTRAL {
            neutral.get_or_insert(slot);
        } else {
            fallback.get_or_insert(slot);
        }
    }

    let found = neutral.or(fallback);
    trace!("lookup {name}: {found:?} after {probes} probes");
    found
}
