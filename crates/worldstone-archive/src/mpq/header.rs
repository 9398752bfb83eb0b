//! MPQ archive header
//!
//! Format versions 0 (original) and 1 (Burning Crusade, adds the high
//! halves of 64-bit table offsets). The header may sit at any 512-byte
//! aligned offset of the file; table offsets are relative to it.

use crate::error::{ArchiveError, ArchiveResult};
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;
use tracing::debug;

/// `MPQ\x1A`
pub const MPQ_MAGIC: [u8; 4] = *b"MPQ\x1A";

/// Alignment of header candidates inside a file
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// Size of the version 0 header
pub const HEADER_SIZE_V0: usize = 0x20;

/// Size of the version 1 header
pub const HEADER_SIZE_V1: usize = 0x2C;

/// Highest format version this crate reads
pub const MAX_FORMAT_VERSION: u16 = 1;

/// MPQ header as stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little, magic = b"MPQ\x1A")]
pub struct MpqHeader {
    /// Declared header size in bytes
    pub header_size: u32,
    /// Declared archive size (unreliable in protected archives)
    pub archive_size: u32,
    /// Format version
    pub format_version: u16,
    /// Sector size is `512 << sector_size_shift`
    pub sector_size_shift: u16,
    /// Low 32 bits of the hash table offset
    pub hash_table_offset: u32,
    /// Low 32 bits of the block table offset
    pub block_table_offset: u32,
    /// Hash table entry count, a power of two
    pub hash_table_entries: u32,
    /// Block table entry count
    pub block_table_entries: u32,
    /// Version 1 fields
    #[br(if(format_version >= 1))]
    pub extended: Option<MpqHeaderExt>,
}

/// Fields added by format version 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct MpqHeaderExt {
    /// Offset of the table of high 16-bit block offsets, 0 if absent
    pub hi_block_table_offset: u64,
    /// High 16 bits of the hash table offset
    pub hash_table_offset_hi: u16,
    /// High 16 bits of the block table offset
    pub block_table_offset_hi: u16,
}

impl MpqHeader {
    /// Parse a header from the start of `data`, checking the version
    pub fn parse(data: &[u8]) -> ArchiveResult<Self> {
        let header: Self = Cursor::new(data).read_le()?;
        if header.format_version > MAX_FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion(header.format_version));
        }
        Ok(header)
    }

    /// Sector size in bytes
    pub fn sector_size(&self) -> u32 {
        512u32 << self.sector_size_shift.min(22)
    }

    /// Hash table offset relative to the header
    pub fn hash_table_pos(&self) -> u64 {
        let hi = self.extended.map_or(0, |ext| u64::from(ext.hash_table_offset_hi));
        (hi << 32) | u64::from(self.hash_table_offset)
    }

    /// Block table offset relative to the header
    pub fn block_table_pos(&self) -> u64 {
        let hi = self
            .extended
            .map_or(0, |ext| u64::from(ext.block_table_offset_hi));
        (hi << 32) | u64::from(self.block_table_offset)
    }

    /// Hi-block table offset relative to the header, if present
    pub fn hi_block_table_pos(&self) -> Option<u64> {
        self.extended
            .map(|ext| ext.hi_block_table_offset)
            .filter(|&offset| offset != 0)
    }
}

/// Scan a source of `len` bytes for an MPQ header at 512-byte aligned offsets.
///
/// `read_at(offset, count)` must return exactly `count` bytes. Returns the
/// header and its absolute offset.
pub fn find_header<F>(len: u64, mut read_at: F) -> ArchiveResult<(MpqHeader, u64)>
where
    F: FnMut(u64, usize) -> ArchiveResult<Vec<u8>>,
{
    let mut offset = 0u64;
    while offset + HEADER_SIZE_V0 as u64 <= len {
        let count = (len - offset).min(HEADER_SIZE_V1 as u64) as usize;
        let candidate = read_at(offset, count)?;
        if candidate.get(..4) == Some(&MPQ_MAGIC[..]) {
            let header = MpqHeader::parse(&candidate)?;
            debug!(
                "MPQ header at 0x{:X}: version {}, sector size {}, {} hash / {} block entries",
                offset,
                header.format_version,
                header.sector_size(),
                header.hash_table_entries,
                header.block_table_entries
            );
            return Ok((header, offset));
        }
        offset += HEADER_ALIGNMENT;
    }
    Err(ArchiveError::InvalidMagic { searched: len })
}
