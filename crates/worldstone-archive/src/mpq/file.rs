//! Archive entry streams
//!
//! An entry is stored either as one unit or as a run of sectors of
//! `512 << sector_size_shift` bytes. Compressed sector runs start with a
//! table of `n + 1` little-endian offsets (one more when sector CRCs are
//! present) giving each sector's bounds inside the stored data. Sectors are
//! decompressed the first time they are read and kept for the lifetime of
//! the stream.

use super::archive::Archive;
use super::tables::{BlockEntry, BlockFlags};
use crate::compression::explode::explode;
use crate::error::{ArchiveError, ArchiveResult, into_io};
use crate::stream::{ByteStream, resolve_seek};
use std::io::{Read, Seek, SeekFrom};
use tracing::trace;

/// Stream over the decompressed bytes of one archive entry
pub struct MpqFileStream {
    archive: Archive,
    block_index: usize,
    block: BlockEntry,
    /// Uncompressed size of every sector but the last
    sector_size: usize,
    /// `sector_count + 1` bounds relative to the start of the stored data
    sector_bounds: Vec<u64>,
    sectors: Vec<Option<Vec<u8>>>,
    position: u64,
}

impl std::fmt::Debug for MpqFileStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MpqFileStream")
            .field("block_index", &self.block_index)
            .field("block", &self.block)
            .field("sector_size", &self.sector_size)
            .field("sector_count", &self.sectors.len())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

impl MpqFileStream {
    pub(crate) fn new(archive: Archive, block_index: usize) -> ArchiveResult<Self> {
        let block = *archive
            .block(block_index)
            .ok_or_else(|| ArchiveError::NotFound(format!("block index {block_index}")))?;
        let flags = block.flags;

        if !flags.exists() {
            return Err(ArchiveError::NotFound(format!(
                "block {block_index} is not a live entry ({flags})"
            )));
        }
        if flags.is_encrypted() {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "block {block_index} is encrypted"
            )));
        }
        if flags.contains(BlockFlags::PATCH_FILE) {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "block {block_index} is a patch file"
            )));
        }

        let available = archive.available_from(block.offset);
        if u64::from(block.compressed_size) > available {
            return Err(ArchiveError::CorruptArchive(format!(
                "block {block_index} declares {} stored bytes at 0x{:X}, only {available} remain",
                block.compressed_size, block.offset
            )));
        }

        let file_size = block.file_size as usize;
        let stored_size = u64::from(block.compressed_size);
        let (sector_size, sector_bounds) = if file_size == 0 {
            (0, vec![0])
        } else if flags.is_single_unit() {
            (file_size, vec![0, stored_size])
        } else {
            let sector_size = archive.header().sector_size() as usize;
            let count = file_size.div_ceil(sector_size);
            let bounds = if flags.is_compressed() {
                read_sector_table(&archive, &block, count)?
            } else {
                if stored_size < file_size as u64 {
                    return Err(ArchiveError::CorruptArchive(format!(
                        "uncompressed block {block_index} stores {stored_size} bytes for a {file_size} byte entry"
                    )));
                }
                (0..=count)
                    .map(|i| (i * sector_size).min(file_size) as u64)
                    .collect()
            };
            (sector_size, bounds)
        };

        let sector_count = sector_bounds.len() - 1;
        trace!(
            "open block {block_index}: {file_size} bytes in {sector_count} sectors ({flags})"
        );

        Ok(Self {
            archive,
            block_index,
            block,
            sector_size,
            sector_bounds,
            sectors: vec![None; sector_count],
            position: 0,
        })
    }

    /// Block table index of this entry
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    /// Block table entry of this entry
    pub fn block(&self) -> &BlockEntry {
        &self.block
    }

    /// Number of sectors
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Number of sectors already decompressed
    pub fn cached_sectors(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_some()).count()
    }

    fn expected_sector_size(&self, index: usize) -> usize {
        let file_size = self.block.file_size as usize;
        (file_size - index * self.sector_size).min(self.sector_size)
    }

    fn load_sector(&mut self, index: usize) -> ArchiveResult<&[u8]> {
        if self.sectors[index].is_none() {
            let data = self.decode_sector(index)?;
            self.sectors[index] = Some(data);
        }
        Ok(self.sectors[index].as_deref().unwrap_or_default())
    }

    fn decode_sector(&self, index: usize) -> ArchiveResult<Vec<u8>> {
        let start = self.sector_bounds[index];
        let end = self.sector_bounds[index + 1];
        let expected = self.expected_sector_size(index);
        let raw = self
            .archive
            .read_raw(self.block.offset + start, (end - start) as usize)?;
        let flags = self.block.flags;

        let data = if raw.len() == expected {
            raw
        } else if flags.contains(BlockFlags::IMPLODE) {
            explode(&raw, expected)?
        } else if flags.contains(BlockFlags::COMPRESS) {
            let Some((&tag, payload)) = raw.split_first() else {
                return Err(ArchiveError::CorruptArchive(format!(
                    "block {} sector {index} is empty",
                    self.block_index
                )));
            };
            trace!(
                "block {} sector {index}: tag 0x{tag:02X}, {} -> {expected} bytes",
                self.block_index,
                payload.len()
            );
            self.archive.registry().decompress(tag, payload, expected)?
        } else {
            return Err(ArchiveError::CorruptArchive(format!(
                "block {} sector {index} stores {} bytes, expected {expected}",
                self.block_index,
                raw.len()
            )));
        };

        if data.len() != expected {
            return Err(ArchiveError::CorruptArchive(format!(
                "block {} sector {index} decompressed to {} bytes, expected {expected}",
                self.block_index,
                data.len()
            )));
        }
        Ok(data)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ArchiveResult<usize> {
        let len = u64::from(self.block.file_size);
        let mut written = 0usize;
        while written < buf.len() && self.position < len {
            let index = (self.position / self.sector_size as u64) as usize;
            let within = (self.position % self.sector_size as u64) as usize;
            let sector = self.load_sector(index)?;
            let count = (sector.len() - within).min(buf.len() - written);
            buf[written..written + count].copy_from_slice(&sector[within..within + count]);
            written += count;
            self.position += count as u64;
        }
        Ok(written)
    }
}

/// Read and validate the sector offset table of a compressed entry
fn read_sector_table(archive: &Archive, block: &BlockEntry, count: usize) -> ArchiveResult<Vec<u64>> {
    let entries = count + 1 + usize::from(block.flags.contains(BlockFlags::SECTOR_CRC));
    let table_size = entries * 4;
    if table_size as u64 > u64::from(block.compressed_size) {
        return Err(ArchiveError::CorruptArchive(format!(
            "sector table of {entries} entries does not fit in {} stored bytes",
            block.compressed_size
        )));
    }

    let raw = archive.read_raw(block.offset, table_size)?;
    let bounds: Vec<u64> = raw
        .chunks_exact(4)
        .take(count + 1)
        .map(|word| u64::from(u32::from_le_bytes([word[0], word[1], word[2], word[3]])))
        .collect();

    let stored = u64::from(block.compressed_size);
    let monotonic = bounds.windows(2).all(|pair| pair[0] <= pair[1]);
    let offsets_size = (count as u64 + 1) * 4;
    let in_range = bounds.first().is_some_and(|&first| first >= offsets_size)
        && bounds.last().is_some_and(|&last| last <= stored);
    if !monotonic || !in_range {
        return Err(ArchiveError::CorruptArchive(format!(
            "invalid sector offset table {bounds:?} for {stored} stored bytes"
        )));
    }
    Ok(bounds)
}

impl Read for MpqFileStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.read_into(buf).map_err(into_io)
    }
}

impl Seek for MpqFileStream {
    fn seek(&mut self, target: SeekFrom) -> std::io::Result<u64> {
        self.position = resolve_seek(target, self.position, u64::from(self.block.file_size))?;
        Ok(self.position)
    }
}

impl ByteStream for MpqFileStream {
    fn len(&self) -> u64 {
        u64::from(self.block.file_size)
    }

    fn tell(&self) -> u64 {
        self.position
    }
}
