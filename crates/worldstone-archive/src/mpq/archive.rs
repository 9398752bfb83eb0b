//! MPQ archive handle

use super::crypto::{BLOCK_TABLE_KEY, HASH_TABLE_KEY};
use super::file::MpqFileStream;
use super::header::{MpqHeader, find_header};
use super::tables::{
    BLOCK_ENTRY_SIZE, BlockEntry, HASH_ENTRY_SIZE, HashEntry, lookup, parse_block_table,
    parse_hash_table,
};
use crate::compression::CompressionRegistry;
use crate::config::ArchiveOptions;
use crate::error::{ArchiveError, ArchiveResult};
use crate::stream::ByteStream;
use memmap2::{Mmap, MmapOptions};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Name of the internal file list
pub const LISTFILE_NAME: &str = "(listfile)";

/// Backing bytes of an archive
enum ArchiveSource {
    /// Memory-mapped file
    Mapped(Mmap),
    /// File read through a lock, for filesystems that cannot be mapped
    File { file: Mutex<File>, len: u64 },
    /// In-memory copy
    Memory(Vec<u8>),
}

impl ArchiveSource {
    fn len(&self) -> u64 {
        match self {
            Self::Mapped(map) => map.len() as u64,
            Self::File { len, .. } => *len,
            Self::Memory(data) => data.len() as u64,
        }
    }

    /// Read exactly `count` bytes at an absolute offset
    fn read_at(&self, offset: u64, count: usize) -> ArchiveResult<Vec<u8>> {
        let len = self.len();
        let available = len.saturating_sub(offset);
        if count as u64 > available {
            return Err(ArchiveError::TruncatedData {
                offset,
                requested: count as u64,
                available,
            });
        }
        let slice_of = |data: &[u8]| {
            let start = offset as usize;
            data[start..start + count].to_vec()
        };
        match self {
            Self::Mapped(map) => Ok(slice_of(map)),
            Self::Memory(data) => Ok(slice_of(data)),
            Self::File { file, .. } => {
                let mut buf = vec![0u8; count];
                let mut file = file.lock();
                file.seek(SeekFrom::Start(offset))?;
                file.read_exact(&mut buf)?;
                Ok(buf)
            }
        }
    }
}

struct ArchiveInner {
    path: Option<PathBuf>,
    source: ArchiveSource,
    options: ArchiveOptions,
    header: MpqHeader,
    header_offset: u64,
    hash_table: Vec<HashEntry>,
    block_table: Vec<BlockEntry>,
}

/// An open MPQ archive.
///
/// Tables are parsed once and never change, so the handle is cheap to clone
/// and can be shared between threads. Every [`MpqFileStream`] it creates
/// owns its own sector cache.
#[derive(Clone)]
pub struct Archive {
    inner: Arc<ArchiveInner>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.inner.path)
            .field("header_offset", &self.inner.header_offset)
            .field("hash_table_size", &self.inner.hash_table.len())
            .field("block_count", &self.inner.block_table.len())
            .finish_non_exhaustive()
    }
}

impl Archive {
    /// Open an archive file with default options
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        Self::open_with(path, ArchiveOptions::default())
    }

    /// Open an archive file
    pub fn open_with(path: impl AsRef<Path>, options: ArchiveOptions) -> ArchiveResult<Self> {
        let path = path.as_ref();
        debug!("Opening MPQ archive {}", path.display());
        let file = File::open(path)?;
        let len = file.metadata()?.len();

        let source = if options.use_mmap && len > 0 {
            #[allow(unsafe_code)]
            let map = unsafe { MmapOptions::new().map(&file)? };
            ArchiveSource::Mapped(map)
        } else {
            ArchiveSource::File {
                file: Mutex::new(file),
                len,
            }
        };

        Self::from_source(source, options, Some(path.to_path_buf()))
    }

    /// Open an archive held in memory
    pub fn from_bytes(data: impl Into<Vec<u8>>, options: ArchiveOptions) -> ArchiveResult<Self> {
        Self::from_source(ArchiveSource::Memory(data.into()), options, None)
    }

    fn from_source(
        source: ArchiveSource,
        options: ArchiveOptions,
        path: Option<PathBuf>,
    ) -> ArchiveResult<Self> {
        let len = source.len();
        let (header, header_offset) = find_header(len, |offset, count| source.read_at(offset, count))?;

        let hash_count = header.hash_table_entries as usize;
        let block_count = header.block_table_entries as usize;
        if hash_count == 0 || !hash_count.is_power_of_two() {
            return Err(ArchiveError::CorruptArchive(format!(
                "hash table size {hash_count} is not a power of two"
            )));
        }
        if block_count == 0 {
            return Err(ArchiveError::CorruptArchive(
                "block table is empty".to_string(),
            ));
        }

        let hash_raw = read_table(
            &source,
            "hash",
            header_offset + header.hash_table_pos(),
            hash_count * HASH_ENTRY_SIZE,
        )?;
        let hash_table = parse_hash_table(hash_raw, hash_count, HASH_TABLE_KEY)?;

        let block_raw = read_table(
            &source,
            "block",
            header_offset + header.block_table_pos(),
            block_count * BLOCK_ENTRY_SIZE,
        )?;
        let hi_offsets = match header.hi_block_table_pos() {
            Some(pos) => {
                let raw = read_table(&source, "hi-block", header_offset + pos, block_count * 2)?;
                Some(
                    raw.chunks_exact(2)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect::<Vec<_>>(),
                )
            }
            None => None,
        };
        let block_table =
            parse_block_table(block_raw, block_count, BLOCK_TABLE_KEY, hi_offsets.as_deref())?;

        if header.archive_size != 0 && u64::from(header.archive_size) + header_offset > len {
            warn!(
                "MPQ header declares {} bytes but only {} follow the header",
                header.archive_size,
                len - header_offset
            );
        }
        debug!(
            "MPQ archive ready: {} hash slots, {} blocks, sector size {}",
            hash_table.len(),
            block_table.len(),
            header.sector_size()
        );

        Ok(Self {
            inner: Arc::new(ArchiveInner {
                path,
                source,
                options,
                header,
                header_offset,
                hash_table,
                block_table,
            }),
        })
    }

    /// Path the archive was opened from, if any
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Parsed header
    pub fn header(&self) -> &MpqHeader {
        &self.inner.header
    }

    /// Absolute offset of the header in the file
    pub fn header_offset(&self) -> u64 {
        self.inner.header_offset
    }

    /// Options the archive was opened with
    pub fn options(&self) -> &ArchiveOptions {
        &self.inner.options
    }

    /// Sector decompression methods
    pub fn registry(&self) -> &CompressionRegistry {
        &self.inner.options.registry
    }

    /// Number of hash table slots
    pub fn hash_table_size(&self) -> usize {
        self.inner.hash_table.len()
    }

    /// Hash table slots
    pub fn hash_entries(&self) -> &[HashEntry] {
        &self.inner.hash_table
    }

    /// Number of block table entries
    pub fn block_count(&self) -> usize {
        self.inner.block_table.len()
    }

    /// Block table entry at `index`
    pub fn block(&self, index: usize) -> Option<&BlockEntry> {
        self.inner.block_table.get(index)
    }

    /// Resolve a name to its block index using the configured locale
    pub fn find(&self, name: &str) -> ArchiveResult<usize> {
        self.find_with_locale(name, self.inner.options.locale)
    }

    /// Resolve a name to its block index, preferring `locale`
    pub fn find_with_locale(&self, name: &str, locale: u16) -> ArchiveResult<usize> {
        let table = &self.inner.hash_table;
        let slot = lookup(table, name, locale, self.inner.options.platform)
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))?;
        let block_index = table[slot].block_index as usize;
        if block_index >= self.inner.block_table.len() {
            return Err(ArchiveError::CorruptArchive(format!(
                "hash slot {slot} for {name} points to block {block_index} of {}",
                self.inner.block_table.len()
            )));
        }
        Ok(block_index)
    }

    /// True when `name` resolves to an existing entry
    pub fn exists(&self, name: &str) -> bool {
        self.find(name)
            .ok()
            .and_then(|index| self.block(index))
            .is_some_and(|block| block.flags.exists())
    }

    /// Open the entry at a block index as a stream
    pub fn open_entry(&self, index: usize) -> ArchiveResult<MpqFileStream> {
        MpqFileStream::new(self.clone(), index)
    }

    /// Open an entry by name
    pub fn open_file(&self, name: &str) -> ArchiveResult<MpqFileStream> {
        let index = self.find(name)?;
        self.open_entry(index)
    }

    /// Decompress a whole entry
    pub fn read_entry(&self, index: usize) -> ArchiveResult<Vec<u8>> {
        let mut stream = self.open_entry(index)?;
        stream.read_to_vec()
    }

    /// Decompress a whole entry by name
    pub fn read_file(&self, name: &str) -> ArchiveResult<Vec<u8>> {
        let index = self.find(name)?;
        self.read_entry(index)
    }

    /// Names listed in the archive's `(listfile)`
    pub fn list_files(&self) -> ArchiveResult<Vec<String>> {
        let data = self.read_file(LISTFILE_NAME)?;
        Ok(parse_listfile(&data))
    }

    /// Read raw stored bytes at an offset relative to the header
    pub(crate) fn read_raw(&self, relative_offset: u64, count: usize) -> ArchiveResult<Vec<u8>> {
        self.inner
            .source
            .read_at(self.inner.header_offset + relative_offset, count)
    }

    /// Bytes available after `relative_offset`
    pub(crate) fn available_from(&self, relative_offset: u64) -> u64 {
        self.inner
            .source
            .len()
            .saturating_sub(self.inner.header_offset + relative_offset)
    }
}

fn read_table(source: &ArchiveSource, name: &str, offset: u64, size: usize) -> ArchiveResult<Vec<u8>> {
    let len = source.len();
    if offset.checked_add(size as u64).is_none_or(|end| end > len) {
        return Err(ArchiveError::CorruptArchive(format!(
            "{name} table at 0x{offset:X} ({size} bytes) lies outside the archive ({len} bytes)"
        )));
    }
    source.read_at(offset, size)
}

/// Split a listfile into names.
///
/// Entries are separated by `;`, CR or LF; blank entries are dropped.
pub fn parse_listfile(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split([';', '\r', '\n'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect()
}
