//! Bounds-checked byte streams
//!
//! [`ByteStream`] is the single capability every byte source implements:
//! exact reads, bounded seeks and a known length. Backends also implement
//! `std::io::Read + Seek`, so `binrw` can parse straight from them.
//!
//! - [`FileStream`]: plain file on disk
//! - [`MemoryStream`]: owned in-memory buffer
//! - [`MpqFileStream`](crate::mpq::MpqFileStream): archive entry, decompressed per sector

use crate::error::{ArchiveError, ArchiveResult, from_io, into_io};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Random-access byte source with a known length.
///
/// Reads either fill the whole buffer or fail with
/// [`ArchiveError::TruncatedData`]; seeks past [`len`](Self::len) fail with
/// [`ArchiveError::SeekOutOfBounds`].
pub trait ByteStream: Read + Seek {
    /// Total length in bytes
    fn len(&self) -> u64;

    /// Current position in bytes
    fn tell(&self) -> u64;

    /// True when the stream holds no data
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes left between the position and the end
    fn remaining(&self) -> u64 {
        self.len().saturating_sub(self.tell())
    }

    /// Move to an absolute position
    fn seek_to(&mut self, position: u64) -> ArchiveResult<()> {
        if position > self.len() {
            return Err(ArchiveError::SeekOutOfBounds {
                position,
                len: self.len(),
            });
        }
        self.seek(SeekFrom::Start(position)).map_err(from_io)?;
        Ok(())
    }

    /// Fill `buf` completely
    fn read_bytes(&mut self, buf: &mut [u8]) -> ArchiveResult<()> {
        let offset = self.tell();
        let available = self.remaining();
        let requested = buf.len() as u64;
        if requested > available {
            return Err(ArchiveError::TruncatedData {
                offset,
                requested,
                available,
            });
        }
        self.read_exact(buf).map_err(from_io)
    }

    /// Read `count` bytes into a new buffer
    fn read_vec(&mut self, count: usize) -> ArchiveResult<Vec<u8>> {
        let available = self.remaining();
        if count as u64 > available {
            return Err(ArchiveError::TruncatedData {
                offset: self.tell(),
                requested: count as u64,
                available,
            });
        }
        let mut buf = vec![0u8; count];
        self.read_bytes(&mut buf)?;
        Ok(buf)
    }

    /// Read everything from the current position to the end
    fn read_to_vec(&mut self) -> ArchiveResult<Vec<u8>> {
        let count = usize::try_from(self.remaining()).map_err(|_| {
            ArchiveError::CorruptArchive(format!(
                "stream of {} bytes does not fit in memory",
                self.len()
            ))
        })?;
        self.read_vec(count)
    }

    /// Read one byte
    fn read_u8(&mut self) -> ArchiveResult<u8> {
        let mut buf = [0u8; 1];
        self.read_bytes(&mut buf)?;
        Ok(buf[0])
    }

    /// Read a little-endian `u16`
    fn read_u16(&mut self) -> ArchiveResult<u16> {
        let mut buf = [0u8; 2];
        self.read_bytes(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Read a little-endian `u32`
    fn read_u32(&mut self) -> ArchiveResult<u32> {
        let mut buf = [0u8; 4];
        self.read_bytes(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Resolve a `SeekFrom` against a stream of `len` bytes.
///
/// Targets before the start or past the end are rejected.
pub(crate) fn resolve_seek(target: SeekFrom, current: u64, len: u64) -> std::io::Result<u64> {
    let position = match target {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
    };
    match position {
        Some(position) if position <= len => Ok(position),
        Some(position) => Err(into_io(ArchiveError::SeekOutOfBounds { position, len })),
        None => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "seek to a negative position",
        )),
    }
}

/// Stream over a file on disk
#[derive(Debug)]
pub struct FileStream {
    file: File,
    len: u64,
    position: u64,
}

impl FileStream {
    /// Open a file for reading
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_file(file)
    }

    /// Wrap an already opened file, starting at offset 0
    pub fn from_file(mut file: File) -> ArchiveResult<Self> {
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(0))?;
        Ok(Self {
            file,
            len,
            position: 0,
        })
    }
}

impl Read for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let left = usize::try_from(self.len - self.position).unwrap_or(usize::MAX);
        let want = buf.len().min(left);
        let read = self.file.read(&mut buf[..want])?;
        self.position += read as u64;
        Ok(read)
    }
}

impl Seek for FileStream {
    fn seek(&mut self, target: SeekFrom) -> std::io::Result<u64> {
        let position = resolve_seek(target, self.position, self.len)?;
        self.file.seek(SeekFrom::Start(position))?;
        self.position = position;
        Ok(position)
    }
}

impl ByteStream for FileStream {
    fn len(&self) -> u64 {
        self.len
    }

    fn tell(&self) -> u64 {
        self.position
    }
}

/// Stream over an owned buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStream {
    data: Vec<u8>,
    position: u64,
}

impl MemoryStream {
    /// Wrap a buffer, starting at offset 0
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    /// The whole buffer
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Give the buffer back
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let start = usize::try_from(self.position)
            .unwrap_or(usize::MAX)
            .min(self.data.len());
        let available = &self.data[start..];
        let count = buf.len().min(available.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.position += count as u64;
        Ok(count)
    }
}

impl Seek for MemoryStream {
    fn seek(&mut self, target: SeekFrom) -> std::io::Result<u64> {
        self.position = resolve_seek(target, self.position, self.data.len() as u64)?;
        Ok(self.position)
    }
}

impl ByteStream for MemoryStream {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    fn tell(&self) -> u64 {
        self.position
    }
}
