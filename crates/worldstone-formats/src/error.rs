//! Error types for sprite, palette and animation decoders

use thiserror::Error;
use worldstone_archive::error::{binrw_kind, io_kind};
use worldstone_archive::{ArchiveError, BitError, ErrorKind};

/// Errors raised while decoding game formats
#[derive(Debug, Error)]
pub enum FormatError {
    /// Signature byte or magic does not match the format
    #[error("invalid {format} signature: expected 0x{expected:02X}, found 0x{found:02X}")]
    InvalidSignature {
        /// Format being decoded
        format: &'static str,
        /// Expected signature
        expected: u32,
        /// Signature found in the data
        found: u32,
    },

    /// Version field this library does not decode
    #[error("unsupported {format} version: {version}")]
    UnsupportedVersion {
        /// Format being decoded
        format: &'static str,
        /// Version found in the data
        version: u32,
    },

    /// Structurally inconsistent data (runs overflowing a frame, invalid cell codes)
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Data ends before a declared field or run
    #[error("truncated data: requested {requested} bytes at offset {offset}, {available} available")]
    TruncatedData {
        /// Offset of the failed read
        offset: u64,
        /// Bytes requested
        requested: u64,
        /// Bytes left at that offset
        available: u64,
    },

    /// Direction, frame or palette index past the end of its table
    #[error("{what} index {index} out of range (count is {count})")]
    OutOfRange {
        /// What was indexed
        what: &'static str,
        /// Requested index
        index: usize,
        /// Number of items
        count: usize,
    },

    /// Error from the underlying stream or archive
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Bitstream overrun
    #[error("bitstream error: {0}")]
    Bits(#[from] BitError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl FormatError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSignature { .. } | Self::UnsupportedVersion { .. } => ErrorKind::Format,
            Self::CorruptData(_) => ErrorKind::CorruptData,
            Self::TruncatedData { .. } | Self::Bits(_) => ErrorKind::TruncatedData,
            Self::OutOfRange { .. } => ErrorKind::NotFound,
            Self::Archive(err) => err.kind(),
            Self::Io(err) => io_kind(err),
            Self::BinRw(err) => binrw_kind(err),
        }
    }
}

/// Result type for format decoders
pub type FormatResult<T> = Result<T, FormatError>;

/// Borrow `len` bytes at `offset`, failing with [`FormatError::TruncatedData`]
pub(crate) fn slice_at(data: &[u8], offset: usize, len: usize) -> FormatResult<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(FormatError::TruncatedData {
            offset: offset as u64,
            requested: len as u64,
            available: data.len().saturating_sub(offset) as u64,
        })
}
