//! Error types for streams and archives

use thiserror::Error;

use crate::bits::BitError;

/// Broad classification of every error this workspace reports.
///
/// Tools scanning many entries use this to print a short reason and move on
/// to the next entry instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Bad magic, signature or version field
    Format,
    /// Structurally inconsistent tables, sectors or cell encodings
    CorruptData,
    /// A read went past the declared end of the data
    TruncatedData,
    /// Archive lookup miss
    NotFound,
    /// Valid input using a feature this library does not decode
    UnsupportedFeature,
    /// Underlying I/O failure
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Format => "format error",
            Self::CorruptData => "corrupt data",
            Self::TruncatedData => "truncated data",
            Self::NotFound => "not found",
            Self::UnsupportedFeature => "unsupported feature",
            Self::Io => "I/O error",
        };
        f.write_str(name)
    }
}

/// Errors raised by byte streams and MPQ archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// No MPQ header found in the file
    #[error("invalid MPQ magic: no header found in the first {searched} bytes")]
    InvalidMagic {
        /// Number of bytes scanned for a header
        searched: u64,
    },

    /// Header declares a format version this library cannot read
    #[error("unsupported MPQ format version: {0}")]
    UnsupportedVersion(u16),

    /// Tables, sector offsets or decompressed sizes are inconsistent
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// Read past the end of a stream or archive
    #[error("truncated data: requested {requested} bytes at offset {offset}, {available} available")]
    TruncatedData {
        /// Offset of the failed read
        offset: u64,
        /// Bytes requested
        requested: u64,
        /// Bytes left at that offset
        available: u64,
    },

    /// Seek target beyond the end of the stream
    #[error("seek to {position} is past the end of the stream ({len} bytes)")]
    SeekOutOfBounds {
        /// Requested position
        position: u64,
        /// Stream length
        len: u64,
    },

    /// Name lookup or block index miss
    #[error("entry not found: {0}")]
    NotFound(String),

    /// Encrypted or patch entries
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Sector compression tag with no registered decompressor
    #[error("unsupported compression method: 0x{0:02X}")]
    UnsupportedCompression(u8),

    /// Bit cursor overrun inside a compressed sector
    #[error("bitstream error: {0}")]
    Bits(#[from] BitError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl ArchiveError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidMagic { .. } | Self::UnsupportedVersion(_) => ErrorKind::Format,
            Self::CorruptArchive(_) => ErrorKind::CorruptData,
            Self::TruncatedData { .. } | Self::SeekOutOfBounds { .. } | Self::Bits(_) => {
                ErrorKind::TruncatedData
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::UnsupportedFeature(_) | Self::UnsupportedCompression(_) => {
                ErrorKind::UnsupportedFeature
            }
            Self::Io(err) => io_kind(err),
            Self::BinRw(err) => binrw_kind(err),
        }
    }
}

/// Classify a `binrw` error.
///
/// End-of-input while parsing a fixed header counts as truncation, assertion
/// failures as corrupt data.
pub fn binrw_kind(err: &binrw::Error) -> ErrorKind {
    if let binrw::Error::Io(io) = err.root_cause() {
        return io_kind(io);
    }
    if err.is_eof() {
        return ErrorKind::TruncatedData;
    }
    err.custom_err::<ArchiveError>()
        .map_or(ErrorKind::CorruptData, ArchiveError::kind)
}

/// Classify an I/O error, looking through a wrapped [`ArchiveError`].
pub fn io_kind(err: &std::io::Error) -> ErrorKind {
    if let Some(inner) = err
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<ArchiveError>())
    {
        return inner.kind();
    }
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        ErrorKind::TruncatedData
    } else {
        ErrorKind::Io
    }
}

/// Result type for stream and archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// Convert a stream error surfaced through `std::io` back into an
/// [`ArchiveError`], keeping the original when one was wrapped.
pub(crate) fn from_io(err: std::io::Error) -> ArchiveError {
    if !err.get_ref().is_some_and(|inner| inner.is::<ArchiveError>()) {
        return ArchiveError::Io(err);
    }
    let kind = err.kind();
    match err.into_inner().map(|inner| inner.downcast::<ArchiveError>()) {
        Some(Ok(inner)) => *inner,
        Some(Err(other)) => ArchiveError::Io(std::io::Error::new(kind, other)),
        None => ArchiveError::Io(std::io::Error::from(kind)),
    }
}

/// Wrap an [`ArchiveError`] so it can travel through `std::io::Read`.
pub(crate) fn into_io(err: ArchiveError) -> std::io::Error {
    match err {
        ArchiveError::Io(io) => io,
        ArchiveError::TruncatedData { .. } => {
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, err)
        }
        other => std::io::Error::other(other),
    }
}
