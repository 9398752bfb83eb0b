//! Byte streams, bit cursor and MPQ archive access for Diablo II assets.
//!
//! This crate is the I/O layer of WorldStone:
//!
//! - **Streams**: [`ByteStream`], a bounds-checked `Read + Seek` capability
//!   with file, memory and archive-entry backends
//! - **Bits**: [`BitReader`], an LSB-first cursor for sub-byte fields
//! - **MPQ**: [`Archive`] for header and table parsing, name lookup and
//!   sector decompression through an explicit [`CompressionRegistry`]
//!
//! # Example
//!
//! ```no_run
//! use worldstone_archive::{Archive, ArchiveOptions, ByteStream};
//!
//! # fn main() -> Result<(), worldstone_archive::ArchiveError> {
//! let archive = Archive::open_with("d2char.mpq", ArchiveOptions::new().with_locale(0x409))?;
//! for name in archive.list_files()? {
//!     match archive.open_file(&name) {
//!         Ok(stream) => println!("{name}: {} bytes", stream.len()),
//!         Err(e) => println!("{name}: {} ({e})", e.kind()),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]

pub mod bits;
pub mod compression;
pub mod config;
pub mod error;
pub mod mpq;
pub mod stream;

pub use bits::{BitError, BitReader, BitResult};
pub use compression::CompressionRegistry;
pub use config::ArchiveOptions;
pub use error::{ArchiveError, ArchiveResult, ErrorKind};
pub use mpq::{Archive, MpqFileStream};
pub use stream::{ByteStream, FileStream, MemoryStream};
