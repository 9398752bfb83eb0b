//! MPQ archives
//!
//! Blizzard's "Mo'PaQ" container as used by Diablo II: a header, an
//! encrypted hash table for name lookup, an encrypted block table locating
//! each entry, and per-entry data stored whole or in compressed sectors.
//!
//! ```no_run
//! use worldstone_archive::mpq::Archive;
//! use worldstone_archive::ByteStream;
//!
//! # fn main() -> Result<(), worldstone_archive::ArchiveError> {
//! let archive = Archive::open("d2data.mpq")?;
//! let mut palette = archive.open_file("data\\global\\palette\\act1\\pal.dat")?;
//! let bytes = palette.read_vec(768)?;
//! assert_eq!(bytes.len(), 768);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod crypto;
pub mod file;
pub mod header;
pub mod tables;

pub use archive::{Archive, LISTFILE_NAME, parse_listfile};
pub use crypto::{HashType, hash_string};
pub use file::MpqFileStream;
pub use header::MpqHeader;
pub use tables::{BlockEntry, BlockFlags, HashEntry};
