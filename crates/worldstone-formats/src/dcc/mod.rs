//! DCC sprites
//!
//! DCC files store animated unit graphics. Each direction is compressed as
//! a whole: frames are cut into cells aligned on a 4-pixel grid, and a cell
//! can repeat what the previous frame left in the same place. A direction
//! therefore decodes in one pass, and [`DccDecoder`] keeps the decoded
//! directions around so that frames can be requested in any order.
//!
//! ```no_run
//! use worldstone_formats::{DccDecoder, ImageProvider};
//!
//! # fn main() -> worldstone_formats::FormatResult<()> {
//! let mut decoder = DccDecoder::open("data/global/monsters/ZM/TR/ZMTRLITA1HTH.dcc")?;
//! let frame = decoder.frame(0, 0)?;
//! println!("{}x{}", frame.width(), frame.height());
//! # Ok(())
//! # }
//! ```

mod decoder;
mod header;

pub use decoder::{DccDirection, DccFrame, MAX_DIRECTION_PIXELS};
pub use header::{
    CELL_SIZE, DCC_HEADER_SIZE, DCC_SIGNATURE, DCC_VERSION, DccDirectionHeader, DccFrameHeader,
    DccHeader, FrameCells, MAX_FRAME_DIMENSION, WIDTH_TABLE,
};

use crate::error::{FormatError, FormatResult, slice_at};
use binrw::BinReaderExt;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use worldstone_archive::ByteStream;

/// Frames per direction never exceed this
pub const MAX_FRAMES_PER_DIRECTION: u32 = 256;

/// Decoder over an in-memory DCC file.
///
/// Directions are decoded on first use and cached; [`decode_direction`]
/// bypasses the cache.
///
/// [`decode_direction`]: Self::decode_direction
#[derive(Debug, Clone)]
pub struct DccDecoder {
    data: Vec<u8>,
    header: DccHeader,
    /// Start of each direction, plus the file size
    direction_offsets: Vec<usize>,
    directions: Vec<Option<DccDirection>>,
}

impl DccDecoder {
    /// Parse the file header and the direction table
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> FormatResult<Self> {
        let data = data.into();
        let header: DccHeader = Cursor::new(slice_at(&data, 0, DCC_HEADER_SIZE)?).read_le()?;
        if header.signature != DCC_SIGNATURE {
            return Err(FormatError::InvalidSignature {
                format: "DCC",
                expected: u32::from(DCC_SIGNATURE),
                found: u32::from(header.signature),
            });
        }
        if header.version != DCC_VERSION {
            return Err(FormatError::UnsupportedVersion {
                format: "DCC",
                version: u32::from(header.version),
            });
        }
        if header.frames_per_dir > MAX_FRAMES_PER_DIRECTION {
            return Err(FormatError::CorruptData(format!(
                "{} frames per direction",
                header.frames_per_dir
            )));
        }

        let count = usize::from(header.directions);
        let table = slice_at(&data, DCC_HEADER_SIZE, count * 4)?;
        let mut direction_offsets: Vec<usize> = table
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]) as usize)
            .collect();
        direction_offsets.push(data.len());

        let table_end = DCC_HEADER_SIZE + count * 4;
        for (index, pair) in direction_offsets.windows(2).enumerate() {
            if pair[0] < table_end || pair[0] > pair[1] {
                return Err(FormatError::CorruptData(format!(
                    "direction {index} spans {}..{} in a {} byte file",
                    pair[0],
                    pair[1],
                    data.len()
                )));
            }
        }

        debug!(
            "DCC: {} directions x {} frames",
            header.directions, header.frames_per_dir
        );

        Ok(Self {
            data,
            header,
            direction_offsets,
            directions: vec![None; count],
        })
    }

    /// Read a whole DCC stream, for example an archive entry
    pub fn from_stream<S: ByteStream>(stream: &mut S) -> FormatResult<Self> {
        stream.seek_to(0)?;
        Self::from_bytes(stream.read_to_vec()?)
    }

    /// Read a DCC file from disk
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// File header
    pub fn header(&self) -> &DccHeader {
        &self.header
    }

    /// Number of directions
    pub fn direction_count(&self) -> usize {
        usize::from(self.header.directions)
    }

    /// Frames in each direction
    pub fn frames_per_direction(&self) -> usize {
        self.header.frames_per_dir as usize
    }

    /// Encoded bytes of `direction`
    pub fn direction_data(&self, direction: usize) -> FormatResult<&[u8]> {
        let count = self.direction_count();
        if direction >= count {
            return Err(FormatError::OutOfRange {
                what: "direction",
                index: direction,
                count,
            });
        }
        let start = self.direction_offsets[direction];
        let end = self.direction_offsets[direction + 1];
        Ok(&self.data[start..end])
    }

    /// Decode `direction` without touching the cache
    pub fn decode_direction(&self, direction: usize) -> FormatResult<DccDirection> {
        let data = self.direction_data(direction)?;
        debug!("decoding DCC direction {direction} ({} bytes)", data.len());
        decoder::decode_direction(data, self.frames_per_direction())
    }

    /// Decoded `direction`, decoding it on first use
    pub fn direction(&mut self, direction: usize) -> FormatResult<&DccDirection> {
        if !self.is_cached(direction) {
            let decoded = self.decode_direction(direction)?;
            self.directions[direction] = Some(decoded);
        }
        self.directions[direction]
            .as_ref()
            .ok_or_else(|| FormatError::CorruptData(format!("direction {direction} not cached")))
    }

    /// Frame `frame` of `direction`
    pub fn frame(&mut self, direction: usize, frame: usize) -> FormatResult<&DccFrame> {
        self.direction(direction)?.frame(frame)
    }

    /// Cell grid frame `frame` of `direction` was decoded with
    pub fn frame_cell_grid(&mut self, direction: usize, frame: usize) -> FormatResult<&FrameCells> {
        self.direction(direction)?.frame_cell_grid(frame)
    }

    /// True once `direction` has been decoded and cached
    pub fn is_cached(&self, direction: usize) -> bool {
        self.directions.get(direction).is_some_and(Option::is_some)
    }

    /// Drop every cached direction
    pub fn clear_cache(&mut self) {
        self.directions.iter_mut().for_each(|slot| *slot = None);
    }
}
