//! DCC file, direction and frame headers, and frame cell geometry

use crate::aabb::Aabb;
use crate::error::{FormatError, FormatResult};
use binrw::BinRead;
use worldstone_archive::BitReader;

/// Signature byte of every DCC file
pub const DCC_SIGNATURE: u8 = 0x74;

/// Version written in every known DCC file
pub const DCC_VERSION: u8 = 6;

/// Size of [`DccHeader`] on disk
pub const DCC_HEADER_SIZE: usize = 15;

/// Bit widths selected by the 4-bit width codes of a direction header
pub const WIDTH_TABLE: [u32; 16] = [0, 1, 2, 4, 6, 8, 10, 12, 14, 16, 20, 24, 26, 28, 30, 32];

/// Frames never exceed this size on either axis
pub const MAX_FRAME_DIMENSION: u32 = 0x70_0000;

/// Side of a full cell in pixels
pub const CELL_SIZE: usize = 4;

/// File header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct DccHeader {
    /// Must be [`DCC_SIGNATURE`]
    pub signature: u8,
    /// Must be [`DCC_VERSION`]
    pub version: u8,
    /// Number of directions, at most 32 in game files
    pub directions: u8,
    /// Frames per direction; stored on four bytes, the upper three are zero in practice
    pub frames_per_dir: u32,
    /// Always 1
    pub tag: u32,
    /// Size of the equivalent DC6 file
    pub final_dc6_size: u32,
}

/// Per-direction header: stream flags and the bit widths of the frame header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DccDirectionHeader {
    /// Encoded size of the direction
    pub outsize_coded: u32,
    /// Cells may store their pixel codes raw
    pub has_raw_pixel_encoding: bool,
    /// An equal-cell stream lets cells reuse the previous frame
    pub compress_equal_cells: bool,
    /// Width code of [`DccFrameHeader::variable0`]
    pub variable0_bits: u8,
    /// Width code of [`DccFrameHeader::width`]
    pub width_bits: u8,
    /// Width code of [`DccFrameHeader::height`]
    pub height_bits: u8,
    /// Width code of [`DccFrameHeader::x_offset`]
    pub x_offset_bits: u8,
    /// Width code of [`DccFrameHeader::y_offset`]
    pub y_offset_bits: u8,
    /// Width code of [`DccFrameHeader::optional_bytes`]
    pub optional_bytes_bits: u8,
    /// Width code of [`DccFrameHeader::coded_bytes`]
    pub coded_bytes_bits: u8,
}

impl DccDirectionHeader {
    pub(crate) fn read(bits: &mut BitReader<'_>) -> FormatResult<Self> {
        let outsize_coded = bits.read_bits(32)?;
        let has_raw_pixel_encoding = bits.read_bit()?;
        let compress_equal_cells = bits.read_bit()?;
        let mut codes = [0u8; 7];
        for code in &mut codes {
            *code = bits.read_bits(4)? as u8;
        }
        let [
            variable0_bits,
            width_bits,
            height_bits,
            x_offset_bits,
            y_offset_bits,
            optional_bytes_bits,
            coded_bytes_bits,
        ] = codes;
        Ok(Self {
            outsize_coded,
            has_raw_pixel_encoding,
            compress_equal_cells,
            variable0_bits,
            width_bits,
            height_bits,
            x_offset_bits,
            y_offset_bits,
            optional_bytes_bits,
            coded_bytes_bits,
        })
    }
}

fn width_of(code: u8) -> u32 {
    WIDTH_TABLE[usize::from(code & 0x0F)]
}

/// Frame header, with the frame's extents in direction coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DccFrameHeader {
    /// Unused by the game
    pub variable0: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Horizontal offset of the left edge
    pub x_offset: i32,
    /// Vertical offset of the bottom edge for top-down frames, top edge otherwise
    pub y_offset: i32,
    /// Bytes of extra data stored after the frame headers
    pub optional_bytes: u32,
    /// Encoded size
    pub coded_bytes: u32,
    /// Scanlines stored bottom first
    pub bottom_up: bool,
    /// Pixels covered by the frame, bounds half-open
    pub extents: Aabb<i32>,
}

impl DccFrameHeader {
    pub(crate) fn read(bits: &mut BitReader<'_>, dir: &DccDirectionHeader) -> FormatResult<Self> {
        let variable0 = bits.read_bits(width_of(dir.variable0_bits))?;
        let width = bits.read_bits(width_of(dir.width_bits))?;
        let height = bits.read_bits(width_of(dir.height_bits))?;
        let x_offset = bits.read_signed(width_of(dir.x_offset_bits))?;
        let y_offset = bits.read_signed(width_of(dir.y_offset_bits))?;
        let optional_bytes = bits.read_bits(width_of(dir.optional_bytes_bits))?;
        let coded_bytes = bits.read_bits(width_of(dir.coded_bytes_bits))?;
        let bottom_up = bits.read_bit()?;

        if width >= MAX_FRAME_DIMENSION || height >= MAX_FRAME_DIMENSION {
            return Err(FormatError::CorruptData(format!(
                "frame size {width}x{height} exceeds the format limit"
            )));
        }
        // both dimensions are below 2^23, so they fit an i32
        let (w, h) = (width as i32, height as i32);
        let overflow = || FormatError::CorruptData(format!("frame offset ({x_offset}, {y_offset}) overflows"));
        let x_upper = x_offset.checked_add(w).ok_or_else(overflow)?;
        let (y_lower, y_upper) = if bottom_up {
            (y_offset, y_offset.checked_add(h).ok_or_else(overflow)?)
        } else {
            (
                y_offset
                    .checked_sub(h)
                    .and_then(|y| y.checked_add(1))
                    .ok_or_else(overflow)?,
                y_offset.checked_add(1).ok_or_else(overflow)?,
            )
        };

        Ok(Self {
            variable0,
            width,
            height,
            x_offset,
            y_offset,
            optional_bytes,
            coded_bytes,
            bottom_up,
            extents: Aabb::new(x_offset, y_lower, x_upper, y_upper),
        })
    }
}

/// How a frame's box is cut into cells.
///
/// Cell boundaries follow the 4-pixel grid of the direction, so the first
/// column and row absorb the frame's misalignment. A trailing strip of a
/// single pixel is merged into its neighbour, making cells 1 to 5 pixels
/// wide.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameCells {
    /// Left of the frame relative to the direction box
    pub offset_x: usize,
    /// Top of the frame relative to the direction box
    pub offset_y: usize,
    /// Width of each cell column
    pub widths: Vec<usize>,
    /// Height of each cell row
    pub heights: Vec<usize>,
}

impl FrameCells {
    /// Cell grid of a `width` x `height` frame at `(offset_x, offset_y)` in its direction
    pub fn new(offset_x: usize, offset_y: usize, width: usize, height: usize) -> Self {
        Self {
            offset_x,
            offset_y,
            widths: cell_sizes(offset_x, width),
            heights: cell_sizes(offset_y, height),
        }
    }

    /// Cell columns
    pub fn columns(&self) -> usize {
        self.widths.len()
    }

    /// Cell rows
    pub fn rows(&self) -> usize {
        self.heights.len()
    }

    /// Number of cells
    pub fn cell_count(&self) -> usize {
        self.columns() * self.rows()
    }

    /// Cell rectangles `(x, y, width, height)` relative to the frame, row-major
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        let ys = self.heights.iter().scan(0, |y, &h| {
            let top = *y;
            *y += h;
            Some((top, h))
        });
        ys.flat_map(move |(y, h)| {
            self.widths.iter().scan(0, move |x, &w| {
                let left = *x;
                *x += w;
                Some((left, y, w, h))
            })
        })
    }
}

/// Split `size` pixels starting `offset` pixels into the direction
fn cell_sizes(offset: usize, size: usize) -> Vec<usize> {
    if size == 0 {
        return Vec::new();
    }
    let first = CELL_SIZE - offset % CELL_SIZE;
    if size <= first + 1 {
        return vec![size];
    }
    let rest = size - first - 1;
    let count = 2 + rest / CELL_SIZE - usize::from(rest % CELL_SIZE == 0);
    let middle = count - 2;
    let mut sizes = Vec::with_capacity(count);
    sizes.push(first);
    sizes.extend(std::iter::repeat_n(CELL_SIZE, middle));
    sizes.push(size - first - CELL_SIZE * middle);
    sizes
}
