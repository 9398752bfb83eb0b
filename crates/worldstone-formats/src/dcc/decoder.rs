//! Reconstruction of one DCC direction
//!
//! A direction is rebuilt into a single pixel buffer covering the union of
//! its frames. The buffer is tracked as a grid of 4x4 cells. Stage one walks
//! every frame and decides, per cell, whether it repeats the previous frame
//! or carries up to four new palette values. Stage two then paints the cells
//! frame by frame, cropping each frame's box out of the buffer once its
//! cells are done.

use super::header::{CELL_SIZE, DccDirectionHeader, DccFrameHeader, FrameCells};
use crate::aabb::Aabb;
use crate::error::{FormatError, FormatResult};
use crate::image::{ImageBuffer, ImageProvider, ImageViewMut};
use tracing::{debug, trace};
use worldstone_archive::BitReader;

/// Largest direction buffer, in pixels, the decoder will allocate
pub const MAX_DIRECTION_PIXELS: usize = 1 << 24;

const STREAM_SIZE_BITS: u32 = 20;

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccFrame {
    header: DccFrameHeader,
    cells: FrameCells,
    image: ImageBuffer,
}

impl DccFrame {
    /// Frame header
    pub fn header(&self) -> &DccFrameHeader {
        &self.header
    }

    /// Cell grid the frame was decoded with
    pub fn cells(&self) -> &FrameCells {
        &self.cells
    }

    /// Pixels, rows top to bottom
    pub fn image(&self) -> &ImageBuffer {
        &self.image
    }

    /// Take the pixels
    pub fn into_image(self) -> ImageBuffer {
        self.image
    }
}

impl ImageProvider for DccFrame {
    fn dimensions(&self) -> (usize, usize) {
        self.image.dimensions()
    }

    fn pixel_at(&self, x: usize, y: usize) -> Option<u8> {
        self.image.pixel_at(x, y)
    }
}

/// Every frame of a direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DccDirection {
    header: DccDirectionHeader,
    extents: Aabb<i32>,
    frames: Vec<DccFrame>,
}

impl DccDirection {
    /// Direction header
    pub fn header(&self) -> &DccDirectionHeader {
        &self.header
    }

    /// Union of the frame boxes
    pub fn extents(&self) -> Aabb<i32> {
        self.extents
    }

    /// Decoded frames, in file order
    pub fn frames(&self) -> &[DccFrame] {
        &self.frames
    }

    /// Frame `index`
    pub fn frame(&self, index: usize) -> FormatResult<&DccFrame> {
        self.frames.get(index).ok_or(FormatError::OutOfRange {
            what: "frame",
            index,
            count: self.frames.len(),
        })
    }

    /// Cell grid of frame `index`
    pub fn frame_cell_grid(&self, index: usize) -> FormatResult<&FrameCells> {
        self.frame(index).map(DccFrame::cells)
    }
}

/// The independent bitstreams of a direction
struct Streams<'a> {
    equal_cells: BitReader<'a>,
    pixel_mask: BitReader<'a>,
    raw_usage: BitReader<'a>,
    raw_codes: BitReader<'a>,
    /// Pixel code displacements, then the stage two pixel indices
    displacement: BitReader<'a>,
}

impl Streams<'_> {
    /// Read the codes of the `mask.count_ones()` values a cell changes.
    ///
    /// Decoding stops early when a code repeats the previous one; the
    /// remaining values then fall back to code 0.
    fn read_pixel_codes(&mut self, mask: u8) -> FormatResult<([u8; 4], usize)> {
        let wanted = mask.count_ones() as usize;
        let raw = self.raw_usage.bit_len() > 0 && self.raw_usage.read_bit()?;
        let mut codes = [0u8; 4];
        let mut count = 0;
        let mut last = 0u8;
        for slot in codes.iter_mut().take(wanted) {
            let code = if raw {
                self.raw_codes.read_u8()?
            } else {
                let mut code = last;
                loop {
                    let step = self.displacement.read_bits(4)? as u8;
                    code = code.wrapping_add(step);
                    if step != 0x0F {
                        break;
                    }
                }
                code
            };
            if code == last {
                break;
            }
            *slot = code;
            last = code;
            count += 1;
        }
        Ok((codes, count))
    }

    fn log_leftovers(&self) {
        for (name, stream) in [
            ("equal cells", &self.equal_cells),
            ("pixel mask", &self.pixel_mask),
            ("raw usage", &self.raw_usage),
            ("raw codes", &self.raw_codes),
        ] {
            if !stream.is_empty() {
                debug!("DCC {name} stream has {} unread bits", stream.remaining());
            }
        }
        // the displacement stream runs to the end of the direction, padding included
        if self.displacement.remaining() >= 8 {
            debug!(
                "DCC displacement stream has {} unread bits",
                self.displacement.remaining()
            );
        }
    }
}

/// Stage one result for a frame
struct FrameCellState {
    /// Index of the frame's first cell entry
    first_entry: usize,
    /// Per cell, row-major: repeats the previous frame
    equal: Vec<bool>,
}

/// Decode a direction from its bytes
pub(crate) fn decode_direction(data: &[u8], frame_count: usize) -> FormatResult<DccDirection> {
    let mut bits = BitReader::new(data);
    let header = DccDirectionHeader::read(&mut bits)?;

    let frame_headers = (0..frame_count)
        .map(|_| DccFrameHeader::read(&mut bits, &header))
        .collect::<FormatResult<Vec<_>>>()?;
    for frame in &frame_headers {
        if frame.optional_bytes != 0 {
            bits.align_to_byte()?;
            bits.skip((frame.optional_bytes as usize).saturating_mul(8))?;
        }
    }

    let extents: Aabb<i32> = frame_headers.iter().map(|frame| frame.extents).collect();
    let (width, height) = buffer_size(&extents)?;
    trace!(?extents, width, height, "DCC direction box");

    let equal_size = if header.compress_equal_cells {
        bits.read_bits(STREAM_SIZE_BITS)?
    } else {
        0
    };
    let mask_size = bits.read_bits(STREAM_SIZE_BITS)?;
    let (raw_usage_size, raw_codes_size) = if header.has_raw_pixel_encoding {
        (
            bits.read_bits(STREAM_SIZE_BITS)?,
            bits.read_bits(STREAM_SIZE_BITS)?,
        )
    } else {
        (0, 0)
    };

    let mut code_to_value = Vec::new();
    for value in 0..=u8::MAX {
        if bits.read_bit()? {
            code_to_value.push(value);
        }
    }

    let mut streams = Streams {
        equal_cells: bits.split_off(equal_size as usize)?,
        pixel_mask: bits.split_off(mask_size as usize)?,
        raw_usage: bits.split_off(raw_usage_size as usize)?,
        raw_codes: bits.split_off(raw_codes_size as usize)?,
        displacement: bits.split_off(bits.remaining())?,
    };

    let grids: Vec<FrameCells> = frame_headers
        .iter()
        .map(|frame| {
            FrameCells::new(
                offset_in(frame.extents.x_lower, extents.x_lower),
                offset_in(frame.extents.y_lower, extents.y_lower),
                frame.width as usize,
                frame.height as usize,
            )
        })
        .collect();

    let buffer_columns = width.div_ceil(CELL_SIZE);
    let buffer_rows = height.div_ceil(CELL_SIZE);
    let (entries, states) = fill_cell_entries(
        &mut streams,
        &header,
        &grids,
        &code_to_value,
        buffer_columns * buffer_rows,
        buffer_columns,
    )?;

    let mut pixels = vec![0u8; width * height];
    let mut buffer = ImageViewMut::new(&mut pixels, width, height, width)?;
    let mut cell_sizes: Vec<Option<(usize, usize)>> = vec![None; buffer_columns * buffer_rows];
    let mut frames = Vec::with_capacity(frame_count);
    for ((frame_header, grid), state) in frame_headers.into_iter().zip(grids).zip(&states) {
        paint_frame(
            &mut streams.displacement,
            &mut buffer,
            &mut cell_sizes,
            buffer_columns,
            &grid,
            state,
            &entries,
        )?;
        let mut image = ImageBuffer::new(frame_header.width as usize, frame_header.height as usize);
        if !image.is_empty() {
            buffer
                .as_view()
                .sub_view(grid.offset_x, grid.offset_y, image.width(), image.height())
                .ok_or_else(|| FormatError::CorruptData("frame outside its direction".to_string()))?
                .copy_to(&mut image.view_mut())?;
        }
        frames.push(DccFrame {
            header: frame_header,
            cells: grid,
            image,
        });
    }

    streams.log_leftovers();
    Ok(DccDirection {
        header,
        extents,
        frames,
    })
}

/// Stage one: decide every cell of every frame, producing the cell entries
fn fill_cell_entries(
    streams: &mut Streams<'_>,
    header: &DccDirectionHeader,
    grids: &[FrameCells],
    code_to_value: &[u8],
    buffer_cells: usize,
    buffer_columns: usize,
) -> FormatResult<(Vec<[u8; 4]>, Vec<FrameCellState>)> {
    let mut entries: Vec<[u8; 4]> = Vec::new();
    // latest entry of each buffer cell
    let mut latest: Vec<Option<usize>> = vec![None; buffer_cells];
    let mut states = Vec::with_capacity(grids.len());

    for grid in grids {
        let first_entry = entries.len();
        let mut equal_cells = Vec::with_capacity(grid.cell_count());
        let cell_x = grid.offset_x / CELL_SIZE;
        let cell_y = grid.offset_y / CELL_SIZE;
        for y in 0..grid.rows() {
            for x in 0..grid.columns() {
                let index = (cell_x + x) + (cell_y + y) * buffer_columns;
                let slot = latest.get_mut(index).ok_or_else(|| {
                    FormatError::CorruptData(format!("cell {index} outside the direction buffer"))
                })?;
                let previous = *slot;

                let mut equal = false;
                let mut mask = 0x0F;
                // a cell seen for the first time always carries four values
                if previous.is_some() {
                    if header.compress_equal_cells {
                        equal = streams.equal_cells.read_bit()?;
                    }
                    if !equal {
                        mask = streams.pixel_mask.read_bits(4)? as u8;
                        if mask == 0 {
                            return Err(FormatError::CorruptData(format!(
                                "cell {index} changes but its pixel mask selects no value"
                            )));
                        }
                    }
                }
                equal_cells.push(equal);
                if equal {
                    continue;
                }

                let (codes, mut remaining) = streams.read_pixel_codes(mask)?;
                let mut values = previous.map_or([0; 4], |entry| entries[entry]);
                for (bit, value) in values.iter_mut().enumerate() {
                    if mask & (1 << bit) == 0 {
                        continue;
                    }
                    let code = if remaining > 0 {
                        remaining -= 1;
                        codes[remaining]
                    } else {
                        0
                    };
                    *value = *code_to_value.get(usize::from(code)).ok_or_else(|| {
                        FormatError::CorruptData(format!(
                            "pixel code {code} outside a table of {} values",
                            code_to_value.len()
                        ))
                    })?;
                }
                *slot = Some(entries.len());
                entries.push(values);
            }
        }
        states.push(FrameCellState {
            first_entry,
            equal: equal_cells,
        });
    }
    Ok((entries, states))
}

/// Stage two: paint one frame's cells into the direction buffer
fn paint_frame(
    indices: &mut BitReader<'_>,
    buffer: &mut ImageViewMut<'_>,
    cell_sizes: &mut [Option<(usize, usize)>],
    buffer_columns: usize,
    grid: &FrameCells,
    state: &FrameCellState,
    entries: &[[u8; 4]],
) -> FormatResult<()> {
    let mut entry = state.first_entry;
    let mut equal_cells = state.equal.iter().copied();
    let mut y = grid.offset_y;
    for &cell_height in &grid.heights {
        let mut x = grid.offset_x;
        for &cell_width in &grid.widths {
            let index = x / CELL_SIZE + (y / CELL_SIZE) * buffer_columns;
            let size = Some((cell_width, cell_height));
            if equal_cells.next().unwrap_or(false) {
                // a repeated cell whose shape changed has nothing to repeat
                if cell_sizes[index] != size {
                    buffer.fill(x, y, cell_width, cell_height, 0);
                }
            } else {
                let values = *entries.get(entry).ok_or_else(|| {
                    FormatError::CorruptData("cell entries exhausted".to_string())
                })?;
                entry += 1;
                if values[0] == values[1] {
                    buffer.fill(x, y, cell_width, cell_height, values[0]);
                } else {
                    let width = if values[1] == values[2] { 1 } else { 2 };
                    for row in y..y + cell_height {
                        let line = buffer.row_mut(row).ok_or_else(|| {
                            FormatError::CorruptData(format!("cell row {row} outside the direction"))
                        })?;
                        let pixels = line.get_mut(x..x + cell_width).ok_or_else(|| {
                            FormatError::CorruptData(format!("cell at x {x} outside the direction"))
                        })?;
                        for pixel in pixels {
                            *pixel = values[indices.read_bits(width)? as usize];
                        }
                    }
                }
            }
            cell_sizes[index] = size;
            x += cell_width;
        }
        y += cell_height;
    }
    Ok(())
}

/// Distance from `base` to `value`, `value` being inside the direction box
fn offset_in(value: i32, base: i32) -> usize {
    (i64::from(value) - i64::from(base)) as usize
}

fn buffer_size(extents: &Aabb<i32>) -> FormatResult<(usize, usize)> {
    if extents.is_empty() {
        return Ok((0, 0));
    }
    let width = (i64::from(extents.x_upper) - i64::from(extents.x_lower)) as usize;
    let height = (i64::from(extents.y_upper) - i64::from(extents.y_lower)) as usize;
    if width.saturating_mul(height) > MAX_DIRECTION_PIXELS {
        return Err(FormatError::CorruptData(format!(
            "direction box {width}x{height} is too large"
        )));
    }
    Ok((width, height))
}
