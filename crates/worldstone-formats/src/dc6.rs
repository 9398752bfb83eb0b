//! DC6 sprites
//!
//! A DC6 file holds `directions * frames_per_dir` independent frames. Each
//! frame is run-length encoded, one scanline after another starting from
//! the bottom row:
//!
//! | Byte        | Meaning                                  |
//! |-------------|------------------------------------------|
//! | `0x80`      | end of scanline                          |
//! | `0x80 \| n` | skip `n` transparent pixels              |
//! | `n < 0x80`  | copy the next `n` bytes as palette indices |

use crate::error::{FormatError, FormatResult, slice_at};
use crate::image::{ImageAllocator, ImageBuffer, ImageProvider, ImageViewMut};
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, trace, warn};
use worldstone_archive::ByteStream;

/// Version written in every known DC6 file
pub const DC6_VERSION: i32 = 6;

/// Size of [`Dc6Header`] on disk
pub const DC6_HEADER_SIZE: usize = 24;

/// Size of [`Dc6FrameHeader`] on disk
pub const DC6_FRAME_HEADER_SIZE: usize = 32;

/// Largest frame, in pixels, the decoder will allocate
pub const MAX_FRAME_PIXELS: usize = 1 << 24;

const END_OF_LINE: u8 = 0x80;
const SKIP_FLAG: u8 = 0x80;

/// File header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Dc6Header {
    /// Major version, 6
    pub version: i32,
    /// Minor version, usually 1
    pub sub_version: i32,
    /// Usually 0
    pub zeros: i32,
    /// Termination bytes, `0xEE` or `0xCD`
    pub pad_bytes: [u8; 4],
    /// Number of directions
    pub directions: u32,
    /// Frames in each direction
    pub frames_per_dir: u32,
}

/// Frame header, found at each frame pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Dc6FrameHeader {
    /// Non-zero when scanlines are stored top to bottom
    pub flip: i32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
    /// Horizontal offset of the left edge
    pub offset_x: i32,
    /// Vertical offset of the bottom edge (top edge when flipped)
    pub offset_y: i32,
    /// Usually 0
    pub zeros: i32,
    /// Pointer to the next frame
    pub next_block: i32,
    /// Encoded size in bytes
    pub length: i32,
}

impl Dc6FrameHeader {
    /// Width and height, validated
    pub fn dimensions(&self) -> FormatResult<(usize, usize)> {
        let width = usize::try_from(self.width).ok();
        let height = usize::try_from(self.height).ok();
        match (width, height) {
            (Some(w), Some(h)) if w.saturating_mul(h) <= MAX_FRAME_PIXELS => Ok((w, h)),
            _ => Err(FormatError::CorruptData(format!(
                "invalid frame size {}x{}",
                self.width, self.height
            ))),
        }
    }
}

/// Decoder over an in-memory DC6 file
#[derive(Debug, Clone)]
pub struct Dc6Decoder {
    data: Vec<u8>,
    header: Dc6Header,
    frame_pointers: Vec<u32>,
    frame_headers: Vec<Dc6FrameHeader>,
}

impl Dc6Decoder {
    /// Parse the file header and every frame header
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> FormatResult<Self> {
        let data = data.into();
        let header: Dc6Header = Cursor::new(slice_at(&data, 0, DC6_HEADER_SIZE)?).read_le()?;
        if header.version != DC6_VERSION {
            return Err(FormatError::UnsupportedVersion {
                format: "DC6",
                version: header.version as u32,
            });
        }

        let frame_count = (header.directions as usize)
            .checked_mul(header.frames_per_dir as usize)
            .ok_or_else(|| FormatError::CorruptData("frame count overflows".to_string()))?;
        let pointer_bytes = slice_at(&data, DC6_HEADER_SIZE, frame_count.saturating_mul(4))?;
        let frame_pointers: Vec<u32> = pointer_bytes
            .chunks_exact(4)
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect();

        let frame_headers = frame_pointers
            .iter()
            .map(|&pointer| {
                let raw = slice_at(&data, pointer as usize, DC6_FRAME_HEADER_SIZE)?;
                Ok(Cursor::new(raw).read_le::<Dc6FrameHeader>()?)
            })
            .collect::<FormatResult<Vec<_>>>()?;

        debug!(
            "DC6: {} directions x {} frames",
            header.directions, header.frames_per_dir
        );

        Ok(Self {
            data,
            header,
            frame_pointers,
            frame_headers,
        })
    }

    /// Read a whole DC6 stream, for example an archive entry
    pub fn from_stream<S: ByteStream>(stream: &mut S) -> FormatResult<Self> {
        stream.seek_to(0)?;
        Self::from_bytes(stream.read_to_vec()?)
    }

    /// Read a DC6 file from disk
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    /// File header
    pub fn header(&self) -> &Dc6Header {
        &self.header
    }

    /// Frame headers, direction-major
    pub fn frame_headers(&self) -> &[Dc6FrameHeader] {
        &self.frame_headers
    }

    /// Total number of frames
    pub fn frame_count(&self) -> usize {
        self.frame_headers.len()
    }

    /// Flat frame index of `frame` in `direction`
    pub fn frame_index(&self, direction: usize, frame: usize) -> FormatResult<usize> {
        let directions = self.header.directions as usize;
        let per_dir = self.header.frames_per_dir as usize;
        if direction >= directions {
            return Err(FormatError::OutOfRange {
                what: "direction",
                index: direction,
                count: directions,
            });
        }
        if frame >= per_dir {
            return Err(FormatError::OutOfRange {
                what: "frame",
                index: frame,
                count: per_dir,
            });
        }
        Ok(direction * per_dir + frame)
    }

    fn frame_header(&self, index: usize) -> FormatResult<&Dc6FrameHeader> {
        self.frame_headers.get(index).ok_or(FormatError::OutOfRange {
            what: "frame",
            index,
            count: self.frame_headers.len(),
        })
    }

    /// Decode frame `index` into a new image, rows top to bottom
    pub fn decode_frame(&self, index: usize) -> FormatResult<ImageBuffer> {
        let (width, height) = self.frame_header(index)?.dimensions()?;
        let mut image = ImageBuffer::new(width, height);
        self.decode_frame_into(index, &mut image.view_mut())?;
        Ok(image)
    }

    /// Decode frame `index` into `target`, which must be at least the frame's size.
    ///
    /// Transparent pixels are left untouched.
    pub fn decode_frame_into(&self, index: usize, target: &mut ImageViewMut<'_>) -> FormatResult<()> {
        let header = self.frame_header(index)?;
        let (width, height) = header.dimensions()?;
        if target.width() < width || target.height() < height {
            return Err(FormatError::CorruptData(format!(
                "frame {index} is {width}x{height}, target is {}x{}",
                target.width(),
                target.height()
            )));
        }

        let mut cursor = self.frame_pointers[index] as usize + DC6_FRAME_HEADER_SIZE;
        let leading_zeros = self.data[cursor.min(self.data.len())..]
            .iter()
            .take_while(|&&byte| byte == 0)
            .count();
        if leading_zeros != 0 && leading_zeros != 3 {
            warn!("DC6 frame {index}: {leading_zeros} leading zero bytes");
        }
        cursor += leading_zeros;

        let length = usize::try_from(header.length)
            .map_err(|_| FormatError::CorruptData(format!("frame {index} length {}", header.length)))?;
        let encoded = slice_at(&self.data, cursor, length)?;
        trace!("DC6 frame {index}: {width}x{height}, {length} encoded bytes");

        let mut x = 0usize;
        let mut line = 0usize;
        let mut pos = 0usize;
        while pos < encoded.len() {
            let code = encoded[pos];
            pos += 1;
            if code == END_OF_LINE {
                x = 0;
                line += 1;
            } else if code & SKIP_FLAG != 0 {
                x += usize::from(code & !SKIP_FLAG);
                if x > width {
                    return Err(FormatError::CorruptData(format!(
                        "frame {index}: skip to {x} on line {line} overflows width {width}"
                    )));
                }
            } else {
                let run = usize::from(code);
                let pixels = slice_at(encoded, pos, run)?;
                pos += run;
                if x + run > width || line >= height {
                    return Err(FormatError::CorruptData(format!(
                        "frame {index}: run of {run} at ({x}, line {line}) overflows {width}x{height}"
                    )));
                }
                let y = if header.flip != 0 { line } else { height - 1 - line };
                if let Some(row) = target.row_mut(y) {
                    row[x..x + run].copy_from_slice(pixels);
                }
                x += run;
            }
        }
        Ok(())
    }

    /// Decode every frame into images handed out by `allocator`, in file order.
    ///
    /// Empty frames get no image. Returns the number of frames decoded.
    pub fn decode_all<A: ImageAllocator>(&self, allocator: &mut A) -> FormatResult<usize> {
        let mut decoded = 0;
        for index in 0..self.frame_count() {
            let (width, height) = self.frame_headers[index].dimensions()?;
            if let Some(mut image) = allocator.new_image(width, height) {
                self.decode_frame_into(index, &mut image)?;
                decoded += 1;
            }
        }
        Ok(decoded)
    }
}
