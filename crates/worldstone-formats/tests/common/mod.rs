#![allow(dead_code)]
//! In-test writers for synthetic sprite files
//!
//! The DCC builder lays out a direction exactly as the decoder expects it:
//! header bits, frame headers, optional bytes, stream sizes, the code table,
//! then the five substreams. Tests fill the substreams by hand.

/// LSB-first bit writer, the mirror of `BitReader`
#[derive(Debug, Clone, Default)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the low `bits` bits of `value`
    pub fn push(&mut self, value: u32, bits: u32) -> &mut Self {
        for i in 0..bits {
            self.push_bit((value >> i) & 1 == 1);
        }
        self
    }

    pub fn push_bit(&mut self, bit: bool) -> &mut Self {
        if self.bit_len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            let last = self.bytes.len() - 1;
            self.bytes[last] |= 1 << (self.bit_len % 8);
        }
        self.bit_len += 1;
        self
    }

    /// Append a whole byte, 8 bits
    pub fn push_byte(&mut self, byte: u8) -> &mut Self {
        self.push(u32::from(byte), 8)
    }

    /// Pad with zero bits up to the next byte boundary
    pub fn align(&mut self) -> &mut Self {
        while self.bit_len % 8 != 0 {
            self.push_bit(false);
        }
        self
    }

    /// Append every bit of `other`
    pub fn append(&mut self, other: &Self) -> &mut Self {
        for i in 0..other.bit_len {
            self.push_bit(other.bytes[i / 8] >> (i % 8) & 1 == 1);
        }
        self
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One frame of a synthetic direction; every header field is written on 8 bits
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSpec {
    pub width: u8,
    pub height: u8,
    pub x_offset: i8,
    pub y_offset: i8,
    pub optional_bytes: u8,
    pub bottom_up: bool,
}

impl FrameSpec {
    /// Top-down frame whose top-left pixel is at `(x, y)`
    pub fn at(x: i8, y: i8, width: u8, height: u8) -> Self {
        Self {
            width,
            height,
            x_offset: x,
            y_offset: y + height as i8 - 1,
            ..Self::default()
        }
    }
}

/// Builder for one DCC direction
#[derive(Debug, Clone, Default)]
pub struct DirectionBuilder {
    pub compress_equal_cells: bool,
    pub raw_pixel_encoding: bool,
    pub frames: Vec<FrameSpec>,
    /// Palette values present in the direction, ascending
    pub values: Vec<u8>,
    pub equal_cells: BitWriter,
    pub pixel_mask: BitWriter,
    pub raw_usage: BitWriter,
    pub raw_codes: BitWriter,
    pub displacement: BitWriter,
}

impl DirectionBuilder {
    pub fn new(frames: Vec<FrameSpec>, values: &[u8]) -> Self {
        Self {
            frames,
            values: values.to_vec(),
            ..Self::default()
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bits = BitWriter::new();
        bits.push(0, 32);
        bits.push_bit(self.raw_pixel_encoding);
        bits.push_bit(self.compress_equal_cells);
        // variable0 on 0 bits, every other field on 8 bits except coded bytes
        for code in [0, 5, 5, 5, 5, 5, 0] {
            bits.push(code, 4);
        }
        for frame in &self.frames {
            bits.push(u32::from(frame.width), 8);
            bits.push(u32::from(frame.height), 8);
            bits.push(u32::from(frame.x_offset as u8), 8);
            bits.push(u32::from(frame.y_offset as u8), 8);
            bits.push(u32::from(frame.optional_bytes), 8);
            bits.push_bit(frame.bottom_up);
        }
        for frame in &self.frames {
            if frame.optional_bytes != 0 {
                bits.align();
                for _ in 0..frame.optional_bytes {
                    bits.push_byte(0xAB);
                }
            }
        }

        if self.compress_equal_cells {
            bits.push(self.equal_cells.bit_len() as u32, 20);
        }
        bits.push(self.pixel_mask.bit_len() as u32, 20);
        if self.raw_pixel_encoding {
            bits.push(self.raw_usage.bit_len() as u32, 20);
            bits.push(self.raw_codes.bit_len() as u32, 20);
        }
        for value in 0..=255u8 {
            bits.push_bit(self.values.contains(&value));
        }

        bits.append(&self.equal_cells)
            .append(&self.pixel_mask)
            .append(&self.raw_usage)
            .append(&self.raw_codes)
            .append(&self.displacement);
        bits.into_bytes()
    }
}

/// Assemble a DCC file from encoded directions
pub fn dcc_file(frames_per_dir: u32, directions: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0x74, 6, directions.len() as u8];
    data.extend_from_slice(&frames_per_dir.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&0u32.to_le_bytes());
    let mut offset = data.len() + directions.len() * 4;
    for direction in directions {
        data.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += direction.len();
    }
    for direction in directions {
        data.extend_from_slice(direction);
    }
    data
}

/// Assemble a DC6 file of one direction from `(width, height, encoded)` frames
pub fn dc6_file(frames: &[(i32, i32, &[u8])]) -> Vec<u8> {
    let mut data = Vec::new();
    for word in [6i32, 1, 0] {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data.extend_from_slice(&[0xEE; 4]);
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&(frames.len() as u32).to_le_bytes());

    let mut pointer = data.len() + frames.len() * 4;
    for (_, _, encoded) in frames {
        data.extend_from_slice(&(pointer as u32).to_le_bytes());
        pointer += 32 + encoded.len() + 3;
    }
    for (width, height, encoded) in frames {
        for word in [0i32, *width, *height, 0, 0, 0, 0, encoded.len() as i32] {
            data.extend_from_slice(&word.to_le_bytes());
        }
        data.extend_from_slice(encoded);
        data.extend_from_slice(&[0xEE; 3]);
    }
    data
}
