//! Bit-granular cursor over a borrowed byte slice
//!
//! Bits are consumed least-significant-bit first within each byte, and
//! multi-bit values are assembled little-endian: the first bit read becomes
//! bit 0 of the result. This is the layout used by the DCC sprite format and
//! by the PKWARE DCL compressed sectors found in MPQ archives.
//!
//! ```
//! use worldstone_archive::bits::BitReader;
//!
//! let data = [0b1010_1100u8, 0xFF];
//! let mut reader = BitReader::new(&data);
//! assert_eq!(reader.read_bits(2).unwrap(), 0b00);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1011);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1110);
//! ```

use thiserror::Error;

/// Errors raised by [`BitReader`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitError {
    /// Read or skip past the end of the view
    #[error("bitstream truncated: requested {requested} bits at bit {position}, {available} available")]
    Truncated {
        /// Bit position of the failed read, relative to the view start
        position: usize,
        /// Bits requested
        requested: usize,
        /// Bits left in the view
        available: usize,
    },

    /// Width larger than a `u32`
    #[error("invalid bit width: {0} (maximum is 32)")]
    InvalidWidth(u32),
}

/// Result type for bit cursor operations
pub type BitResult<T> = Result<T, BitError>;

/// A read cursor over a bit range of a byte slice.
///
/// The cursor never owns its data. Sub-cursors created with
/// [`split_off`](Self::split_off) share the same slice and are bounded to
/// their own bit range, so a malformed size field cannot make one stream
/// read into its neighbour.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// First bit of the view (absolute, in bits from `data[0]`)
    start: usize,
    /// One past the last readable bit (absolute)
    end: usize,
    /// Current position (absolute)
    pos: usize,
}

impl<'a> BitReader<'a> {
    /// Create a cursor covering every bit of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            end: data.len() * 8,
            pos: 0,
        }
    }

    /// Create a cursor covering only the first `bit_len` bits of `data`
    pub fn with_bit_len(data: &'a [u8], bit_len: usize) -> BitResult<Self> {
        let available = data.len() * 8;
        if bit_len > available {
            return Err(BitError::Truncated {
                position: 0,
                requested: bit_len,
                available,
            });
        }
        Ok(Self {
            data,
            start: 0,
            end: bit_len,
            pos: 0,
        })
    }

    /// Size of the view in bits
    pub fn bit_len(&self) -> usize {
        self.end - self.start
    }

    /// Current position in bits, relative to the start of the view
    pub fn position(&self) -> usize {
        self.pos - self.start
    }

    /// Bits left to read
    pub fn remaining(&self) -> usize {
        self.end - self.pos
    }

    /// True when the view has no bits at all
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Move to an absolute position inside the view
    pub fn set_position(&mut self, position: usize) -> BitResult<()> {
        if position > self.bit_len() {
            return Err(self.truncated(position.saturating_sub(self.position())));
        }
        self.pos = self.start + position;
        Ok(())
    }

    fn truncated(&self, requested: usize) -> BitError {
        BitError::Truncated {
            position: self.position(),
            requested,
            available: self.remaining(),
        }
    }

    fn check_width(bits: u32) -> BitResult<usize> {
        if bits > 32 {
            return Err(BitError::InvalidWidth(bits));
        }
        Ok(bits as usize)
    }

    /// Read `bits` bits without moving the cursor
    pub fn peek_bits(&self, bits: u32) -> BitResult<u32> {
        let count = Self::check_width(bits)?;
        if count > self.remaining() {
            return Err(self.truncated(count));
        }

        let mut value = 0u32;
        let mut written = 0usize;
        let mut pos = self.pos;
        while written < count {
            let byte = self.data[pos / 8];
            let bit_in_byte = pos % 8;
            let take = (8 - bit_in_byte).min(count - written);
            let mask = (1u32 << take) - 1;
            value |= ((u32::from(byte) >> bit_in_byte) & mask) << written;
            written += take;
            pos += take;
        }
        Ok(value)
    }

    /// Read `bits` bits (at most 32) as an unsigned value
    pub fn read_bits(&mut self, bits: u32) -> BitResult<u32> {
        let value = self.peek_bits(bits)?;
        self.pos += bits as usize;
        Ok(value)
    }

    /// Read a single bit
    pub fn read_bit(&mut self) -> BitResult<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Read 8 bits
    pub fn read_u8(&mut self) -> BitResult<u8> {
        Ok(self.read_bits(8)? as u8)
    }

    /// Read a two's-complement value stored on `bits` bits and sign-extend it.
    ///
    /// A width of zero always yields 0.
    pub fn read_signed(&mut self, bits: u32) -> BitResult<i32> {
        let raw = self.read_bits(bits)?;
        Ok(sign_extend(raw, bits))
    }

    /// Skip `bits` bits
    pub fn skip(&mut self, bits: usize) -> BitResult<()> {
        if bits > self.remaining() {
            return Err(self.truncated(bits));
        }
        self.pos += bits;
        Ok(())
    }

    /// Round the position up to the next byte boundary of the underlying slice
    pub fn align_to_byte(&mut self) -> BitResult<()> {
        let aligned = self.pos.div_ceil(8) * 8;
        self.skip(aligned - self.pos)
    }

    /// Detach the next `bits` bits as an independent cursor and advance past them
    pub fn split_off(&mut self, bits: usize) -> BitResult<Self> {
        if bits > self.remaining() {
            return Err(self.truncated(bits));
        }
        let sub = Self {
            data: self.data,
            start: self.pos,
            end: self.pos + bits,
            pos: self.pos,
        };
        self.pos += bits;
        Ok(sub)
    }

    /// Byte index of the current position in the underlying slice, rounded up
    pub fn byte_position(&self) -> usize {
        self.pos.div_ceil(8)
    }
}

/// Sign-extend the low `bits` bits of `value`
pub fn sign_extend(value: u32, bits: u32) -> i32 {
    match bits {
        0 => 0,
        32.. => value as i32,
        _ => {
            let shift = 32 - bits;
            ((value << shift) as i32) >> shift
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_read_lsb_first() {
        let data = [0b1011_0100u8, 0b0000_0001];
        let mut reader = BitReader::new(&data);
        assert!(!reader.read_bit().unwrap());
        assert!(!reader.read_bit().unwrap());
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_bits(5).unwrap(), 0b10110);
        assert_eq!(reader.read_bits(8).unwrap(), 1);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_read_across_bytes() {
        let data = [0xF0u8, 0x0F, 0xAA];
        let mut reader = BitReader::new(&data);
        reader.skip(4).unwrap();
        assert_eq!(reader.read_bits(8).unwrap(), 0xFF);
        assert_eq!(reader.read_bits(12).unwrap(), 0xAA0);
    }

    #[test]
    fn test_read_32_bits() {
        let data = 0xDEAD_BEEFu32.to_le_bytes();
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(32).unwrap(), 0xDEAD_BEEF);

        let data = [0x80u8, 0x57, 0x5B, 0xDF, 0x05];
        let mut reader = BitReader::new(&data);
        reader.skip(7).unwrap();
        assert_eq!(reader.read_bits(32).unwrap(), 0x0BBE_B6AF);
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0x5Au8];
        let reader = BitReader::new(&data);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xA);
        assert_eq!(reader.peek_bits(4).unwrap(), 0xA);
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn test_zero_width_read() {
        let mut reader = BitReader::new(&[]);
        assert_eq!(reader.read_bits(0).unwrap(), 0);
        assert_eq!(reader.read_signed(0).unwrap(), 0);
    }

    #[test]
    fn test_truncated_read_fails_without_advancing() {
        let data = [0xFFu8];
        let mut reader = BitReader::new(&data);
        reader.skip(5).unwrap();
        let err = reader.read_bits(4).unwrap_err();
        assert_eq!(
            err,
            BitError::Truncated {
                position: 5,
                requested: 4,
                available: 3
            }
        );
        assert_eq!(reader.position(), 5);
        assert_eq!(reader.read_bits(3).unwrap(), 0b111);
    }

    #[test]
    fn test_invalid_width() {
        let data = [0u8; 8];
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_bits(33), Err(BitError::InvalidWidth(33)));
    }

    #[test]
    fn test_signed_values() {
        // 4-bit -3 is 0b1101, 6-bit 5 is 0b000101
        let value = 0b1101u32 | (0b000101 << 4);
        let data = value.to_le_bytes();
        let mut reader = BitReader::new(&data);
        assert_eq!(reader.read_signed(4).unwrap(), -3);
        assert_eq!(reader.read_signed(6).unwrap(), 5);
    }

    #[test]
    fn test_sign_extend_edges() {
        assert_eq!(sign_extend(1, 1), -1);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(0x7F, 8), 127);
        assert_eq!(sign_extend(0xFFFF_FFFF, 32), -1);
        assert_eq!(sign_extend(0xF_FFFF, 20), -1);
    }

    #[test]
    fn test_align_to_byte() {
        let data = [0x00u8, 0xAB];
        let mut reader = BitReader::new(&data);
        reader.align_to_byte().unwrap();
        assert_eq!(reader.position(), 0);
        reader.skip(1).unwrap();
        reader.align_to_byte().unwrap();
        assert_eq!(reader.position(), 8);
        assert_eq!(reader.read_bits(8).unwrap(), 0xAB);
    }

    #[test]
    fn test_split_off_is_bounded() {
        let data = [0xFFu8, 0x00];
        let mut reader = BitReader::new(&data);
        reader.skip(3).unwrap();
        let mut sub = reader.split_off(6).unwrap();
        assert_eq!(reader.position(), 9);
        assert_eq!(sub.bit_len(), 6);
        assert_eq!(sub.read_bits(5).unwrap(), 0b11111);
        assert!(!sub.read_bit().unwrap());
        assert!(sub.read_bit().is_err());
    }

    #[test]
    fn test_with_bit_len() {
        let data = [0xFFu8];
        let mut reader = BitReader::with_bit_len(&data, 3).unwrap();
        assert_eq!(reader.read_bits(3).unwrap(), 0b111);
        assert!(reader.read_bit().is_err());
        assert!(BitReader::with_bit_len(&data, 9).is_err());
    }

    proptest! {
        #[test]
        fn prop_reads_never_cross_the_end(data in proptest::collection::vec(any::<u8>(), 0..16),
                                          widths in proptest::collection::vec(0u32..=32, 0..32)) {
            let mut reader = BitReader::new(&data);
            for width in widths {
                let before = reader.position();
                match reader.read_bits(width) {
                    Ok(_) => prop_assert_eq!(reader.position(), before + width as usize),
                    Err(_) => prop_assert_eq!(reader.position(), before),
                }
                prop_assert!(reader.position() <= reader.bit_len());
            }
        }

        #[test]
        fn prop_split_matches_sequential(data in proptest::collection::vec(any::<u8>(), 4..16),
                                         skip in 0usize..8, width in 1u32..=16) {
            let mut sequential = BitReader::new(&data);
            sequential.skip(skip).unwrap();
            let expected = sequential.read_bits(width).unwrap();

            let mut outer = BitReader::new(&data);
            outer.skip(skip).unwrap();
            let mut sub = outer.split_off(width as usize).unwrap();
            prop_assert_eq!(sub.read_bits(width).unwrap(), expected);
        }
    }
}
