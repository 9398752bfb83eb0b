//! PKWARE Data Compression Library "explode"
//!
//! Used by MPQ sectors tagged 0x08 and by entries carrying the IMPLODE block
//! flag. The stream starts with a two byte header (literal mode, dictionary
//! size) followed by an LSB-first bitstream of literal and match tokens.

use super::PREALLOC_LIMIT;
use crate::bits::BitReader;
use crate::error::{ArchiveError, ArchiveResult};
use std::sync::LazyLock;

/// Literals stored as raw 8-bit values
pub const MODE_BINARY: u8 = 0;

/// Literals coded with the fixed ASCII tree
pub const MODE_ASCII: u8 = 1;

/// Match length that ends the stream
const END_OF_STREAM: u32 = 519;

// Fixed trees. Codes are stored so that the first bit read from the stream
// is bit 0 of the code.

const LENGTH_BITS: [u8; 16] = [
    3, 2, 3, 3, 4, 4, 4, 5, 5, 5, 5, 6, 6, 6, 7, 7,
];

const LENGTH_CODES: [u8; 16] = [
    0x05, 0x03, 0x01, 0x06, 0x0A, 0x02, 0x0C, 0x14, 0x04, 0x18, 0x08, 0x30, 0x10, 0x20, 0x40, 0x00,
];

const DISTANCE_BITS: [u8; 64] = [
    2, 4, 4, 5, 5, 5, 5, 6, 6, 6, 6, 6, 6, 6, 6, 6,
    6, 6, 6, 6, 6, 6, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7, 7,
    8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8, 8,
];

const DISTANCE_CODES: [u8; 64] = [
    0x03, 0x0D, 0x05, 0x19, 0x09, 0x11, 0x01, 0x3E, 0x1E, 0x2E, 0x0E, 0x36, 0x16, 0x26, 0x06, 0x3A,
    0x1A, 0x2A, 0x0A, 0x32, 0x12, 0x22, 0x42, 0x02, 0x7C, 0x3C, 0x5C, 0x1C, 0x6C, 0x2C, 0x4C, 0x0C,
    0x74, 0x34, 0x54, 0x14, 0x64, 0x24, 0x44, 0x04, 0x78, 0x38, 0x58, 0x18, 0x68, 0x28, 0x48, 0x08,
    0xF0, 0x70, 0xB0, 0x30, 0xD0, 0x50, 0x90, 0x10, 0xE0, 0x60, 0xA0, 0x20, 0xC0, 0x40, 0x80, 0x00,
];

const ASCII_BITS: [u8; 256] = [
    11, 12, 12, 12, 12, 12, 12, 12, 12, 8, 7, 12, 12, 7, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 13, 12, 12, 12, 12, 12,
    4, 10, 8, 12, 10, 12, 10, 8, 7, 7, 8, 9, 7, 6, 7, 8,
    7, 6, 7, 7, 7, 7, 8, 7, 7, 8, 8, 12, 11, 7, 9, 11,
    12, 6, 7, 6, 6, 5, 7, 8, 8, 6, 11, 9, 6, 7, 6, 6,
    7, 11, 6, 6, 6, 7, 9, 8, 9, 9, 11, 8, 11, 9, 12, 8,
    12, 5, 6, 6, 6, 5, 6, 6, 6, 5, 11, 7, 5, 6, 5, 5,
    6, 10, 5, 5, 5, 5, 8, 7, 8, 8, 10, 11, 11, 12, 12, 12,
    13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13,
    13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13,
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
    12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12, 12,
    13, 12, 13, 13, 13, 12, 13, 13, 13, 12, 13, 13, 13, 13, 12, 13,
    13, 13, 12, 12, 12, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13, 13,
];

const ASCII_CODES: [u16; 256] = [
    0x0490, 0x0FE0, 0x07E0, 0x0BE0, 0x03E0, 0x0DE0, 0x05E0, 0x09E0,
    0x01E0, 0x00B8, 0x0062, 0x0EE0, 0x06E0, 0x0022, 0x0AE0, 0x02E0,
    0x0CE0, 0x04E0, 0x08E0, 0x00E0, 0x0F60, 0x0760, 0x0B60, 0x0360,
    0x0D60, 0x0560, 0x1240, 0x0960, 0x0160, 0x0E60, 0x0660, 0x0A60,
    0x000F, 0x0250, 0x0038, 0x0260, 0x0050, 0x0C60, 0x0390, 0x00D8,
    0x0042, 0x0002, 0x0058, 0x01B0, 0x007C, 0x0029, 0x003C, 0x0098,
    0x005C, 0x0009, 0x001C, 0x006C, 0x002C, 0x004C, 0x0018, 0x000C,
    0x0074, 0x00E8, 0x0068, 0x0460, 0x0090, 0x0034, 0x00B0, 0x0710,
    0x0860, 0x0031, 0x0054, 0x0011, 0x0021, 0x0017, 0x0014, 0x00A8,
    0x0028, 0x0001, 0x0310, 0x0130, 0x003E, 0x0064, 0x001E, 0x002E,
    0x0024, 0x0510, 0x000E, 0x0036, 0x0016, 0x0044, 0x0030, 0x00C8,
    0x01D0, 0x00D0, 0x0110, 0x0048, 0x0610, 0x0150, 0x0060, 0x0088,
    0x0FA0, 0x0007, 0x0026, 0x0006, 0x003A, 0x001B, 0x001A, 0x002A,
    0x000A, 0x000B, 0x0210, 0x0004, 0x0013, 0x0032, 0x0003, 0x001D,
    0x0012, 0x0190, 0x000D, 0x0015, 0x0005, 0x0019, 0x0008, 0x0078,
    0x00F0, 0x0070, 0x0290, 0x0410, 0x0010, 0x07A0, 0x0BA0, 0x03A0,
    0x0240, 0x1C40, 0x0C40, 0x1440, 0x0440, 0x1840, 0x0840, 0x1040,
    0x0040, 0x1F80, 0x0F80, 0x1780, 0x0780, 0x1B80, 0x0B80, 0x1380,
    0x0380, 0x1D80, 0x0D80, 0x1580, 0x0580, 0x1980, 0x0980, 0x1180,
    0x0180, 0x1E80, 0x0E80, 0x1680, 0x0680, 0x1A80, 0x0A80, 0x1280,
    0x0280, 0x1C80, 0x0C80, 0x1480, 0x0480, 0x1880, 0x0880, 0x1080,
    0x0080, 0x1F00, 0x0F00, 0x1700, 0x0700, 0x1B00, 0x0B00, 0x1300,
    0x0DA0, 0x05A0, 0x09A0, 0x01A0, 0x0EA0, 0x06A0, 0x0AA0, 0x02A0,
    0x0CA0, 0x04A0, 0x08A0, 0x00A0, 0x0F20, 0x0720, 0x0B20, 0x0320,
    0x0D20, 0x0520, 0x0920, 0x0120, 0x0E20, 0x0620, 0x0A20, 0x0220,
    0x0C20, 0x0420, 0x0820, 0x0020, 0x0FC0, 0x07C0, 0x0BC0, 0x03C0,
    0x0DC0, 0x05C0, 0x09C0, 0x01C0, 0x0EC0, 0x06C0, 0x0AC0, 0x02C0,
    0x0CC0, 0x04C0, 0x08C0, 0x00C0, 0x0F40, 0x0740, 0x0B40, 0x0340,
    0x0300, 0x0D40, 0x1D00, 0x0D00, 0x1500, 0x0540, 0x0500, 0x1900,
    0x0900, 0x0940, 0x1100, 0x0100, 0x1E00, 0x0E00, 0x0140, 0x1600,
    0x0600, 0x1A00, 0x0E40, 0x0640, 0x0A40, 0x0A00, 0x1200, 0x0200,
    0x1C00, 0x0C00, 0x1400, 0x0400, 0x1800, 0x0800, 0x1000, 0x0000,
];

/// Prefix-code decoder indexed by the next `max_bits` stream bits
struct DecodeTable {
    max_bits: u32,
    /// (code length, symbol) for every possible `max_bits` window
    entries: Vec<(u8, u16)>,
}

impl DecodeTable {
    fn build(lengths: &[u8], codes: impl Fn(usize) -> u16) -> Self {
        let max_bits = u32::from(lengths.iter().copied().max().unwrap_or(0));
        let mut entries = vec![(0u8, 0u16); 1usize << max_bits];
        for (symbol, &length) in lengths.iter().enumerate() {
            let code = usize::from(codes(symbol));
            let step = 1usize << length;
            let mut index = code;
            while index < entries.len() {
                entries[index] = (length, symbol as u16);
                index += step;
            }
        }
        Self { max_bits, entries }
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> ArchiveResult<u16> {
        let available = (reader.remaining() as u32).min(self.max_bits);
        let window = reader.peek_bits(available)? as usize;
        let (length, symbol) = self.entries[window];
        if length == 0 {
            return Err(ArchiveError::CorruptArchive(
                "invalid prefix code in imploded data".to_string(),
            ));
        }
        reader.skip(usize::from(length))?;
        Ok(symbol)
    }
}

static LENGTH_TABLE: LazyLock<DecodeTable> =
    LazyLock::new(|| DecodeTable::build(&LENGTH_BITS, |s| u16::from(LENGTH_CODES[s])));
static DISTANCE_TABLE: LazyLock<DecodeTable> =
    LazyLock::new(|| DecodeTable::build(&DISTANCE_BITS, |s| u16::from(DISTANCE_CODES[s])));
static ASCII_TABLE: LazyLock<DecodeTable> =
    LazyLock::new(|| DecodeTable::build(&ASCII_BITS, |s| ASCII_CODES[s]));

fn read_match_length(reader: &mut BitReader<'_>) -> ArchiveResult<u32> {
    let code = u32::from(LENGTH_TABLE.decode(reader)?);
    if code < 8 {
        return Ok(code + 2);
    }
    let extra_bits = code - 7;
    let extra = reader.read_bits(extra_bits)?;
    Ok(8 + ((1 << extra_bits) | extra))
}

fn read_match_distance(
    reader: &mut BitReader<'_>,
    length: u32,
    dictionary_bits: u32,
) -> ArchiveResult<usize> {
    let code = u32::from(DISTANCE_TABLE.decode(reader)?);
    let extra_bits = if length == 2 { 2 } else { dictionary_bits };
    let extra = reader.read_bits(extra_bits)?;
    Ok(1 + ((code << extra_bits) | extra) as usize)
}

/// Decompress `input` into at most `expected_size` bytes.
///
/// Decoding stops at the end-of-stream token or once `expected_size` bytes
/// have been produced; callers compare the output length themselves.
pub fn explode(input: &[u8], expected_size: usize) -> ArchiveResult<Vec<u8>> {
    let [mode, dictionary_bits, payload @ ..] = input else {
        return Err(ArchiveError::CorruptArchive(
            "imploded data shorter than its header".to_string(),
        ));
    };
    if *mode > MODE_ASCII {
        return Err(ArchiveError::CorruptArchive(format!(
            "invalid implode literal mode {mode}"
        )));
    }
    if !(4..=6).contains(dictionary_bits) {
        return Err(ArchiveError::CorruptArchive(format!(
            "invalid implode dictionary size {dictionary_bits}"
        )));
    }
    let dictionary_bits = u32::from(*dictionary_bits);

    let mut reader = BitReader::new(payload);
    let mut output = Vec::with_capacity(expected_size.min(PREALLOC_LIMIT));

    while output.len() < expected_size {
        if reader.read_bit()? {
            let length = read_match_length(&mut reader)?;
            if length == END_OF_STREAM {
                break;
            }
            let distance = read_match_distance(&mut reader, length, dictionary_bits)?;
            if distance > output.len() {
                return Err(ArchiveError::CorruptArchive(format!(
                    "implode match distance {distance} before start of output ({} bytes)",
                    output.len()
                )));
            }
            let count = (length as usize).min(expected_size - output.len());
            let mut source = output.len() - distance;
            for _ in 0..count {
                output.push(output[source]);
                source += 1;
            }
        } else if *mode == MODE_ASCII {
            output.push(ASCII_TABLE.decode(&mut reader)? as u8);
        } else {
            output.push(reader.read_u8()?);
        }
    }

    Ok(output)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_binary_mode_with_overlapping_match() {
        let input = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F];
        let output = explode(&input, 100).unwrap();
        assert_eq!(output, b"AIAIAIAIAIAIA");
    }

    #[test]
    fn test_stops_at_expected_size() {
        let input = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8F, 0x80, 0x7F];
        let output = explode(&input, 5).unwrap();
        assert_eq!(output, b"AIAIA");
    }

    #[test]
    fn test_ascii_mode_literals() {
        let input = [0x01, 0x06, 0x50, 0x2C, 0x50, 0x06, 0xFC, 0x03];
        let output = explode(&input, 64).unwrap();
        assert_eq!(output, b"Hi!");
    }

    #[test]
    fn test_codes_are_prefix_free() {
        for table in [&*LENGTH_TABLE, &*DISTANCE_TABLE, &*ASCII_TABLE] {
            assert!(table.entries.iter().all(|&(length, _)| length > 0));
        }
    }

    #[test]
    fn test_bad_header() {
        assert_eq!(explode(&[0x00], 4).unwrap_err().kind(), ErrorKind::CorruptData);
        assert_eq!(explode(&[0x02, 0x04, 0x00], 4).unwrap_err().kind(), ErrorKind::CorruptData);
        assert_eq!(explode(&[0x00, 0x07, 0x00], 4).unwrap_err().kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_truncated_stream() {
        // Literal flag then only 7 of the 8 literal bits
        let err = explode(&[0x00, 0x04, 0x00], 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedData);
    }

    #[test]
    fn test_match_before_start() {
        // Match of length 2 reaching far before the empty output
        let err = explode(&[0x00, 0x04, 0x0B, 0x00, 0x00], 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }
}
