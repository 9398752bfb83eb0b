//! Sector decompression
//!
//! Compressed MPQ sectors start with a one byte tag naming the method, or a
//! bitmask of several methods applied in sequence. [`CompressionRegistry`]
//! maps tags to decompression functions. It is built once and passed
//! explicitly to every archive that needs it.
//!
//! The default registry handles zlib (0x02) and PKWARE DCL (0x08), the two
//! methods used by Diablo II archives for non-audio data. Other tags fail
//! with [`ArchiveError::UnsupportedCompression`] unless registered.

pub mod explode;

use crate::error::{ArchiveError, ArchiveResult};
use flate2::read::ZlibDecoder;
use std::collections::HashMap;
use std::io::Read;
use tracing::trace;

/// Decompression function: compressed payload and expected output size
pub type DecompressFn = fn(&[u8], usize) -> ArchiveResult<Vec<u8>>;

/// Huffman coding (WAVE files)
pub const HUFFMAN: u8 = 0x01;
/// zlib deflate
pub const ZLIB: u8 = 0x02;
/// PKWARE DCL implode
pub const PKWARE: u8 = 0x08;
/// bzip2
pub const BZIP2: u8 = 0x10;
/// Sparse run-length
pub const SPARSE: u8 = 0x20;
/// IMA ADPCM mono
pub const ADPCM_MONO: u8 = 0x40;
/// IMA ADPCM stereo
pub const ADPCM_STEREO: u8 = 0x80;
/// LZMA, exclusive tag
pub const LZMA: u8 = 0x12;

/// Upper bound on output buffers allocated before any data is decoded
pub(crate) const PREALLOC_LIMIT: usize = 1 << 20;

/// Order in which the bits of a combined tag are undone.
///
/// Compression applies ADPCM, then Huffman, then one of the byte
/// compressors; decompression walks the chain backwards.
const DECOMPRESSION_ORDER: [u8; 6] = [BZIP2, PKWARE, ZLIB, HUFFMAN, ADPCM_STEREO, ADPCM_MONO];

/// Tag → decompression function mapping
#[derive(Debug, Clone, Default)]
pub struct CompressionRegistry {
    methods: HashMap<u8, DecompressFn>,
}

impl CompressionRegistry {
    /// Registry with no methods
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with zlib and PKWARE DCL
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ZLIB, decompress_zlib);
        registry.register(PKWARE, explode::explode);
        registry
    }

    /// Add or replace the method for `tag`
    pub fn register(&mut self, tag: u8, method: DecompressFn) -> &mut Self {
        self.methods.insert(tag, method);
        self
    }

    /// True when `tag` can be decompressed, alone or as a combination
    pub fn supports(&self, tag: u8) -> bool {
        self.methods.contains_key(&tag) || self.decomposition(tag).is_ok()
    }

    fn decomposition(&self, tag: u8) -> ArchiveResult<Vec<(u8, DecompressFn)>> {
        let mut remaining = tag;
        let mut chain = Vec::new();
        for bit in DECOMPRESSION_ORDER {
            if remaining & bit == 0 {
                continue;
            }
            let method = self
                .methods
                .get(&bit)
                .ok_or(ArchiveError::UnsupportedCompression(bit))?;
            chain.push((bit, *method));
            remaining &= !bit;
        }
        if remaining != 0 || chain.is_empty() {
            return Err(ArchiveError::UnsupportedCompression(tag));
        }
        Ok(chain)
    }

    /// Decompress a tagged sector payload (without its tag byte)
    pub fn decompress(&self, tag: u8, data: &[u8], expected_size: usize) -> ArchiveResult<Vec<u8>> {
        if let Some(method) = self.methods.get(&tag) {
            trace!("decompress tag 0x{tag:02X}: {} -> {expected_size} bytes", data.len());
            return method(data, expected_size);
        }

        let chain = self.decomposition(tag)?;
        let mut buffer = data.to_vec();
        for (bit, method) in chain {
            trace!("decompress step 0x{bit:02X}: {} -> {expected_size} bytes", buffer.len());
            buffer = method(&buffer, expected_size)?;
        }
        Ok(buffer)
    }
}

/// zlib decompression, bounded by the expected size
pub fn decompress_zlib(data: &[u8], expected_size: usize) -> ArchiveResult<Vec<u8>> {
    let decoder = ZlibDecoder::new(data);
    let mut output = Vec::with_capacity(expected_size.min(PREALLOC_LIMIT));
    // One extra byte so oversized output is detected instead of truncated
    decoder
        .take(expected_size as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| ArchiveError::CorruptArchive(format!("zlib decompression failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_zlib_sector() {
        let registry = CompressionRegistry::with_defaults();
        let plain = b"Stay awhile and listen".repeat(8);
        let output = registry.decompress(ZLIB, &zlib(&plain), plain.len()).unwrap();
        assert_eq!(output, plain);
    }

    #[test]
    fn test_zlib_oversized_output_is_visible() {
        let plain = vec![7u8; 64];
        let output = decompress_zlib(&zlib(&plain), 16).unwrap();
        assert_eq!(output.len(), 17);
    }

    #[test]
    fn test_zlib_garbage() {
        let err = decompress_zlib(&[0xFF, 0x00, 0x12], 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_unknown_tags() {
        let registry = CompressionRegistry::with_defaults();
        for tag in [HUFFMAN, BZIP2, SPARSE, ADPCM_MONO, ADPCM_STEREO, LZMA, 0x04] {
            let err = registry.decompress(tag, &[0u8; 4], 4).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedFeature, "tag 0x{tag:02X}");
            assert!(!registry.supports(tag));
        }
        // Huffman + zlib: Huffman has no decoder
        let err = registry.decompress(HUFFMAN | ZLIB, &[0u8; 4], 4).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedCompression(HUFFMAN)));
    }

    #[test]
    fn test_registered_combination() {
        fn reverse(data: &[u8], _: usize) -> ArchiveResult<Vec<u8>> {
            Ok(data.iter().rev().copied().collect())
        }

        let mut registry = CompressionRegistry::with_defaults();
        registry.register(HUFFMAN, reverse);
        assert!(registry.supports(HUFFMAN | ZLIB));

        // zlib is undone first, then the Huffman stand-in
        let plain = b"abcdef".to_vec();
        let output = registry.decompress(HUFFMAN | ZLIB, &zlib(&plain), 6).unwrap();
        assert_eq!(output, b"fedcba");
    }
}
