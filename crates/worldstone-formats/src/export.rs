//! Netpbm export for inspection tools
//!
//! Indexed images are written either as raw grayscale (`P5`, the indices
//! themselves) or as raw RGB (`P6`, resolved through a palette).

use crate::error::FormatResult;
use crate::image::{ImageProvider, ImageView};
use crate::palette::Palette;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write `image` as a binary PGM, the maximum gray value being the highest index
pub fn write_pgm<W: Write>(mut writer: W, image: &ImageView<'_>) -> FormatResult<()> {
    let max = image
        .rows()
        .flat_map(|row| row.iter().copied())
        .max()
        .unwrap_or(0)
        .max(1);
    writeln!(writer, "P5 {} {} {max}", image.width(), image.height())?;
    for row in image.rows() {
        writer.write_all(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write `image` as a binary PPM, colors taken from `palette`
pub fn write_ppm<W: Write>(mut writer: W, image: &ImageView<'_>, palette: &Palette) -> FormatResult<()> {
    writeln!(writer, "P6 {} {} 255", image.width(), image.height())?;
    let mut line = Vec::with_capacity(image.width() * 3);
    for row in image.rows() {
        line.clear();
        for &index in row {
            let color = palette.color(index);
            line.extend_from_slice(&[color.r, color.g, color.b]);
        }
        writer.write_all(&line)?;
    }
    writer.flush()?;
    Ok(())
}

/// [`write_pgm`] to a new file at `path`
pub fn save_pgm(path: impl AsRef<Path>, image: &ImageView<'_>) -> FormatResult<()> {
    write_pgm(BufWriter::new(File::create(path)?), image)
}

/// [`write_ppm`] to a new file at `path`
pub fn save_ppm(path: impl AsRef<Path>, image: &ImageView<'_>, palette: &Palette) -> FormatResult<()> {
    write_ppm(BufWriter::new(File::create(path)?), image, palette)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::palette::tests::gray_palette;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pgm_respects_stride() {
        // 2x2 image in a buffer with 3-byte rows
        let buffer = [1u8, 7, 99, 3, 4, 99];
        let view = ImageView::new(&buffer, 2, 2, 3).unwrap();
        let mut out = Vec::new();
        write_pgm(&mut out, &view).unwrap();
        let mut expected = b"P5 2 2 7\n".to_vec();
        expected.extend_from_slice(&[1, 7, 3, 4]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_pgm_of_black_image() {
        let buffer = [0u8; 4];
        let view = ImageView::packed(&buffer, 4, 1).unwrap();
        let mut out = Vec::new();
        write_pgm(&mut out, &view).unwrap();
        assert!(out.starts_with(b"P5 4 1 1\n"));
    }

    #[test]
    fn test_ppm_uses_palette() {
        let buffer = [10u8, 200];
        let view = ImageView::packed(&buffer, 2, 1).unwrap();
        let mut out = Vec::new();
        write_ppm(&mut out, &view, &gray_palette()).unwrap();
        let mut expected = b"P6 2 1 255\n".to_vec();
        expected.extend_from_slice(&[10, 10, 10, 200, 200, 200]);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.pgm");
        let buffer = [5u8; 6];
        save_pgm(&path, &ImageView::packed(&buffer, 3, 2).unwrap()).unwrap();
        let written = std::fs::read(&path).unwrap();
        assert_eq!(written.len(), b"P5 3 2 5\n".len() + 6);
    }
}
