//! 256-color palettes and palette shifts
//!
//! Sprites store palette indices. A [`Palette`] turns an index into a color
//! and a [`PalShift`] remaps indices, which is how the game renders light
//! levels, blending and recolored units without touching the sprites.

mod pl2;

pub use pl2::{
    ALPHA_BLEND_LEVELS, HUE_VARIATIONS, INV_COLOR_VARIATIONS, LIGHT_LEVELS, PL2_SIZE, Pl2,
    TEXT_COLORS,
};

use crate::error::{FormatError, FormatResult, slice_at};
use binrw::BinRead;
use std::io::Read;
use std::path::Path;

/// Number of entries in a palette
pub const PALETTE_COLORS: usize = 256;

/// Size of a `.pal` file (256 BGR triples)
pub const PAL_FILE_SIZE: usize = PALETTE_COLORS * 3;

/// 24-bit color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, BinRead)]
pub struct Color {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Color from its components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared euclidean distance in RGB space
    pub fn distance_squared(&self, other: &Self) -> u32 {
        let dr = i32::from(self.r) - i32::from(other.r);
        let dg = i32::from(self.g) - i32::from(other.g);
        let db = i32::from(self.b) - i32::from(other.b);
        (dr * dr + dg * dg + db * db) as u32
    }
}

/// A 256-color palette
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [Color; PALETTE_COLORS],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: [Color::default(); PALETTE_COLORS],
        }
    }
}

impl Palette {
    /// Palette from its colors
    pub const fn from_colors(colors: [Color; PALETTE_COLORS]) -> Self {
        Self { colors }
    }

    /// Parse the `.pal` layout: 256 blue, green, red triples
    pub fn from_bgr(data: &[u8]) -> FormatResult<Self> {
        let data = slice_at(data, 0, PAL_FILE_SIZE)?;
        let mut colors = [Color::default(); PALETTE_COLORS];
        for (color, bgr) in colors.iter_mut().zip(data.chunks_exact(3)) {
            *color = Color::new(bgr[2], bgr[1], bgr[0]);
        }
        Ok(Self { colors })
    }

    /// Read a `.pal` palette from a stream
    pub fn read<R: Read>(mut reader: R) -> FormatResult<Self> {
        let mut data = [0u8; PAL_FILE_SIZE];
        reader.read_exact(&mut data)?;
        Self::from_bgr(&data)
    }

    /// Read a `.pal` file from disk
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bgr(&data)
    }

    /// Every color, by index
    pub fn colors(&self) -> &[Color; PALETTE_COLORS] {
        &self.colors
    }

    /// Color at `index`
    pub fn color_at(&self, index: usize) -> FormatResult<Color> {
        self.colors
            .get(index)
            .copied()
            .ok_or(FormatError::OutOfRange {
                what: "palette color",
                index,
                count: PALETTE_COLORS,
            })
    }

    /// Color of a pixel value; every `u8` is a valid index
    pub fn color(&self, index: u8) -> Color {
        self.colors[usize::from(index)]
    }

    /// Index of the nearest color by squared RGB distance, first match wins
    pub fn closest_color_index(&self, color: Color) -> u8 {
        let mut best_distance = u32::MAX;
        let mut best_index = 0u8;
        for (index, candidate) in (0..=u8::MAX).zip(&self.colors) {
            let distance = candidate.distance_squared(&color);
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }
        best_index
    }
}

/// Index remapping table
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
pub struct PalShift {
    /// New index for each palette index
    pub indices: [u8; PALETTE_COLORS],
}

impl Default for PalShift {
    fn default() -> Self {
        Self {
            indices: [0; PALETTE_COLORS],
        }
    }
}

impl PalShift {
    /// Shift that maps every index to itself
    pub fn identity() -> Self {
        let mut indices = [0u8; PALETTE_COLORS];
        for (slot, index) in indices.iter_mut().zip(0..=u8::MAX) {
            *slot = index;
        }
        Self { indices }
    }

    /// Remap one index
    pub fn apply(&self, index: u8) -> u8 {
        self.indices[usize::from(index)]
    }

    /// Color an index takes once shifted
    pub fn transformed_color(&self, palette: &Palette, index: u8) -> Color {
        palette.color(self.apply(index))
    }

    /// Palette with every entry shifted
    pub fn transform_palette(&self, base: &Palette) -> Palette {
        let mut colors = [Color::default(); PALETTE_COLORS];
        for (color, &index) in colors.iter_mut().zip(&self.indices) {
            *color = base.color(index);
        }
        Palette::from_colors(colors)
    }
}
