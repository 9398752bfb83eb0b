//! Precomputed palette shifts (`.pl2`)
//!
//! A PL2 file bundles a base palette with every shift table the renderer
//! needs: light levels, blending lookups, hue variations and text colors.
//! Files shipped with the game can be read directly, or regenerated from a
//! palette with [`Pl2::from_palette`], which reproduces the game's own
//! rounding (including its use of single-precision constants).

use super::{Color, PALETTE_COLORS, PalShift, Palette};
use crate::error::{FormatError, FormatResult, slice_at};
use binrw::{BinRead, BinReaderExt};
use std::io::{Cursor, Read};
use tracing::debug;

/// Size of a `.pl2` file
pub const PL2_SIZE: usize = 443_175;

/// Number of light level shifts
pub const LIGHT_LEVELS: usize = 32;

/// Number of inverse color shifts
pub const INV_COLOR_VARIATIONS: usize = 16;

/// Number of alpha blend levels (75%, 50% and 25% opacity)
pub const ALPHA_BLEND_LEVELS: usize = 3;

/// Number of hue variation shifts
pub const HUE_VARIATIONS: usize = 111;

/// Number of text colors
pub const TEXT_COLORS: usize = 13;

const UNKNOWN_VARIATIONS: usize = 14;

const DEFAULT_TEXT_COLORS: [Color; TEXT_COLORS] = [
    Color::new(0xFF, 0xFF, 0xFF),
    Color::new(0xFF, 0x4D, 0x4D),
    Color::new(0x00, 0xFF, 0x00),
    Color::new(0x69, 0x69, 0xFF),
    Color::new(0xC7, 0xB3, 0x77),
    Color::new(0x69, 0x69, 0x69),
    Color::new(0x00, 0x00, 0x00),
    Color::new(0xD0, 0xC2, 0x7D),
    Color::new(0xFF, 0xA8, 0x00),
    Color::new(0xFF, 0xFF, 0x64),
    Color::new(0x00, 0x80, 0x00),
    Color::new(0xAE, 0x00, 0xFF),
    Color::new(0x00, 0xC8, 0x00),
];

/// Palette shift tables of one palette
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Pl2 {
    /// Palette every table indexes into
    #[br(parse_with = parse_rgba_palette)]
    pub base_palette: Palette,
    /// Light level `i` scales colors by `(i + 1) / 32`
    #[br(count = LIGHT_LEVELS)]
    pub light_level_variations: Vec<PalShift>,
    /// Colors pushed toward white
    #[br(count = INV_COLOR_VARIATIONS)]
    pub inv_color_variations: Vec<PalShift>,
    /// Brightened colors for the unit under the cursor
    pub selected_unit_shift: PalShift,
    /// `[level * 256 + src]` maps a destination index to the blended index
    #[br(count = ALPHA_BLEND_LEVELS * PALETTE_COLORS)]
    pub alpha_blend: Vec<PalShift>,
    /// `[src]`, saturating addition
    #[br(count = PALETTE_COLORS)]
    pub additive_blend: Vec<PalShift>,
    /// `[src]`, component-wise multiplication
    #[br(count = PALETTE_COLORS)]
    pub multiplicative_blend: Vec<PalShift>,
    /// Hue rotations and desaturations used for unit recoloring
    #[br(count = HUE_VARIATIONS)]
    pub hue_variations: Vec<PalShift>,
    /// Colors mapped onto shades of red by magnitude
    pub red_tones: PalShift,
    /// Colors mapped onto shades of green by magnitude
    pub green_tones: PalShift,
    /// Colors mapped onto shades of blue by magnitude
    pub blue_tones: PalShift,
    /// Tables with no known use
    #[br(count = UNKNOWN_VARIATIONS)]
    pub unknown_variations: Vec<PalShift>,
    /// `[src]`, blended by the destination's brightest component
    #[br(count = PALETTE_COLORS)]
    pub max_component_blend: Vec<PalShift>,
    /// Colors darkened by a third
    pub darkened_color_shift: PalShift,
    /// Font colors
    pub text_colors: [Color; TEXT_COLORS],
    /// Shift rendering the font in each text color
    #[br(count = TEXT_COLORS)]
    pub text_color_shifts: Vec<PalShift>,
}

#[binrw::parser(reader)]
fn parse_rgba_palette() -> binrw::BinResult<Palette> {
    let mut raw = [0u8; PALETTE_COLORS * 4];
    reader.read_exact(&mut raw)?;
    let mut colors = [Color::default(); PALETTE_COLORS];
    for (color, rgba) in colors.iter_mut().zip(raw.chunks_exact(4)) {
        *color = Color::new(rgba[0], rgba[1], rgba[2]);
    }
    Ok(Palette::from_colors(colors))
}

impl Pl2 {
    /// Parse a `.pl2` file
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let data = slice_at(data, 0, PL2_SIZE)?;
        Ok(Cursor::new(data).read_le()?)
    }

    /// Read a `.pl2` file from a stream
    pub fn read<R: Read>(mut reader: R) -> FormatResult<Self> {
        let mut data = vec![0u8; PL2_SIZE];
        reader.read_exact(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Index `index` takes at light level `light_level` (0 darkest, 31 full)
    pub fn shifted_index(&self, light_level: usize, index: u8) -> FormatResult<u8> {
        self.light_level_variations
            .get(light_level)
            .map(|shift| shift.apply(index))
            .ok_or(FormatError::OutOfRange {
                what: "light level",
                index: light_level,
                count: LIGHT_LEVELS,
            })
    }

    /// Alpha blend table for `level` (0: 75%, 1: 50%, 2: 25%) and source index
    pub fn alpha_blend_shift(&self, level: usize, source: u8) -> FormatResult<&PalShift> {
        if level >= ALPHA_BLEND_LEVELS {
            return Err(FormatError::OutOfRange {
                what: "alpha blend level",
                index: level,
                count: ALPHA_BLEND_LEVELS,
            });
        }
        self.alpha_blend
            .get(level * PALETTE_COLORS + usize::from(source))
            .ok_or(FormatError::OutOfRange {
                what: "alpha blend table",
                index: level * PALETTE_COLORS + usize::from(source),
                count: self.alpha_blend.len(),
            })
    }

    /// Compute every table from a palette
    #[allow(clippy::float_cmp)]
    pub fn from_palette(palette: &Palette) -> Self {
        debug!("Generating PL2 tables");
        let hsl: Vec<Hsl> = palette.colors().iter().map(Hsl::from_rgb).collect();
        let closest = |color: Color| palette.closest_color_index(color);
        let shift_of = |f: &dyn Fn(usize) -> Color| {
            let mut shift = PalShift::default();
            for (index, slot) in shift.indices.iter_mut().enumerate() {
                *slot = closest(f(index));
            }
            shift
        };
        let base = |index: usize| palette.colors()[index];

        let light_level_variations = (0..LIGHT_LEVELS as u32)
            .map(|level| {
                shift_of(&|index| {
                    let c = base(index);
                    let scale = |v: u8| (((level + 1) * u32::from(v)) >> 5) as u8;
                    Color::new(scale(c.r), scale(c.g), scale(c.b))
                })
            })
            .collect();

        let inv_color_variations = (0..INV_COLOR_VARIATIONS as u32)
            .map(|level| {
                shift_of(&|index| {
                    let c = base(index);
                    let lift = |v: u8| ((((level + 1) * (255 - u32::from(v))) >> 4) + u32::from(v)) as u8;
                    Color::new(lift(c.r), lift(c.g), lift(c.b))
                })
            })
            .collect();

        let selected_unit_shift = shift_of(&|index| {
            let mut color = hsl[index];
            if color.lum != 0.0 {
                color.lum = (color.lum + 0.2).min(1.0);
            }
            color.to_rgb()
        });

        let blend_table = |blend: &dyn Fn(Color, Color) -> Color| -> Vec<PalShift> {
            (0..PALETTE_COLORS)
                .map(|src| shift_of(&|dst| blend(base(src), base(dst))))
                .collect()
        };

        let mut alpha_blend = Vec::with_capacity(ALPHA_BLEND_LEVELS * PALETTE_COLORS);
        for ratio in [191u32, 127, 63] {
            let inv = 255 - ratio;
            let mix = |s: u8, d: u8| ((inv * u32::from(s) + ratio * u32::from(d)) / 0xFF) as u8;
            alpha_blend.extend(blend_table(&|s, d| {
                Color::new(mix(s.r, d.r), mix(s.g, d.g), mix(s.b, d.b))
            }));
        }

        let additive_blend = blend_table(&|s, d| {
            let add = |a: u8, b: u8| a.saturating_add(b);
            Color::new(add(s.r, d.r), add(s.g, d.g), add(s.b, d.b))
        });

        let multiplicative_blend = blend_table(&|s, d| {
            let mul = |a: u8, b: u8| ((u32::from(a) * u32::from(b)) / 0xFF) as u8;
            Color::new(mul(s.r, d.r), mul(s.g, d.g), mul(s.b, d.b))
        });

        let hue_variations = hue_variations(palette, &hsl);

        let magnitude = |index: usize| {
            let c = base(index);
            let sum = u32::from(c.r).pow(2) + u32::from(c.g).pow(2) + u32::from(c.b).pow(2);
            // the game truncates to 8 bits without clamping
            f64::from(sum).sqrt() as u32 as u8
        };
        let red_tones = shift_of(&|index| Color::new(magnitude(index), 0, 0));
        let green_tones = shift_of(&|index| Color::new(0, magnitude(index), 0));
        let blue_tones = shift_of(&|index| Color::new(0, 0, magnitude(index)));

        let max_component_blend = blend_table(&|s, d| {
            let weight = u32::from(d.r.max(d.g).max(d.b));
            let inv = 0xFF - weight;
            let mix = |a: u8, b: u8| ((inv * u32::from(a) + weight * u32::from(b)) / 0xFF) as u8;
            Color::new(mix(s.r, d.r), mix(s.g, d.g), mix(s.b, d.b))
        });

        let darkened_color_shift = shift_of(&|index| {
            let c = base(index);
            Color::new(c.r - c.r / 3, c.g - c.g / 3, c.b - c.b / 3)
        });

        // the first text color shift is left black
        let mut text_color_shifts = vec![PalShift::default()];
        for text in &DEFAULT_TEXT_COLORS[1..] {
            text_color_shifts.push(shift_of(&|index| {
                let intensity = u32::from(base(index).r);
                let scale = |v: u8| ((u32::from(v) * intensity) / 0xFF) as u8;
                Color::new(scale(text.r), scale(text.g), scale(text.b))
            }));
        }

        Self {
            base_palette: palette.clone(),
            light_level_variations,
            inv_color_variations,
            selected_unit_shift,
            alpha_blend,
            additive_blend,
            multiplicative_blend,
            hue_variations,
            red_tones,
            green_tones,
            blue_tones,
            unknown_variations: vec![PalShift::default(); UNKNOWN_VARIATIONS],
            max_component_blend,
            darkened_color_shift,
            text_colors: DEFAULT_TEXT_COLORS,
            text_color_shifts,
        }
    }
}

fn hue_variations(palette: &Palette, hsl: &[Hsl]) -> Vec<PalShift> {
    let shift_of = |f: &dyn Fn(usize) -> Hsl| {
        let mut shift = PalShift::default();
        for (index, slot) in shift.indices.iter_mut().enumerate() {
            *slot = palette.closest_color_index(f(index).to_rgb());
        }
        shift
    };
    let rotate = |color: &mut Hsl, step: u32| {
        color.hue += f64::from(step) * 15.0;
        if color.hue > 360.0 {
            color.hue -= 360.0;
        }
    };
    // the game uses single-precision constants here
    let darker = f64::from(0.1f32);
    let lighter = f64::from(0.2f32);

    let mut tables = Vec::with_capacity(HUE_VARIATIONS);
    for step in 0..24 {
        tables.push(shift_of(&|index| {
            let mut color = hsl[index];
            rotate(&mut color, step);
            color
        }));
    }
    for step in 0..24 {
        tables.push(shift_of(&|index| {
            let mut color = hsl[index];
            rotate(&mut color, step);
            color.sat = 0.5;
            color.lum = (color.lum - darker).max(0.0);
            color
        }));
    }
    for step in 0..24 {
        tables.push(shift_of(&|index| {
            let mut color = hsl[index];
            rotate(&mut color, step);
            color.sat = 0.5;
            color.lum = (color.lum + lighter).min(1.0);
            color
        }));
    }
    tables.push(shift_of(&|index| Hsl {
        sat: 0.0,
        lum: hsl[index].lum / 2.0,
        ..hsl[index]
    }));
    tables.push(shift_of(&|index| Hsl {
        sat: 0.0,
        lum: (hsl[index].lum + lighter) / f64::from(1.2f32),
        ..hsl[index]
    }));
    // reds and oranges keep the previous table's index
    for step in 0..24u32 {
        let mut shift = PalShift::default();
        for index in 0..PALETTE_COLORS {
            let mut color = hsl[index];
            shift.indices[index] = if color.hue > 45.0 && color.hue < 315.0 {
                rotate(&mut color, step);
                palette.closest_color_index(color.to_rgb())
            } else {
                tables
                    .last()
                    .map_or(index as u8, |previous: &PalShift| previous.indices[index])
            };
        }
        tables.push(shift);
    }
    for step in 0..12u32 {
        tables.push(shift_of(&|index| Hsl {
            hue: f64::from(step) * 30.0,
            sat: 1.0,
            ..hsl[index]
        }));
    }
    tables
}

/// Hue in degrees, saturation and lightness in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Hsl {
    hue: f64,
    sat: f64,
    lum: f64,
}

impl Hsl {
    #[allow(clippy::float_cmp)]
    fn from_rgb(color: &Color) -> Self {
        let red = f64::from(color.r) / 255.0;
        let green = f64::from(color.g) / 255.0;
        let blue = f64::from(color.b) / 255.0;
        let min = red.min(green).min(blue);
        let max = red.max(green).max(blue);
        let sum = min + max;
        let lum = sum / 2.0;
        if min == max {
            return Self {
                hue: 0.0,
                sat: 0.0,
                lum,
            };
        }

        let delta = max - min;
        let sat = if lum > 0.5 {
            delta / (2.0 - sum)
        } else {
            delta / sum
        };
        let sector = if max == red {
            (green - blue) / delta
        } else if max == green {
            (blue - red) / delta + 2.0
        } else {
            (red - green) / delta + 4.0
        };
        let mut hue = sector * 60.0;
        if hue < 0.0 {
            hue += 360.0;
        }
        Self { hue, sat, lum }
    }

    #[allow(clippy::float_cmp)]
    fn to_rgb(self) -> Color {
        if self.sat == 0.0 {
            let gray = (self.lum * 255.0) as u8;
            return Color::new(gray, gray, gray);
        }
        let q = if self.lum > 0.5 {
            self.lum + self.sat - self.lum * self.sat
        } else {
            (self.sat + 1.0) * self.lum
        };
        let p = 2.0 * self.lum - q;
        let channel = |hue: f64| (hue_to_channel(p, q, hue) * 255.0) as u8;
        Color::new(
            channel(self.hue + 120.0),
            channel(self.hue),
            channel(self.hue - 120.0),
        )
    }
}

fn hue_to_channel(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 360.0;
    }
    if t > 360.0 {
        t -= 360.0;
    }
    if t < 60.0 {
        (q - p) * t / 60.0 + p
    } else if t < 180.0 {
        q
    } else if t < 240.0 {
        (q - p) * (240.0 - t) / 60.0 + p
    } else {
        p
    }
}
