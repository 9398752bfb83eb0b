//! COF composite animation descriptions
//!
//! A COF file tells how the component layers of a unit (head, torso,
//! weapons...) are stacked for one animation mode. Layout:
//!
//! | Field        | Size                                  |
//! |--------------|---------------------------------------|
//! | header       | 28 bytes                              |
//! | layers       | 9 bytes per layer                     |
//! | keyframes    | 1 byte per frame                      |
//! | layer order  | `directions * frames * layers` bytes  |

use crate::aabb::Aabb;
use crate::error::{FormatError, FormatResult, slice_at};
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use worldstone_archive::ByteStream;

/// Only COF version found in game files
pub const COF_VERSION: u8 = 20;

/// Size of [`CofHeader`] on disk
pub const COF_HEADER_SIZE: usize = 28;

/// Size of [`CofLayer`] on disk
pub const COF_LAYER_SIZE: usize = 9;

/// Component codes, indexed by component number
pub const COMPONENT_NAMES: [&str; 16] = [
    "HD", "TR", "LG", "RA", "LA", "RH", "LH", "SH", "S1", "S2", "S3", "S4", "S5", "S6", "S7", "S8",
];

/// Number of components a unit can have
pub const COMPONENT_COUNT: usize = COMPONENT_NAMES.len();

/// Code of component `index`, `None` past the last component
pub fn component_name(index: usize) -> Option<&'static str> {
    COMPONENT_NAMES.get(index).copied()
}

/// File header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct CofHeader {
    /// Number of component layers
    pub layers: u8,
    /// Frames in the animation
    pub frames: u8,
    /// Directions in the animation
    pub directions: u8,
    /// Always [`COF_VERSION`]
    pub version: u8,
    /// Looping and hit overlay flags
    pub unknown1: u32,
    /// Left of the bounding box
    pub x_min: i32,
    /// Right of the bounding box
    pub x_max: i32,
    /// Top of the bounding box
    pub y_min: i32,
    /// Bottom of the bounding box
    pub y_max: i32,
    /// Animation speed, 256 is the base rate
    pub anim_rate: i16,
    /// Always zero
    pub zeros: i16,
}

impl CofHeader {
    /// Bounding box of every frame
    pub fn bounding_box(&self) -> Aabb<i32> {
        Aabb::new(self.x_min, self.y_min, self.x_max, self.y_max)
    }
}

/// One component layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct CofLayer {
    /// Component number, index into [`COMPONENT_NAMES`]
    pub component: u8,
    /// Non-zero when the layer casts a shadow
    pub shadow: u8,
    /// Non-zero when the layer can be clicked
    pub selectable: u8,
    /// Non-zero when `new_translvl` replaces the default transparency
    pub override_translvl: u8,
    /// Transparency level
    pub new_translvl: u8,
    /// Weapon class code, nul terminated
    pub weapon_class: [u8; 4],
}

impl CofLayer {
    /// Component code, such as `TR`
    pub fn component_name(&self) -> Option<&'static str> {
        component_name(usize::from(self.component))
    }

    /// Casts a shadow
    pub fn has_shadow(&self) -> bool {
        self.shadow != 0
    }

    /// Can be selected with the mouse
    pub fn is_selectable(&self) -> bool {
        self.selectable != 0
    }

    /// Weapon class code without its terminator, such as `hth`
    pub fn weapon_class(&self) -> String {
        let end = self
            .weapon_class
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.weapon_class.len());
        String::from_utf8_lossy(&self.weapon_class[..end]).into_owned()
    }
}

/// Event triggered when a frame is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Keyframe {
    /// Nothing happens
    #[default]
    None = 0,
    /// Melee hit
    Attack = 1,
    /// Missile launch
    Missile = 2,
    /// Sound cue
    Sound = 3,
    /// Skill effect
    Skill = 4,
}

impl Keyframe {
    /// Parse from byte value
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Attack),
            2 => Some(Self::Missile),
            3 => Some(Self::Sound),
            4 => Some(Self::Skill),
            _ => None,
        }
    }
}

/// A parsed COF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cof {
    header: CofHeader,
    layers: Vec<CofLayer>,
    keyframes: Vec<Keyframe>,
    layer_order: Vec<u8>,
}

impl Cof {
    /// Parse a whole COF file
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let header: CofHeader = Cursor::new(slice_at(data, 0, COF_HEADER_SIZE)?).read_le()?;
        if header.version != COF_VERSION {
            return Err(FormatError::UnsupportedVersion {
                format: "COF",
                version: u32::from(header.version),
            });
        }

        let layer_count = usize::from(header.layers);
        let frames = usize::from(header.frames);
        let order_size = usize::from(header.directions) * frames * layer_count;

        let mut offset = COF_HEADER_SIZE;
        let mut cursor = Cursor::new(slice_at(data, offset, layer_count * COF_LAYER_SIZE)?);
        let layers = (0..layer_count)
            .map(|_| cursor.read_le::<CofLayer>())
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(layer) = layers
            .iter()
            .find(|layer| usize::from(layer.component) >= COMPONENT_COUNT)
        {
            return Err(FormatError::CorruptData(format!(
                "layer component {} out of range",
                layer.component
            )));
        }
        offset += layer_count * COF_LAYER_SIZE;

        let keyframes = slice_at(data, offset, frames)?
            .iter()
            .map(|&byte| {
                Keyframe::from_byte(byte)
                    .ok_or_else(|| FormatError::CorruptData(format!("invalid keyframe {byte}")))
            })
            .collect::<FormatResult<Vec<_>>>()?;
        offset += frames;

        let layer_order = slice_at(data, offset, order_size)?.to_vec();
        if let Some(&component) = layer_order
            .iter()
            .find(|&&component| usize::from(component) >= COMPONENT_COUNT)
        {
            return Err(FormatError::CorruptData(format!(
                "layer order references component {component}"
            )));
        }

        debug!(
            "COF: {} layers, {} frames, {} directions",
            header.layers, header.frames, header.directions
        );

        Ok(Self {
            header,
            layers,
            keyframes,
            layer_order,
        })
    }

    /// Read a whole COF stream
    pub fn from_stream<S: ByteStream>(stream: &mut S) -> FormatResult<Self> {
        stream.seek_to(0)?;
        Self::from_bytes(&stream.read_to_vec()?)
    }

    /// Read a COF file from disk
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// File header
    pub fn header(&self) -> &CofHeader {
        &self.header
    }

    /// Component layers
    pub fn layers(&self) -> &[CofLayer] {
        &self.layers
    }

    /// Layer drawing `component`, if the animation uses it
    pub fn layer_for_component(&self, component: u8) -> Option<&CofLayer> {
        self.layers.iter().find(|layer| layer.component == component)
    }

    /// Trigger of every frame
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// First frame carrying `keyframe`
    pub fn keyframe_position(&self, keyframe: Keyframe) -> Option<usize> {
        self.keyframes.iter().position(|&k| k == keyframe)
    }

    /// Draw order of every frame, direction-major
    pub fn layer_orders(&self) -> &[u8] {
        &self.layer_order
    }

    /// Components of `frame` in `direction`, in drawing order
    pub fn frame_layer_order(&self, direction: usize, frame: usize) -> FormatResult<&[u8]> {
        let directions = usize::from(self.header.directions);
        let frames = usize::from(self.header.frames);
        let layers = usize::from(self.header.layers);
        if direction >= directions {
            return Err(FormatError::OutOfRange {
                what: "direction",
                index: direction,
                count: directions,
            });
        }
        if frame >= frames {
            return Err(FormatError::OutOfRange {
                what: "frame",
                index: frame,
                count: frames,
            });
        }
        let start = (direction * frames + frame) * layers;
        Ok(&self.layer_order[start..start + layers])
    }
}
