//! DT1 tile sets
//!
//! Only the headers are decoded: the tile-set header and one 96-byte header
//! per tile, stored one after the other.

use crate::error::{FormatError, FormatResult, slice_at};
use binrw::{BinRead, BinReaderExt};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};
use worldstone_archive::ByteStream;

/// Tile-set version used by the game
pub const DT1_VERSION: u32 = 7;

/// Size of [`Dt1Header`] on disk
pub const DT1_HEADER_SIZE: usize = 276;

/// Size of [`TileHeader`] on disk
pub const TILE_HEADER_SIZE: usize = 96;

/// Sub-tiles in a tile's collision grid (5x5)
pub const SUB_TILES: usize = 25;

/// Tile-set flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dt1Flags(pub u32);

impl Dt1Flags {
    /// Colors are stored on 24 bits
    pub const IS_24_BIT: u32 = 0x1;
    /// Set once the data was validated
    pub const VALIDATED: u32 = 0x2;
    /// The tile set was serialized
    pub const IS_SERIALIZED: u32 = 0x4;
    /// `TILEPROJECT_FEWBLOCKS`
    pub const FEW_BLOCKS: u32 = 0x8;

    /// Every bit of `flag` is set
    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// Tile-set header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct Dt1Header {
    /// Format version
    pub version: u32,
    /// Tile-set flags
    #[br(map = |raw: u32| Dt1Flags(raw))]
    pub flags: Dt1Flags,
    /// Name the game uses to load the set once, nul terminated
    pub library_name: [u8; 260],
    /// Number of tiles
    pub num_tiles: u32,
    /// Offset of the first tile header
    pub first_tile: u32,
}

impl Dt1Header {
    /// Library name without its terminator
    pub fn library_name(&self) -> String {
        let end = self
            .library_name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(self.library_name.len());
        String::from_utf8_lossy(&self.library_name[..end]).into_owned()
    }
}

/// Floor material of a tile, drives footstep sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialFlags(pub u16);

impl MaterialFlags {
    /// Anything else
    pub const OTHER: u16 = 0x1;
    /// Water
    pub const WATER: u16 = 0x2;
    /// Wooden object
    pub const WOOD_OBJECT: u16 = 0x4;
    /// Inside stone
    pub const INSIDE_STONE: u16 = 0x8;
    /// Outside stone
    pub const OUTSIDE_STONE: u16 = 0x10;
    /// Dirt
    pub const DIRT: u16 = 0x20;
    /// Sand
    pub const SAND: u16 = 0x40;
    /// Wooden floor
    pub const WOOD: u16 = 0x80;
    /// Lava, always bright and animated
    pub const LAVA: u16 = 0x100;
    /// Snow
    pub const SNOW: u16 = 0x400;

    /// Every bit of `flag` is set
    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }
}

/// Tile header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct TileHeader {
    /// Direction of the light
    pub light_direction: u32,
    /// Height of the roof
    pub roof_height: u16,
    /// Floor material
    #[br(map = |raw: u16| MaterialFlags(raw))]
    pub material_flags: MaterialFlags,
    /// Height of the tile image
    pub total_height: i32,
    /// Width of the tile image
    pub width: i32,
    /// Distance from the tile origin to the image bottom
    pub height_to_bottom: i32,
    /// Orientation: floor, wall part, roof...
    pub tile_type: u32,
    /// Main index
    pub style: u32,
    /// Sub index
    pub sequence: u32,
    /// Rarity for floors, frame for animated tiles
    pub rarity: u32,
    /// Transparent color, 24-bit RGB
    pub transparent_color: u32,
    /// Collision and flags of each sub-tile
    pub collision: [u8; SUB_TILES],
    /// Padding
    pub padding: u8,
    /// Handle
    pub handle: u16,
    /// Unknown
    pub unknown_word: u16,
    /// Internal type flags
    pub type_flag: u8,
    /// Unknown
    pub unknown_byte: u8,
    /// Offset of the block table
    pub blocks_offset: u32,
    /// Size of the block data
    pub blocks_size: u32,
    /// Number of blocks
    pub block_count: u32,
    /// Runtime pointers, meaningless on disk
    pub runtime: [u32; 3],
}

impl TileHeader {
    /// Collision flags of sub-tile `(x, y)` in the 5x5 grid
    pub fn sub_tile_flags(&self, x: usize, y: usize) -> Option<u8> {
        if x >= 5 || y >= 5 {
            return None;
        }
        Some(self.collision[y * 5 + x])
    }
}

/// A parsed DT1 file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dt1 {
    header: Dt1Header,
    tiles: Vec<TileHeader>,
}

impl Dt1 {
    /// Parse the tile-set header and every tile header
    pub fn from_bytes(data: &[u8]) -> FormatResult<Self> {
        let header: Dt1Header = Cursor::new(slice_at(data, 0, DT1_HEADER_SIZE)?).read_le()?;
        if header.version != DT1_VERSION {
            return Err(FormatError::UnsupportedVersion {
                format: "DT1",
                version: header.version,
            });
        }
        if header.first_tile as usize != DT1_HEADER_SIZE {
            warn!(
                "DT1 first tile at {}, reading tiles right after the header",
                header.first_tile
            );
        }

        let count = header.num_tiles as usize;
        let table = slice_at(
            data,
            DT1_HEADER_SIZE,
            count.saturating_mul(TILE_HEADER_SIZE),
        )?;
        let mut cursor = Cursor::new(table);
        let tiles = (0..count)
            .map(|_| cursor.read_le::<TileHeader>())
            .collect::<Result<Vec<_>, _>>()?;

        debug!("DT1 '{}': {} tiles", header.library_name(), tiles.len());
        Ok(Self { header, tiles })
    }

    /// Read a whole DT1 stream
    pub fn from_stream<S: ByteStream>(stream: &mut S) -> FormatResult<Self> {
        stream.seek_to(0)?;
        Self::from_bytes(&stream.read_to_vec()?)
    }

    /// Read a DT1 file from disk
    pub fn open(path: impl AsRef<Path>) -> FormatResult<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }

    /// Tile-set header
    pub fn header(&self) -> &Dt1Header {
        &self.header
    }

    /// Tile headers, in file order
    pub fn tiles(&self) -> &[TileHeader] {
        &self.tiles
    }
}
