//! Decoders for Diablo II sprite, palette and animation formats.
//!
//! Every decoder produces 8-bit palette indices; a [`Palette`] or one of
//! the [`Pl2`] shift tables turns them into colors.
//!
//! - **Sprites**: [`Dc6Decoder`] for run-length encoded frames,
//!   [`DccDecoder`] for cell-compressed directions
//! - **Animation**: [`Cof`] layer stacking and draw order
//! - **Tiles**: [`Dt1`] tile-set headers
//! - **Palettes**: [`Palette`], [`PalShift`] and [`Pl2`]
//! - **Images**: [`ImageView`], [`ImageBuffer`], [`ImageProvider`] and the
//!   [`export`] helpers writing Netpbm files
//!
//! Input comes from byte slices, files, or any
//! [`ByteStream`](worldstone_archive::ByteStream), including MPQ entries.
//!
//! # Example
//!
//! ```no_run
//! use worldstone_archive::Archive;
//! use worldstone_formats::{Dc6Decoder, Palette, export};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let archive = Archive::open("d2data.mpq")?;
//! let palette = Palette::from_bgr(&archive.read_file("data\\global\\palette\\act1\\pal.dat")?)?;
//! let mut stream = archive.open_file("data\\global\\ui\\cursor\\hand.dc6")?;
//! let sprite = Dc6Decoder::from_stream(&mut stream)?;
//! let frame = sprite.decode_frame(0)?;
//! export::save_ppm("hand.ppm", &frame.view(), &palette)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_precision_loss)]

pub mod aabb;
pub mod cof;
pub mod dc6;
pub mod dcc;
pub mod dt1;
pub mod error;
pub mod export;
pub mod image;
pub mod palette;

pub use aabb::Aabb;
pub use cof::{Cof, CofHeader, CofLayer, Keyframe};
pub use dc6::{Dc6Decoder, Dc6FrameHeader, Dc6Header};
pub use dcc::{DccDecoder, DccDirection, DccFrame, FrameCells};
pub use dt1::{Dt1, Dt1Header, TileHeader};
pub use error::{FormatError, FormatResult};
pub use image::{
    ImageAllocator, ImageBuffer, ImageProvider, ImageView, ImageViewMut, SimpleImageAllocator,
};
pub use palette::{Color, PalShift, Palette, Pl2};
