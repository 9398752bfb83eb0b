//! Print the frame headers of a DC6 sprite and dump its frames.
//!
//! Usage:
//!   cargo run --example dc6_extract -p worldstone-formats -- hand.dc6 -o out
//!   cargo run --example dc6_extract -p worldstone-formats -- \
//!       --archive d2data.mpq "data\global\ui\cursor\hand.dc6" \
//!       --palette "data\global\palette\act1\pal.dat" -o out
//!
//! Frames are written as `<direction>_<frame>.ppm` when a palette is given,
//! as grayscale `.pgm` otherwise. A frame that fails to decode is reported
//! with its error kind and skipped.

mod common;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use worldstone_archive::{Archive, ArchiveOptions};
use worldstone_formats::export::{save_pgm, save_ppm};
use worldstone_formats::{Dc6Decoder, Palette};

#[derive(Debug, Parser)]
#[command(about = "Inspect and extract the frames of a DC6 sprite")]
struct Args {
    /// Sprite file, or entry name when `--archive` is given
    sprite: String,

    /// MPQ archive holding the sprite and palette
    #[arg(short, long)]
    archive: Option<PathBuf>,

    /// Palette file (`pal.dat`), or entry name when `--archive` is given
    #[arg(short, long)]
    palette: Option<String>,

    /// Directory to write frames into; only headers are printed when absent
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let archive = args
        .archive
        .as_ref()
        .map(|path| {
            Archive::open_with(path, ArchiveOptions::default())
                .with_context(|| format!("failed to open {}", path.display()))
        })
        .transpose()?;

    let data = common::read_input(archive.as_ref(), &args.sprite)?;
    let decoder = Dc6Decoder::from_bytes(data).context("not a DC6 sprite")?;
    let palette = args
        .palette
        .as_deref()
        .map(|name| -> Result<Palette> {
            let bytes = common::read_input(archive.as_ref(), name)?;
            Palette::from_bgr(&bytes).context("invalid palette")
        })
        .transpose()?;

    let header = decoder.header();
    println!(
        "{}: version {}.{}, {} directions x {} frames",
        args.sprite,
        header.version,
        header.sub_version,
        header.directions,
        header.frames_per_dir
    );
    let per_dir = header.frames_per_dir.max(1) as usize;
    for (index, frame) in decoder.frame_headers().iter().enumerate() {
        println!(
            "  [{}:{}] {}x{} at ({}, {}), flip {}, {} bytes",
            index / per_dir,
            index % per_dir,
            frame.width,
            frame.height,
            frame.offset_x,
            frame.offset_y,
            frame.flip,
            frame.length
        );
    }

    let Some(root) = &args.output else {
        return Ok(());
    };
    std::fs::create_dir_all(root).with_context(|| format!("failed to create {}", root.display()))?;

    let mut written = 0usize;
    for index in 0..decoder.frame_count() {
        let image = match decoder.decode_frame(index) {
            Ok(image) => image,
            Err(e) => {
                warn!("frame {index}: {} ({e})", e.kind());
                continue;
            }
        };
        if image.is_empty() {
            continue;
        }
        let stem = format!("{}_{}", index / per_dir, index % per_dir);
        match &palette {
            Some(palette) => save_ppm(root.join(format!("{stem}.ppm")), &image.view(), palette)?,
            None => save_pgm(root.join(format!("{stem}.pgm")), &image.view())?,
        }
        written += 1;
    }
    info!("{written} frames written to {}", root.display());
    Ok(())
}
