//! Extract entries from an MPQ archive.
//!
//! Usage:
//!   cargo run --example mpq_extract -p worldstone-archive -- d2data.mpq -o out
//!   cargo run --example mpq_extract -p worldstone-archive -- d2data.mpq \
//!       --file "data\global\palette\act1\pal.dat"
//!
//! Without `--file`, every name of the archive's `(listfile)` (plus any
//! `--listfile` given) is extracted. Failing entries are reported with their
//! error kind and the scan continues.

mod common;

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use worldstone_archive::mpq::parse_listfile;
use worldstone_archive::{Archive, ArchiveOptions, ErrorKind};

#[derive(Debug, Parser)]
#[command(about = "Extract entries from a Diablo II MPQ archive")]
struct Args {
    /// Archive to read
    archive: PathBuf,

    /// Directory to write extracted entries into; entries are only checked when absent
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Extract a single entry and hex dump its start
    #[arg(short, long)]
    file: Option<String>,

    /// Additional listfile with one name per line
    #[arg(long)]
    listfile: Option<PathBuf>,

    /// Preferred locale (Windows LANGID)
    #[arg(long, default_value_t = 0)]
    locale: u16,

    /// Read through a file handle instead of memory mapping
    #[arg(long)]
    no_mmap: bool,
}

fn main() -> Result<()> {
    common::init_tracing();
    let args = Args::parse();

    let options = ArchiveOptions::new()
        .with_locale(args.locale)
        .with_mmap(!args.no_mmap);
    let archive = Archive::open_with(&args.archive, options)
        .with_context(|| format!("failed to open {}", args.archive.display()))?;
    info!(
        "{}: {} blocks, {} hash slots, sector size {}",
        args.archive.display(),
        archive.block_count(),
        archive.hash_table_size(),
        archive.header().sector_size()
    );

    if let Some(name) = &args.file {
        let data = archive
            .read_file(name)
            .with_context(|| format!("failed to read {name}"))?;
        println!("{name}: {} bytes", data.len());
        common::hex_dump(&data, 256);
        if let Some(root) = &args.output {
            write_entry(root, name, &data)?;
        }
        return Ok(());
    }

    let mut names = match archive.list_files() {
        Ok(names) => names,
        Err(e) => {
            warn!("no usable (listfile): {e}");
            Vec::new()
        }
    };
    if let Some(path) = &args.listfile {
        let extra = std::fs::read(path)
            .with_context(|| format!("failed to read listfile {}", path.display()))?;
        names.extend(parse_listfile(&extra));
    }
    names.sort_unstable_by_key(|name| name.to_ascii_lowercase());
    names.dedup_by_key(|name| name.to_ascii_lowercase());

    let mut extracted = 0usize;
    let mut failures: BTreeMap<ErrorKind, usize> = BTreeMap::new();
    for name in &names {
        match archive.read_file(name) {
            Ok(data) => {
                if let Some(root) = &args.output {
                    write_entry(root, name, &data)?;
                }
                extracted += 1;
            }
            Err(e) => {
                println!("FAILED {name}: {} ({e})", e.kind());
                *failures.entry(e.kind()).or_default() += 1;
            }
        }
    }

    println!("{extracted} of {} entries extracted", names.len());
    for (kind, count) in failures {
        println!("  {count} x {kind}");
    }
    Ok(())
}

fn write_entry(root: &std::path::Path, name: &str, data: &[u8]) -> Result<()> {
    let path = common::output_path(root, name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))
}
