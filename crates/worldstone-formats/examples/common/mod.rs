#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::Path;
use tracing_subscriber::EnvFilter;
use worldstone_archive::Archive;

/// Install a stderr subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read `name` from `archive` when one is given, from disk otherwise.
pub fn read_input(archive: Option<&Archive>, name: &str) -> Result<Vec<u8>> {
    match archive {
        Some(archive) => archive
            .read_file(name)
            .with_context(|| format!("failed to read {name} from the archive")),
        None => std::fs::read(Path::new(name)).with_context(|| format!("failed to read {name}")),
    }
}
