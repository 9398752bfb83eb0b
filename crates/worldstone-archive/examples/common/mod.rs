#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Install a stderr subscriber honouring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Map an archive name (`data\global\x.dc6`) to a path under `root`.
pub fn output_path(root: &Path, name: &str) -> PathBuf {
    name.split(['\\', '/'])
        .filter(|part| !part.is_empty() && *part != "..")
        .fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Print a hex dump of `bytes`, capped at `max_bytes`.
pub fn hex_dump(bytes: &[u8], max_bytes: usize) {
    let len = bytes.len().min(max_bytes);
    for (i, chunk) in bytes[..len].chunks(16).enumerate() {
        let hex = hex::encode(chunk);
        let spaced: Vec<&str> = (0..hex.len())
            .step_by(2)
            .map(|at| &hex[at..at + 2])
            .collect();
        let ascii: String = chunk
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect();
        println!("  {:08x}  {:<48}  {ascii}", i * 16, spaced.join(" "));
    }
    if bytes.len() > max_bytes {
        println!("  ... ({} more bytes)", bytes.len() - max_bytes);
    }
}
