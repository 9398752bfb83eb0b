//! Archive open options

use crate::compression::CompressionRegistry;
use crate::mpq::tables::{LOCALE_NEUTRAL, PLATFORM_DEFAULT};
use std::sync::Arc;

/// Options applied when opening an archive
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Preferred locale for name lookups (Windows LANGID, 0 = neutral)
    pub locale: u16,

    /// Platform for name lookups (0 = any)
    pub platform: u16,

    /// Memory-map the archive file instead of reading through a file handle
    pub use_mmap: bool,

    /// Sector decompression methods
    pub registry: Arc<CompressionRegistry>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            locale: LOCALE_NEUTRAL,
            platform: PLATFORM_DEFAULT,
            use_mmap: true,
            registry: Arc::new(CompressionRegistry::with_defaults()),
        }
    }
}

impl ArchiveOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preferred locale
    #[must_use]
    pub const fn with_locale(mut self, locale: u16) -> Self {
        self.locale = locale;
        self
    }

    /// Set the platform
    #[must_use]
    pub const fn with_platform(mut self, platform: u16) -> Self {
        self.platform = platform;
        self
    }

    /// Enable or disable memory mapping
    #[must_use]
    pub const fn with_mmap(mut self, enable: bool) -> Self {
        self.use_mmap = enable;
        self
    }

    /// Use a specific compression registry
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CompressionRegistry>) -> Self {
        self.registry = registry;
        self
    }
}
