use std::path::PathBuf;

use serde::Deserialize;

/// Pixel density the remote assets are authored at (xxhdpi).
pub const REFERENCE_DENSITY: u32 = 480;

/// Name of the cache subdirectory under the process cache root.
pub const CACHE_SUBDIR: &str = "nine-patch";

/// Suffix appended to the final cache path while a download is in progress.
pub const TEMP_SUFFIX: &str = ".tmp";

/// HTTP status meaning the requested range is already fully on disk.
pub const HTTP_RANGE_NOT_SATISFIABLE: u16 = 416;

/// Per-request timeout for the HTTP download service.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration for the loader.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Process cache root; the loader owns `<cache_root>/nine-patch`.
    pub cache_root: String,
    /// Density the source assets are authored at.
    pub reference_density: u32,
    /// Resume an existing `.tmp` file with a Range request instead of starting over.
    pub resume_partial: bool,
    /// Timeout for a single download request, in seconds.
    pub request_timeout_secs: u64,
}

impl LoaderConfig {
    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_root).join(CACHE_SUBDIR)
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().to_string_lossy().into_owned(),
            reference_density: REFERENCE_DENSITY,
            resume_partial: true,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}
