// On-disk cache of downloaded assets, one file per resource name.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::TEMP_SUFFIX;
use crate::error::LoadError;

/// Remote resource identifier (normally a URL).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    /// Returns `None` for identifiers that cannot name a cache file.
    ///
    /// Names ending in the temp suffix are rejected: they would resolve to
    /// another resource's in-progress download.
    pub fn parse(raw: &str) -> Option<Self> {
        let id = Self(raw.to_string());
        match id.file_name() {
            "" | "." | ".." => None,
            name if name.ends_with(TEMP_SUFFIX) => None,
            _ => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last `/`-separated segment, ignoring trailing empty segments.
    pub fn file_name(&self) -> &str {
        self.0
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub file_name: String,
    pub path: PathBuf,
}

pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open the cache rooted at `dir`, creating the directory if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        debug!("cache directory ready at {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Final cache path for `id`. Does not touch the filesystem.
    pub fn resolve(&self, id: &ResourceId) -> PathBuf {
        self.dir.join(id.file_name())
    }

    pub fn entry(&self, id: &ResourceId) -> CacheEntry {
        CacheEntry {
            file_name: id.file_name().to_string(),
            path: self.resolve(id),
        }
    }

    /// Path a download writes to before it is published.
    pub fn temp_path(&self, final_path: &Path) -> PathBuf {
        let mut name = final_path.as_os_str().to_os_string();
        name.push(TEMP_SUFFIX);
        PathBuf::from(name)
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Atomically move a completed download into place.
    ///
    /// The download's own result handle is tried first, then the temp path
    /// derived from `final_path`.
    pub fn publish(
        &self,
        handle: Option<&Path>,
        temp_path: &Path,
        final_path: &Path,
    ) -> Result<(), LoadError> {
        if let Some(handle) = handle {
            match fs::rename(handle, final_path) {
                Ok(()) => {
                    debug!("published {} -> {}", handle.display(), final_path.display());
                    return Ok(());
                }
                Err(e) => {
                    debug!(
                        "rename of result handle {} failed: {}, trying temp path",
                        handle.display(),
                        e
                    );
                }
            }
        }

        match fs::rename(temp_path, final_path) {
            Ok(()) => {
                debug!("published {} -> {}", temp_path.display(), final_path.display());
                Ok(())
            }
            Err(source) => {
                warn!(
                    "publish failed {} -> {}: {}",
                    temp_path.display(),
                    final_path.display(),
                    source
                );
                Err(LoadError::Publish {
                    temp: temp_path.to_path_buf(),
                    target: final_path.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Best-effort removal of a temp file. Returns whether a file was deleted.
    pub fn discard(&self, temp_path: &Path) -> bool {
        if !temp_path.exists() {
            return false;
        }
        match fs::remove_file(temp_path) {
            Ok(()) => {
                debug!("temp file {} deleted", temp_path.display());
                true
            }
            Err(e) => {
                warn!("failed to delete temp file {}: {}", temp_path.display(), e);
                false
            }
        }
    }
}
