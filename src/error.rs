use std::path::PathBuf;

use thiserror::Error;

use crate::config::HTTP_RANGE_NOT_SATISFIABLE;

/// Failures reported by a download service.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP error {status} downloading {url}")]
    HttpStatus { status: u16, url: String },

    #[error("transport error downloading {url}: {message}")]
    Transport { url: String, message: String },

    #[error("download of {url} cancelled")]
    Cancelled { url: String },

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),
}

impl DownloadError {
    /// Numeric failure code: the HTTP status when there is one, otherwise 0.
    pub fn code(&self) -> u16 {
        match self {
            DownloadError::HttpStatus { status, .. } => *status,
            _ => 0,
        }
    }

    /// A 416 means a resumed download already covers the whole body.
    pub fn is_range_not_satisfiable(&self) -> bool {
        self.code() == HTTP_RANGE_NOT_SATISFIABLE
    }
}

/// Failures of a single load. Callers only ever see a generic failure signal;
/// the detail is for logs.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error("failed to publish {} -> {}: {source}", temp.display(), target.display())]
    Publish {
        temp: PathBuf,
        target: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
}
