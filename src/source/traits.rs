use std::path::{Path, PathBuf};

use crate::error::DownloadError;

/// Identifier handed out by a download service for one transfer.
pub type TaskId = u64;

/// What a finished transfer hands back.
#[derive(Debug, Clone, Default)]
pub struct DownloadResult {
    /// The file the service actually wrote, when it reports one.
    pub file: Option<PathBuf>,
    /// Bytes written by this transfer (excluding any resumed prefix).
    pub bytes_written: u64,
}

/// One-shot completion, invoked on whichever thread finished the transfer.
pub type DownloadCallback = Box<dyn FnOnce(Result<DownloadResult, DownloadError>) + Send + 'static>;

pub trait DownloadService: Send + Sync {
    fn generate_task_id(&self) -> TaskId;

    /// Auxiliary hint only. Callers must not treat it as authoritative.
    fn is_file_downloading(&self, url: &str) -> bool;

    /// Start fetching `url` into `dest`. The callback fires exactly once.
    fn download(&self, task_id: TaskId, url: &str, dest: &Path, callback: DownloadCallback);
}
