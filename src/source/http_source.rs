use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::{header, Client, StatusCode};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::traits::{DownloadCallback, DownloadResult, DownloadService, TaskId};
use crate::config::LoaderConfig;
use crate::error::DownloadError;

/// Download service backed by reqwest, running transfers on a tokio runtime.
///
/// Completions are delivered on a blocking-pool thread so callers can decode
/// inside the callback without stalling the async workers.
pub struct HttpDownloadService {
    client: Client,
    runtime: Handle,
    active: Arc<Mutex<HashMap<String, usize>>>,
    next_task_id: AtomicU64,
    shutdown_token: CancellationToken,
    resume_partial: bool,
}

impl HttpDownloadService {
    pub fn new(runtime: Handle, config: &LoaderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::with_client(client, runtime, config.resume_partial))
    }

    pub fn with_client(client: Client, runtime: Handle, resume_partial: bool) -> Self {
        Self {
            client,
            runtime,
            active: Arc::new(Mutex::new(HashMap::new())),
            next_task_id: AtomicU64::new(1),
            shutdown_token: CancellationToken::new(),
            resume_partial,
        }
    }

    /// Cancel in-flight transfers and refuse new ones.
    pub fn shutdown(&self) {
        info!("http download service shutting down");
        self.shutdown_token.cancel();
    }

    /// Number of transfers currently running.
    pub fn active_count(&self) -> usize {
        self.active.lock().values().sum()
    }

    async fn fetch_to_file(
        client: &Client,
        url: &str,
        dest: &Path,
        resume: bool,
    ) -> Result<DownloadResult, DownloadError> {
        let offset = if resume {
            match fs::metadata(dest).await {
                Ok(meta) if meta.is_file() => meta.len(),
                _ => 0,
            }
        } else {
            0
        };

        let mut req = client.get(url);
        if offset > 0 {
            req = req.header(header::RANGE, format!("bytes={}-", offset));
        }

        let resp = req.send().await.map_err(|e| DownloadError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            warn!(
                "http download failed status={} url={} resume_offset={}",
                status.as_u16(),
                url,
                offset
            );
            return Err(DownloadError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // A 200 on a resumed request means the server ignored the range.
        let append = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = if append {
            OpenOptions::new().append(true).open(dest).await?
        } else {
            OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(dest)
                .await?
        };

        let mut bytes_written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(
            "http download status={} url={} append={} bytes={}",
            status.as_u16(),
            url,
            append,
            bytes_written
        );

        Ok(DownloadResult {
            file: Some(dest.to_path_buf()),
            bytes_written,
        })
    }
}

impl DownloadService for HttpDownloadService {
    fn generate_task_id(&self) -> TaskId {
        self.next_task_id.fetch_add(1, Ordering::Relaxed)
    }

    fn is_file_downloading(&self, url: &str) -> bool {
        self.active.lock().contains_key(url)
    }

    fn download(&self, task_id: TaskId, url: &str, dest: &Path, callback: DownloadCallback) {
        let url = url.to_string();
        if self.shutdown_token.is_cancelled() {
            debug!("task {} refused: shutdown in progress", task_id);
            callback(Err(DownloadError::Cancelled { url }));
            return;
        }

        let active = ActiveTransfer::begin(&self.active, &url);
        let client = self.client.clone();
        let token = self.shutdown_token.clone();
        let dest = dest.to_path_buf();
        let resume = self.resume_partial;

        debug!("task {} started url={} dest={}", task_id, url, dest.display());

        self.runtime.spawn(async move {
            let result = tokio::select! {
                r = Self::fetch_to_file(&client, &url, &dest, resume) => r,
                _ = token.cancelled() => Err(DownloadError::Cancelled { url: url.clone() }),
            };

            drop(active);

            if let Err(e) = &result {
                debug!("task {} finished with error: {}", task_id, e);
            }

            let join = tokio::task::spawn_blocking(move || callback(result)).await;
            if let Err(e) = join {
                warn!("task {} completion callback panicked: {}", task_id, e);
            }
        });
    }
}

/// One running transfer in the per-URL active counts. Released on drop, so a
/// task the runtime discards unpolled does not stay counted.
struct ActiveTransfer {
    active: Arc<Mutex<HashMap<String, usize>>>,
    url: String,
}

impl ActiveTransfer {
    fn begin(active: &Arc<Mutex<HashMap<String, usize>>>, url: &str) -> Self {
        *active.lock().entry(url.to_string()).or_insert(0) += 1;
        Self {
            active: Arc::clone(active),
            url: url.to_string(),
        }
    }
}

impl Drop for ActiveTransfer {
    fn drop(&mut self) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&self.url) {
            *count -= 1;
            if *count == 0 {
                active.remove(&self.url);
            }
        }
    }
}
