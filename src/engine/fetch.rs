// Cache-or-fetch coordination with single-flight downloads per resource.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::cache::{CacheStore, ResourceId};
use super::stats::LoadStats;
use crate::error::{DownloadError, LoadError};
use crate::source::traits::{DownloadResult, DownloadService, TaskId};

#[derive(Debug, Clone)]
pub struct InFlightDownload {
    pub resource_id: ResourceId,
    /// Cache file the download publishes to. Identifiers sharing a file
    /// name share this path, so it is the registry key.
    pub final_path: PathBuf,
    pub temp_path: PathBuf,
    pub task_id: TaskId,
    pub started_at: Instant,
}

/// Downloads currently running, at most one per cache file.
#[derive(Default)]
pub struct InFlightRegistry {
    downloads: Mutex<HashMap<PathBuf, InFlightDownload>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry shared by every coordinator in the process.
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<InFlightRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(InFlightRegistry::new())))
    }

    /// Insert unless the target cache file is already being downloaded.
    /// Check and insert happen under one lock.
    pub fn try_register(&self, download: InFlightDownload) -> bool {
        let mut downloads = self.downloads.lock();
        if let Some(running) = downloads.get(&download.final_path) {
            if running.resource_id != download.resource_id {
                debug!(
                    "{} shares cache file {} with in-flight {}",
                    download.resource_id,
                    download.final_path.display(),
                    running.resource_id
                );
            }
            return false;
        }
        downloads.insert(download.final_path.clone(), download);
        true
    }

    pub fn complete(&self, final_path: &Path) -> Option<InFlightDownload> {
        self.downloads.lock().remove(final_path)
    }

    pub fn contains(&self, final_path: &Path) -> bool {
        self.downloads.lock().contains_key(final_path)
    }

    pub fn len(&self) -> usize {
        self.downloads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a `load` call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStart {
    /// Served from disk; `on_ready` already ran on the caller's thread.
    CacheHit,
    /// A new download was started.
    Started(TaskId),
    /// Another download for the same resource is running. Neither callback
    /// will fire for this call.
    Deduplicated,
}

pub struct FetchCoordinator {
    cache: Arc<CacheStore>,
    service: Arc<dyn DownloadService>,
    in_flight: Arc<InFlightRegistry>,
    stats: Arc<LoadStats>,
}

impl FetchCoordinator {
    /// Coordinator using the process-wide in-flight registry.
    pub fn new(
        cache: Arc<CacheStore>,
        service: Arc<dyn DownloadService>,
        stats: Arc<LoadStats>,
    ) -> Self {
        Self::with_registry(cache, service, InFlightRegistry::global(), stats)
    }

    pub fn with_registry(
        cache: Arc<CacheStore>,
        service: Arc<dyn DownloadService>,
        in_flight: Arc<InFlightRegistry>,
        stats: Arc<LoadStats>,
    ) -> Self {
        Self {
            cache,
            service,
            in_flight,
            stats,
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn in_flight(&self) -> &Arc<InFlightRegistry> {
        &self.in_flight
    }

    /// Resolve `id` to a published cache file, downloading it if needed.
    ///
    /// On a cache hit `on_ready` runs before this returns. Otherwise exactly
    /// one of the callbacks runs later on the download service's thread,
    /// unless the call was deduplicated.
    pub fn load<R, F>(&self, id: &ResourceId, on_ready: R, on_failed: F) -> FetchStart
    where
        R: FnOnce(PathBuf) + Send + 'static,
        F: FnOnce(LoadError) + Send + 'static,
    {
        let final_path = self.cache.resolve(id);
        if self.cache.exists(&final_path) {
            self.stats.record_cache_hit();
            debug!("cache hit {} -> {}", id, final_path.display());
            on_ready(final_path);
            return FetchStart::CacheHit;
        }
        self.stats.record_cache_miss();

        if self.service.is_file_downloading(id.as_str()) {
            debug!("download service reports {} as already downloading", id);
        }

        let temp_path = self.cache.temp_path(&final_path);
        let task_id = self.service.generate_task_id();
        let registered = self.in_flight.try_register(InFlightDownload {
            resource_id: id.clone(),
            final_path: final_path.clone(),
            temp_path: temp_path.clone(),
            task_id,
            started_at: Instant::now(),
        });
        if !registered {
            self.stats.record_deduplicated();
            debug!("{} already in flight, dropping duplicate request", id);
            return FetchStart::Deduplicated;
        }

        self.stats.record_download_started();
        info!("task {} downloading {} -> {}", task_id, id, temp_path.display());

        let completion = Completion {
            cache: Arc::clone(&self.cache),
            in_flight: Arc::clone(&self.in_flight),
            stats: Arc::clone(&self.stats),
            id: id.clone(),
            temp_path: temp_path.clone(),
            final_path,
        };
        let pending = PendingCompletion {
            state: Some((completion, on_ready, on_failed)),
        };
        self.service.download(
            task_id,
            id.as_str(),
            &temp_path,
            Box::new(move |result| pending.finish(result)),
        );

        FetchStart::Started(task_id)
    }
}

/// State captured by a download callback.
struct Completion {
    cache: Arc<CacheStore>,
    in_flight: Arc<InFlightRegistry>,
    stats: Arc<LoadStats>,
    id: ResourceId,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl Completion {
    fn finish<R, F>(
        self,
        result: Result<DownloadResult, DownloadError>,
        on_ready: R,
        on_failed: F,
    ) where
        R: FnOnce(PathBuf),
        F: FnOnce(LoadError),
    {
        let handle = match result {
            Ok(result) => result.file,
            Err(e) if e.is_range_not_satisfiable() => {
                self.stats.record_range_recovered();
                info!("{} already complete on disk (HTTP 416), publishing temp file", self.id);
                None
            }
            Err(e) => {
                self.stats.record_download_failure();
                warn!("download of {} failed: {}", self.id, e);
                self.cache.discard(&self.temp_path);
                self.in_flight.complete(&self.final_path);
                on_failed(LoadError::Download(e));
                return;
            }
        };

        let published = self
            .cache
            .publish(handle.as_deref(), &self.temp_path, &self.final_path);
        // Unregister only after the rename so a racing load sees the file.
        if let Some(download) = self.in_flight.complete(&self.final_path) {
            debug!(
                "task {} for {} finished in {} ms",
                download.task_id,
                self.id,
                download.started_at.elapsed().as_millis()
            );
        }

        match published {
            Ok(()) => on_ready(self.final_path),
            Err(e) => {
                self.stats.record_publish_failure();
                on_failed(e);
            }
        }
    }

    /// The service dropped the callback without calling it. The temp file is
    /// left for a later resume.
    fn abandon<F>(self, on_failed: F)
    where
        F: FnOnce(LoadError),
    {
        self.stats.record_download_failure();
        warn!("download of {} ended without a result", self.id);
        self.in_flight.complete(&self.final_path);
        on_failed(LoadError::Download(DownloadError::Cancelled {
            url: self.id.to_string(),
        }));
    }
}

/// Owns the callbacks until the service reports back. Dropping it unreported
/// releases the registry entry and fails the load.
struct PendingCompletion<R, F>
where
    R: FnOnce(PathBuf),
    F: FnOnce(LoadError),
{
    state: Option<(Completion, R, F)>,
}

impl<R, F> PendingCompletion<R, F>
where
    R: FnOnce(PathBuf),
    F: FnOnce(LoadError),
{
    fn finish(mut self, result: Result<DownloadResult, DownloadError>) {
        if let Some((completion, on_ready, on_failed)) = self.state.take() {
            completion.finish(result, on_ready, on_failed);
        }
    }
}

impl<R, F> Drop for PendingCompletion<R, F>
where
    R: FnOnce(PathBuf),
    F: FnOnce(LoadError),
{
    fn drop(&mut self) {
        if let Some((completion, _, on_failed)) = self.state.take() {
            completion.abandon(on_failed);
        }
    }
}
