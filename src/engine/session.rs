// Per-owner load session: fetch, decode and lifecycle-gated delivery.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use super::cache::{CacheStore, ResourceId};
use super::decoder::{ArtifactDecoder, DecodeRequest, DecodedArtifact};
use super::fetch::{FetchCoordinator, FetchStart, InFlightRegistry};
use super::stats::{LoadStats, StatsSnapshot};
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::lifecycle::LifecycleGate;
use crate::source::traits::DownloadService;

/// Receives the outcome of a load. At most one method fires per `load`.
pub trait LoadCallback: Send + Sync {
    fn on_drawable_ready(&self, artifact: DecodedArtifact);
    fn on_load_failed(&self);
}

/// How a `load` call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStart {
    /// The identifier names no cache file; nothing happens.
    Ignored,
    /// Served from disk; the callback (if not suppressed) already ran.
    CacheHit,
    /// A download is running; the callback fires when it completes.
    Downloading,
    /// The same resource is already downloading; this call gets no callback.
    Deduplicated,
}

struct SessionInner {
    fetcher: FetchCoordinator,
    decoder: ArtifactDecoder,
    gate: Arc<LifecycleGate>,
    callback: Arc<dyn LoadCallback>,
    target_density: u32,
    stats: Arc<LoadStats>,
}

/// Maps a requested URL to the one actually fetched and cached, e.g. to
/// point at a CDN mirror.
pub type UrlRewrite = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub struct LoadSession {
    inner: Arc<SessionInner>,
    rewrite: Option<UrlRewrite>,
}

impl LoadSession {
    /// Create a session for one owner.
    ///
    /// `target_density` comes from the owner's display and is fixed for the
    /// session. The cache directory is created if it does not exist.
    pub fn new(
        config: &LoaderConfig,
        target_density: u32,
        service: Arc<dyn DownloadService>,
        gate: Arc<LifecycleGate>,
        callback: Arc<dyn LoadCallback>,
    ) -> Result<Self> {
        Self::with_registry(
            config,
            target_density,
            service,
            InFlightRegistry::global(),
            gate,
            callback,
        )
    }

    /// Same as [`LoadSession::new`] with an explicit in-flight registry.
    pub fn with_registry(
        config: &LoaderConfig,
        target_density: u32,
        service: Arc<dyn DownloadService>,
        in_flight: Arc<InFlightRegistry>,
        gate: Arc<LifecycleGate>,
        callback: Arc<dyn LoadCallback>,
    ) -> Result<Self> {
        let cache = Arc::new(CacheStore::new(&config.cache_dir())?);
        let stats = Arc::new(LoadStats::new());
        let fetcher = FetchCoordinator::with_registry(cache, service, in_flight, stats.clone());

        info!(
            "load session ready cache_dir={} density {} -> {}",
            config.cache_dir().display(),
            config.reference_density,
            target_density
        );

        Ok(Self {
            inner: Arc::new(SessionInner {
                fetcher,
                decoder: ArtifactDecoder::new(config.reference_density),
                gate,
                callback,
                target_density,
                stats,
            }),
            rewrite: None,
        })
    }

    /// Rewrite every URL before it is named, cached and downloaded.
    pub fn with_url_rewrite<F>(mut self, rewrite: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.rewrite = Some(Arc::new(rewrite));
        self
    }

    /// Load `url` and report the drawable through the session callback.
    pub fn load(&self, url: &str) -> LoadStart {
        let rewritten = self.rewrite.as_ref().map(|rewrite| rewrite(url));
        let url = match rewritten.as_deref() {
            Some(target) => {
                if target != url {
                    debug!("rewrote {} -> {}", url, target);
                }
                target
            }
            None => url,
        };

        let id = match ResourceId::parse(url) {
            Some(id) => id,
            None => {
                debug!("ignoring load of unusable resource id {:?}", url);
                return LoadStart::Ignored;
            }
        };

        let ready = Arc::clone(&self.inner);
        let failed = Arc::clone(&self.inner);
        let start = self.inner.fetcher.load(
            &id,
            move |path| ready.deliver_ready(&path),
            move |err| failed.deliver_failed(err),
        );

        match start {
            FetchStart::CacheHit => LoadStart::CacheHit,
            FetchStart::Started(_) => LoadStart::Downloading,
            FetchStart::Deduplicated => LoadStart::Deduplicated,
        }
    }

    /// Detach from the owner's lifecycle.
    pub fn teardown(&self) {
        self.inner.gate.on_teardown();
    }

    pub fn target_density(&self) -> u32 {
        self.inner.target_density
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        self.inner.fetcher.cache()
    }

    pub fn gate(&self) -> &Arc<LifecycleGate> {
        &self.inner.gate
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }
}

impl SessionInner {
    fn suppressed(&self, outcome: &str) -> bool {
        if self.gate.is_suppressed() {
            self.stats.record_suppressed();
            debug!("owner gone, dropping {} callback", outcome);
            return true;
        }
        false
    }

    fn deliver_ready(&self, path: &Path) {
        // Skip decoding entirely when nobody will receive the result.
        if self.suppressed("ready") {
            return;
        }

        let request = DecodeRequest {
            path: path.to_path_buf(),
            target_density: self.target_density,
        };
        match self.decoder.decode(&request) {
            Ok(artifact) => {
                self.stats.record_decoded(artifact.is_nine_patch());
                debug!(
                    "decoded {} as {} {}x{}",
                    path.display(),
                    if artifact.is_nine_patch() { "nine-patch" } else { "bitmap" },
                    artifact.width(),
                    artifact.height()
                );
                if self.suppressed("ready") {
                    return;
                }
                self.callback.on_drawable_ready(artifact);
            }
            Err(e) => {
                self.stats.record_decode_failure();
                warn!("{}", e);
                if self.suppressed("failed") {
                    return;
                }
                self.callback.on_load_failed();
            }
        }
    }

    fn deliver_failed(&self, err: LoadError) {
        debug!("load failed: {}", err);
        if self.suppressed("failed") {
            return;
        }
        self.callback.on_load_failed();
    }
}
