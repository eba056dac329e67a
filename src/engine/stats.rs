// Per-session counters: cache behavior, download outcomes, decode variants.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub downloads_started: u64,
    pub deduplicated: u64,
    pub download_failures: u64,
    pub range_recovered: u64,
    pub publish_failures: u64,
    pub nine_patch_decodes: u64,
    pub bitmap_decodes: u64,
    pub decode_failures: u64,
    pub suppressed: u64,
    pub cache_hit_rate: f64,
}

#[derive(Default)]
pub struct LoadStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    downloads_started: AtomicU64,
    deduplicated: AtomicU64,
    download_failures: AtomicU64,
    range_recovered: AtomicU64,
    publish_failures: AtomicU64,
    nine_patch_decodes: AtomicU64,
    bitmap_decodes: AtomicU64,
    decode_failures: AtomicU64,
    suppressed: AtomicU64,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_started(&self) {
        self.downloads_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deduplicated(&self) {
        self.deduplicated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_download_failure(&self) {
        self.download_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// A 416 that was treated as a completed download.
    pub fn record_range_recovered(&self) {
        self.range_recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish_failure(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self, nine_patch: bool) {
        if nine_patch {
            self.nine_patch_decodes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.bitmap_decodes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_suppressed(&self) {
        self.suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let cache_misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = cache_hits + cache_misses;
        let cache_hit_rate = if lookups > 0 {
            cache_hits as f64 / lookups as f64
        } else {
            0.0
        };

        StatsSnapshot {
            cache_hits,
            cache_misses,
            downloads_started: self.downloads_started.load(Ordering::Relaxed),
            deduplicated: self.deduplicated.load(Ordering::Relaxed),
            download_failures: self.download_failures.load(Ordering::Relaxed),
            range_recovered: self.range_recovered.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            nine_patch_decodes: self.nine_patch_decodes.load(Ordering::Relaxed),
            bitmap_decodes: self.bitmap_decodes.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            suppressed: self.suppressed.load(Ordering::Relaxed),
            cache_hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_basic() {
        let stats = LoadStats::new();
        stats.record_cache_hit();
        stats.record_cache_miss();
        stats.record_cache_miss();
        stats.record_cache_miss();
        stats.record_download_started();
        stats.record_deduplicated();
        stats.record_decoded(true);
        stats.record_decoded(false);
        stats.record_decoded(false);
        stats.record_suppressed();

        let snap = stats.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 3);
        assert_eq!(snap.downloads_started, 1);
        assert_eq!(snap.deduplicated, 1);
        assert_eq!(snap.nine_patch_decodes, 1);
        assert_eq!(snap.bitmap_decodes, 2);
        assert_eq!(snap.suppressed, 1);
        assert!((snap.cache_hit_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_hit_rate_without_lookups() {
        let snap = LoadStats::new().snapshot();
        assert_eq!(snap.cache_hit_rate, 0.0);
    }
}
