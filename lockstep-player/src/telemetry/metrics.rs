//! Playback counters
//!
//! Lock-free counters updated from the decode and render threads. The
//! render side's miss counter doubles as the dropped-frame signal: a miss
//! means the read path had to repeat the previous image.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free playback counters shared between threads
#[derive(Debug, Default)]
pub struct PlaybackMetrics {
    frames_decoded: AtomicU64,
    seeks: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    frames_evicted: AtomicU64,
}

/// A point-in-time copy of the playback counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    /// Frames decoded since load (preload included)
    pub frames_decoded: u64,
    /// Container seeks issued by the decode scheduler
    pub seeks: u64,
    /// Read-path requests served with the exact frame
    pub cache_hits: u64,
    /// Read-path requests that had to fall back or return nothing
    pub cache_misses: u64,
    /// Frames evicted from the cache
    pub frames_evicted: u64,
}

impl PlaybackStats {
    /// Fraction of read-path requests served with the exact frame (0.0-1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl PlaybackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seek(&self) {
        self.seeks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evicted(&self, count: u64) {
        if count > 0 {
            self.frames_evicted.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> PlaybackStats {
        PlaybackStats {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            seeks: self.seeks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            frames_evicted: self.frames_evicted.load(Ordering::Relaxed),
        }
    }
}
