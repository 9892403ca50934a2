//! Bounded, position-aware cache of decoded frames
//!
//! Maps absolute frame index to a decoded RGB24 buffer. The cache is
//! bounded in entry count and keeps an insertion-order list for eviction:
//! entries behind the playhead (on the shorter circular arc) go first,
//! then oldest-by-insertion until the cache is back under capacity.
//!
//! Read-mostly from the render thread, write-mostly from the decode
//! thread; one coarse mutex protects both the map and the order list.
//! Lookups hand out `Arc` clones so eviction can never invalidate a frame
//! a caller is still holding.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::frame::DecodedFrame;
use super::sync::{circular_distance, wrap_frame};

/// Thread-safe frame cache keyed by absolute frame index
pub struct FrameCache {
    capacity: usize,
    total_frames: u64,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    entries: HashMap<u64, Arc<DecodedFrame>>,
    /// Insertion order of the current entries; keys appear exactly once.
    order: VecDeque<u64>,
}

impl FrameCache {
    /// Create a cache holding at most `capacity` frames of a file with
    /// `total_frames` frames.
    pub fn new(capacity: usize, total_frames: u64) -> Self {
        Self {
            capacity,
            total_frames,
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// Look up a frame by index. Does not affect eviction order.
    pub fn get(&self, idx: u64) -> Option<Arc<DecodedFrame>> {
        self.inner.lock().entries.get(&idx).cloned()
    }

    /// Whether a frame is present, without touching it.
    pub fn contains(&self, idx: u64) -> bool {
        self.inner.lock().entries.contains_key(&idx)
    }

    /// Insert a frame at `idx`. An existing entry is overwritten in place
    /// and keeps its position in the eviction order.
    pub fn insert(&self, idx: u64, frame: DecodedFrame) {
        debug_assert!(idx < self.total_frames);
        let mut inner = self.inner.lock();
        if inner.entries.insert(idx, Arc::new(frame)).is_none() {
            inner.order.push_back(idx);
        }
    }

    /// Evict entries until the cache is at or under capacity.
    ///
    /// Entries behind `playhead` on the shorter circular arc are dropped
    /// first; if the cache is still over capacity, the oldest entries by
    /// insertion go next. Returns the number of evicted frames.
    pub fn evict_to_capacity(&self, playhead: u64) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        let total = self.total_frames;

        let stale: Vec<u64> = inner
            .entries
            .keys()
            .copied()
            .filter(|&idx| circular_distance(playhead, idx, total) < 0)
            .collect();
        if !stale.is_empty() {
            for idx in &stale {
                inner.entries.remove(idx);
            }
            let CacheInner { entries, order } = &mut *inner;
            order.retain(|idx| entries.contains_key(idx));
        }

        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }

        before - inner.entries.len()
    }

    /// Length of the contiguous cached run starting at `start`, probing at
    /// most `max` frames and wrapping at the file boundary.
    pub fn buffered_run_length(&self, start: u64, max: u64) -> u64 {
        let inner = self.inner.lock();
        let mut run = 0;
        while run < max {
            let idx = wrap_frame(start as i64 + run as i64, self.total_frames);
            if !inner.entries.contains_key(&idx) {
                break;
            }
            run += 1;
        }
        run
    }

    /// Number of cached frames.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of cached frames.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total frame count of the loaded file.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Drop all cached frames.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(idx: u64) -> DecodedFrame {
        let width = 4;
        let height = 4;
        let data = vec![(idx % 251) as u8; DecodedFrame::expected_size(width, height)];
        DecodedFrame::new(data, width, height, idx as f64 / 25.0)
    }

    #[test]
    fn test_insert_and_get() {
        let cache = FrameCache::new(8, 300);
        cache.insert(5, frame(5));
        let got = cache.get(5).unwrap();
        assert_eq!(got.data[0], 5);
        assert!(cache.get(6).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let cache = FrameCache::new(8, 300);
        cache.insert(5, frame(5));
        cache.insert(5, frame(7));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(5).unwrap().data[0], 7);
        // An overwrite must not duplicate the key in the eviction order:
        // filling the cache and evicting repeatedly stays consistent.
        for i in 0..8 {
            cache.insert(i, frame(i));
        }
        cache.evict_to_capacity(0);
        assert!(cache.len() <= 8);
    }

    #[test]
    fn test_evict_behind_playhead_first() {
        let cache = FrameCache::new(300, 300);
        for i in 0..20 {
            cache.insert(i, frame(i));
        }
        // Playhead at 10: frames 0..10 are behind, 10..20 are ahead.
        let evicted = cache.evict_to_capacity(10);
        assert_eq!(evicted, 10);
        for i in 0..10 {
            assert!(!cache.contains(i), "frame {i} should be evicted");
        }
        for i in 10..20 {
            assert!(cache.contains(i), "frame {i} should survive");
        }
    }

    #[test]
    fn test_evict_behind_across_seam() {
        let cache = FrameCache::new(300, 300);
        cache.insert(295, frame(295));
        cache.insert(299, frame(299));
        cache.insert(0, frame(0));
        cache.insert(5, frame(5));
        // Playhead just before the seam: 295 is behind, the rest ahead.
        cache.evict_to_capacity(298);
        assert!(!cache.contains(295));
        assert!(cache.contains(299));
        assert!(cache.contains(0));
        assert!(cache.contains(5));
    }

    #[test]
    fn test_evict_oldest_when_over_capacity() {
        let cache = FrameCache::new(4, 300);
        for i in 0..6 {
            cache.insert(i, frame(i));
        }
        // Everything is at or ahead of playhead 0, so the overflow comes
        // out of the oldest insertions.
        cache.evict_to_capacity(0);
        assert_eq!(cache.len(), 4);
        assert!(!cache.contains(0) || !cache.contains(1));
        assert!(cache.contains(4));
        assert!(cache.contains(5));
    }

    #[test]
    fn test_buffered_run_length() {
        let cache = FrameCache::new(300, 300);
        for i in 0..10 {
            cache.insert(i, frame(i));
        }
        assert_eq!(cache.buffered_run_length(0, 150), 10);
        assert_eq!(cache.buffered_run_length(0, 5), 5);
        assert_eq!(cache.buffered_run_length(5, 150), 5);
        assert_eq!(cache.buffered_run_length(10, 150), 0);
        // A gap stops the run.
        cache.insert(12, frame(12));
        assert_eq!(cache.buffered_run_length(0, 150), 10);
    }

    #[test]
    fn test_buffered_run_length_wraps_at_seam() {
        let cache = FrameCache::new(300, 300);
        cache.insert(298, frame(298));
        cache.insert(299, frame(299));
        cache.insert(0, frame(0));
        cache.insert(1, frame(1));
        assert_eq!(cache.buffered_run_length(298, 10), 4);
    }

    #[test]
    fn test_run_length_monotone_in_max() {
        let cache = FrameCache::new(300, 300);
        for i in 0..7 {
            cache.insert(i, frame(i));
        }
        let mut prev = 0;
        for max in 0..12 {
            let run = cache.buffered_run_length(0, max);
            assert!(run >= prev);
            prev = run;
        }
    }

    #[test]
    fn test_clear() {
        let cache = FrameCache::new(8, 300);
        cache.insert(1, frame(1));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.buffered_run_length(1, 5), 0);
    }

    #[test]
    fn test_eviction_preserves_held_frames() {
        let cache = FrameCache::new(4, 300);
        cache.insert(0, frame(0));
        let held = cache.get(0).unwrap();
        cache.evict_to_capacity(10);
        assert!(!cache.contains(0));
        // The caller's handle stays valid after eviction.
        assert_eq!(held.data[0], 0);
    }
}
