//! Playback position shared between the render and decode threads
//!
//! The playhead is the frame index the renderer currently wants on screen.
//! The render side writes it (from the transport clock or the fallback
//! timer); the decode thread only reads it. Correctness never depends on
//! the index being synchronized with cache contents, so the index itself
//! uses relaxed ordering.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Shared playback position and state flags
pub struct Playhead {
    /// Frame index the renderer wants to display
    current_frame: AtomicU64,
    /// Last frame index the read path returned a cache hit for (-1 = none)
    last_valid_frame: AtomicI64,
    /// Whether playback is running
    playing: AtomicBool,
    /// Whether an external clock has taken over positioning
    external_sync_active: AtomicBool,
    /// When the external clock last positioned us
    last_sync: Mutex<Option<Instant>>,
    /// Reference point for the wall-clock fallback timer
    last_tick: Mutex<Instant>,
}

impl Playhead {
    pub fn new() -> Self {
        Self {
            current_frame: AtomicU64::new(0),
            last_valid_frame: AtomicI64::new(-1),
            playing: AtomicBool::new(false),
            external_sync_active: AtomicBool::new(false),
            last_sync: Mutex::new(None),
            last_tick: Mutex::new(Instant::now()),
        }
    }

    pub fn current(&self) -> u64 {
        self.current_frame.load(Ordering::Relaxed)
    }

    pub fn set_current(&self, idx: u64) {
        self.current_frame.store(idx, Ordering::Relaxed);
    }

    pub fn last_valid(&self) -> i64 {
        self.last_valid_frame.load(Ordering::Relaxed)
    }

    pub fn set_last_valid(&self, idx: u64) {
        self.last_valid_frame.store(idx as i64, Ordering::Relaxed);
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    /// Record that the external clock positioned the playhead just now.
    pub fn mark_synced(&self) {
        self.external_sync_active.store(true, Ordering::Release);
        *self.last_sync.lock() = Some(Instant::now());
    }

    /// Whether an external sync happened within `window`. While this holds,
    /// the wall-clock fallback timer must not advance the playhead.
    pub fn external_sync_fresh(&self, window: Duration) -> bool {
        if !self.external_sync_active.load(Ordering::Acquire) {
            return false;
        }
        self.last_sync
            .lock()
            .map_or(false, |at| at.elapsed() < window)
    }

    /// Reset the fallback timer reference to now.
    pub fn reset_tick(&self) {
        *self.last_tick.lock() = Instant::now();
    }

    /// Advance the playhead by one frame for every full `frame_duration`
    /// elapsed since the last tick, wrapping at `total_frames`. Returns the
    /// number of frames advanced.
    pub fn fallback_advance(&self, frame_duration: Duration, total_frames: u64) -> u64 {
        if total_frames == 0 || frame_duration.is_zero() {
            return 0;
        }
        let mut last_tick = self.last_tick.lock();
        let now = Instant::now();
        let mut advanced = 0;
        while now.duration_since(*last_tick) >= frame_duration {
            *last_tick += frame_duration;
            let next = (self.current_frame.load(Ordering::Relaxed) + 1) % total_frames;
            self.current_frame.store(next, Ordering::Relaxed);
            advanced += 1;
        }
        advanced
    }
}

impl Default for Playhead {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let playhead = Playhead::new();
        assert_eq!(playhead.current(), 0);
        assert_eq!(playhead.last_valid(), -1);
        assert!(!playhead.is_playing());
        assert!(!playhead.external_sync_fresh(Duration::from_millis(100)));
    }

    #[test]
    fn test_sync_freshness() {
        let playhead = Playhead::new();
        playhead.mark_synced();
        assert!(playhead.external_sync_fresh(Duration::from_millis(100)));
        assert!(!playhead.external_sync_fresh(Duration::ZERO));
    }

    #[test]
    fn test_fallback_advance_wraps() {
        let playhead = Playhead::new();
        playhead.set_current(9);
        playhead.reset_tick();
        std::thread::sleep(Duration::from_millis(25));
        // 25 ms at a 10 ms frame duration advances two frames, 9 -> 1 of 10.
        let advanced = playhead.fallback_advance(Duration::from_millis(10), 10);
        assert!(advanced >= 2);
        assert_eq!(playhead.current(), (9 + advanced) % 10);
    }

    #[test]
    fn test_fallback_advance_noop_before_frame_elapsed() {
        let playhead = Playhead::new();
        playhead.reset_tick();
        let advanced = playhead.fallback_advance(Duration::from_secs(10), 100);
        assert_eq!(advanced, 0);
        assert_eq!(playhead.current(), 0);
    }
}
