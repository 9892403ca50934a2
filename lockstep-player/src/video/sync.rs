//! Clock-to-frame mapping and circular frame arithmetic
//!
//! Playback position is cyclic: frame indices are modular over the total
//! frame count so the player loops seamlessly at the file boundary. Every
//! ahead/behind comparison in the player goes through [`circular_distance`];
//! plain integer comparisons misbehave near the loop seam.

/// Wrap a possibly-negative frame index into `[0, total_frames)`.
pub fn wrap_frame(idx: i64, total_frames: u64) -> u64 {
    debug_assert!(total_frames > 0);
    idx.rem_euclid(total_frames as i64) as u64
}

/// Shortest signed distance from `from` to `to` on a cycle of
/// `total_frames` frames.
///
/// The result lies in `(-total_frames/2, total_frames/2]`; the exact
/// half-way tie resolves toward the positive (ahead) direction.
pub fn circular_distance(from: u64, to: u64, total_frames: u64) -> i64 {
    debug_assert!(total_frames > 0);
    let total = total_frames as i64;
    let raw = (to as i64 - from as i64).rem_euclid(total);
    if raw > total / 2 {
        raw - total
    } else {
        raw
    }
}

/// Map a timestamp in seconds to a frame index, wrapping into the file's
/// duration in both directions and clamping to the valid index range.
pub fn time_to_frame(seconds: f64, fps: f64, duration: f64, total_frames: u64) -> u64 {
    if total_frames == 0 || fps <= 0.0 {
        return 0;
    }
    let wrapped = if duration > 0.0 {
        seconds.rem_euclid(duration)
    } else {
        0.0
    };
    let max = (total_frames - 1) as f64;
    (wrapped * fps).floor().clamp(0.0, max) as u64
}

/// Map an external transport position to a video frame index.
///
/// `clock_frame` is the transport's sample counter at `sample_rate` Hz.
/// A positive `offset_ms` delays the video relative to the clock; when the
/// offset pushes the video time below zero it wraps around the file
/// duration, and when it pushes past the end the position is pinned one
/// frame short of the end.
pub fn clock_to_frame(
    clock_frame: u64,
    sample_rate: u32,
    offset_ms: f64,
    fps: f64,
    duration: f64,
    total_frames: u64,
) -> u64 {
    if total_frames == 0 || sample_rate == 0 || fps <= 0.0 {
        return 0;
    }
    let clock_time = (clock_frame as f64 / sample_rate as f64).clamp(0.0, duration.max(0.0));
    let mut video_time = clock_time - offset_ms / 1000.0;
    if video_time < 0.0 {
        video_time = if duration > 0.0 {
            video_time.rem_euclid(duration)
        } else {
            0.0
        };
    } else if video_time > duration {
        video_time = (duration - 1.0 / fps).max(0.0);
    }
    let max = (total_frames - 1) as f64;
    (video_time * fps).floor().clamp(0.0, max) as u64
}
