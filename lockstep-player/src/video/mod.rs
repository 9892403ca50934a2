//! Video decoding, frame caching, and clock-locked playback
//!
//! Provides video file decoding using FFmpeg via the `ffmpeg-next` crate.
//! Decoded frames are returned as tightly packed RGB24 pixel buffers and
//! cached by absolute frame index so the playhead can move arbitrarily
//! (forward, backward, or across the loop seam) while a background thread
//! keeps the cache filled ahead of it.

mod cache;
mod decoder;
mod frame;
mod player;
mod playhead;
mod sync;

pub use cache::FrameCache;
pub use decoder::{FrameSource, LoadError, VideoDecoder, VideoInfo};
pub use frame::DecodedFrame;
pub use player::VideoPlayer;
pub use playhead::Playhead;
pub use sync::{circular_distance, clock_to_frame, time_to_frame, wrap_frame};
