//! Lockstep Player Core
//!
//! A low-latency video playback core that keeps the displayed frame in
//! sample-accurate lockstep with an external transport clock. Decoding runs
//! on a background thread that fills a bounded, position-aware frame cache
//! ahead of the playhead; the render side reads frames synchronously and
//! holds the last valid image across buffer underruns.
//!
//! Rendering, windowing and the transport client itself are collaborators;
//! this crate owns the cache, the decode scheduler, and the clock-to-frame
//! mapping.

pub mod settings;
pub mod telemetry;
pub mod transport;
pub mod video;

// Re-export commonly used types
pub use settings::{PlayerSettings, SettingsError};
pub use telemetry::{init_logging, LogConfig, PlaybackMetrics, PlaybackStats};
pub use transport::{TransportClock, TransportSnapshot};
pub use video::{
    DecodedFrame, FrameCache, FrameSource, LoadError, VideoDecoder, VideoInfo, VideoPlayer,
};
