//! Video decoder gateway using FFmpeg
//!
//! Wraps the demuxer, codec and scaler behind a single-threaded gateway
//! that translates between absolute frame indices and container
//! timestamps. Frames come out as tightly packed RGB24 via the `ffmpeg-next`
//! crate's software scaler; hardware-decoded pictures are transferred to
//! system memory first so the output contract holds either way.
//!
//! The underlying FFmpeg contexts are not reentrant. A `VideoDecoder` is
//! owned by exactly one thread at a time: the loading thread during
//! preload, then the decode thread for the rest of its life.

use std::path::Path;

use thiserror::Error;

use super::frame::DecodedFrame;

/// Errors that can occur while opening a media file.
///
/// These are the only errors that reach the caller; runtime decode
/// failures are logged and self-healed by reseeking.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open media file {path}: {source}")]
    OpenFailed {
        path: String,
        source: ffmpeg_next::Error,
    },
    #[error("no video stream found in file")]
    NoVideoStream,
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("decoder setup failed: {0}")]
    SetupFailed(#[from] ffmpeg_next::Error),
}

/// Immutable description of a loaded video stream
#[derive(Debug, Clone)]
pub struct VideoInfo {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Total frame count (`floor(duration * fps)`)
    pub total_frames: u64,
    /// Source pixel format before RGB24 conversion
    pub pixel_format: ffmpeg_next::format::Pixel,
    /// Stream time base as a double, for PTS conversion
    pub time_base: f64,
}

/// Sequential source of decoded frames.
///
/// Seam between the scheduler and the media library: the production
/// implementation is [`VideoDecoder`]; tests drive the scheduler with a
/// synthetic source.
pub trait FrameSource {
    /// Position the stream so the next decoded picture is at or shortly
    /// before `idx`. Returns false if the container refused the seek; the
    /// stream then continues from its current position.
    fn seek_to_frame(&mut self, idx: u64) -> bool;

    /// Decode the next picture, returning its best-effort frame index and
    /// pixels, or `None` at end of stream or on a decode failure.
    fn decode_next(&mut self) -> Option<(u64, DecodedFrame)>;

    /// Drop codec-internal buffered pictures.
    fn flush(&mut self);

    /// Whether the stream has reached end of file.
    fn is_eof(&self) -> bool;
}

/// Video decoder that reads frames from a media file
pub struct VideoDecoder {
    /// The input format context
    input: ffmpeg_next::format::context::Input,
    /// Index of the video stream
    stream_index: usize,
    /// Video decoder
    decoder: ffmpeg_next::decoder::Video,
    /// Scaler converting decoded pictures to RGB24
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    fps: f64,
    duration: f64,
    total_frames: u64,
    /// Stream time base as a double, for PTS conversion
    time_base: f64,
    /// Source pixel format as negotiated at open
    pixel_format: ffmpeg_next::format::Pixel,
    /// Whether the demuxer has been fully drained
    eof: bool,
    /// Whether the codec has been sent the end-of-stream marker
    sent_eof: bool,
    /// Highest frame index actually produced; the container's real frame
    /// count when it disagrees with `total_frames`
    max_seen_index: u64,
}

impl VideoDecoder {
    /// Open a video file for decoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        ffmpeg_next::init()?;

        let path = path.as_ref();
        let input = ffmpeg_next::format::input(&path).map_err(|source| LoadError::OpenFailed {
            path: path.to_string_lossy().into_owned(),
            source,
        })?;

        let stream = input
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(LoadError::NoVideoStream)?;
        let stream_index = stream.index();

        let time_base = stream.time_base();
        let time_base = time_base.numerator() as f64 / time_base.denominator() as f64;

        let frame_rate = stream.avg_frame_rate();
        let fps = if frame_rate.denominator() > 0 && frame_rate.numerator() > 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            25.0
        };

        let duration = if stream.duration() > 0 {
            stream.duration() as f64 * time_base
        } else if input.duration() > 0 {
            input.duration() as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let parameters = stream.parameters();
        let codec = ffmpeg_next::decoder::find(parameters.id())
            .ok_or_else(|| LoadError::UnsupportedCodec(format!("{:?}", parameters.id())))?;
        let codec_name = codec.name().to_string();

        let context = ffmpeg_next::codec::context::Context::from_parameters(parameters)?;
        let decoder = context
            .decoder()
            .video()
            .map_err(|_| LoadError::UnsupportedCodec(codec_name.clone()))?;

        let width = decoder.width();
        let height = decoder.height();
        let pixel_format = decoder.format();
        let total_frames = ((duration * fps).floor() as u64).max(1);

        let scaler = ffmpeg_next::software::scaling::Context::get(
            pixel_format,
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        tracing::info!(
            "Opened video: {}x{} @ {:.2}fps, duration {:.2}s ({} frames), codec {}",
            width,
            height,
            fps,
            duration,
            total_frames,
            codec_name,
        );

        Ok(Self {
            input,
            stream_index,
            decoder,
            scaler,
            width,
            height,
            fps,
            duration,
            total_frames,
            time_base,
            pixel_format,
            eof: false,
            sent_eof: false,
            max_seen_index: 0,
        })
    }

    /// Seek the container to the nearest keyframe at or before `idx` and
    /// drop codec-internal buffered pictures. Idempotent; safe before any
    /// frame has been read.
    pub fn seek_to_frame(&mut self, idx: u64) -> bool {
        let timestamp_us =
            (idx as f64 / self.fps * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
        let result = if timestamp_us <= 0 {
            self.input.seek(0, ..)
        } else {
            self.input.seek(timestamp_us, ..timestamp_us)
        };
        self.decoder.flush();
        self.eof = false;
        self.sent_eof = false;
        match result {
            Ok(()) => true,
            Err(e) => {
                // Soft-fail: decoding continues from the current position
                // and the caller's index-based filtering takes care of it.
                tracing::warn!("Seek to frame {idx} failed: {e}");
                false
            }
        }
    }

    /// Decode the next picture and convert it to RGB24.
    ///
    /// Returns the frame together with its best-effort index derived from
    /// the stream timestamps. Returns `None` at end of file, on a decode
    /// error, or when no picture appears within a bounded number of
    /// packets; the caller reseeks to recover.
    pub fn decode_next(&mut self) -> Option<(u64, DecodedFrame)> {
        if self.eof {
            return None;
        }

        let max_packets = (self.fps * 2.0).ceil() as usize + 8;
        let mut packets_sent = 0usize;
        let mut decoded = ffmpeg_next::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => return self.convert_frame(&decoded),
                Err(ffmpeg_next::Error::Other {
                    errno: ffmpeg_next::error::EAGAIN,
                }) => {
                    // Need more input.
                }
                Err(ffmpeg_next::Error::Eof) => {
                    self.eof = true;
                    let produced = self.max_seen_index + 1;
                    if produced != self.total_frames {
                        tracing::debug!(
                            "Container produced {produced} frames, expected {}",
                            self.total_frames
                        );
                    }
                    return None;
                }
                Err(e) => {
                    tracing::warn!("Decode error: {e}");
                    return None;
                }
            }

            if packets_sent >= max_packets {
                tracing::warn!("No picture after {packets_sent} packets, giving up");
                return None;
            }

            loop {
                match self.input.packets().next() {
                    Some((stream, packet)) => {
                        if stream.index() != self.stream_index {
                            continue;
                        }
                        if let Err(e) = self.decoder.send_packet(&packet) {
                            tracing::warn!("Failed to send packet to decoder: {e}");
                            return None;
                        }
                        packets_sent += 1;
                        break;
                    }
                    None => {
                        if !self.sent_eof {
                            let _ = self.decoder.send_eof();
                            self.sent_eof = true;
                        }
                        break;
                    }
                }
            }
        }
    }

    /// Drop codec-internal buffered pictures.
    pub fn flush(&mut self) {
        self.decoder.flush();
        self.sent_eof = false;
    }

    fn convert_frame(&mut self, decoded: &ffmpeg_next::frame::Video) -> Option<(u64, DecodedFrame)> {
        let pts = decoded.timestamp().or_else(|| decoded.pts()).unwrap_or(0);

        // Hardware decoders hand back device-memory pictures; transfer to
        // system memory before scaling.
        let mut sw_frame = ffmpeg_next::frame::Video::empty();
        let frame_to_scale: &ffmpeg_next::frame::Video = if is_hardware_format(decoded.format()) {
            let ret = unsafe {
                ffmpeg_next::ffi::av_hwframe_transfer_data(
                    sw_frame.as_mut_ptr(),
                    decoded.as_ptr(),
                    0,
                )
            };
            if ret < 0 {
                tracing::warn!("Failed to transfer hardware frame to system memory");
                decoded
            } else {
                &sw_frame
            }
        } else {
            decoded
        };

        // Recreate the scaler if the incoming pixel format changed (e.g.
        // after a hardware-to-software transfer).
        if frame_to_scale.format() != self.scaler.input().format {
            match ffmpeg_next::software::scaling::Context::get(
                frame_to_scale.format(),
                self.width,
                self.height,
                ffmpeg_next::format::Pixel::RGB24,
                self.width,
                self.height,
                ffmpeg_next::software::scaling::Flags::BILINEAR,
            ) {
                Ok(scaler) => self.scaler = scaler,
                Err(e) => {
                    tracing::warn!("Failed to rebuild scaler for {:?}: {e}", frame_to_scale.format());
                    return None;
                }
            }
        }

        let mut rgb_frame = ffmpeg_next::frame::Video::empty();
        if let Err(e) = self.scaler.run(frame_to_scale, &mut rgb_frame) {
            tracing::warn!("Pixel format conversion failed: {e}");
            return None;
        }

        let data = rgb_frame.data(0);
        let stride = rgb_frame.stride(0);
        let row_bytes = self.width as usize * 3;
        let pixels = if stride == row_bytes {
            data[..DecodedFrame::expected_size(self.width, self.height)].to_vec()
        } else {
            // The scaler may pad rows; compact them.
            let mut out = Vec::with_capacity(DecodedFrame::expected_size(self.width, self.height));
            for y in 0..self.height as usize {
                let row_start = y * stride;
                out.extend_from_slice(&data[row_start..row_start + row_bytes]);
            }
            out
        };

        let seconds = pts as f64 * self.time_base;
        let index = index_from_pts(pts, self.time_base, self.fps);
        self.max_seen_index = self.max_seen_index.max(index);

        Some((index, DecodedFrame::new(pixels, self.width, self.height, seconds)))
    }

    /// Get the video width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Get the video height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Get the video frame rate (fps)
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Get the video duration in seconds
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Get the total frame count derived from duration and frame rate
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Check if the stream has been fully drained
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Highest frame index actually produced so far
    pub fn max_seen_index(&self) -> u64 {
        self.max_seen_index
    }

    /// Get the stream description
    pub fn info(&self) -> VideoInfo {
        VideoInfo {
            width: self.width,
            height: self.height,
            fps: self.fps,
            duration: self.duration,
            total_frames: self.total_frames,
            pixel_format: self.pixel_format,
            time_base: self.time_base,
        }
    }
}

impl FrameSource for VideoDecoder {
    fn seek_to_frame(&mut self, idx: u64) -> bool {
        VideoDecoder::seek_to_frame(self, idx)
    }

    fn decode_next(&mut self) -> Option<(u64, DecodedFrame)> {
        VideoDecoder::decode_next(self)
    }

    fn flush(&mut self) {
        VideoDecoder::flush(self)
    }

    fn is_eof(&self) -> bool {
        VideoDecoder::is_eof(self)
    }
}

/// Derive a frame index from a raw PTS value, rounding to the nearest frame.
fn index_from_pts(pts: i64, time_base: f64, fps: f64) -> u64 {
    let seconds = pts as f64 * time_base;
    (seconds * fps).round().max(0.0) as u64
}

/// Check if a pixel format lives in device memory
fn is_hardware_format(format: ffmpeg_next::format::Pixel) -> bool {
    matches!(
        format,
        ffmpeg_next::format::Pixel::VIDEOTOOLBOX
            | ffmpeg_next::format::Pixel::D3D11
            | ffmpeg_next::format::Pixel::CUDA
            | ffmpeg_next::format::Pixel::QSV
            | ffmpeg_next::format::Pixel::VAAPI
            | ffmpeg_next::format::Pixel::VDPAU
            | ffmpeg_next::format::Pixel::DXVA2_VLD
    )
}
