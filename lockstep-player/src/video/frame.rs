//! Decoded video frame representation
//!
//! Contains the raw pixel data and metadata for a decoded video frame.
//! Frames are tightly packed RGB24 with a top-left origin.

/// A decoded video frame with pixel data
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Raw RGB24 pixel data (3 bytes/pixel, tightly packed)
    pub data: Vec<u8>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Bytes per row (`width * 3`)
    pub stride: usize,
    /// Presentation timestamp in seconds
    pub pts: f64,
}

impl DecodedFrame {
    /// Create a new RGB24 decoded frame
    pub fn new(data: Vec<u8>, width: u32, height: u32, pts: f64) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * 3,
            pts,
        }
    }

    /// Get the expected data size for RGB24 frame dimensions (width * height * 3)
    pub fn expected_size(width: u32, height: u32) -> usize {
        (width as usize) * (height as usize) * 3
    }

    /// Check if the frame data has the correct size
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::expected_size(self.width, self.height)
            && self.stride == self.width as usize * 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let width = 1920;
        let height = 1080;
        let data = vec![0u8; DecodedFrame::expected_size(width, height)];
        let frame = DecodedFrame::new(data, width, height, 0.0);

        assert_eq!(frame.width, 1920);
        assert_eq!(frame.height, 1080);
        assert!(frame.is_valid());
        assert_eq!(frame.stride, 1920 * 3);
    }

    #[test]
    fn test_expected_size() {
        assert_eq!(DecodedFrame::expected_size(1920, 1080), 1920 * 1080 * 3);
        assert_eq!(DecodedFrame::expected_size(1280, 720), 1280 * 720 * 3);
    }

    #[test]
    fn test_truncated_data_is_invalid() {
        let frame = DecodedFrame::new(vec![0u8; 10], 64, 64, 0.0);
        assert!(!frame.is_valid());
    }
}
