//! Video frame types and conversion

use image::RgbImage;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Capture timestamp (nanoseconds since the device was opened)
    pub timestamp_ns: u64,
    /// Frame sequence number, starting at 0
    pub sequence: u32,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp_ns: u64, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Create a black frame, used by tests and synthetic sources
    pub fn blank(width: u32, height: u32, sequence: u32) -> Self {
        Self::new(vec![0; (width * height * 3) as usize], width, height, 0, sequence)
    }

    /// Build a frame from a decoded image
    pub fn from_rgb_image(img: RgbImage, timestamp_ns: u64, sequence: u32) -> Self {
        let (width, height) = img.dimensions();
        Self::new(img.into_raw(), width, height, timestamp_ns, sequence)
    }

    /// Borrow the pixel data as an image buffer
    ///
    /// Returns `None` when the buffer length does not match the dimensions.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_image_round_trip_keeps_metadata() {
        let mut img = RgbImage::new(4, 2);
        img.put_pixel(3, 1, image::Rgb([10, 20, 30]));

        let frame = VideoFrame::from_rgb_image(img, 42, 7);
        assert_eq!(frame.width, 4);
        assert_eq!(frame.height, 2);
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.get_pixel(3, 1), Some([10, 20, 30]));
        assert_eq!(frame.get_pixel(4, 0), None);

        let back = frame.to_rgb_image().unwrap();
        assert_eq!(back.get_pixel(3, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_mismatched_buffer_is_rejected() {
        let frame = VideoFrame::new(vec![0; 5], 2, 2, 0, 0);
        assert!(frame.to_rgb_image().is_none());
    }
}
