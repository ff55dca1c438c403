//! Live cabin camera over V4L2
//!
//! Built with the `v4l2` feature on Linux. The device is asked for MJPG and
//! YUYV is accepted as a fallback; both are converted to RGB frames.

use std::path::PathBuf;

use crate::{CameraConfig, CameraError, CaptureDevice};

/// `"0"` names `/dev/video0`; anything else is taken as a device path
pub fn device_path(device: &str) -> PathBuf {
    let device = device.trim();
    if !device.is_empty() && device.bytes().all(|b| b.is_ascii_digit()) {
        PathBuf::from(format!("/dev/video{device}"))
    } else {
        PathBuf::from(device)
    }
}

/// Convert packed YUYV 4:2:2 (BT.601) to RGB
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, CameraError> {
    let pixels = (width * height) as usize;
    if data.len() < pixels * 2 {
        return Err(CameraError::Stream(format!(
            "short YUYV frame: {} bytes for {}x{}",
            data.len(),
            width,
            height
        )));
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for chunk in data[..pixels * 2].chunks_exact(4) {
        let u = f32::from(chunk[1]) - 128.0;
        let v = f32::from(chunk[3]) - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = f32::from(y);
            rgb.push((y + 1.402 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344 * u - 0.714 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

/// Open the live camera named by `device`
#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub fn open(device: &str, config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CameraError> {
    Ok(Box::new(v4l2::V4l2Camera::open(device, config)?))
}

#[cfg(not(all(target_os = "linux", feature = "v4l2")))]
pub fn open(device: &str, _config: &CameraConfig) -> Result<Box<dyn CaptureDevice>, CameraError> {
    Err(CameraError::Open(format!(
        "live capture from {device} needs a Linux build with the `v4l2` feature"
    )))
}

#[cfg(all(target_os = "linux", feature = "v4l2"))]
pub use v4l2::V4l2Camera;

#[cfg(all(target_os = "linux", feature = "v4l2"))]
mod v4l2 {
    use std::time::Instant;

    use image::ImageFormat;
    use tracing::{debug, info, warn};
    use v4l::buffer::Type;
    use v4l::io::mmap::Stream;
    use v4l::io::traits::CaptureStream;
    use v4l::video::capture::Parameters;
    use v4l::video::Capture;
    use v4l::{Device, FourCC};

    use super::{device_path, yuyv_to_rgb};
    use crate::frame::VideoFrame;
    use crate::{CameraConfig, CameraError, CaptureDevice};

    const BUFFER_COUNT: u32 = 4;

    fn mjpg() -> FourCC {
        FourCC::new(b"MJPG")
    }

    fn yuyv() -> FourCC {
        FourCC::new(b"YUYV")
    }

    /// Memory-mapped V4L2 capture stream
    pub struct V4l2Camera {
        stream: Option<Stream<'static>>,
        fourcc: FourCC,
        width: u32,
        height: u32,
        path: String,
        opened_at: Instant,
        sequence: u32,
    }

    impl V4l2Camera {
        pub fn open(device: &str, config: &CameraConfig) -> Result<Self, CameraError> {
            let path = device_path(device);
            let name = path.display().to_string();
            info!("Opening V4L2 camera {}", name);
            let open_err = |e: std::io::Error| CameraError::Open(format!("{name}: {e}"));

            let dev = Device::with_path(&path).map_err(open_err)?;

            let mut wanted = dev.format().map_err(open_err)?;
            wanted.fourcc = mjpg();
            if let (Some(w), Some(h)) = (config.width, config.height) {
                wanted.width = w;
                wanted.height = h;
            }
            let format = dev.set_format(&wanted).map_err(open_err)?;
            if format.fourcc != mjpg() && format.fourcc != yuyv() {
                return Err(CameraError::Open(format!(
                    "{name}: unsupported pixel format {}",
                    format.fourcc
                )));
            }

            if config.fps > 0 {
                if let Err(e) = dev.set_params(&Parameters::with_fps(config.fps)) {
                    warn!("{}: could not set {} fps: {}", name, config.fps, e);
                }
            }

            let stream = Stream::with_buffers(&dev, Type::VideoCapture, BUFFER_COUNT).map_err(open_err)?;
            info!("Streaming {}x{} {} from {}", format.width, format.height, format.fourcc, name);

            Ok(Self {
                stream: Some(stream),
                fourcc: format.fourcc,
                width: format.width,
                height: format.height,
                path: name,
                opened_at: Instant::now(),
                sequence: 0,
            })
        }
    }

    impl CaptureDevice for V4l2Camera {
        fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
            let stream = self.stream.as_mut().ok_or(CameraError::NotInitialized)?;
            let (buf, meta) = stream.next().map_err(|e| CameraError::Stream(e.to_string()))?;
            let used = (meta.bytesused as usize).min(buf.len());
            let data = &buf[..used];

            let (rgb, width, height) = if self.fourcc == mjpg() {
                let decoded = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
                    .map_err(|e| CameraError::Decode {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?
                    .to_rgb8();
                let (width, height) = decoded.dimensions();
                (decoded.into_raw(), width, height)
            } else {
                (yuyv_to_rgb(data, self.width, self.height)?, self.width, self.height)
            };

            let sequence = self.sequence;
            self.sequence += 1;
            debug!("Captured frame {} ({} bytes)", sequence, used);

            let timestamp_ns = self.opened_at.elapsed().as_nanos() as u64;
            Ok(VideoFrame::new(rgb, width, height, timestamp_ns, sequence))
        }

        fn release(&mut self) {
            // Dropping the stream turns streaming off and unmaps the buffers
            if self.stream.take().is_some() {
                info!("Released {} after {} frames", self.path, self.sequence);
            } else {
                warn!("Camera release requested but {} already released", self.path);
            }
        }

        fn is_open(&self) -> bool {
            self.stream.is_some()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_path_accepts_index_or_path() {
        assert_eq!(device_path("0"), PathBuf::from("/dev/video0"));
        assert_eq!(device_path(" 2 "), PathBuf::from("/dev/video2"));
        assert_eq!(device_path("/dev/v4l/by-id/cabin"), PathBuf::from("/dev/v4l/by-id/cabin"));
    }

    #[test]
    fn test_yuyv_conversion() {
        // Mid grey, then a saturated red pair
        let rgb = yuyv_to_rgb(&[128, 128, 128, 128, 76, 85, 76, 255], 4, 1).unwrap();
        assert_eq!(&rgb[..6], &[128, 128, 128, 128, 128, 128]);

        let red = &rgb[6..9];
        assert!(red[0] >= 250, "{red:?}");
        assert!(red[1] <= 2 && red[2] <= 2, "{red:?}");
    }

    #[test]
    fn test_short_yuyv_frame_is_an_error() {
        assert!(matches!(yuyv_to_rgb(&[0; 6], 2, 2), Err(CameraError::Stream(_))));
    }

    #[cfg(not(all(target_os = "linux", feature = "v4l2")))]
    #[test]
    fn test_live_capture_needs_v4l2_build() {
        let err = open("0", &CameraConfig::default()).err().unwrap();
        assert!(err.to_string().contains("v4l2"));
    }

    #[cfg(all(target_os = "linux", feature = "v4l2"))]
    #[test]
    fn test_missing_device_fails_to_open() {
        let err = open("/dev/video-missing", &CameraConfig::default()).err().unwrap();
        assert!(matches!(err, CameraError::Open(_)));
    }
}
