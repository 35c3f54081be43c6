//! USB UVC camera capture through V4L2 memory-mapped streaming
//!
//! Dequeueing blocks, so the mmap stream lives on a driver thread that feeds
//! a single-slot queue. The controller only ever polls that slot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::queue::{DrivenSource, FrameDriver, RawFrame};
use super::{CaptureError, CapturedFrame, FrameSource, PixelFormat, Resolution};

/// Longest the driver thread waits for one frame before restarting the stream
const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);

/// V4L2-backed frame source for USB webcams
pub struct V4l2Source {
    device: Arc<Device>,
    driver: Option<DrivenSource>,
    buffer_count: u32,
    width: u32,
    height: u32,
}

impl V4l2Source {
    /// Open the device and check it can capture video
    pub fn open(path: &str, buffer_count: u32) -> Result<Self, CaptureError> {
        info!("Opening V4L2 device {}", path);

        let device = Device::with_path(path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(CaptureError::Device(format!(
                "{path} doesn't support video capture"
            )));
        }

        let fmt = device.format()?;

        Ok(Self {
            device: Arc::new(device),
            driver: None,
            buffer_count: buffer_count.max(1),
            width: fmt.width,
            height: fmt.height,
        })
    }

    fn driver(&mut self) -> Result<&mut DrivenSource, CaptureError> {
        if self.driver.is_none() {
            let mmap = MmapDriver {
                device: self.device.clone(),
                stream: None,
                buffer_count: self.buffer_count,
                width: self.width,
                height: self.height,
            };
            self.driver = Some(DrivenSource::spawn("iris-uvc", mmap)?);
        }
        self.driver
            .as_mut()
            .ok_or_else(|| CaptureError::Device("driver not started".into()))
    }
}

impl FrameSource for V4l2Source {
    fn configure(&mut self, resolution: Resolution) -> Result<(), CaptureError> {
        // format changes require the buffers to be released first
        self.driver = None;

        let mut fmt = self.device.format()?;
        if let Some((width, height)) = resolution.dimensions() {
            fmt.width = width;
            fmt.height = height;
        }
        fmt.fourcc = FourCC::new(b"MJPG");

        let applied = self.device.set_format(&fmt)?;
        if applied.fourcc != FourCC::new(b"MJPG") {
            return Err(CaptureError::Device("camera does not offer MJPEG".into()));
        }
        if resolution.dimensions().is_some_and(|d| d != (applied.width, applied.height)) {
            warn!(
                "Requested {}, camera chose {}x{}",
                resolution, applied.width, applied.height
            );
        }

        self.width = applied.width;
        self.height = applied.height;
        Ok(())
    }

    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError> {
        self.driver()?.capture_frame(dest)
    }

    fn size_hint(&self) -> usize {
        // compressed frames stay well under one byte per pixel
        (self.width * self.height / 2) as usize
    }
}

/// Owns the mmap stream on the driver thread
struct MmapDriver {
    device: Arc<Device>,
    stream: Option<MmapStream<'static>>,
    buffer_count: u32,
    width: u32,
    height: u32,
}

impl FrameDriver for MmapDriver {
    fn next_frame(&mut self) -> Result<RawFrame, CaptureError> {
        if self.stream.is_none() {
            let mut stream =
                MmapStream::with_buffers(&self.device, Type::VideoCapture, self.buffer_count)?;
            stream.set_timeout(DEQUEUE_TIMEOUT);
            info!("Capture stream started with {} buffers", self.buffer_count);
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::Device("stream not started".into()));
        };

        let (buf, meta) = match stream.next() {
            Ok(next) => next,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                return Err(CaptureError::NoFrameAvailable)
            }
            Err(e) => return Err(e.into()),
        };

        let used = (meta.bytesused as usize).min(buf.len());
        Ok(RawFrame {
            data: Bytes::copy_from_slice(&buf[..used]),
            width: self.width,
            height: self.height,
            format: PixelFormat::Mjpeg,
            timestamp: Instant::now(),
            device_timestamp: Some(
                Duration::from_secs(meta.timestamp.sec as u64)
                    + Duration::from_micros(meta.timestamp.usec as u64),
            ),
        })
    }

    fn recover(&mut self) {
        // a failed dequeue leaves a buffer queued; only a fresh stream is safe
        if self.stream.take().is_some() {
            debug!("Capture stream restarted");
        }
    }
}

/// Find the first capture device offering MJPEG
pub fn auto_detect_device() -> Result<String, CaptureError> {
    use std::path::Path;

    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            continue;
        }
        if let Ok(formats) = dev.enum_formats() {
            if formats.iter().any(|f| f.fourcc == FourCC::new(b"MJPG")) {
                info!("Found MJPEG device: {} - {}", path, caps.card);
                return Ok(path);
            }
        }
    }

    Err(CaptureError::Device("no MJPEG capture device found".into()))
}
