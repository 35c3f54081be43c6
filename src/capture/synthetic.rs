//! Hardware-free frame source for development
//!
//! Emits JPEG-framed payloads whose size swings with a simulated amount of
//! scene detail, which is enough to exercise pacing and the drop policy.

use std::time::Instant;

use bytes::{BufMut, BytesMut};
use tracing::trace;

use super::{CaptureError, CapturedFrame, FrameSource, PixelFormat, Resolution};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];

/// Configuration for the synthetic source
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Smallest payload in bytes
    pub base_size: usize,
    /// Extra bytes added at peak scene detail
    pub detail_swing: usize,
    /// Frames per full detail cycle
    pub cycle: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            base_size: 4000,
            detail_swing: 6000, // peaks above the default drop size
            cycle: 16,
        }
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    resolution: Resolution,
    sequence: u64,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            resolution: Resolution::Any,
            sequence: 0,
        }
    }

    fn payload_len(&self) -> usize {
        let cycle = self.config.cycle.max(1);
        let phase = self.sequence % cycle;
        // triangle wave over the cycle
        let half = cycle / 2;
        let level = if phase <= half { phase } else { cycle - phase };
        let swing = if half == 0 {
            0
        } else {
            self.config.detail_swing * level as usize / half as usize
        };
        self.config.base_size + swing
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl FrameSource for SyntheticSource {
    fn configure(&mut self, resolution: Resolution) -> Result<(), CaptureError> {
        self.resolution = resolution;
        Ok(())
    }

    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError> {
        self.sequence += 1;
        let len = self.payload_len().max(SOI.len() + EOI.len() + 8);

        dest.reserve(len);
        dest.put_slice(&SOI);
        dest.put_u64(self.sequence);
        let fill = len - SOI.len() - EOI.len() - 8;
        dest.put_bytes((self.sequence & 0x7F) as u8, fill);
        dest.put_slice(&EOI);

        let (width, height) = self.resolution.dimensions().unwrap_or((640, 480));
        trace!(sequence = self.sequence, len, "Synthesized frame");

        Ok(CapturedFrame {
            sequence: self.sequence,
            width,
            height,
            format: PixelFormat::Mjpeg,
            timestamp: Some(Instant::now()),
            device_timestamp: None,
        })
    }

    fn size_hint(&self) -> usize {
        self.config.base_size + self.config.detail_swing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_jpeg_framed() {
        let mut source = SyntheticSource::default();
        let mut buf = BytesMut::new();
        let info = source.capture_frame(&mut buf).unwrap();
        assert_eq!(&buf[..2], &SOI);
        assert_eq!(&buf[buf.len() - 2..], &EOI);
        assert_eq!(info.sequence, 1);
        assert_eq!(info.format, PixelFormat::Mjpeg);
    }

    #[test]
    fn sizes_swing_over_a_cycle() {
        let mut source = SyntheticSource::default();
        let sizes: Vec<usize> = (0..16)
            .map(|_| {
                let mut buf = BytesMut::new();
                source.capture_frame(&mut buf).unwrap();
                buf.len()
            })
            .collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max > 7000);
        assert!(min < 7000);
        assert!(max <= source.size_hint());
    }

    #[test]
    fn configured_resolution_is_reported() {
        let mut source = SyntheticSource::default();
        source.configure(Resolution::R320x240).unwrap();
        let mut buf = BytesMut::new();
        let info = source.capture_frame(&mut buf).unwrap();
        assert_eq!((info.width, info.height), (320, 240));
    }
}
