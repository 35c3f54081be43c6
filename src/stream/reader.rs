//! Chunked reading of a delivered frame
//!
//! Streaming responders write a frame out in pieces; the reader tracks how far
//! they got without copying the frame.

use crate::capture::Frame;

#[derive(Debug, Default)]
pub struct ImageReader {
    image: Option<Frame>,
    offset: usize,
}

impl ImageReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start reading `frame` from the beginning
    pub fn set_image(&mut self, frame: Frame) {
        self.image = Some(frame);
        self.offset = 0;
    }

    /// Bytes left to read
    pub fn available(&self) -> usize {
        self.image
            .as_ref()
            .map_or(0, |f| f.data.len().saturating_sub(self.offset))
    }

    /// Unread part of the frame
    pub fn peek(&self) -> &[u8] {
        match &self.image {
            Some(f) => &f.data[self.offset.min(f.data.len())..],
            None => &[],
        }
    }

    /// Mark `consumed` bytes as read, clamped to what is left
    pub fn consume(&mut self, consumed: usize) {
        self.offset += consumed.min(self.available());
    }

    /// Release the frame
    pub fn return_image(&mut self) {
        self.image = None;
        self.offset = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{FrameMetadata, PixelFormat, Requesters};
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Instant;

    fn frame(data: &'static [u8]) -> Frame {
        Frame {
            data: Bytes::from_static(data),
            meta: Arc::new(FrameMetadata {
                sequence: 1,
                width: 2,
                height: 2,
                format: PixelFormat::Mjpeg,
                device_timestamp: None,
            }),
            timestamp: Instant::now(),
            requesters: Requesters::empty(),
        }
    }

    #[test]
    fn reads_in_chunks() {
        let mut reader = ImageReader::new();
        assert_eq!(reader.available(), 0);

        reader.set_image(frame(b"abcdef"));
        assert_eq!(reader.peek(), b"abcdef");
        reader.consume(4);
        assert_eq!(reader.available(), 2);
        assert_eq!(reader.peek(), b"ef");
        reader.consume(10);
        assert_eq!(reader.available(), 0);
        assert!(reader.peek().is_empty());

        reader.return_image();
        assert_eq!(reader.available(), 0);
    }
}
