pub mod frame;
pub mod queue;
pub mod resolution;
pub mod synthetic;
#[cfg(feature = "uvc")]
pub mod v4l2;

use std::time::{Duration, Instant};

use bytes::BytesMut;
use thiserror::Error;

pub use frame::{Frame, FrameMetadata, PixelFormat, Requester, Requesters};
pub use queue::{DrivenSource, FrameDriver, QueueFeeder, QueueSource, RawFrame};
pub use resolution::Resolution;
pub use synthetic::SyntheticSource;
#[cfg(feature = "uvc")]
pub use v4l2::V4l2Source;

/// Why a capture attempt produced nothing
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Nothing is ready this tick
    #[error("no frame available")]
    NoFrameAvailable,

    /// The device or driver reported a failure
    #[error("device error: {0}")]
    Device(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a source reports about the bytes it wrote into the destination buffer
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// When the source captured the frame; `None` lets the controller stamp it
    pub timestamp: Option<Instant>,
    pub device_timestamp: Option<Duration>,
}

/// Pull interface to an external camera driver.
///
/// The controller owns the destination buffer and hands it over empty; the
/// source appends one encoded frame and describes it. Implementations must
/// return promptly: a source that may block has to bound the wait itself.
pub trait FrameSource {
    /// Apply a resolution before streaming. Sources without a notion of
    /// resolution accept anything.
    fn configure(&mut self, _resolution: Resolution) -> Result<(), CaptureError> {
        Ok(())
    }

    /// Write one frame into `dest`.
    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError>;

    /// Expected upper bound on a frame, used to size destination buffers.
    fn size_hint(&self) -> usize {
        0
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn configure(&mut self, resolution: Resolution) -> Result<(), CaptureError> {
        (**self).configure(resolution)
    }

    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError> {
        (**self).capture_frame(dest)
    }

    fn size_hint(&self) -> usize {
        (**self).size_hint()
    }
}
