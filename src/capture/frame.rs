use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Frame data with zero-copy semantics
#[derive(Clone)]
pub struct Frame {
    /// Immutable encoded frame data - can be shared across threads without copying
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp
    pub timestamp: Instant,

    /// Which demand caused this frame to be captured
    pub requesters: Requesters,
}

impl Frame {
    /// Encoded size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn was_requested_by(&self, requester: Requester) -> bool {
        self.requesters.contains(requester)
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .field("requesters", &self.requesters)
            .finish()
    }
}

/// Frame metadata reported by the frame source
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub device_timestamp: Option<Duration>, // Hardware timestamp if available
}

/// Pixel formats a source can hand back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Mjpeg,
    Yuyv4,
    Rgb24,
}

/// Kinds of demand that can trigger a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requester {
    /// An attached streaming consumer
    Stream,
    /// A one-shot image request
    Single,
    /// The idle preview cadence
    Idle,
}

/// Set of [`Requester`]s a frame was captured for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requesters(u8);

impl Requesters {
    pub const fn empty() -> Self {
        Self(0)
    }

    fn bit(requester: Requester) -> u8 {
        match requester {
            Requester::Stream => 1 << 0,
            Requester::Single => 1 << 1,
            Requester::Idle => 1 << 2,
        }
    }

    pub fn with(mut self, requester: Requester) -> Self {
        self.0 |= Self::bit(requester);
        self
    }

    pub fn contains(self, requester: Requester) -> bool {
        self.0 & Self::bit(requester) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}
