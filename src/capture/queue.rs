//! Single-slot handoff between a camera driver thread and the controller
//!
//! The driver side blocks in [`QueueFeeder::submit`] until the previous frame
//! has been taken, mirroring a framebuffer that is only refilled once returned.
//! The controller side never blocks: an empty slot is `NoFrameAvailable`.
//!
//! Blocking hardware is wrapped in a [`FrameDriver`] and run on its own thread
//! by [`DrivenSource`], which feeds the same slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use flume::{Receiver, SendTimeoutError, Sender, TryRecvError};
use tracing::{debug, info, trace, warn};

use super::{CaptureError, CapturedFrame, FrameSource, PixelFormat};

/// How often a driver blocked on a full slot checks for shutdown
const SUBMIT_POLL: Duration = Duration::from_millis(50);
/// Pause after a driver error before trying again
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// A frame as produced by the driver
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub timestamp: Instant,
    /// Capture time reported by the device clock, if any
    pub device_timestamp: Option<Duration>,
}

/// Driver-side handle, cloneable and `Send`
#[derive(Clone)]
pub struct QueueFeeder {
    tx: Sender<RawFrame>,
}

impl QueueFeeder {
    /// Hand a frame to the controller, waiting for the slot to free up.
    ///
    /// Returns the frame back if the controller side has gone away.
    pub fn submit(&self, frame: RawFrame) -> Result<(), RawFrame> {
        self.tx.send(frame).map_err(|e| e.into_inner())
    }

    /// Hand a frame over only if the slot is free right now.
    pub fn try_submit(&self, frame: RawFrame) -> Result<(), RawFrame> {
        self.tx.try_send(frame).map_err(|e| e.into_inner())
    }

    /// Like [`QueueFeeder::submit`], but gives up once `stop` is raised.
    ///
    /// Returns false if the frame was not handed over.
    fn submit_until(&self, mut frame: RawFrame, stop: &AtomicBool) -> bool {
        loop {
            match self.tx.send_timeout(frame, SUBMIT_POLL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(back)) if !stop.load(Ordering::Relaxed) => {
                    frame = back
                }
                Err(_) => return false,
            }
        }
    }
}

/// Frame source fed by a [`QueueFeeder`]
pub struct QueueSource {
    rx: Receiver<RawFrame>,
    sequence: u64,
    size_hint: usize,
}

impl QueueSource {
    pub fn new() -> (Self, QueueFeeder) {
        let (tx, rx) = flume::bounded(1);
        (
            Self {
                rx,
                sequence: 0,
                size_hint: 0,
            },
            QueueFeeder { tx },
        )
    }
}

impl FrameSource for QueueSource {
    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError> {
        let raw = match self.rx.try_recv() {
            Ok(raw) => raw,
            Err(TryRecvError::Empty) => {
                trace!("No frame ready");
                return Err(CaptureError::NoFrameAvailable);
            }
            Err(TryRecvError::Disconnected) => {
                return Err(CaptureError::Device("frame driver disconnected".into()));
            }
        };

        dest.extend_from_slice(&raw.data);
        self.sequence += 1;
        self.size_hint = self.size_hint.max(raw.data.len());
        debug!(
            sequence = self.sequence,
            len = raw.data.len(),
            "Took frame from driver queue"
        );

        Ok(CapturedFrame {
            sequence: self.sequence,
            width: raw.width,
            height: raw.height,
            format: raw.format,
            timestamp: Some(raw.timestamp),
            device_timestamp: raw.device_timestamp,
        })
    }

    fn size_hint(&self) -> usize {
        self.size_hint
    }
}

/// Blocking frame producer, run on a dedicated thread by [`DrivenSource`]
pub trait FrameDriver: Send + 'static {
    /// Wait for the next frame.
    ///
    /// `NoFrameAvailable` means the wait timed out.
    fn next_frame(&mut self) -> Result<RawFrame, CaptureError>;

    /// Called after any failed wait. The next `next_frame` must start from a
    /// clean device state.
    fn recover(&mut self) {}
}

/// [`QueueSource`] fed by a [`FrameDriver`] on its own thread.
///
/// Dropping it stops the thread and waits for it to exit.
pub struct DrivenSource {
    queue: QueueSource,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DrivenSource {
    pub fn spawn<D: FrameDriver>(name: &str, driver: D) -> Result<Self, CaptureError> {
        let (queue, feeder) = QueueSource::new();
        let stop = Arc::new(AtomicBool::new(false));

        let thread = std::thread::Builder::new().name(name.into()).spawn({
            let stop = stop.clone();
            move || run_driver(driver, feeder, &stop)
        })?;
        info!("Frame driver thread {} started", name);

        Ok(Self {
            queue,
            stop,
            thread: Some(thread),
        })
    }
}

impl FrameSource for DrivenSource {
    fn capture_frame(&mut self, dest: &mut BytesMut) -> Result<CapturedFrame, CaptureError> {
        self.queue.capture_frame(dest)
    }

    fn size_hint(&self) -> usize {
        self.queue.size_hint()
    }
}

impl Drop for DrivenSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Frame driver thread panicked");
            }
        }
    }
}

fn run_driver<D: FrameDriver>(mut driver: D, feeder: QueueFeeder, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        let frame = match driver.next_frame() {
            Ok(frame) => frame,
            Err(CaptureError::NoFrameAvailable) => {
                trace!("Driver wait timed out");
                driver.recover();
                continue;
            }
            Err(e) => {
                warn!("Frame driver error: {}", e);
                driver.recover();
                std::thread::sleep(ERROR_BACKOFF);
                continue;
            }
        };

        if !feeder.submit_until(frame, stop) {
            break;
        }
    }
    debug!("Frame driver stopped");
}
