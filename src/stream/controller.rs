//! Stream lifecycle controller
//!
//! Turns a pacing policy plus consumer attach/detach signals into capture
//! requests against a [`FrameSource`], enforces the frame drop size and fires
//! start/stop callbacks. The controller is a plain state machine: it never
//! spawns, locks or sleeps, and all mutation happens on the context that calls
//! [`StreamControl::tick`].

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwapOption;
use bytes::BytesMut;
use flume::Receiver;
use metrics::{counter, gauge};
use tracing::{debug, info, instrument, trace, warn};

use super::command::{self, Command, ControlHandle};
use super::config::StreamConfig;
use super::pacing::Pacer;
use super::triggers::Triggers;
use crate::capture::{
    CaptureError, Frame, FrameMetadata, FrameSource, QueueSource, Requester, Requesters,
};
use crate::error::{Result, StreamError};

/// Whether any consumer is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Streaming,
}

/// Counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Frames returned by the source, dropped ones included
    pub captured: u64,
    pub delivered: u64,
    /// Frames discarded for exceeding the drop size
    pub dropped: u64,
    /// Capture attempts that produced nothing
    pub empty: u64,
}

/// What a single tick did
#[derive(Debug, Clone)]
pub enum TickOutcome {
    /// No demand, or the interval has not elapsed yet
    Skipped,
    /// The source had nothing to give
    NoFrame,
    /// A frame of this many bytes was discarded
    Dropped(usize),
    Delivered(Frame),
}

impl TickOutcome {
    /// Whether a capture was requested from the source
    pub fn attempted(&self) -> bool {
        !matches!(self, TickOutcome::Skipped)
    }
}

/// Shared capability of every camera variant.
///
/// Variants differ only in the frame source they are bound to.
pub trait StreamControl {
    /// Add a consumer; the first one starts the stream.
    fn attach_consumer(&mut self);

    /// Remove a consumer; the last one stops the stream. No-op at zero.
    fn detach_consumer(&mut self);

    /// Ask for exactly one frame without attaching.
    fn request_image(&mut self);

    /// Drive pacing. Must be called more often than the shortest interval.
    fn tick(&mut self, now: Instant) -> TickOutcome;

    fn state(&self) -> LifecycleState;

    fn consumers(&self) -> usize;
}

/// Pacing and lifecycle logic, parametrized by its frame source
pub struct StreamController<S> {
    config: StreamConfig,
    source: S,
    state: LifecycleState,
    consumers: usize,
    single_requested: bool,
    pacer: Pacer,
    triggers: Triggers,
    latest: Arc<ArcSwapOption<Frame>>,
    handle: ControlHandle,
    commands: Receiver<Command>,
    stats: StreamStats,
}

/// Camera fed by an onboard sensor driver through a single-slot queue
pub type SensorCamera = StreamController<QueueSource>;

/// USB UVC webcam
#[cfg(feature = "uvc")]
pub type UvcCamera = StreamController<crate::capture::V4l2Source>;

impl<S: FrameSource> StreamController<S> {
    /// Bind a validated configuration to a frame source.
    pub fn new(config: StreamConfig, mut source: S) -> Result<Self> {
        source.configure(config.resolution())?;
        config.log_config();

        let (handle, commands) = command::channel();
        Ok(Self {
            config,
            source,
            state: LifecycleState::Idle,
            consumers: 0,
            single_requested: false,
            pacer: Pacer::new(),
            triggers: Triggers::default(),
            latest: Arc::new(ArcSwapOption::empty()),
            handle,
            commands,
            stats: StreamStats::default(),
        })
    }

    /// Replace the configuration. Only allowed while idle.
    pub fn reconfigure(&mut self, config: StreamConfig) -> Result<()> {
        if self.state == LifecycleState::Streaming {
            return Err(StreamError::ReconfigureWhileStreaming);
        }
        self.source.configure(config.resolution())?;
        self.config = config;
        info!("Stream reconfigured");
        self.config.log_config();
        Ok(())
    }

    /// Validate raw values and apply them, see [`StreamConfig::from_alias`].
    pub fn configure(
        &mut self,
        resolution: &str,
        max_fps: f64,
        idle_fps: f64,
        drop_threshold_bytes: u32,
    ) -> Result<()> {
        let config = StreamConfig::from_alias(resolution, max_fps, idle_fps, drop_threshold_bytes)?;
        self.reconfigure(config)
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Handle for attaching and detaching from other threads or tasks
    pub fn control_handle(&self) -> ControlHandle {
        self.handle.clone()
    }

    pub fn on_stream_start(&mut self, f: impl FnMut() + Send + 'static) {
        self.triggers.add_stream_start(f);
    }

    pub fn on_stream_stop(&mut self, f: impl FnMut() + Send + 'static) {
        self.triggers.add_stream_stop(f);
    }

    /// Called with every delivered frame
    pub fn on_image(&mut self, f: impl FnMut(&Frame) + Send + 'static) {
        self.triggers.add_image(f);
    }

    /// Last delivered frame
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.latest.load_full()
    }

    /// Shared slot holding the last delivered frame, readable from anywhere
    pub fn latest_frame_slot(&self) -> Arc<ArcSwapOption<Frame>> {
        self.latest.clone()
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Attach => self.attach_consumer(),
                Command::Detach => self.detach_consumer(),
                Command::RequestImage => self.request_image(),
            }
        }
    }

    /// Interval and requesters for the current demand, if any
    fn demand(&self) -> Option<(u64, Requesters)> {
        let mut requesters = Requesters::empty();
        if self.state == LifecycleState::Streaming {
            requesters = requesters.with(Requester::Stream);
        }
        if self.single_requested {
            requesters = requesters.with(Requester::Single);
        }
        if !requesters.is_empty() {
            return Some((self.config.active_interval_ms(), requesters));
        }
        if self.config.idle_pacing_enabled() {
            return Some((
                self.config.idle_interval_ms(),
                requesters.with(Requester::Idle),
            ));
        }
        None
    }

    #[instrument(skip(self), level = "trace")]
    fn capture(&mut self, now: Instant, requesters: Requesters) -> TickOutcome {
        let mut dest = BytesMut::with_capacity(self.source.size_hint());
        let captured = match self.source.capture_frame(&mut dest) {
            Ok(captured) => captured,
            Err(CaptureError::NoFrameAvailable) => {
                trace!("No frame this tick");
                self.stats.empty += 1;
                return TickOutcome::NoFrame;
            }
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.stats.empty += 1;
                return TickOutcome::NoFrame;
            }
        };

        self.stats.captured += 1;
        counter!("iris_frames_captured_total").increment(1);

        let len = dest.len();
        if self.config.should_drop(len) {
            trace!(
                "Dropping frame {}: {}B > {}B",
                captured.sequence,
                len,
                self.config.drop_threshold_bytes()
            );
            self.stats.dropped += 1;
            counter!("iris_frames_dropped_total").increment(1);
            return TickOutcome::Dropped(len);
        }

        let frame = Frame {
            data: dest.freeze(),
            meta: Arc::new(FrameMetadata {
                sequence: captured.sequence,
                width: captured.width,
                height: captured.height,
                format: captured.format,
                device_timestamp: captured.device_timestamp,
            }),
            timestamp: captured.timestamp.unwrap_or(now),
            requesters,
        };

        debug!(
            "Got image {}: {}x{} {}B",
            frame.meta.sequence, frame.meta.width, frame.meta.height, len
        );

        self.latest.store(Some(Arc::new(frame.clone())));
        self.triggers.image(&frame);
        self.single_requested = false;
        self.stats.delivered += 1;
        counter!("iris_frames_delivered_total").increment(1);

        TickOutcome::Delivered(frame)
    }
}

impl<S: FrameSource> StreamControl for StreamController<S> {
    fn attach_consumer(&mut self) {
        self.consumers += 1;
        gauge!("iris_stream_consumers").set(self.consumers as f64);

        if self.consumers == 1 {
            self.state = LifecycleState::Streaming;
            info!("Stream started");
            self.triggers.stream_started();
        } else {
            debug!("Consumer attached ({} total)", self.consumers);
        }
    }

    fn detach_consumer(&mut self) {
        if self.consumers == 0 {
            debug!("Detach with no consumers attached, ignoring");
            return;
        }
        self.consumers -= 1;
        gauge!("iris_stream_consumers").set(self.consumers as f64);

        if self.consumers == 0 {
            self.state = LifecycleState::Idle;
            info!("Stream stopped");
            self.triggers.stream_stopped();
        } else {
            debug!("Consumer detached ({} left)", self.consumers);
        }
    }

    fn request_image(&mut self) {
        self.single_requested = true;
    }

    fn tick(&mut self, now: Instant) -> TickOutcome {
        self.drain_commands();

        let Some((interval_ms, requesters)) = self.demand() else {
            return TickOutcome::Skipped;
        };
        if !self.pacer.is_due(now, interval_ms) {
            return TickOutcome::Skipped;
        }

        // a failed or dropped capture still consumes the interval
        self.pacer.mark(now);
        self.capture(now, requesters)
    }

    fn state(&self) -> LifecycleState {
        self.state
    }

    fn consumers(&self) -> usize {
        self.consumers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturedFrame, PixelFormat, Resolution};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Source returning frames of a fixed size and counting calls
    struct FixedSource {
        len: usize,
        calls: usize,
        resolution: Option<Resolution>,
    }

    impl FixedSource {
        fn new(len: usize) -> Self {
            Self {
                len,
                calls: 0,
                resolution: None,
            }
        }
    }

    impl FrameSource for FixedSource {
        fn configure(&mut self, resolution: Resolution) -> std::result::Result<(), CaptureError> {
            self.resolution = Some(resolution);
            Ok(())
        }

        fn capture_frame(
            &mut self,
            dest: &mut BytesMut,
        ) -> std::result::Result<CapturedFrame, CaptureError> {
            self.calls += 1;
            dest.resize(self.len, 0);
            Ok(CapturedFrame {
                sequence: self.calls as u64,
                width: 640,
                height: 480,
                format: PixelFormat::Mjpeg,
                timestamp: None,
                device_timestamp: None,
            })
        }
    }

    fn controller(len: usize, idle_fps: f64) -> StreamController<FixedSource> {
        let config = StreamConfig::from_alias("VGA", 15.0, idle_fps, 7000).unwrap();
        StreamController::new(config, FixedSource::new(len)).unwrap()
    }

    fn call_counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn new_applies_resolution_to_source() {
        let ctl = controller(100, 0.1);
        assert_eq!(ctl.source().resolution, Some(Resolution::R640x480));
        assert_eq!(ctl.state(), LifecycleState::Idle);
    }

    #[test]
    fn start_fires_once_per_transition() {
        let mut ctl = controller(100, 0.1);
        let (starts, on_start) = call_counter();
        ctl.on_stream_start(on_start);

        ctl.attach_consumer();
        ctl.attach_consumer();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.consumers(), 2);
        assert_eq!(ctl.state(), LifecycleState::Streaming);
    }

    #[test]
    fn stop_fires_on_last_detach_only() {
        let mut ctl = controller(100, 0.1);
        let (stops, on_stop) = call_counter();
        ctl.on_stream_stop(on_stop);

        ctl.attach_consumer();
        ctl.attach_consumer();
        ctl.detach_consumer();
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        ctl.detach_consumer();
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.state(), LifecycleState::Idle);
    }

    #[test]
    fn detach_at_zero_is_noop() {
        let mut ctl = controller(100, 0.1);
        let (stops, on_stop) = call_counter();
        ctl.on_stream_stop(on_stop);

        ctl.detach_consumer();
        assert_eq!(ctl.consumers(), 0);
        assert_eq!(stops.load(Ordering::SeqCst), 0);
        assert_eq!(ctl.state(), LifecycleState::Idle);
    }

    #[test]
    fn oversized_frames_are_dropped_but_consume_interval() {
        let mut ctl = controller(7001, 0.0);
        let t0 = Instant::now();
        ctl.attach_consumer();

        assert!(matches!(ctl.tick(t0), TickOutcome::Dropped(7001)));
        assert!(ctl.latest_frame().is_none());
        assert!(matches!(
            ctl.tick(t0 + Duration::from_millis(1)),
            TickOutcome::Skipped
        ));
        assert_eq!(ctl.stats().dropped, 1);
        assert_eq!(ctl.stats().captured, 1);
    }

    #[test]
    fn frames_at_threshold_are_delivered() {
        let mut ctl = controller(7000, 0.0);
        let images = Arc::new(AtomicUsize::new(0));
        let seen = images.clone();
        ctl.on_image(move |frame| {
            assert_eq!(frame.len(), 7000);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        ctl.attach_consumer();

        let outcome = ctl.tick(Instant::now());
        let TickOutcome::Delivered(frame) = outcome else {
            panic!("expected delivery, got {outcome:?}");
        };
        assert!(frame.was_requested_by(Requester::Stream));
        assert_eq!(images.load(Ordering::SeqCst), 1);
        assert_eq!(ctl.latest_frame().map(|f| f.len()), Some(7000));
    }

    #[test]
    fn reconfigure_rejected_while_streaming() {
        let mut ctl = controller(100, 0.1);
        ctl.attach_consumer();
        assert!(matches!(
            ctl.configure("QVGA", 15.0, 0.1, 7000),
            Err(StreamError::ReconfigureWhileStreaming)
        ));

        ctl.detach_consumer();
        ctl.configure("QVGA", 10.0, 0.0, 5000).unwrap();
        assert_eq!(ctl.config().resolution(), Resolution::R320x240);
        assert_eq!(ctl.source().resolution, Some(Resolution::R320x240));
        assert_eq!(ctl.config().active_interval_ms(), 100);
    }

    #[test]
    fn invalid_reconfigure_keeps_old_config() {
        let mut ctl = controller(100, 0.1);
        let before = *ctl.config();
        assert!(matches!(
            ctl.configure("VGA", 61.0, 0.1, 7000),
            Err(StreamError::InvalidConfig(_))
        ));
        assert_eq!(*ctl.config(), before);
    }

    #[test]
    fn single_request_paces_at_active_rate_then_clears() {
        let mut ctl = controller(100, 0.0);
        let t0 = Instant::now();

        assert!(matches!(ctl.tick(t0), TickOutcome::Skipped));
        ctl.request_image();
        let outcome = ctl.tick(t0);
        let TickOutcome::Delivered(frame) = outcome else {
            panic!("expected delivery, got {outcome:?}");
        };
        assert!(frame.was_requested_by(Requester::Single));
        assert!(!frame.was_requested_by(Requester::Stream));

        assert!(matches!(
            ctl.tick(t0 + Duration::from_secs(5)),
            TickOutcome::Skipped
        ));
    }

    #[test]
    fn control_handle_commands_apply_on_tick() {
        let mut ctl = controller(100, 0.0);
        let (starts, on_start) = call_counter();
        ctl.on_stream_start(on_start);
        let handle = ctl.control_handle();

        handle.attach();
        assert_eq!(ctl.state(), LifecycleState::Idle);
        assert!(ctl.tick(Instant::now()).attempted());
        assert_eq!(ctl.state(), LifecycleState::Streaming);
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        handle.detach();
        handle.detach();
        ctl.tick(Instant::now());
        assert_eq!(ctl.consumers(), 0);
        assert_eq!(ctl.state(), LifecycleState::Idle);
    }
}
