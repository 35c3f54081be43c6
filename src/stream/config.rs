//! Validated, immutable stream configuration

use tracing::info;

use super::pacing::fps_to_interval_ms;
use crate::capture::Resolution;
use crate::error::{Result, StreamError};

/// Highest accepted streaming frame rate
pub const MAX_FRAMERATE: f64 = 60.0;
/// Highest accepted idle frame rate
pub const MAX_IDLE_FRAMERATE: f64 = 1.0;
/// Largest accepted drop threshold in bytes
pub const MAX_DROP_FRAME_SIZE: u32 = 100_000;

/// Pacing and drop policy for one camera.
///
/// Built once through [`StreamConfig::configure`]; there are no setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    resolution: Resolution,
    active_interval_ms: u64,
    idle_interval_ms: u64,
    drop_threshold_bytes: u32,
}

impl StreamConfig {
    /// Validate raw settings and derive pacing intervals.
    ///
    /// `max_fps` must lie in `(0, 60]`, `idle_fps` in `[0, 1]` (0 disables
    /// idle captures) and `drop_threshold_bytes` in `[0, 100000]`.
    pub fn configure(
        resolution: Resolution,
        max_fps: f64,
        idle_fps: f64,
        drop_threshold_bytes: u32,
    ) -> Result<Self> {
        if !max_fps.is_finite() || max_fps <= 0.0 || max_fps > MAX_FRAMERATE {
            return Err(StreamError::InvalidConfig(format!(
                "max framerate {max_fps} fps is outside (0, {MAX_FRAMERATE}]"
            )));
        }
        if !idle_fps.is_finite() || !(0.0..=MAX_IDLE_FRAMERATE).contains(&idle_fps) {
            return Err(StreamError::InvalidConfig(format!(
                "idle framerate {idle_fps} fps is outside [0, {MAX_IDLE_FRAMERATE}]"
            )));
        }
        if drop_threshold_bytes > MAX_DROP_FRAME_SIZE {
            return Err(StreamError::InvalidConfig(format!(
                "drop frame size {drop_threshold_bytes} is outside [0, {MAX_DROP_FRAME_SIZE}]"
            )));
        }

        Ok(Self {
            resolution,
            active_interval_ms: fps_to_interval_ms(max_fps),
            idle_interval_ms: fps_to_interval_ms(idle_fps),
            drop_threshold_bytes,
        })
    }

    /// Same as [`StreamConfig::configure`] but resolves a textual resolution alias.
    pub fn from_alias(
        resolution: &str,
        max_fps: f64,
        idle_fps: f64,
        drop_threshold_bytes: u32,
    ) -> Result<Self> {
        Self::configure(resolution.parse()?, max_fps, idle_fps, drop_threshold_bytes)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn active_interval_ms(&self) -> u64 {
        self.active_interval_ms
    }

    /// 0 when idle pacing is disabled
    pub fn idle_interval_ms(&self) -> u64 {
        self.idle_interval_ms
    }

    pub fn idle_pacing_enabled(&self) -> bool {
        self.idle_interval_ms != 0
    }

    pub fn drop_threshold_bytes(&self) -> u32 {
        self.drop_threshold_bytes
    }

    /// Whether a frame of `len` bytes has to be discarded
    pub fn should_drop(&self, len: usize) -> bool {
        len > self.drop_threshold_bytes as usize
    }

    /// Dump the configuration at info level
    pub fn log_config(&self) {
        info!("Camera stream configuration:");
        info!("  Resolution: {}", self.resolution);
        info!("  Update interval: {} ms", self.active_interval_ms);
        if self.idle_pacing_enabled() {
            info!("  Idle interval: {} ms", self.idle_interval_ms);
        } else {
            info!("  Idle interval: disabled");
        }
        info!("  Drop frame size: {} B", self.drop_threshold_bytes);
    }
}

impl Default for StreamConfig {
    /// 15 fps streaming, 0.1 fps idle preview, 7000 byte drop size
    fn default() -> Self {
        Self {
            resolution: Resolution::Any,
            active_interval_ms: fps_to_interval_ms(15.0),
            idle_interval_ms: fps_to_interval_ms(0.1),
            drop_threshold_bytes: 7000,
        }
    }
}
