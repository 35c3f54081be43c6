pub mod capture;
pub mod error;
pub mod stream;

use serde::{Deserialize, Serialize};

pub use error::{Result, StreamError};
use stream::StreamConfig;

/// Environment variable naming an alternative settings file
pub const CONFIG_PATH_ENV: &str = "IRIS_CONFIG";

/// System configuration, read once at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub camera: CameraSettings,
    pub source: SourceSettings,
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Resolution name or `WIDTHxHEIGHT`, e.g. `VGA` or `640X480`
    pub resolution: String,
    pub max_framerate: f64,
    /// 0 disables idle captures
    pub idle_framerate: f64,
    pub drop_frame_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Generated frames, no hardware needed
    Synthetic,
    /// USB webcam through V4L2
    Uvc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub kind: SourceKind,
    /// Device path; empty means auto-detect
    pub device: String,
    pub buffer_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Tick period, must be finer than the active interval
    pub tick_ms: u64,
    /// Attach one consumer right after startup
    pub attach_on_start: bool,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            resolution: "ANY".into(),
            max_framerate: 15.0,
            idle_framerate: 0.1,
            drop_frame_size: 7000,
        }
    }
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            device: String::new(),
            buffer_count: 4,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_ms: 5,
            attach_on_start: false,
        }
    }
}

impl SchedulerSettings {
    /// Tick period actually used by the scheduler
    pub fn tick_period_ms(&self) -> u64 {
        self.tick_ms.max(1)
    }

    /// Whether ticks come often enough to hit every active capture on time
    pub fn keeps_pace_with(&self, config: &StreamConfig) -> bool {
        self.tick_period_ms() < config.active_interval_ms()
    }
}

impl Settings {
    /// Load defaults, then `path` (or `iris.toml`) if present, then `IRIS_*`
    /// environment variables such as `IRIS_CAMERA__MAX_FRAMERATE`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path.unwrap_or("iris")).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix("IRIS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }

    /// Validate the camera section into an immutable [`StreamConfig`]
    pub fn stream_config(&self) -> Result<StreamConfig> {
        StreamConfig::from_alias(
            &self.camera.resolution,
            self.camera.max_framerate,
            self.camera.idle_framerate,
            self.camera.drop_frame_size,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Resolution;

    #[test]
    fn defaults_validate() {
        let cfg = Settings::default().stream_config().unwrap();
        assert_eq!(cfg.resolution(), Resolution::Any);
        assert_eq!(cfg.active_interval_ms(), 67);
        assert_eq!(cfg.idle_interval_ms(), 10000);
        assert_eq!(cfg.drop_threshold_bytes(), 7000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let settings = Settings::from_toml(
            r#"
            [camera]
            resolution = "svga"
            idle_framerate = 0

            [source]
            kind = "uvc"
            device = "/dev/video2"
            "#,
        )
        .unwrap();
        assert_eq!(settings.source.kind, SourceKind::Uvc);
        assert_eq!(settings.source.device, "/dev/video2");
        assert_eq!(settings.source.buffer_count, 4);
        assert_eq!(settings.scheduler.tick_ms, 5);

        let cfg = settings.stream_config().unwrap();
        assert_eq!(cfg.resolution(), Resolution::R800x600);
        assert!(!cfg.idle_pacing_enabled());
    }

    #[test]
    fn out_of_range_settings_fail_validation() {
        let settings = Settings::from_toml("[camera]\nmax_framerate = 120.0\n").unwrap();
        assert!(matches!(
            settings.stream_config(),
            Err(StreamError::InvalidConfig(_))
        ));

        let settings = Settings::from_toml("[camera]\nresolution = \"8K\"\n").unwrap();
        assert!(matches!(
            settings.stream_config(),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn coarse_tick_cannot_keep_pace() {
        let cfg = Settings::default().stream_config().unwrap();
        let mut scheduler = SchedulerSettings::default();
        assert!(scheduler.keeps_pace_with(&cfg));

        scheduler.tick_ms = 66;
        assert!(scheduler.keeps_pace_with(&cfg));
        scheduler.tick_ms = 67;
        assert!(!scheduler.keeps_pace_with(&cfg));
        scheduler.tick_ms = 500;
        assert!(!scheduler.keeps_pace_with(&cfg));

        scheduler.tick_ms = 0;
        assert_eq!(scheduler.tick_period_ms(), 1);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(matches!(
            Settings::load(Some("/nonexistent/iris-settings")),
            Err(StreamError::Settings(_))
        ));
    }
}
