//! Error types for the stream controller

use thiserror::Error;

use crate::capture::CaptureError;

/// Result type alias using StreamError
pub type Result<T> = std::result::Result<T, StreamError>;

/// Errors surfaced by configuration and lifecycle operations.
///
/// Frame drops and empty capture ticks are not errors and never show up here.
#[derive(Debug, Error)]
pub enum StreamError {
    /// A configured value is outside its validated range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resolution changes are only accepted while idle
    #[error("cannot reconfigure while streaming; detach all consumers first")]
    ReconfigureWhileStreaming,

    /// The frame source rejected the requested configuration
    #[error("frame source error: {0}")]
    Source(#[from] CaptureError),

    /// Settings could not be loaded or deserialized
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),
}
