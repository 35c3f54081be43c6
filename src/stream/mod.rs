pub mod command;
pub mod config;
pub mod controller;
pub mod pacing;
pub mod reader;
pub mod triggers;

pub use command::{Command, ControlHandle};
pub use config::StreamConfig;
#[cfg(feature = "uvc")]
pub use controller::UvcCamera;
pub use controller::{
    LifecycleState, SensorCamera, StreamControl, StreamController, StreamStats, TickOutcome,
};
pub use pacing::fps_to_interval_ms;
pub use reader::ImageReader;
