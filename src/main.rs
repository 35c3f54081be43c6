//! Iris camera stream controller

use std::time::{Duration, Instant};

use color_eyre::Result;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use iris::capture::{FrameSource, SyntheticSource};
use iris::stream::{ControlHandle, StreamControl, StreamController};
use iris::{Settings, SourceKind, CONFIG_PATH_ENV};

type DynSource = Box<dyn FrameSource + Send>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("iris=debug")),
        )
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Iris launching...");

    // Load configuration
    let config_path = std::env::var(CONFIG_PATH_ENV).ok();
    let settings = Settings::load(config_path.as_deref())?;
    let stream_config = settings.stream_config()?;

    let source = open_source(&settings)?;
    let mut camera = StreamController::new(stream_config, source)?;

    camera.on_stream_start(|| info!("on_stream_start"));
    camera.on_stream_stop(|| info!("on_stream_stop"));
    camera.on_image(|frame| {
        debug!(
            "Frame {} delivered ({}B, {:?})",
            frame.meta.sequence,
            frame.len(),
            frame.requesters
        );
    });

    let handle = camera.control_handle();
    if settings.scheduler.attach_on_start {
        handle.attach();
    }
    spawn_signal_controls(handle);

    if !settings.scheduler.keeps_pace_with(&stream_config) {
        warn!(
            "Tick period {} ms is not finer than the {} ms capture interval, frame rate will drop",
            settings.scheduler.tick_period_ms(),
            stream_config.active_interval_ms()
        );
    }
    let tick_period = Duration::from_millis(settings.scheduler.tick_period_ms());
    let mut ticker = tokio::time::interval(tick_period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Scheduler running every {:?}", tick_period);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                camera.tick(Instant::now());
            }
            _ = &mut shutdown => {
                info!("Ctrl-C received");
                break;
            }
        }
    }

    while camera.consumers() > 0 {
        camera.detach_consumer();
    }
    let stats = camera.stats();
    info!(
        "Iris shutting down: {} captured, {} delivered, {} dropped, {} empty",
        stats.captured, stats.delivered, stats.dropped, stats.empty
    );
    Ok(())
}

fn open_source(settings: &Settings) -> Result<DynSource> {
    match settings.source.kind {
        SourceKind::Synthetic => {
            info!("Using synthetic frame source");
            Ok(Box::new(SyntheticSource::default()))
        }
        #[cfg(feature = "uvc")]
        SourceKind::Uvc => {
            use iris::capture::v4l2::{auto_detect_device, V4l2Source};

            let path = if settings.source.device.is_empty() {
                auto_detect_device()?
            } else {
                settings.source.device.clone()
            };
            info!("Using capture device: {}", path);
            Ok(Box::new(V4l2Source::open(&path, settings.source.buffer_count)?))
        }
        #[cfg(not(feature = "uvc"))]
        SourceKind::Uvc => Err(color_eyre::eyre::eyre!("built without the `uvc` feature")),
    }
}

/// SIGUSR1 attaches a consumer, SIGUSR2 detaches one
#[cfg(unix)]
fn spawn_signal_controls(handle: ControlHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let (Ok(mut usr1), Ok(mut usr2)) = (
            signal(SignalKind::user_defined1()),
            signal(SignalKind::user_defined2()),
        ) else {
            tracing::warn!("Signal controls unavailable");
            return;
        };
        loop {
            tokio::select! {
                Some(()) = usr1.recv() => handle.attach(),
                Some(()) = usr2.recv() => handle.detach(),
                else => break,
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_signal_controls(_handle: ControlHandle) {}
