//! multicamd - multi-camera capture daemon
//!
//! This daemon:
//! 1. Starts one capture worker per configured camera
//! 2. Reads control input from stdin (n/p/[/] switch, a number selects, q quits)
//! 3. Runs the consumer loop: fetches the selected camera's latest frame, tracks FPS,
//!    reports offline and stale cameras
//! 4. Logs per-camera health every few seconds
//! 5. Stops every worker and releases every device on quit or Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use multicam::{
    CameraId, CameraSelector, CaptureConfig, CaptureRig, ControlEvent, Driver,
    EventType, Flow, FpsCounter, Platform, Shutdown, SystemOpener,
};

const DISPLAY_INTERVAL: Duration = Duration::from_millis(100);
const HEALTH_INTERVAL: Duration = Duration::from_secs(5);
const STALE_AFTER: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capture every configured camera concurrently and switch between them instantly"
)]
struct Args {
    /// Config file (TOML for .toml, JSON otherwise).
    #[arg(long, env = "MULTICAM_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Camera shown first. Must be one of the configured cameras.
    #[arg(long, value_name = "ID")]
    camera: Option<CameraId>,

    /// Capture driver (synthetic, v4l2, gstreamer, auto).
    #[arg(long, value_name = "DRIVER")]
    driver: Option<Driver>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => CaptureConfig::from_path(path)?,
        None => CaptureConfig::load()?,
    };
    if let Some(camera) = args.camera {
        if !config.cameras.contains(&camera) {
            return Err(anyhow!("camera {} is not configured", camera));
        }
        config.initial_camera = camera;
    }
    if let Some(driver) = args.driver {
        config.driver = driver;
    }

    log::info!("multicamd starting on {}", Platform::current());

    let rig = CaptureRig::start(&config, Arc::new(SystemOpener::new(config.driver)))?;
    let shutdown = rig.shutdown_signal();

    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        ctrlc_shutdown.trigger();
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    spawn_control_thread(Arc::clone(rig.selector()), shutdown.clone())?;

    log::info!(
        "multicamd running. cameras={:?} selected={} backend={}",
        config.cameras.iter().map(|c| c.index()).collect::<Vec<_>>(),
        rig.selector().current(),
        rig.backend()
    );

    let mut fps = FpsCounter::new(Instant::now());
    let mut last_sequence: Option<(CameraId, u64)> = None;
    let mut reported_offline: Option<CameraId> = None;
    let mut last_health_log = Instant::now();
    let mut all_offline = false;

    while !shutdown.is_triggered() {
        if let Some(frame) = rig.frame_for_display() {
            let key = (frame.camera_id(), frame.sequence());
            if !frame.is_valid() {
                if reported_offline != Some(frame.camera_id()) {
                    log::warn!("camera {} is offline", frame.camera_id());
                    reported_offline = Some(frame.camera_id());
                }
            } else if last_sequence != Some(key) {
                fps.update(Instant::now());
                last_sequence = Some(key);
                reported_offline = None;
                if frame.age() > STALE_AFTER {
                    log::debug!(
                        "camera {} frame {} is {:?} old",
                        frame.camera_id(),
                        frame.sequence(),
                        frame.age()
                    );
                }
            }
        }

        if last_health_log.elapsed() >= HEALTH_INTERVAL {
            last_health_log = Instant::now();
            let selected = rig.selector().current();
            for (camera, state) in rig.states() {
                let frames = rig.status(camera).map_or(0, |s| s.frames());
                let reconnects = rig.status(camera).map_or(0, |s| s.reconnects());
                log::info!(
                    "camera {}{}: state={} frames={} reconnects={}",
                    camera,
                    if camera == selected { " (selected)" } else { "" },
                    state,
                    frames,
                    reconnects
                );
            }
            log::info!("display fps={:.1}", fps.fps());
        }

        // Failed cameras never come back; exit non-zero so a supervisor restarts us.
        if rig.all_offline() {
            log::error!("{} every camera is offline", EventType::CameraError);
            all_offline = true;
            break;
        }

        shutdown.wait_timeout(DISPLAY_INTERVAL);
    }

    for (camera, exit) in rig.shutdown() {
        log::info!("camera {} stopped: {:?}", camera, exit);
    }
    if all_offline {
        return Err(anyhow!("every camera is offline"));
    }
    Ok(())
}

/// Read operator commands from stdin until quit or end of input.
fn spawn_control_thread(selector: Arc<CameraSelector>, shutdown: Shutdown) -> Result<()> {
    std::thread::Builder::new()
        .name("control".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                let Some(event) = ControlEvent::parse(&line) else {
                    if !line.trim().is_empty() {
                        log::warn!("unrecognised command '{}'", line.trim());
                    }
                    continue;
                };
                log::info!("{} event={:?}", EventType::UserInput, event);
                match event.apply(&selector) {
                    Ok(Flow::Continue) => log::info!("showing camera {}", selector.current()),
                    Ok(Flow::Quit) => {
                        shutdown.trigger();
                        break;
                    }
                    Err(err) => log::warn!("{}; still showing camera {}", err, selector.current()),
                }
            }
        })?;
    Ok(())
}
