//! Face gaze tracker: drives a robot head toward the most prominent face.

use anyhow::{bail, Context, Result};
use clap::Parser;
use face_gaze_tracker::{
    app::{spawn_source, DetectionSource, ReplayFile, SyntheticSweep},
    config::{Config, EXAMPLE_CONFIG},
    constants::DETECTION_CHANNEL_CAPACITY,
    control::{EchoJointState, LoggingActuator},
    scheduler::Scheduler,
};
use log::{info, warn};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Replay recorded detections from a YAML file
    #[arg(short, long, conflicts_with = "synthetic")]
    replay: Option<String>,

    /// Generate a synthetic face sweeping across the frame
    #[arg(short, long)]
    synthetic: bool,

    /// Easing curve (linear, cubic)
    #[arg(short, long)]
    easing: Option<String>,

    /// Control loop rate in Hz
    #[arg(long)]
    rate: Option<u32>,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Body yaw reported to the controller in degrees
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    body_yaw: f64,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Write the example configuration to this path and exit
    #[arg(long)]
    write_example_config: Option<String>,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if let Some(path) = &args.write_example_config {
        std::fs::write(path, EXAMPLE_CONFIG).with_context(|| format!("Failed to write {path}"))?;
        info!("Example configuration written to {}", path);
        return Ok(());
    }

    info!("Face Gaze Tracker");

    // Load configuration if provided
    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path);
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {}. Using defaults.", e);
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    // Command line overrides
    if let Some(easing) = args.easing {
        config.control.easing = easing;
    }
    if let Some(rate) = args.rate {
        config.control.control_rate_hz = rate;
    }
    config.validate().context("Invalid configuration")?;

    let source = if let Some(path) = &args.replay {
        info!("Replaying detections from: {}", path);
        let replay = ReplayFile::from_file(path).with_context(|| format!("Failed to load replay {path}"))?;
        DetectionSource::Replay(replay)
    } else if args.synthetic {
        let sweep = SyntheticSweep {
            frame_width: config.camera.frame_width,
            frame_height: config.camera.frame_height,
            ..SyntheticSweep::default()
        };
        DetectionSource::Synthetic(sweep, None)
    } else {
        bail!("No detection source: pass --replay <file> or --synthetic");
    };

    let limit = match args.duration {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => bail!("Duration must be a positive number of seconds, got {secs}"),
        None => None,
    };

    let (detections_tx, detections_rx) = crossbeam_channel::bounded(DETECTION_CHANNEL_CAPACITY);
    let scheduler = Scheduler::spawn(
        &config,
        detections_rx,
        Box::new(EchoJointState::new(args.body_yaw)),
        Box::new(LoggingActuator::new()),
    )?;
    let detector = spawn_source(source, detections_tx, scheduler.stop_handle())?;

    let start = Instant::now();
    while !scheduler.tracking_finished() {
        if limit.is_some_and(|l| start.elapsed() >= l) {
            info!("Duration reached");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    let stats = scheduler.shutdown()?;
    let source_stats = detector
        .join()
        .map_err(|_| anyhow::anyhow!("Detection source panicked"))?;

    info!(
        "Processed {} frames ({} with faces, {} dropped); {} control ticks, {} commands, {} safety violations",
        stats.tracking.frames_processed,
        stats.tracking.faces_detected,
        source_stats.dropped,
        stats.control.ticks,
        stats.control.commands_sent,
        stats.control.violations
    );

    Ok(())
}
