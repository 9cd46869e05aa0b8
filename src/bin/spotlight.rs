//! Doorway spotlight node.
//!
//! Usage: spotlight [/etc/pir-node/spotlight.json]
//!        spotlight --set-orientation target --duration 10
//!
//! The calibration flags park the servos at the rest or target pose with
//! an optional brightness override, without touching the bus.

use clap::{Parser, ValueEnum};
use homesight::bus::{BusClient, BusOptions};
use homesight::config::{HardwareMode, SpotlightConfig, DEFAULT_SPOTLIGHT_CONFIG_PATH};
use homesight::hardware::open_hardware;
use homesight::spotlight::SpotlightController;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, ValueEnum)]
enum Pose {
    Rest,
    Target,
}

#[derive(Parser)]
#[command(name = "spotlight", about = "Doorway spotlight controller")]
struct Args {
    /// Path to the config file.
    #[arg(default_value = DEFAULT_SPOTLIGHT_CONFIG_PATH)]
    config: PathBuf,

    /// Calibration helper: move the servos to the given pose and exit.
    #[arg(long, value_enum)]
    set_orientation: Option<Pose>,

    /// How long to hold the calibration pose in seconds; 0 keeps it
    /// until interrupted.
    #[arg(long, default_value_t = 0.0)]
    duration: f64,

    /// LED brightness for calibration (0-1). Falls back to the
    /// configured value for the chosen pose.
    #[arg(long)]
    set_brightness: Option<f64>,

    /// Force mock hardware.
    #[arg(long)]
    mock: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> homesight::Result<()> {
    let mut config = SpotlightConfig::load(&args.config)?;
    if args.mock {
        config.hardware = HardwareMode::Mock;
    }

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("received termination signal");
            stop.store(true, Ordering::Relaxed);
        })
        .map_err(|e| homesight::HomesightError::Config(format!("signal handler: {}", e)))?;
    }

    if let Some(pose) = args.set_orientation {
        return run_calibration(&config, pose, args.set_brightness, args.duration, &stop);
    }

    let hardware = open_hardware(&config)?;
    let controller = SpotlightController::new(config.clone(), hardware);

    log::info!(
        "spotlight controller {} connecting to {}:{}",
        config.module_id,
        config.mqtt_host,
        config.mqtt_port
    );
    let bus = BusClient::connect(&BusOptions::new(
        config.client_id.clone(),
        config.mqtt_host.clone(),
        config.mqtt_port,
    ))?;

    let result = controller.start(&bus);
    if result.is_ok() {
        controller.run(&bus, &stop);
    }
    controller.shutdown();
    bus.stop();
    result
}

fn run_calibration(
    config: &SpotlightConfig,
    pose: Pose,
    brightness: Option<f64>,
    duration: f64,
    stop: &AtomicBool,
) -> homesight::Result<()> {
    let mut hardware = open_hardware(config)?;

    let (pan, tilt, default_brightness) = match pose {
        Pose::Target => (
            config.servo_pan_angle,
            config.servo_tilt_angle,
            config.brightness,
        ),
        Pose::Rest => (
            config.servo_rest_pan,
            config.servo_rest_tilt,
            config.rest_brightness,
        ),
    };
    let brightness = brightness.unwrap_or(default_brightness);

    hardware.set_orientation(pan, tilt);
    hardware.set_brightness(brightness);
    log::info!(
        "calibration pose applied (pan {:.1}, tilt {:.1}, brightness {:.2})",
        pan,
        tilt,
        brightness
    );

    if duration > 0.0 {
        let deadline = Instant::now() + Duration::from_secs_f64(duration);
        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(100));
        }
    } else {
        log::info!("holding pose until interrupted");
        while !stop.load(Ordering::Relaxed) {
            std::thread::sleep(Duration::from_secs(1));
        }
    }

    hardware.shutdown();
    Ok(())
}
