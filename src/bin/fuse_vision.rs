//! Vision and sensor fusion node.
//!
//! Usage: fuse-vision [/etc/home-vision/config.json] [--frames DIR]
//! Runs until SIGINT/SIGTERM; exits non-zero when the camera or bus
//! cannot be brought up.

use clap::Parser;
use homesight::camera::ImageFolderCamera;
use homesight::config::{FusionConfig, DEFAULT_FUSION_CONFIG_PATH};
use homesight::fusion::VisionService;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fuse-vision", about = "Vision and sensor fusion node")]
struct Args {
    /// Path to the config file.
    #[arg(default_value = DEFAULT_FUSION_CONFIG_PATH)]
    config: PathBuf,

    /// Override the configured frame directory.
    #[arg(long)]
    frames: Option<PathBuf>,
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
    let mut config = FusionConfig::load(&args.config)?;
    if let Some(frames) = args.frames {
        config.frame_dir = Some(frames);
    }

    let frame_dir = config.frame_dir.clone().ok_or_else(|| {
        homesight::HomesightError::Camera(
            "no frame source configured (set frame_dir or pass --frames)".into(),
        )
    })?;
    let camera = ImageFolderCamera::open(&frame_dir)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            log::info!("received termination signal");
            stop.store(true, Ordering::Relaxed);
        })
        .map_err(|e| homesight::HomesightError::Config(format!("signal handler: {}", e)))?;
    }

    let mut service = VisionService::start(config, Box::new(camera))?;
    let result = service.run(&stop);
    service.stop();
    result
}
