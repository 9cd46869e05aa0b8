//! # homesight - smart-home motion pipeline
//!
//! Two cooperating services built on an MQTT bus:
//! - The **vision node** captures frames, extracts moving blobs, fuses them
//!   with passive-infrared pulses, and publishes debounced room-crossing
//!   events plus a confirmed living-room presence signal.
//! - The **spotlight nodes** subscribe to those events and aim a PWM LED on
//!   pan/tilt servos at the occupant's path, with an auto-off hold window.
//!
//! ## Quick Start
//! ```no_run
//! use homesight::config::FusionConfig;
//! use homesight::camera::ImageFolderCamera;
//! use homesight::fusion::VisionService;
//! use std::sync::atomic::AtomicBool;
//!
//! let config = FusionConfig::default();
//! let camera = ImageFolderCamera::open("/var/lib/home-vision/frames").unwrap();
//! let mut service = VisionService::start(config, Box::new(camera)).unwrap();
//! let stop = AtomicBool::new(false);
//! service.run(&stop).unwrap();
//! ```

pub mod bus;
pub mod camera;
pub mod config;
pub mod detect;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod hardware;
pub mod journal;
pub mod protocol;
pub mod spotlight;

pub use error::HomesightError;

/// Result type alias for homesight operations.
pub type Result<T> = std::result::Result<T, HomesightError>;

/// Wall-clock timestamp as fractional seconds since the Unix epoch.
///
/// All bus payloads and debounce timers use this representation so PIR
/// timestamps arriving over the wire compare directly against local time.
pub fn utc_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
