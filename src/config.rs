//! JSON configuration for both services.
//!
//! Each service loads one file from a fixed path. A missing file yields the
//! built-in defaults, missing fields default individually, unknown fields
//! are ignored. A file that exists but fails to parse is a startup error.

use crate::geometry::{Line, Point, Polygon};
use crate::protocol;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_FUSION_CONFIG_PATH: &str = "/etc/home-vision/config.json";
pub const DEFAULT_SPOTLIGHT_CONFIG_PATH: &str = "/etc/pir-node/spotlight.json";
pub const DEFAULT_JSONL_PATH: &str = "/var/log/home/vision_events.jsonl";

/// Door lines and the living-room polygon, all in normalized coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    pub bed_door: Line,
    pub bath_door: Line,
    pub living_room_polygon: Polygon,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            bed_door: Line(Point(0.15, 0.30), Point(0.35, 0.30)),
            bath_door: Line(Point(0.65, 0.40), Point(0.85, 0.40)),
            living_room_polygon: Polygon(vec![
                Point(0.2, 0.35),
                Point(0.8, 0.35),
                Point(0.85, 0.9),
                Point(0.15, 0.9),
            ]),
        }
    }
}

/// Topic map used by the vision node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionTopics {
    pub pir: String,
    pub vision_state: String,
    pub bed_event_out: String,
    pub bed_event_in: String,
    pub bath_event_out: String,
    pub bath_event_in: String,
}

impl Default for FusionTopics {
    fn default() -> Self {
        Self {
            pir: protocol::PIR_TOPIC.into(),
            vision_state: protocol::PRESENCE_TOPIC.into(),
            bed_event_out: protocol::BED_EVENT_OUT.into(),
            bed_event_in: protocol::BED_EVENT_IN.into(),
            bath_event_out: protocol::BATH_EVENT_OUT.into(),
            bath_event_in: protocol::BATH_EVENT_IN.into(),
        }
    }
}

/// Vision node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    pub topics: FusionTopics,
    /// Minimum blob area in pixels after resize.
    pub min_contour_area: f64,
    pub frame_resize_width: u32,
    /// Seconds before accepting a new crossing on the same door.
    pub detection_cooldown: f64,
    pub presence_hold_seconds: f64,
    pub presence_confirm_seconds: f64,
    pub pir_boost_window: f64,
    pub pir_cross_window: f64,
    pub log_jsonl_path: Option<PathBuf>,
    pub fsync_journal: bool,
    /// Directory of still frames driving the folder camera.
    pub frame_dir: Option<PathBuf>,
    pub geometry: GeometryConfig,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            mqtt_host: "127.0.0.1".into(),
            mqtt_port: 1883,
            mqtt_client_id: "vision_fusion".into(),
            topics: FusionTopics::default(),
            min_contour_area: 1_200.0,
            frame_resize_width: 640,
            detection_cooldown: 1.0,
            presence_hold_seconds: 3.0,
            presence_confirm_seconds: 0.5,
            pir_boost_window: 2.0,
            pir_cross_window: 1.0,
            log_jsonl_path: Some(PathBuf::from(DEFAULT_JSONL_PATH)),
            fsync_journal: false,
            frame_dir: None,
            geometry: GeometryConfig::default(),
        }
    }
}

impl FusionConfig {
    pub fn load(path: &Path) -> crate::Result<FusionConfig> {
        load_json(path)
    }
}

/// How the spotlight node binds its LED and servos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareMode {
    /// Try GPIO, fall back to the logging mock with a warning.
    Auto,
    /// Require GPIO; initialization failure is fatal.
    Gpio,
    /// Always use the logging mock.
    Mock,
}

/// Doorway spotlight node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotlightConfig {
    pub module_id: String,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub client_id: String,
    pub trigger_on_topics: Vec<String>,
    pub trigger_off_topics: Vec<String>,
    /// Auto-off window in seconds; 0 disables the guardrail.
    pub light_hold_seconds: f64,
    pub brightness: f64,
    pub rest_brightness: f64,
    pub led_pwm_pin: u8,
    pub led_frequency: u32,
    pub servo_pan_pin: u8,
    pub servo_tilt_pin: u8,
    pub servo_pan_angle: f64,
    pub servo_tilt_angle: f64,
    pub servo_rest_pan: f64,
    pub servo_rest_tilt: f64,
    pub servo_min_angle: f64,
    pub servo_max_angle: f64,
    pub servo_min_pulse_width: f64,
    pub servo_max_pulse_width: f64,
    pub auto_rest: bool,
    pub hardware: HardwareMode,
}

impl Default for SpotlightConfig {
    fn default() -> Self {
        Self {
            module_id: "doorway_bedroom".into(),
            mqtt_host: "127.0.0.1".into(),
            mqtt_port: 1883,
            client_id: String::new(),
            trigger_on_topics: Vec::new(),
            trigger_off_topics: Vec::new(),
            light_hold_seconds: 8.0,
            brightness: 0.85,
            rest_brightness: 0.0,
            led_pwm_pin: 18,
            led_frequency: 500,
            servo_pan_pin: 12,
            servo_tilt_pin: 13,
            servo_pan_angle: -20.0,
            servo_tilt_angle: -5.0,
            servo_rest_pan: 0.0,
            servo_rest_tilt: 0.0,
            servo_min_angle: -90.0,
            servo_max_angle: 90.0,
            servo_min_pulse_width: 0.0005,
            servo_max_pulse_width: 0.0025,
            auto_rest: true,
            hardware: HardwareMode::Auto,
        }
    }
}

impl SpotlightConfig {
    pub fn load(path: &Path) -> crate::Result<SpotlightConfig> {
        let mut config: SpotlightConfig = load_json(path)?;
        config.ensure_topics();
        Ok(config)
    }

    /// Fill in the per-module defaults that depend on other fields.
    pub fn ensure_topics(&mut self) {
        if self.trigger_on_topics.is_empty() {
            self.trigger_on_topics = vec![protocol::BED_EVENT_OUT.into()];
        }
        if self.trigger_off_topics.is_empty() {
            self.trigger_off_topics = vec![protocol::BATH_EVENT_IN.into()];
        }
        if self.client_id.is_empty() {
            self.client_id = format!("spotlight_{}", self.module_id);
        }
    }
}

fn load_json<T: Default + serde::de::DeserializeOwned>(path: &Path) -> crate::Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
