//! Vision and sensor fusion service.
//!
//! Captures frames, extracts the largest moving blob, and fuses the
//! centroid track with recent PIR pulses delivered over the bus. Debounced
//! crossing events and the living-room presence signal are published back
//! through the bus and mirrored to the JSONL journal.
//!
//! The decision logic lives in [`FusionEngine`], which never reads the
//! clock itself; every observation carries its timestamp. The surrounding
//! [`VisionService`] owns the camera, detector, bus and journal, and feeds
//! the engine from its run loop.

use crate::bus::{BusClient, BusOptions};
use crate::camera::{resize_to_width, FrameSource};
use crate::config::FusionConfig;
use crate::detect::MotionDetector;
use crate::geometry::{line_crossed, point_in_polygon, Direction, Line, Point};
use crate::journal::EventJournal;
use crate::protocol::{
    self, CrossingPayload, Door, PirPayload, PirState, PresencePayload, Zone,
};
use image::RgbImage;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A debounced, directional door crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub door: Door,
    pub direction: Direction,
    pub centroid: Point,
    pub ts: f64,
    pub confidence: f64,
}

/// A presence flip; confidence is derived from the new state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceChange {
    pub present: bool,
    pub ts: f64,
}

/// What one frame observation produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameOutcome {
    pub crossing: Option<Crossing>,
    pub presence: Option<PresenceChange>,
}

fn door_index(door: Door) -> usize {
    match door {
        Door::Bed => 0,
        Door::Bath => 1,
    }
}

fn zone_index(zone: Zone) -> usize {
    match zone {
        Zone::Bedroom => 0,
        Zone::Bathroom => 1,
    }
}

/// The fusion state machine: centroid history, per-door crossing cooldowns,
/// PIR recency, and the two-timer presence debounce.
pub struct FusionEngine {
    config: FusionConfig,
    last_centroid: Option<Point>,
    last_cross: [f64; 2],
    pir_last_on: [f64; 2],
    present: bool,
    enter_t: Option<f64>,
    exit_t: Option<f64>,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> FusionEngine {
        FusionEngine {
            config,
            last_centroid: None,
            last_cross: [f64::NEG_INFINITY; 2],
            pir_last_on: [f64::NEG_INFINITY; 2],
            present: false,
            enter_t: None,
            exit_t: None,
        }
    }

    /// Record a PIR pulse for a zone. Newer pulses overwrite older ones.
    pub fn observe_pir(&mut self, zone: Zone, ts: f64) {
        self.pir_last_on[zone_index(zone)] = ts;
    }

    /// Whether any PIR pulse corroborates motion right now.
    pub fn pir_boost_active(&self, now: f64) -> bool {
        self.pir_last_on
            .iter()
            .any(|&last| now - last <= self.config.pir_boost_window)
    }

    /// Area gate for the detector: relaxed to 0.6x while infrared
    /// corroborates, so marginal blobs still count.
    pub fn effective_min_area(&self, now: f64) -> f64 {
        if self.pir_boost_active(now) {
            self.config.min_contour_area * 0.6
        } else {
            self.config.min_contour_area
        }
    }

    pub fn present(&self) -> bool {
        self.present
    }

    /// Feed one frame's (possibly absent) normalized centroid.
    ///
    /// The presence machine always runs. The crossing check needs both a
    /// previous and a current centroid; doors are tested in fixed order
    /// (bed, then bath) and at most one crossing is emitted per frame.
    /// A frame without a centroid leaves the track untouched.
    pub fn observe_frame(&mut self, centroid: Option<Point>, now: f64) -> FrameOutcome {
        let mut outcome = FrameOutcome {
            presence: self.update_presence(centroid, now),
            ..FrameOutcome::default()
        };

        let Some(curr) = centroid else {
            return outcome;
        };
        let prev = self.last_centroid.replace(curr);
        let Some(prev) = prev else {
            return outcome;
        };

        for door in [Door::Bed, Door::Bath] {
            let Some(direction) = line_crossed(prev, curr, self.door_line(door)) else {
                continue;
            };
            if now - self.last_cross[door_index(door)] < self.config.detection_cooldown {
                log::debug!("crossing on {:?} suppressed by cooldown", door);
                continue;
            }
            self.last_cross[door_index(door)] = now;
            outcome.crossing = Some(Crossing {
                door,
                direction,
                centroid: curr,
                ts: now,
                confidence: self.crossing_confidence(door.zone(), now),
            });
            break;
        }
        outcome
    }

    fn door_line(&self, door: Door) -> Line {
        match door {
            Door::Bed => self.config.geometry.bed_door,
            Door::Bath => self.config.geometry.bath_door,
        }
    }

    fn crossing_confidence(&self, zone: Zone, ts: f64) -> f64 {
        let pir_recent =
            ts - self.pir_last_on[zone_index(zone)] <= self.config.pir_cross_window;
        if pir_recent {
            protocol::CONF_CROSSING_PIR
        } else {
            protocol::CONF_CROSSING
        }
    }

    /// Two hysteretic timers: the enter debounce filters flicker before
    /// confirming presence, the exit hold bridges brief occlusions before
    /// clearing it. Presence flips strictly alternate.
    fn update_presence(&mut self, centroid: Option<Point>, now: f64) -> Option<PresenceChange> {
        let in_poly = centroid.map_or(false, |c| {
            point_in_polygon(c, &self.config.geometry.living_room_polygon)
        });

        if in_poly {
            if self.present {
                self.exit_t = None;
                return None;
            }
            match self.enter_t {
                None => {
                    self.enter_t = Some(now);
                    None
                }
                Some(enter_t) if now - enter_t >= self.config.presence_confirm_seconds => {
                    self.present = true;
                    self.exit_t = None;
                    Some(PresenceChange { present: true, ts: now })
                }
                Some(_) => None,
            }
        } else {
            self.enter_t = None;
            if !self.present {
                self.exit_t = None;
                return None;
            }
            match self.exit_t {
                None => {
                    self.exit_t = Some(now);
                    None
                }
                Some(exit_t) if now - exit_t >= self.config.presence_hold_seconds => {
                    self.present = false;
                    Some(PresenceChange { present: false, ts: now })
                }
                Some(_) => None,
            }
        }
    }
}

/// The vision node: one main loop plus the bus reader thread.
pub struct VisionService {
    config: FusionConfig,
    engine: FusionEngine,
    detector: MotionDetector,
    camera: Box<dyn FrameSource>,
    bus: BusClient,
    journal: EventJournal,
}

impl VisionService {
    /// Validate geometry, connect the bus, and subscribe to PIR pulses.
    /// The camera is handed in already opened; a failed open is the
    /// caller's fatal startup error.
    pub fn start(config: FusionConfig, camera: Box<dyn FrameSource>) -> crate::Result<VisionService> {
        config.geometry.living_room_polygon.validate()?;

        log::info!("starting vision fusion service");
        let bus = BusClient::connect(&BusOptions::new(
            config.mqtt_client_id.clone(),
            config.mqtt_host.clone(),
            config.mqtt_port,
        ))?;
        bus.subscribe(&config.topics.pir)?;
        let journal = EventJournal::new(config.log_jsonl_path.clone(), config.fsync_journal);

        Ok(VisionService {
            engine: FusionEngine::new(config.clone()),
            detector: MotionDetector::new(),
            camera,
            bus,
            journal,
            config,
        })
    }

    /// Drain PIR pulses, then do one frame's worth of work, until the
    /// stop flag is set. Everything inside is recovered locally; only the
    /// caller's startup path is fatal.
    pub fn run(&mut self, stop: &AtomicBool) -> crate::Result<()> {
        while !stop.load(Ordering::Relaxed) {
            self.drain_pir();

            let frame = match self.camera.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    std::thread::sleep(Duration::from_millis(500));
                    continue;
                }
                Err(e) => {
                    log::warn!("frame capture failed: {}", e);
                    std::thread::sleep(Duration::from_millis(500));
                    continue;
                }
            };
            self.process_frame(&frame);
        }
        Ok(())
    }

    /// Release camera and bus. The bus disconnects cleanly on drop as
    /// well, so early-exit paths stay covered.
    pub fn stop(mut self) {
        log::info!("stopping vision fusion service");
        self.camera.stop();
        self.bus.stop();
    }

    /// Bus link state, for health reporting.
    pub fn bus_connected(&self) -> bool {
        self.bus.is_connected()
    }

    fn drain_pir(&mut self) {
        while let Some(event) = self.bus.poll_event(Duration::ZERO) {
            // Malformed JSON was already logged on the reader thread.
            let Some(json) = event.json else { continue };
            match serde_json::from_value::<PirPayload>(json) {
                Ok(payload) if payload.state == PirState::On => {
                    let zone = Zone::from_topic(&event.topic);
                    let ts = payload.ts.unwrap_or_else(crate::utc_timestamp);
                    log::debug!("PIR {:?} triggered at {:.3}", zone, ts);
                    self.engine.observe_pir(zone, ts);
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("discarding unknown payload on {}: {}", event.topic, e);
                }
            }
        }
    }

    fn process_frame(&mut self, frame: &RgbImage) {
        let now = crate::utc_timestamp();
        let resized = resize_to_width(frame, self.config.frame_resize_width);
        let gray = image::imageops::grayscale(&resized);

        let min_area = self.engine.effective_min_area(now);
        let centroid = self.detector.detect(&gray, min_area).map(|blob| {
            Point(
                blob.centroid.0 / resized.width() as f64,
                blob.centroid.1 / resized.height() as f64,
            )
        });

        let outcome = self.engine.observe_frame(centroid, now);
        if let Some(change) = outcome.presence {
            self.publish_presence(&change);
        }
        if let Some(crossing) = outcome.crossing {
            self.publish_crossing(&crossing);
        }
    }

    fn publish_crossing(&self, crossing: &Crossing) {
        let topics = &self.config.topics;
        let topic = match (crossing.direction, crossing.door.zone()) {
            (Direction::IntoLiving, Zone::Bedroom) => &topics.bed_event_out,
            (Direction::IntoLiving, Zone::Bathroom) => &topics.bath_event_out,
            (Direction::IntoRoom, Zone::Bedroom) => &topics.bed_event_in,
            (Direction::IntoRoom, Zone::Bathroom) => &topics.bath_event_in,
        };
        let payload = CrossingPayload {
            ts: crossing.ts,
            dir: crossing.direction,
            centroid: crossing.centroid,
            conf: crossing.confidence,
        };
        self.publish(topic, &payload);
    }

    fn publish_presence(&self, change: &PresenceChange) {
        let payload = PresencePayload {
            ts: change.ts,
            present: change.present,
            conf: if change.present {
                protocol::CONF_PRESENT
            } else {
                protocol::CONF_ABSENT
            },
        };
        self.publish(&self.config.topics.vision_state, &payload);
    }

    fn publish<T: Serialize>(&self, topic: &str, payload: &T) {
        log::debug!("publishing {}", topic);
        if let Err(e) = self.bus.publish(topic, payload) {
            log::warn!("publish to {} failed: {}", topic, e);
        }
        self.journal.append(topic, payload);
    }
}
