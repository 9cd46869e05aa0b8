//! Bus wire contract: topic map and typed payloads.
//!
//! Payloads arrive as arbitrary JSON. Each is modelled as a serde struct
//! that ignores unknown fields; a missing required field fails the decode
//! and the message is dropped with a warning at the call site.

use crate::geometry::{Direction, Point};
use serde::{Deserialize, Serialize};

// -- Default topics --
pub const PIR_TOPIC: &str = "sensors/door/+/pir";
pub const PRESENCE_TOPIC: &str = "vision/state/living_room";
pub const BED_EVENT_OUT: &str = "events/person/bedroom/out";
pub const BED_EVENT_IN: &str = "events/person/bedroom/in";
pub const BATH_EVENT_OUT: &str = "events/person/bathroom/out";
pub const BATH_EVENT_IN: &str = "events/person/bathroom/in";
pub const LIGHTING_COMMAND_TEMPLATE: &str = "cmd/lighting/{room}/set";

// -- Confidence levels --
pub const CONF_CROSSING_PIR: f64 = 0.85;
pub const CONF_CROSSING: f64 = 0.70;
pub const CONF_PRESENT: f64 = 0.9;
pub const CONF_ABSENT: f64 = 0.8;

/// The monitored rooms adjacent to the living room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    Bedroom,
    Bathroom,
}

impl Zone {
    /// Derive the zone hint from a PIR topic's path segment.
    pub fn from_topic(topic: &str) -> Zone {
        if topic.contains("bedroom") {
            Zone::Bedroom
        } else {
            Zone::Bathroom
        }
    }
}

/// The two doorways watched by crossing lines, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Door {
    Bed,
    Bath,
}

impl Door {
    pub fn zone(self) -> Zone {
        match self {
            Door::Bed => Zone::Bedroom,
            Door::Bath => Zone::Bathroom,
        }
    }
}

/// PIR sensor state change, e.g. `{"state":"ON","ts":1700000000.0}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PirPayload {
    pub state: PirState,
    #[serde(default)]
    pub ts: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PirState {
    On,
    Off,
}

/// Directional room-crossing event published by the vision node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossingPayload {
    pub ts: f64,
    pub dir: Direction,
    pub centroid: Point,
    pub conf: f64,
}

/// Debounced living-room occupancy signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    pub ts: f64,
    pub present: bool,
    pub conf: f64,
}

/// Lighting command consumed by downstream adapters on
/// `cmd/lighting/{room}/set`. The spotlight controller does not consume
/// this today; the type pins the contract for the gateway side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightingCommand {
    pub mode: LightingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servo: Option<ServoVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_sec: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LightingMode {
    On,
    Off,
    Dim,
    Aim,
}

/// Normalized aim vector, both axes in [-1, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ServoVector {
    pub x: f64,
    pub y: f64,
}

impl LightingCommand {
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(b) = self.brightness {
            if b > 100 {
                return Err(crate::HomesightError::Config(format!(
                    "brightness {} out of 0..=100",
                    b
                )));
            }
        }
        if let Some(v) = self.servo {
            if !(-1.0..=1.0).contains(&v.x) || !(-1.0..=1.0).contains(&v.y) {
                return Err(crate::HomesightError::Config(format!(
                    "servo vector ({}, {}) outside [-1, 1]",
                    v.x, v.y
                )));
            }
        }
        if self.ttl_sec == Some(0) {
            return Err(crate::HomesightError::Config("ttl_sec must be >= 1".into()));
        }
        Ok(())
    }

    /// Fill the `{room}` slot of the command topic template.
    pub fn topic_for(template: &str, room: &str) -> String {
        template.replace("{room}", room)
    }
}

/// Encode a payload as compact JSON bytes (no whitespace, UTF-8).
pub fn encode<T: Serialize>(payload: &T) -> crate::Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_from_topic() {
        assert_eq!(Zone::from_topic("sensors/door/bedroom/pir"), Zone::Bedroom);
        assert_eq!(Zone::from_topic("sensors/door/bathroom/pir"), Zone::Bathroom);
        // Unknown zone hints fall back to bathroom.
        assert_eq!(Zone::from_topic("sensors/door/hall/pir"), Zone::Bathroom);
    }

    #[test]
    fn test_pir_payload_decode() {
        let p: PirPayload = serde_json::from_str(r#"{"state":"ON","ts":12.5}"#).unwrap();
        assert_eq!(p.state, PirState::On);
        assert_eq!(p.ts, Some(12.5));

        // ts is optional, unknown fields are ignored.
        let p: PirPayload = serde_json::from_str(r#"{"state":"OFF","rssi":-70}"#).unwrap();
        assert_eq!(p.state, PirState::Off);
        assert_eq!(p.ts, None);

        // Missing state or unknown value fails the decode.
        assert!(serde_json::from_str::<PirPayload>(r#"{"ts":1.0}"#).is_err());
        assert!(serde_json::from_str::<PirPayload>(r#"{"state":"MAYBE"}"#).is_err());
    }

    #[test]
    fn test_crossing_payload_compact() {
        let payload = CrossingPayload {
            ts: 100.25,
            dir: Direction::IntoLiving,
            centroid: Point(0.25, 0.4),
            conf: CONF_CROSSING,
        };
        let bytes = encode(&payload).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            r#"{"ts":100.25,"dir":"into_living","centroid":[0.25,0.4],"conf":0.7}"#
        );
        assert!(!text.contains(' '));
    }

    #[test]
    fn test_presence_payload_roundtrip() {
        let payload = PresencePayload {
            ts: 5.0,
            present: true,
            conf: CONF_PRESENT,
        };
        let back: PresencePayload =
            serde_json::from_slice(&encode(&payload).unwrap()).unwrap();
        assert!(back.present);
        assert_eq!(back.conf, CONF_PRESENT);
    }

    #[test]
    fn test_lighting_command_validate() {
        let cmd: LightingCommand =
            serde_json::from_str(r#"{"mode":"dim","brightness":40}"#).unwrap();
        assert!(cmd.validate().is_ok());

        let cmd: LightingCommand =
            serde_json::from_str(r#"{"mode":"aim","servo":{"x":1.5,"y":0.0}}"#).unwrap();
        assert!(cmd.validate().is_err());

        let cmd: LightingCommand =
            serde_json::from_str(r#"{"mode":"on","ttl_sec":0}"#).unwrap();
        assert!(cmd.validate().is_err());
    }

    #[test]
    fn test_lighting_command_topic() {
        assert_eq!(
            LightingCommand::topic_for(LIGHTING_COMMAND_TEMPLATE, "bedroom"),
            "cmd/lighting/bedroom/set"
        );
    }
}
