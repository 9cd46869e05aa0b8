//! Doorway spotlight reactive controller.
//!
//! Each doorway node aims a PWM LED on pan/tilt servos toward a configured
//! zone. Trigger-on topics light the path, trigger-off topics rest it, and
//! a periodic tick enforces the hold window so a missed "off" message can
//! never leave the light on forever.

use crate::bus::{BusClient, BusEvent};
use crate::config::SpotlightConfig;
use crate::hardware::SpotlightHardware;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

struct LampState {
    hardware: Box<dyn SpotlightHardware>,
    current_brightness: f64,
    last_on: f64,
}

pub struct SpotlightController {
    config: SpotlightConfig,
    state: Mutex<LampState>,
}

impl SpotlightController {
    pub fn new(config: SpotlightConfig, hardware: Box<dyn SpotlightHardware>) -> Self {
        let rest = config.rest_brightness;
        SpotlightController {
            state: Mutex::new(LampState {
                hardware,
                current_brightness: rest,
                last_on: 0.0,
            }),
            config,
        }
    }

    /// Park the beam: rest angles, rest brightness.
    pub fn rest_pose(&self) {
        let mut state = self.lock();
        state
            .hardware
            .set_orientation(self.config.servo_rest_pan, self.config.servo_rest_tilt);
        state.hardware.set_brightness(self.config.rest_brightness);
        state.current_brightness = self.config.rest_brightness;
    }

    /// Subscribe to the deduplicated union of both trigger lists and run
    /// until the stop flag is set. The 500 ms poll timeout doubles as the
    /// tick cadence for the hold-window guardrail.
    pub fn start(&self, bus: &BusClient) -> crate::Result<()> {
        log::info!(
            "spotlight controller {} ready (hold {}s, auto_rest {})",
            self.config.module_id,
            self.config.light_hold_seconds,
            self.config.auto_rest
        );
        self.rest_pose();
        for topic in self.subscription_topics() {
            log::info!("subscribing to {}", topic);
            bus.subscribe(&topic)?;
        }
        Ok(())
    }

    pub fn run(&self, bus: &BusClient, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            if let Some(event) = bus.poll_event(Duration::from_millis(500)) {
                self.handle_event(&event, crate::utc_timestamp());
            }
            self.tick(crate::utc_timestamp());
        }
    }

    pub fn shutdown(&self) {
        log::info!("stopping spotlight controller");
        self.lock().hardware.shutdown();
    }

    /// Route one bus message. The payload content is irrelevant here; a
    /// malformed payload still counts as its topic's trigger.
    pub fn handle_event(&self, event: &BusEvent, now: f64) {
        if self.config.trigger_on_topics.iter().any(|t| t == &event.topic) {
            log::info!("trigger ON from {}", event.topic);
            self.activate(now);
        } else if self
            .config
            .trigger_off_topics
            .iter()
            .any(|t| t == &event.topic)
        {
            log::info!("trigger OFF from {}", event.topic);
            self.deactivate();
        }
    }

    /// Aim at the target zone and raise the LED to active brightness.
    ///
    /// Always refreshes the hold timer, so repeated triggers extend the
    /// window; the hardware is only written on the rest -> active edge.
    pub fn activate(&self, now: f64) {
        let mut state = self.lock();
        state.last_on = now;
        if state.current_brightness == self.config.brightness {
            return;
        }
        state
            .hardware
            .set_orientation(self.config.servo_pan_angle, self.config.servo_tilt_angle);
        state.hardware.set_brightness(self.config.brightness);
        state.current_brightness = self.config.brightness;
    }

    /// Drop the LED to rest brightness and, when `auto_rest` is set, park
    /// the servos. Idempotent.
    pub fn deactivate(&self) {
        let mut state = self.lock();
        self.deactivate_locked(&mut state);
    }

    /// Auto-off guardrail, driven roughly twice per second.
    pub fn tick(&self, now: f64) {
        if self.config.light_hold_seconds <= 0.0 {
            return;
        }
        let mut state = self.lock();
        if state.current_brightness != self.config.brightness {
            return;
        }
        if now - state.last_on >= self.config.light_hold_seconds {
            log::info!("hold window expired, turning light off");
            self.deactivate_locked(&mut state);
        }
    }

    /// First-seen-order deduplicated union of both trigger lists.
    pub fn subscription_topics(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for topic in self
            .config
            .trigger_on_topics
            .iter()
            .chain(self.config.trigger_off_topics.iter())
        {
            if !seen.contains(topic) {
                seen.push(topic.clone());
            }
        }
        seen
    }

    fn deactivate_locked(&self, state: &mut MutexGuard<'_, LampState>) {
        if state.current_brightness == self.config.rest_brightness {
            return;
        }
        state.hardware.set_brightness(self.config.rest_brightness);
        state.current_brightness = self.config.rest_brightness;
        if self.config.auto_rest {
            state
                .hardware
                .set_orientation(self.config.servo_rest_pan, self.config.servo_rest_tilt);
        }
    }

    fn lock(&self) -> MutexGuard<'_, LampState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{HwAction, MockSpotlight};

    fn controller(config: SpotlightConfig) -> (SpotlightController, crate::hardware::ActionLog) {
        let mock = MockSpotlight::new(&config);
        let log = mock.action_log();
        (SpotlightController::new(config, Box::new(mock)), log)
    }

    fn test_config() -> SpotlightConfig {
        let mut config = SpotlightConfig::default();
        config.ensure_topics();
        config
    }

    #[test]
    fn test_activate_writes_target_pose_once() {
        let (ctl, log) = controller(test_config());

        ctl.activate(0.0);
        ctl.activate(1.0);
        ctl.activate(2.0);

        let actions = log.lock().unwrap();
        assert_eq!(
            *actions,
            vec![
                HwAction::Orientation(-20.0, -5.0),
                HwAction::Brightness(0.85),
            ]
        );
    }

    #[test]
    fn test_deactivate_idempotent() {
        let (ctl, log) = controller(test_config());

        ctl.activate(0.0);
        ctl.deactivate();
        ctl.deactivate();

        let actions = log.lock().unwrap();
        // One activate pair, then one rest pair (auto_rest defaults true).
        assert_eq!(actions.len(), 4);
        assert_eq!(actions[2], HwAction::Brightness(0.0));
        assert_eq!(actions[3], HwAction::Orientation(0.0, 0.0));
    }

    #[test]
    fn test_deactivate_without_auto_rest_keeps_aim() {
        let mut config = test_config();
        config.auto_rest = false;
        let (ctl, log) = controller(config);

        ctl.activate(0.0);
        ctl.deactivate();

        let actions = log.lock().unwrap();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[2], HwAction::Brightness(0.0));
    }

    #[test]
    fn test_tick_expires_hold_window() {
        let (ctl, log) = controller(test_config()); // hold = 8s

        ctl.activate(0.0);
        ctl.tick(7.9);
        assert_eq!(log.lock().unwrap().len(), 2);

        ctl.tick(8.1);
        let actions = log.lock().unwrap();
        assert_eq!(actions[2], HwAction::Brightness(0.0));
        assert_eq!(actions[3], HwAction::Orientation(0.0, 0.0));
    }

    #[test]
    fn test_repeated_trigger_extends_hold() {
        let (ctl, log) = controller(test_config());

        ctl.activate(0.0);
        ctl.activate(5.0); // no hardware write, but refreshes last_on
        ctl.tick(9.0); // 4s since refresh: still on
        assert_eq!(log.lock().unwrap().len(), 2);

        ctl.tick(13.1); // 8.1s since refresh: off
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_zero_hold_disables_guardrail() {
        let mut config = test_config();
        config.light_hold_seconds = 0.0;
        let (ctl, log) = controller(config);

        ctl.activate(0.0);
        ctl.tick(1.0e9);
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_event_routing_ignores_payload_shape() {
        let (ctl, log) = controller(test_config());

        // Malformed payload (json: None) still fires the trigger.
        ctl.handle_event(
            &BusEvent {
                topic: "events/person/bedroom/out".into(),
                json: None,
            },
            0.0,
        );
        assert_eq!(log.lock().unwrap().len(), 2);

        // Unrelated topics do nothing.
        ctl.handle_event(
            &BusEvent {
                topic: "events/person/hall/out".into(),
                json: Some(serde_json::json!({})),
            },
            1.0,
        );
        assert_eq!(log.lock().unwrap().len(), 2);

        ctl.handle_event(
            &BusEvent {
                topic: "events/person/bathroom/in".into(),
                json: Some(serde_json::json!({})),
            },
            2.0,
        );
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_subscription_topics_dedup_order() {
        let mut config = test_config();
        config.trigger_on_topics = vec!["a".into(), "b".into()];
        config.trigger_off_topics = vec!["b".into(), "c".into(), "a".into()];
        let (ctl, _) = controller(config);
        assert_eq!(ctl.subscription_topics(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_rest_pose_resets_state() {
        let (ctl, log) = controller(test_config());
        ctl.rest_pose();
        ctl.activate(0.0);

        let actions = log.lock().unwrap();
        assert_eq!(actions[0], HwAction::Orientation(0.0, 0.0));
        assert_eq!(actions[1], HwAction::Brightness(0.0));
        assert_eq!(actions[2], HwAction::Orientation(-20.0, -5.0));
        assert_eq!(actions[3], HwAction::Brightness(0.85));
    }
}
