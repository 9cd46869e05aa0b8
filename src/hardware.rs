//! LED and servo actuation for the doorway spotlight.
//!
//! The controller talks to a minimal capability trait; behind it sit the
//! real GPIO binding (Pi header, software PWM) and a recording mock used
//! by tests and on non-target hosts. Angle and brightness clamping happen
//! here so no out-of-range command can reach a servo.

use crate::config::{HardwareMode, SpotlightConfig};
use std::sync::{Arc, Mutex};

/// What a spotlight can do.
pub trait SpotlightHardware: Send {
    fn set_orientation(&mut self, pan: f64, tilt: f64);
    fn set_brightness(&mut self, value: f64);
    fn shutdown(&mut self);
}

/// Open the hardware for the configured mode.
///
/// `Auto` falls back to the mock when GPIO is unavailable (expected in
/// development); `Gpio` makes that failure fatal so a misconfigured
/// doorway node exits non-zero instead of silently pretending.
pub fn open_hardware(config: &SpotlightConfig) -> crate::Result<Box<dyn SpotlightHardware>> {
    match config.hardware {
        HardwareMode::Mock => Ok(Box::new(MockSpotlight::new(config))),
        HardwareMode::Gpio => open_gpio(config),
        HardwareMode::Auto => match open_gpio(config) {
            Ok(hw) => Ok(hw),
            Err(e) => {
                log::warn!("GPIO unavailable ({}); running in mock hardware mode", e);
                Ok(Box::new(MockSpotlight::new(config)))
            }
        },
    }
}

fn clamp_angle(config: &Limits, angle: f64) -> f64 {
    angle.clamp(config.min_angle, config.max_angle)
}

fn clamp_brightness(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// The slice of config the hardware layer needs after init.
#[derive(Debug, Clone, Copy)]
struct Limits {
    min_angle: f64,
    max_angle: f64,
    min_pulse_width: f64,
    max_pulse_width: f64,
}

impl Limits {
    fn from_config(config: &SpotlightConfig) -> Limits {
        Limits {
            min_angle: config.servo_min_angle,
            max_angle: config.servo_max_angle,
            min_pulse_width: config.servo_min_pulse_width,
            max_pulse_width: config.servo_max_pulse_width,
        }
    }

    /// Linear map from the angle range to the servo pulse-width range.
    #[allow(dead_code)]
    fn pulse_width(&self, angle: f64) -> std::time::Duration {
        let span = self.max_angle - self.min_angle;
        let fraction = if span.abs() < f64::EPSILON {
            0.5
        } else {
            (angle - self.min_angle) / span
        };
        let seconds =
            self.min_pulse_width + fraction * (self.max_pulse_width - self.min_pulse_width);
        std::time::Duration::from_secs_f64(seconds)
    }
}

// -- Recording mock --

#[derive(Debug, Clone, PartialEq)]
pub enum HwAction {
    Orientation(f64, f64),
    Brightness(f64),
    Shutdown,
}

/// Shared view into a mock's recorded actions.
pub type ActionLog = Arc<Mutex<Vec<HwAction>>>;

/// Logs intended actions instead of driving pins, and records them for
/// assertions.
pub struct MockSpotlight {
    limits: Limits,
    actions: ActionLog,
}

impl MockSpotlight {
    pub fn new(config: &SpotlightConfig) -> MockSpotlight {
        MockSpotlight {
            limits: Limits::from_config(config),
            actions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Clone the action log handle before boxing the mock away.
    pub fn action_log(&self) -> ActionLog {
        self.actions.clone()
    }

    fn record(&self, action: HwAction) {
        if let Ok(mut actions) = self.actions.lock() {
            actions.push(action);
        }
    }
}

impl SpotlightHardware for MockSpotlight {
    fn set_orientation(&mut self, pan: f64, tilt: f64) {
        let pan = clamp_angle(&self.limits, pan);
        let tilt = clamp_angle(&self.limits, tilt);
        log::info!("mock servo orientation -> pan {:.1} tilt {:.1}", pan, tilt);
        self.record(HwAction::Orientation(pan, tilt));
    }

    fn set_brightness(&mut self, value: f64) {
        let value = clamp_brightness(value);
        log::info!("mock LED brightness -> {:.2}", value);
        self.record(HwAction::Brightness(value));
    }

    fn shutdown(&mut self) {
        self.record(HwAction::Shutdown);
    }
}

// -- Pi GPIO binding --

#[cfg(feature = "rpi-gpio")]
mod gpio {
    use super::{clamp_angle, clamp_brightness, Limits, SpotlightHardware};
    use crate::config::SpotlightConfig;
    use std::time::Duration;

    /// Standard 50 Hz servo frame.
    const SERVO_PERIOD: Duration = Duration::from_millis(20);

    pub struct GpioSpotlight {
        limits: Limits,
        led_frequency: f64,
        pan: rppal::gpio::OutputPin,
        tilt: rppal::gpio::OutputPin,
        led: rppal::gpio::OutputPin,
    }

    impl GpioSpotlight {
        pub fn open(config: &SpotlightConfig) -> crate::Result<GpioSpotlight> {
            let gpio = rppal::gpio::Gpio::new()
                .map_err(|e| crate::HomesightError::Gpio(e.to_string()))?;
            let pin = |n: u8| {
                gpio.get(n)
                    .map(|p| p.into_output())
                    .map_err(|e| crate::HomesightError::Gpio(format!("pin {}: {}", n, e)))
            };
            Ok(GpioSpotlight {
                limits: Limits::from_config(config),
                led_frequency: config.led_frequency as f64,
                pan: pin(config.servo_pan_pin)?,
                tilt: pin(config.servo_tilt_pin)?,
                led: pin(config.led_pwm_pin)?,
            })
        }
    }

    impl SpotlightHardware for GpioSpotlight {
        fn set_orientation(&mut self, pan: f64, tilt: f64) {
            let pan = clamp_angle(&self.limits, pan);
            let tilt = clamp_angle(&self.limits, tilt);
            if let Err(e) = self.pan.set_pwm(SERVO_PERIOD, self.limits.pulse_width(pan)) {
                log::warn!("pan servo write failed: {}", e);
            }
            if let Err(e) = self.tilt.set_pwm(SERVO_PERIOD, self.limits.pulse_width(tilt)) {
                log::warn!("tilt servo write failed: {}", e);
            }
        }

        fn set_brightness(&mut self, value: f64) {
            let value = clamp_brightness(value);
            if let Err(e) = self.led.set_pwm_frequency(self.led_frequency, value) {
                log::warn!("LED write failed: {}", e);
            }
        }

        fn shutdown(&mut self) {
            let _ = self.pan.clear_pwm();
            let _ = self.tilt.clear_pwm();
            let _ = self.led.clear_pwm();
            self.led.set_low();
        }
    }
}

#[cfg(feature = "rpi-gpio")]
fn open_gpio(config: &SpotlightConfig) -> crate::Result<Box<dyn SpotlightHardware>> {
    Ok(Box::new(gpio::GpioSpotlight::open(config)?))
}

#[cfg(not(feature = "rpi-gpio"))]
fn open_gpio(_config: &SpotlightConfig) -> crate::Result<Box<dyn SpotlightHardware>> {
    Err(crate::HomesightError::Gpio(
        "built without the rpi-gpio feature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clamps_angles_and_brightness() {
        let config = SpotlightConfig::default();
        let mut hw = MockSpotlight::new(&config);
        let log = hw.action_log();

        hw.set_orientation(-500.0, 500.0);
        hw.set_brightness(7.0);
        hw.set_brightness(-1.0);

        let actions = log.lock().unwrap();
        assert_eq!(actions[0], HwAction::Orientation(-90.0, 90.0));
        assert_eq!(actions[1], HwAction::Brightness(1.0));
        assert_eq!(actions[2], HwAction::Brightness(0.0));
    }

    #[test]
    fn test_pulse_width_mapping() {
        let config = SpotlightConfig::default();
        let limits = Limits::from_config(&config);

        // -90 -> min pulse, +90 -> max pulse, 0 -> midpoint.
        assert_eq!(
            limits.pulse_width(-90.0),
            std::time::Duration::from_secs_f64(0.0005)
        );
        assert_eq!(
            limits.pulse_width(90.0),
            std::time::Duration::from_secs_f64(0.0025)
        );
        let mid = limits.pulse_width(0.0).as_secs_f64();
        assert!((mid - 0.0015).abs() < 1e-9);
    }

    #[test]
    fn test_mock_mode_selected() {
        let config = SpotlightConfig {
            hardware: HardwareMode::Mock,
            ..SpotlightConfig::default()
        };
        assert!(open_hardware(&config).is_ok());
    }
}
