//! GPIO character-device edge watchers.

use super::{BUTTON_DEBOUNCE, Debouncer, InputEvent};
use crate::config::DeviceConfig;
use crate::error::InputError;

use gpio_cdev::{Chip, EventRequestFlags, LineEventHandle, LineRequestFlags};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DEFAULT_CHIP: &str = "/dev/gpiochip0";
const DEFAULT_BUTTON_PIN: u64 = 23;
const DEFAULT_MOTION_PIN: u64 = 24;
const CONSUMER: &str = "inkpanel";

/// Button and motion-sensor lines on one GPIO chip.
///
/// The button is watched for falling edges (active low with pull-up) and
/// debounced; the motion sensor is watched for rising edges and is only
/// installed when `motion_enabled` is set.
#[derive(Debug, Clone)]
pub struct GpioInputs {
    chip: PathBuf,
    button_pin: u32,
    motion_pin: Option<u32>,
}

impl GpioInputs {
    /// Read `gpio_chip`, `button_pin`, `motion_pin` and `motion_enabled`.
    pub fn from_config(config: &dyn DeviceConfig) -> Self {
        let pin = |key: &str, default: u64| {
            u32::try_from(config.config_u64(key, default)).unwrap_or_else(|_| {
                warn!("{} out of range, using {}", key, default);
                default as u32
            })
        };
        Self {
            chip: config
                .config_string("gpio_chip")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CHIP)),
            button_pin: pin("button_pin", DEFAULT_BUTTON_PIN),
            motion_pin: config
                .config_bool("motion_enabled", false)
                .then(|| pin("motion_pin", DEFAULT_MOTION_PIN)),
        }
    }

    /// Request the lines and start one watcher thread per line.
    ///
    /// Lines are requested before any thread starts, so a missing chip or a
    /// busy line fails here rather than inside a watcher.
    ///
    /// # Errors
    ///
    /// - [`InputError::Gpio`] if the chip cannot be opened or a line cannot be requested
    /// - [`InputError::Spawn`] if a watcher thread cannot be started
    pub fn spawn(&self, events: Sender<InputEvent>) -> Result<Vec<JoinHandle<()>>, InputError> {
        let mut chip = Chip::new(&self.chip)?;

        let button = chip.get_line(self.button_pin)?.events(
            LineRequestFlags::INPUT,
            EventRequestFlags::FALLING_EDGE,
            CONSUMER,
        )?;
        let motion = match self.motion_pin {
            Some(pin) => Some(chip.get_line(pin)?.events(
                LineRequestFlags::INPUT,
                EventRequestFlags::RISING_EDGE,
                CONSUMER,
            )?),
            None => None,
        };

        let mut handles = vec![watch(
            "gpio-button",
            button,
            InputEvent::ButtonPressed,
            BUTTON_DEBOUNCE,
            events.clone(),
        )?];
        info!("watching button on {} line {}", self.chip.display(), self.button_pin);

        if let (Some(lines), Some(pin)) = (motion, self.motion_pin) {
            handles.push(watch(
                "gpio-motion",
                lines,
                InputEvent::MotionDetected,
                Duration::ZERO,
                events,
            )?);
            info!("watching motion sensor on {} line {}", self.chip.display(), pin);
        }
        Ok(handles)
    }
}

fn watch(
    name: &str,
    lines: LineEventHandle,
    event: InputEvent,
    debounce: Duration,
    events: Sender<InputEvent>,
) -> Result<JoinHandle<()>, InputError> {
    let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
        let mut debouncer = Debouncer::new(debounce);
        for edge in lines {
            match edge {
                Ok(edge) if debouncer.accept(edge.timestamp()) => {
                    if events.send(event).is_err() {
                        debug!("input listener gone, stopping {:?} watcher", event);
                        return;
                    }
                }
                Ok(_) => debug!("{:?} edge debounced", event),
                Err(e) => warn!("gpio read failed for {:?}: {}", event, e),
            }
        }
    })?;
    Ok(handle)
}
