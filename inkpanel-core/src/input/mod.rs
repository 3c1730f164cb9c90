//! Physical input listener: button toggle and motion-triggered refresh.
//!
//! Edge watchers (`GpioInputs`, behind the `gpio` feature) post
//! [`InputEvent`]s onto a channel. [`InputListener::run`] consumes that
//! channel and dispatches each event synchronously.

#[cfg(feature = "gpio")]
mod gpio;

#[cfg(feature = "gpio")]
pub use gpio::GpioInputs;

use crate::config::DeviceConfig;
use crate::error::InputError;
use crate::manager::{DrawOptions, PanelController, PushOutcome};
use crate::refresh::{ContentSourceId, RefreshTrigger};

use image::{DynamicImage, Rgb, RgbImage};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default minimum interval between accepted motion events.
pub const DEFAULT_MOTION_COOLDOWN: Duration = Duration::from_secs(60);

/// Debounce window applied to button edges.
pub const BUTTON_DEBOUNCE: Duration = Duration::from_millis(100);

// =============================================================================
// Events and Outcomes
// =============================================================================

/// An edge reported by a physical input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// The button was pressed.
    ButtonPressed,
    /// The motion sensor fired.
    MotionDetected,
}

/// Where a restored frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    /// The cached frame was redisplayed.
    Cache,
    /// No usable cached frame; a white frame was shown instead.
    WhiteFallback,
}

/// Result of a button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonOutcome {
    /// The panel was blanked and put to sleep.
    Slept {
        /// What happened to the blanking frame.
        blanking: PushOutcome,
    },
    /// The panel was woken and its content restored.
    Woke {
        /// Where the restored content came from.
        restored: RestoreSource,
    },
}

/// Result of a motion event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MotionOutcome {
    /// Motion handling is turned off.
    Disabled,
    /// The panel is asleep.
    Asleep,
    /// The active content source does not react to motion.
    InactiveSource,
    /// The previous accepted event was too recent.
    CoolingDown,
    /// A refresh was requested.
    Triggered,
    /// A refresh was requested but the trigger failed; the error has been logged.
    TriggerFailed(String),
}

/// Result of [`InputListener::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputOutcome {
    /// A button press was handled.
    Button(ButtonOutcome),
    /// A motion event was handled.
    Motion(MotionOutcome),
}

// =============================================================================
// Clock and Cooldown
// =============================================================================

/// Monotonic time source for the motion cooldown.
pub trait Clock: Send + Sync {
    /// Time elapsed since an arbitrary fixed origin.
    fn now(&self) -> Duration;
}

/// [`Clock`] backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

const NEVER: u64 = u64::MAX;

/// Minimum-interval gate for motion events.
///
/// The last accepted timestamp is readable without the lock so events inside
/// the cooldown are rejected cheaply; acceptance re-checks and commits under
/// the lock.
#[derive(Debug)]
pub struct MotionCooldown {
    interval_ms: u64,
    last_ms: AtomicU64,
    commit: Mutex<()>,
}

impl MotionCooldown {
    /// Create a gate that accepts at most one event per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: millis(interval),
            last_ms: AtomicU64::new(NEVER),
            commit: Mutex::new(()),
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    fn elapsed(&self, now_ms: u64) -> bool {
        let last = self.last_ms.load(Ordering::Acquire);
        last == NEVER || now_ms.saturating_sub(last) >= self.interval_ms
    }

    /// Accept an event at `now` if the interval has passed, recording it.
    pub fn try_accept(&self, now: Duration) -> bool {
        let now_ms = millis(now);
        if !self.elapsed(now_ms) {
            return false;
        }
        let _guard = self.commit.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.elapsed(now_ms) {
            return false;
        }
        self.last_ms.store(now_ms, Ordering::Release);
        true
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(NEVER - 1)
}

/// Drops edges that arrive within a window of the last accepted one.
#[derive(Debug)]
#[cfg_attr(not(feature = "gpio"), allow(dead_code))]
pub(crate) struct Debouncer {
    window_ns: u64,
    last_ns: Option<u64>,
}

#[cfg_attr(not(feature = "gpio"), allow(dead_code))]
impl Debouncer {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window_ns: u64::try_from(window.as_nanos()).unwrap_or(u64::MAX),
            last_ns: None,
        }
    }

    /// Whether an edge at `timestamp_ns` should be reported.
    pub(crate) fn accept(&mut self, timestamp_ns: u64) -> bool {
        if let Some(last) = self.last_ns {
            if timestamp_ns.saturating_sub(last) < self.window_ns {
                return false;
            }
        }
        self.last_ns = Some(timestamp_ns);
        true
    }
}

// =============================================================================
// InputListener
// =============================================================================

#[derive(Debug, Default)]
struct ListenerState {
    asleep: bool,
}

/// Dispatches button and motion events to the display manager.
///
/// A button press toggles the panel between blank-and-asleep and
/// awake-with-restored-content. A motion event asks the refresh scheduler to
/// regenerate the AI text source, subject to the cooldown.
pub struct InputListener {
    manager: Arc<dyn PanelController>,
    config: Arc<dyn DeviceConfig>,
    trigger: Arc<dyn RefreshTrigger>,
    state: Mutex<ListenerState>,
    cooldown: MotionCooldown,
    clock: Arc<dyn Clock>,
}

impl InputListener {
    /// Create a listener; the cooldown comes from `motion_cooldown_secs`.
    pub fn new(
        manager: Arc<dyn PanelController>,
        config: Arc<dyn DeviceConfig>,
        trigger: Arc<dyn RefreshTrigger>,
    ) -> Self {
        let cooldown = Duration::from_secs(
            config.config_u64("motion_cooldown_secs", DEFAULT_MOTION_COOLDOWN.as_secs()),
        );
        Self {
            manager,
            config,
            trigger,
            state: Mutex::new(ListenerState::default()),
            cooldown: MotionCooldown::new(cooldown),
            clock: Arc::new(SystemClock::new()),
        }
    }

    /// Replace the time source used by the motion cooldown.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the motion cooldown interval.
    pub fn with_cooldown(mut self, interval: Duration) -> Self {
        self.cooldown = MotionCooldown::new(interval);
        self
    }

    /// Whether the listener last put the panel to sleep.
    pub fn is_asleep(&self) -> bool {
        self.lock_state().asleep
    }

    fn lock_state(&self) -> MutexGuard<'_, ListenerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one event.
    pub fn handle(&self, event: InputEvent) -> InputOutcome {
        match event {
            InputEvent::ButtonPressed => InputOutcome::Button(self.on_button()),
            InputEvent::MotionDetected => InputOutcome::Motion(self.on_motion()),
        }
    }

    /// Consume events until every sender has been dropped.
    pub fn run(&self, events: Receiver<InputEvent>) {
        info!("input listener started");
        for event in events.iter() {
            let outcome = self.handle(event);
            debug!("{:?} -> {:?}", event, outcome);
        }
        info!("input listener stopped: all event sources closed");
    }

    /// Run the listener on a named background thread.
    pub fn spawn(self: Arc<Self>, events: Receiver<InputEvent>) -> Result<JoinHandle<()>, InputError> {
        let handle = thread::Builder::new()
            .name("input-listener".to_string())
            .spawn(move || self.run(events))?;
        Ok(handle)
    }

    /// Toggle the panel between asleep and awake.
    pub fn on_button(&self) -> ButtonOutcome {
        let mut state = self.lock_state();

        if state.asleep || self.manager.is_asleep() {
            info!("button pressed, waking display");
            self.manager.wake();
            self.manager.clear_panel(true);
            let restored = self.restore();
            state.asleep = false;
            ButtonOutcome::Woke { restored }
        } else {
            info!("button pressed, blanking display");
            let (width, height) = self.manager.resolution();
            let black = DynamicImage::ImageRgb8(RgbImage::new(width, height));
            let blanking = match self
                .manager
                .display_image(&black, None, DrawOptions::default().without_cache())
            {
                Ok(report) => report.push,
                Err(e) => {
                    error!("failed to draw blanking frame: {}", e);
                    PushOutcome::Failed(e.to_string())
                }
            };
            self.manager.wait_until_idle();
            self.manager.sleep();
            state.asleep = true;
            ButtonOutcome::Slept { blanking }
        }
    }

    fn restore(&self) -> RestoreSource {
        match self.manager.load_cached_frame() {
            Ok(Some(image)) => match self.manager.display_image(&image, None, DrawOptions::restore()) {
                Ok(_) => return RestoreSource::Cache,
                Err(e) => warn!("could not redisplay cached frame: {}", e),
            },
            Ok(None) => info!("no cached frame, restoring white"),
            Err(e) => warn!("cached frame unreadable, restoring white: {}", e),
        }

        let (width, height) = self.manager.resolution();
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])));
        if let Err(e) = self.manager.display_image(&white, None, DrawOptions::restore()) {
            error!("failed to draw white frame: {}", e);
        }
        RestoreSource::WhiteFallback
    }

    /// Request a refresh of the AI text source if every gate passes.
    pub fn on_motion(&self) -> MotionOutcome {
        if !self.config.config_bool("motion_enabled", false) {
            return MotionOutcome::Disabled;
        }
        if self.manager.is_asleep() || self.lock_state().asleep {
            debug!("motion ignored, display asleep");
            return MotionOutcome::Asleep;
        }

        let source = ContentSourceId::ai_text();
        if self.config.refresh_info().active_source().as_ref() != Some(&source) {
            return MotionOutcome::InactiveSource;
        }
        if !self.cooldown.try_accept(self.clock.now()) {
            debug!("motion ignored, cooling down");
            return MotionOutcome::CoolingDown;
        }

        info!("motion detected, requesting {} refresh", source);
        match self.trigger.request_refresh(&source) {
            Ok(()) => MotionOutcome::Triggered,
            Err(e) => {
                error!("motion refresh request failed: {}", e);
                MotionOutcome::TriggerFailed(e.to_string())
            }
        }
    }
}
