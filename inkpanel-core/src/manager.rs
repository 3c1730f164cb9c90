//! Display manager: power state, frame cache and serialised panel access.

use crate::config::{DeviceConfig, ImageSettings};
use crate::driver::{self, PanelDriver, PushCapability};
use crate::error::DisplayError;
use crate::pipeline::{self, Frame};
use crate::state::{ManagerState, PowerState};

use image::{DynamicImage, ImageFormat};
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// Delay used by [`PanelController::wait_until_idle`] when the driver cannot
/// report readiness itself.
pub const DEFAULT_IDLE_FALLBACK: Duration = Duration::from_secs(2);

// =============================================================================
// Outcomes
// =============================================================================

/// Options for [`PanelController::display_image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawOptions {
    /// Overwrite the cached frame (ignored for blanking frames and while asleep).
    pub save_to_cache: bool,
    /// Push to the panel even while asleep.
    pub force_draw: bool,
    /// The image is already panel-ready; only resize it.
    pub skip_transforms: bool,
}

impl DrawOptions {
    /// Do not overwrite the cached frame.
    pub fn without_cache(mut self) -> Self {
        self.save_to_cache = false;
        self
    }

    /// Push even while the panel is asleep.
    pub fn forced(mut self) -> Self {
        self.force_draw = true;
        self
    }

    /// Options for redisplaying a previously cached (already rendered) frame.
    pub fn restore() -> Self {
        Self {
            skip_transforms: true,
            ..Self::default()
        }
    }
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            save_to_cache: true,
            force_draw: false,
            skip_transforms: false,
        }
    }
}

/// What happened to a frame on its way to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The driver accepted the frame.
    Pushed,
    /// The panel is asleep and the draw was not forced.
    HeldAsleep,
    /// The driver call failed; the error has been logged.
    Failed(String),
}

/// The result of [`PanelController::display_image`].
#[derive(Debug, Clone)]
pub struct DrawReport {
    /// The panel-ready frame.
    pub frame: Frame,
    /// Whether and how the frame reached the driver.
    pub push: PushOutcome,
    /// Whether the frame overwrote the cached frame.
    pub cached: bool,
    /// Whether the input took the blanking (solid black) fast path.
    pub blanking: bool,
}

/// Result of a best-effort driver operation (sleep, wake, clear, idle wait).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    /// The driver performed the operation.
    Completed,
    /// Nothing was sent to the driver: it lacks the capability or the state
    /// already matched.
    Skipped,
    /// The driver call failed; the error has been logged.
    Failed(String),
}

// =============================================================================
// Panel Controller Trait
// =============================================================================

/// Trait for the display manager surface used by the input listener,
/// the refresh scheduler and the web front end.
///
/// This allows for substitute implementations in tests.
pub trait PanelController: Send + Sync {
    /// Get a snapshot of the current manager state.
    fn get_state(&self) -> ManagerState;

    /// Whether the panel is asleep.
    fn is_asleep(&self) -> bool {
        self.get_state().power.is_asleep()
    }

    /// Current panel resolution from the configuration snapshot.
    fn resolution(&self) -> (u32, u32);

    /// Render `image` and push it to the panel according to `options`.
    ///
    /// `settings` of `None` uses the configured `image_settings` block.
    fn display_image(
        &self,
        image: &DynamicImage,
        settings: Option<&ImageSettings>,
        options: DrawOptions,
    ) -> Result<DrawReport, DisplayError>;

    /// Put the panel to sleep. Idempotent.
    fn sleep(&self) -> DriverOutcome;

    /// Wake the panel. Idempotent.
    fn wake(&self) -> DriverOutcome;

    /// Clear the whole panel to white (or black).
    fn clear_panel(&self, to_white: bool) -> DriverOutcome;

    /// Block until the panel is ready for the next operation.
    fn wait_until_idle(&self) -> DriverOutcome;

    /// Read back the cached frame.
    ///
    /// Returns `Ok(None)` when there is no cached frame (missing or empty file).
    fn load_cached_frame(&self) -> Result<Option<DynamicImage>, DisplayError>;
}

// =============================================================================
// DisplayManager
// =============================================================================

struct Inner {
    driver: Box<dyn PanelDriver>,
    power: PowerState,
    pushes: u64,
    cache_writes: u64,
}

/// The display manager.
///
/// Owns the driver, the power state and the cached-frame artifact. Every
/// operation holds one lock for its whole duration, so draws, sleeps, wakes,
/// clears and idle waits from different threads never interleave.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use inkpanel_core::{DisplayManager, DrawOptions, JsonConfig, MockDisplay, PanelController};
///
/// let config = Arc::new(JsonConfig::from_value(serde_json::json!({ "resolution": [80, 48] })));
/// let dir = tempfile::tempdir().unwrap();
/// let manager = DisplayManager::with_driver(config, Box::new(MockDisplay::new()))
///     .with_cache_path(dir.path().join("current_image.png"));
///
/// let image = image::DynamicImage::new_rgb8(160, 96);
/// let report = manager.display_image(&image, None, DrawOptions::default()).unwrap();
/// assert_eq!(report.frame.dimensions(), (80, 48));
/// ```
pub struct DisplayManager {
    config: Arc<dyn DeviceConfig>,
    cache_path: PathBuf,
    idle_fallback: Duration,
    inner: Mutex<Inner>,
}

impl DisplayManager {
    /// Resolve the configured driver and create a manager around it.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::UnsupportedDisplayType`] if `display_type` names no known family
    /// - [`DisplayError::DriverUnavailable`] if the family's vendor binding is missing
    pub fn new(config: Arc<dyn DeviceConfig>) -> Result<Self, DisplayError> {
        let driver = driver::open_driver(config.as_ref())?;
        Ok(Self::with_driver(config, driver))
    }

    /// Create a manager around an already constructed driver.
    pub fn with_driver(config: Arc<dyn DeviceConfig>, driver: Box<dyn PanelDriver>) -> Self {
        let cache_path = config.current_image_file();
        Self {
            config,
            cache_path,
            idle_fallback: DEFAULT_IDLE_FALLBACK,
            inner: Mutex::new(Inner {
                driver,
                power: PowerState::Awake,
                pushes: 0,
                cache_writes: 0,
            }),
        }
    }

    /// Override where the cached frame is stored.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    /// Override the delay used when the driver cannot report readiness.
    pub fn with_idle_fallback(mut self, delay: Duration) -> Self {
        self.idle_fallback = delay;
        self
    }

    /// Where the cached frame is stored.
    pub fn cache_path(&self) -> &Path {
        &self.cache_path
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_frame(
        inner: &mut Inner,
        push: PushCapability,
        frame: &Frame,
        settings: &ImageSettings,
    ) -> PushOutcome {
        let result = match push {
            PushCapability::ImageWithSettings => inner.driver.display_image(frame, settings),
            PushCapability::Image => inner.driver.display(frame),
            PushCapability::DrawAndRefresh => inner
                .driver
                .draw(frame)
                .and_then(|()| inner.driver.refresh()),
        };
        inner.pushes += 1;

        match result {
            Ok(()) => {
                debug!("pushed {}x{} frame via {:?}", frame.width(), frame.height(), push);
                PushOutcome::Pushed
            }
            Err(e) => {
                error!("failed to push image to display: {}", e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }

    /// Write `frame` to a sibling temp file, then rename it over the cache.
    fn write_cache(&self, frame: &Frame) -> Result<(), DisplayError> {
        if let Some(parent) = self.cache_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = self.cache_path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let written = frame
            .as_rgb()
            .save_with_format(&tmp, ImageFormat::Png)
            .map_err(DisplayError::from)
            .and_then(|()| fs::rename(&tmp, &self.cache_path).map_err(DisplayError::from));
        if written.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        written
    }

    fn best_effort(
        op: &'static str,
        supported: bool,
        call: impl FnOnce() -> Result<(), crate::error::DriverError>,
    ) -> DriverOutcome {
        if !supported {
            debug!("driver has no {} capability, skipping", op);
            return DriverOutcome::Skipped;
        }
        match call() {
            Ok(()) => DriverOutcome::Completed,
            Err(e) => {
                warn!("display {} failed: {}", op, e);
                DriverOutcome::Failed(e.to_string())
            }
        }
    }
}

impl PanelController for DisplayManager {
    fn get_state(&self) -> ManagerState {
        let inner = self.lock();
        ManagerState {
            power: inner.power,
            driver: inner.driver.name(),
            pushes: inner.pushes,
            cache_writes: inner.cache_writes,
        }
    }

    fn resolution(&self) -> (u32, u32) {
        self.config.resolution()
    }

    fn display_image(
        &self,
        image: &DynamicImage,
        settings: Option<&ImageSettings>,
        options: DrawOptions,
    ) -> Result<DrawReport, DisplayError> {
        let mut inner = self.lock();
        let push = inner
            .driver
            .capabilities()
            .push
            .ok_or_else(|| DisplayError::NoPushCapability(inner.driver.name()))?;

        let settings = settings.copied().unwrap_or_else(|| self.config.image_settings());
        let display = self.config.display_settings();
        let asleep = inner.power.is_asleep();

        if pipeline::is_solid_black(image) {
            // Blanking frames skip enhancement and never become the cached frame.
            let frame = pipeline::fit_to_resolution(image, display.resolution)?;
            if asleep && !options.force_draw {
                debug!("panel asleep, holding blanking frame");
                return Ok(DrawReport {
                    frame,
                    push: PushOutcome::HeldAsleep,
                    cached: false,
                    blanking: true,
                });
            }
            info!("drawing blanking frame");
            let push = Self::push_frame(&mut inner, push, &frame, &settings);
            return Ok(DrawReport {
                frame,
                push,
                cached: false,
                blanking: true,
            });
        }

        let frame = if options.skip_transforms {
            pipeline::fit_to_resolution(image, display.resolution)?
        } else {
            pipeline::render(image, &display, Some(&settings))?
        };

        let mut cached = false;
        if options.save_to_cache && !asleep {
            match self.write_cache(&frame) {
                Ok(()) => {
                    inner.cache_writes += 1;
                    cached = true;
                    debug!("cached frame at {}", self.cache_path.display());
                }
                Err(e) => warn!("could not cache frame at {}: {}", self.cache_path.display(), e),
            }
        }

        if asleep && !options.force_draw {
            info!("panel asleep, frame not drawn");
            return Ok(DrawReport {
                frame,
                push: PushOutcome::HeldAsleep,
                cached,
                blanking: false,
            });
        }

        let push = Self::push_frame(&mut inner, push, &frame, &settings);
        Ok(DrawReport {
            frame,
            push,
            cached,
            blanking: false,
        })
    }

    fn sleep(&self) -> DriverOutcome {
        let mut inner = self.lock();
        if inner.power.is_asleep() {
            debug!("display already asleep");
            return DriverOutcome::Skipped;
        }
        let supported = inner.driver.capabilities().sleep;
        let outcome = Self::best_effort("sleep", supported, || inner.driver.sleep());
        inner.power = PowerState::Asleep;
        info!("display asleep");
        outcome
    }

    fn wake(&self) -> DriverOutcome {
        let mut inner = self.lock();
        if !inner.power.is_asleep() {
            debug!("display already awake");
            return DriverOutcome::Skipped;
        }
        let supported = inner.driver.capabilities().wake;
        let outcome = Self::best_effort("wake", supported, || inner.driver.wake());
        inner.power = PowerState::Awake;
        info!("display awake");
        outcome
    }

    fn clear_panel(&self, to_white: bool) -> DriverOutcome {
        let mut inner = self.lock();
        let supported = inner.driver.capabilities().clear;
        Self::best_effort("clear", supported, || inner.driver.clear(to_white))
    }

    fn wait_until_idle(&self) -> DriverOutcome {
        let mut inner = self.lock();
        let supported = inner.driver.capabilities().wait_until_idle;
        let outcome = Self::best_effort("wait_until_idle", supported, || inner.driver.wait_until_idle());
        if outcome != DriverOutcome::Completed {
            thread::sleep(self.idle_fallback);
        }
        outcome
    }

    fn load_cached_frame(&self) -> Result<Option<DynamicImage>, DisplayError> {
        let _inner = self.lock();
        let bytes = match fs::read(&self.cache_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(image::load_from_memory(&bytes)?))
    }
}
