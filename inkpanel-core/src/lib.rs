//! Display state and power management for low-refresh e-paper panels.
//!
//! This crate owns everything between a rendered image and the glass: the
//! transform pipeline that turns an arbitrary image into a panel-ready
//! [`Frame`], the vendor driver bindings, a [`DisplayManager`] that serialises
//! hardware access and tracks sleep/wake state, and an [`InputListener`] that
//! turns button and motion-sensor edges into display actions.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inkpanel_core::{DisplayManager, DrawOptions, JsonConfig, PanelController};
//!
//! fn main() -> Result<(), inkpanel_core::DisplayError> {
//!     // Resolves `display_type` and opens the vendor binding
//!     let config = Arc::new(JsonConfig::load("device.json")?);
//!     let manager = DisplayManager::new(config)?;
//!
//!     let image = image::open("dashboard.png")?;
//!     let report = manager.display_image(&image, None, DrawOptions::default())?;
//!     println!("pushed: {:?}, cached: {}", report.push, report.cached);
//!
//!     // Blank-and-sleep is what the button does
//!     manager.sleep();
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! Use [`MockDisplay`] to drive the manager without hardware:
//!
//! ```
//! use std::sync::Arc;
//! use inkpanel_core::{DisplayManager, JsonConfig, MockDisplay, MockEvent, PanelController};
//!
//! let config = Arc::new(JsonConfig::from_value(serde_json::json!({ "display_type": "mock" })));
//! let mock = MockDisplay::new();
//! let handle = mock.handle();
//! let manager = DisplayManager::with_driver(config, Box::new(mock));
//!
//! manager.sleep();
//! assert!(manager.is_asleep());
//! assert_eq!(handle.events(), vec![MockEvent::Sleep]);
//! ```

#![warn(missing_docs)]

mod config;
mod driver;
mod error;
mod input;
mod manager;
mod pipeline;
mod refresh;
mod state;

// Re-export public API
pub use config::{
    DEFAULT_CACHE_FILE, DEFAULT_DISPLAY_TYPE, DEFAULT_RESOLUTION, DeviceConfig, DisplaySettings,
    ImageSettings, JsonConfig, Orientation, RefreshInfo,
};
pub use driver::{
    Capabilities, DisplayType, InkyDriver, MockDisplay, MockEvent, MockHandle, PanelDriver,
    PushCapability, WaveshareDriver, open_driver,
};
pub use error::{DisplayError, DriverError, InputError, RefreshError};
#[cfg(feature = "gpio")]
pub use input::GpioInputs;
pub use input::{
    BUTTON_DEBOUNCE, ButtonOutcome, Clock, DEFAULT_MOTION_COOLDOWN, InputEvent, InputListener,
    InputOutcome, MotionCooldown, MotionOutcome, RestoreSource, SystemClock,
};
pub use manager::{
    DEFAULT_IDLE_FALLBACK, DisplayManager, DrawOptions, DrawReport, DriverOutcome, PanelController,
    PushOutcome,
};
pub use pipeline::{Frame, fit_to_resolution, is_solid_black, render};
pub use refresh::{ContentSourceId, QueuedRefreshTrigger, RefreshRequest, RefreshTrigger};
pub use state::{ManagerState, PowerState};
