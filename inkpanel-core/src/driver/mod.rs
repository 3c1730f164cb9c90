//! Panel driver capability set.
//!
//! A driver is resolved once from the configured display type and never
//! changes afterwards. Drivers declare what they can do through
//! [`Capabilities`]; the [`DisplayManager`](crate::DisplayManager) picks the
//! richest push capability and skips optional operations the driver lacks.

mod inky;
mod mock;
mod vendor;
mod waveshare;

pub use inky::InkyDriver;
pub use mock::{MockDisplay, MockEvent, MockHandle};
pub use waveshare::WaveshareDriver;

use crate::config::{DeviceConfig, ImageSettings};
use crate::error::{DisplayError, DriverError};
use crate::pipeline::Frame;

use log::info;
use std::path::PathBuf;
use std::str::FromStr;

// =============================================================================
// Capabilities
// =============================================================================

/// How a driver accepts a frame, richest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushCapability {
    /// Frame plus enhancement settings in one call.
    ImageWithSettings,
    /// Frame only.
    Image,
    /// Draw into the controller's buffer, then an explicit refresh.
    DrawAndRefresh,
}

/// The operations a driver implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// How frames are pushed, or `None` if the driver cannot show anything.
    pub push: Option<PushCapability>,
    /// Hardware deep sleep.
    pub sleep: bool,
    /// Wake from deep sleep.
    pub wake: bool,
    /// Full-panel clear.
    pub clear: bool,
    /// Blocking readiness wait.
    pub wait_until_idle: bool,
}

impl Capabilities {
    /// Every optional operation plus the given push capability.
    pub fn full(push: PushCapability) -> Self {
        Self {
            push: Some(push),
            sleep: true,
            wake: true,
            clear: true,
            wait_until_idle: true,
        }
    }
}

/// A panel driver.
///
/// Implementors override the methods matching their [`Capabilities`]; the
/// defaults report [`DriverError::Unsupported`] and are never called by the
/// manager for capabilities the driver does not declare.
pub trait PanelDriver: Send {
    /// Short driver name for logs.
    fn name(&self) -> &'static str;

    /// The operations this driver implements.
    fn capabilities(&self) -> Capabilities;

    /// Push a frame together with its enhancement settings.
    fn display_image(&mut self, frame: &Frame, settings: &ImageSettings) -> Result<(), DriverError> {
        let _ = (frame, settings);
        Err(DriverError::Unsupported("display_image"))
    }

    /// Push a frame.
    fn display(&mut self, frame: &Frame) -> Result<(), DriverError> {
        let _ = frame;
        Err(DriverError::Unsupported("display"))
    }

    /// Draw a frame into the controller without refreshing the panel.
    fn draw(&mut self, frame: &Frame) -> Result<(), DriverError> {
        let _ = frame;
        Err(DriverError::Unsupported("draw"))
    }

    /// Refresh the panel from the controller's buffer.
    fn refresh(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("refresh"))
    }

    /// Put the panel into deep sleep.
    fn sleep(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("sleep"))
    }

    /// Bring the panel out of deep sleep.
    fn wake(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("wake"))
    }

    /// Clear the whole panel to white (or black).
    fn clear(&mut self, to_white: bool) -> Result<(), DriverError> {
        let _ = to_white;
        Err(DriverError::Unsupported("clear"))
    }

    /// Block until the panel reports ready.
    fn wait_until_idle(&mut self) -> Result<(), DriverError> {
        Err(DriverError::Unsupported("wait_until_idle"))
    }
}

// =============================================================================
// Display Type Resolution
// =============================================================================

/// The panel family named by the `display_type` setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayType {
    /// No hardware; frames are recorded (and optionally written to disk).
    Mock,
    /// The primary vendor panel family.
    Inky,
    /// The alternate vendor family; holds the panel model, e.g. `epd7in5_V2`.
    Waveshare(String),
}

impl DisplayType {
    /// The family name used in logs and errors.
    pub fn family(&self) -> &'static str {
        match self {
            DisplayType::Mock => "mock",
            DisplayType::Inky => "inky",
            DisplayType::Waveshare(_) => "waveshare",
        }
    }
}

impl FromStr for DisplayType {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mock" => Ok(DisplayType::Mock),
            "inky" => Ok(DisplayType::Inky),
            model if is_waveshare_model(model) => Ok(DisplayType::Waveshare(model.to_string())),
            other => Err(DisplayError::UnsupportedDisplayType(other.to_string())),
        }
    }
}

/// Matches the `epd*in*` naming convention, e.g. `epd7in5_V2` or `epd2in13`.
fn is_waveshare_model(s: &str) -> bool {
    s.strip_prefix("epd").is_some_and(|rest| rest.contains("in"))
}

const DEFAULT_INKY_LIBRARY: &str = "libinky.so";
const DEFAULT_WAVESHARE_LIBRARY: &str = "libwaveshare_epd.so";

/// Resolve the configured display type and construct its driver.
///
/// # Errors
///
/// - [`DisplayError::UnsupportedDisplayType`] if the identifier names no known family
/// - [`DisplayError::DriverUnavailable`] if the family's vendor binding is missing
pub fn open_driver(config: &dyn DeviceConfig) -> Result<Box<dyn PanelDriver>, DisplayError> {
    let display_type: DisplayType = config.display_type().parse()?;
    let resolution = config.resolution();
    info!(
        "using {} display ({}x{})",
        display_type.family(),
        resolution.0,
        resolution.1
    );

    let driver: Box<dyn PanelDriver> = match display_type {
        DisplayType::Mock => Box::new(MockDisplay::from_config(config)),
        DisplayType::Inky => {
            let path = library_path(config, "inky_library", DEFAULT_INKY_LIBRARY);
            Box::new(InkyDriver::open(&path, resolution)?)
        }
        DisplayType::Waveshare(model) => {
            let path = library_path(config, "waveshare_library", DEFAULT_WAVESHARE_LIBRARY);
            Box::new(WaveshareDriver::open(&path, &model, resolution)?)
        }
    };
    Ok(driver)
}

fn library_path(config: &dyn DeviceConfig, key: &str, default: &str) -> PathBuf {
    config
        .config_string(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JsonConfig;
    use serde_json::json;

    #[test]
    fn test_display_type_resolution() {
        assert_eq!("mock".parse::<DisplayType>().unwrap(), DisplayType::Mock);
        assert_eq!("inky".parse::<DisplayType>().unwrap(), DisplayType::Inky);
        assert_eq!(
            "epd7in5_V2".parse::<DisplayType>().unwrap(),
            DisplayType::Waveshare("epd7in5_V2".to_string())
        );
        assert_eq!(
            "epd2in13".parse::<DisplayType>().unwrap(),
            DisplayType::Waveshare("epd2in13".to_string())
        );
    }

    #[test]
    fn test_unknown_display_types_are_rejected() {
        for bad in ["", "lcd", "epd", "epd7_V2", "EPD7IN5", "xepd7in5"] {
            assert!(
                matches!(
                    bad.parse::<DisplayType>(),
                    Err(DisplayError::UnsupportedDisplayType(_))
                ),
                "{} should be unsupported",
                bad
            );
        }
    }

    #[test]
    fn test_open_driver_mock() {
        let config = JsonConfig::from_value(json!({ "display_type": "mock" }));
        let driver = open_driver(&config).unwrap();
        assert_eq!(driver.name(), "mock");
        assert!(driver.capabilities().push.is_some());
    }

    #[test]
    fn test_open_driver_missing_bindings() {
        let config = JsonConfig::from_value(json!({
            "display_type": "inky",
            "inky_library": "/nonexistent/libinky.so",
        }));
        assert!(matches!(
            open_driver(&config).err(),
            Some(DisplayError::DriverUnavailable { family: "inky", .. })
        ));

        let config = JsonConfig::from_value(json!({
            "display_type": "epd7in5_V2",
            "waveshare_library": "/nonexistent/libwaveshare_epd.so",
        }));
        assert!(matches!(
            open_driver(&config).err(),
            Some(DisplayError::DriverUnavailable { family: "waveshare", .. })
        ));
    }

    #[test]
    fn test_open_driver_unsupported_type() {
        let config = JsonConfig::from_value(json!({ "display_type": "crt" }));
        assert!(matches!(
            open_driver(&config).err(),
            Some(DisplayError::UnsupportedDisplayType(t)) if t == "crt"
        ));
    }

    #[test]
    fn test_default_trait_methods_are_unsupported() {
        struct Bare;
        impl PanelDriver for Bare {
            fn name(&self) -> &'static str {
                "bare"
            }
            fn capabilities(&self) -> Capabilities {
                Capabilities::default()
            }
        }

        let mut bare = Bare;
        assert!(matches!(bare.sleep(), Err(DriverError::Unsupported("sleep"))));
        assert!(matches!(
            bare.display(&Frame::white(1, 1)),
            Err(DriverError::Unsupported("display"))
        ));
    }
}
