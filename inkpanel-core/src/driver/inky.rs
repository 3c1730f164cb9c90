//! Pimoroni Inky driver.
//!
//! Binds the `libinky` C shim, which exports:
//!
//! ```text
//! int inky_init(uint32_t width, uint32_t height);
//! int inky_set_image(const uint8_t *rgb, size_t len, uint32_t width, uint32_t height, float saturation);
//! int inky_show(void);
//! int inky_busy_wait(uint32_t timeout_ms);
//! ```
//!
//! Every call returns 0 on success.

use super::vendor::{VendorLibrary, check_frame, check_status};
use super::{Capabilities, PanelDriver, PushCapability};
use crate::config::ImageSettings;
use crate::error::{DisplayError, DriverError};
use crate::pipeline::Frame;

use log::{debug, info};
use std::path::Path;

type InitFn = unsafe extern "C" fn(u32, u32) -> i32;
type SetImageFn = unsafe extern "C" fn(*const u8, usize, u32, u32, f32) -> i32;
type ShowFn = unsafe extern "C" fn() -> i32;
type BusyWaitFn = unsafe extern "C" fn(u32) -> i32;

const INIT: &[u8] = b"inky_init\0";
const SET_IMAGE: &[u8] = b"inky_set_image\0";
const SHOW: &[u8] = b"inky_show\0";
const BUSY_WAIT: &[u8] = b"inky_busy_wait\0";

/// Upper bound handed to the shim's busy wait; a full colour refresh takes ~30 s.
const BUSY_TIMEOUT_MS: u32 = 45_000;

/// Driver for the Inky panel family.
///
/// Pushes RGB frames together with the configured saturation, which the
/// panel's palette quantiser uses. Inky panels have no deep sleep mode.
pub struct InkyDriver {
    lib: VendorLibrary,
    resolution: (u32, u32),
}

impl InkyDriver {
    /// Open the shim at `path` and initialise a panel of `resolution`.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::DriverUnavailable`] if the shim or any export is missing,
    ///   or if `inky_init` reports no attached panel
    pub fn open(path: &Path, resolution: (u32, u32)) -> Result<Self, DisplayError> {
        let lib = VendorLibrary::open("inky", path)?;
        lib.require(&[INIT, SET_IMAGE, SHOW, BUSY_WAIT])?;

        let driver = Self { lib, resolution };
        driver.init().map_err(|e| DisplayError::DriverUnavailable {
            family: "inky",
            reason: e.to_string(),
        })?;
        info!("inky panel initialised ({}x{})", resolution.0, resolution.1);
        Ok(driver)
    }

    fn init(&self) -> Result<(), DriverError> {
        let (width, height) = self.resolution;
        unsafe {
            let init = self.lib.get::<InitFn>(INIT)?;
            check_status("inky_init", init(width, height))
        }
    }

    fn show(&self, frame: &Frame, saturation: f32) -> Result<(), DriverError> {
        check_frame(frame, self.resolution)?;
        let (width, height) = frame.dimensions();
        let rgb = frame.as_rgb().as_raw();
        debug!("inky: showing {}x{} frame (saturation {})", width, height, saturation);
        unsafe {
            let set_image = self.lib.get::<SetImageFn>(SET_IMAGE)?;
            check_status(
                "inky_set_image",
                set_image(rgb.as_ptr(), rgb.len(), width, height, saturation),
            )?;
            let show = self.lib.get::<ShowFn>(SHOW)?;
            check_status("inky_show", show())
        }
    }
}

impl PanelDriver for InkyDriver {
    fn name(&self) -> &'static str {
        "inky"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            push: Some(PushCapability::ImageWithSettings),
            sleep: false,
            wake: false,
            clear: true,
            wait_until_idle: true,
        }
    }

    fn display_image(&mut self, frame: &Frame, settings: &ImageSettings) -> Result<(), DriverError> {
        self.show(frame, settings.saturation)
    }

    fn clear(&mut self, to_white: bool) -> Result<(), DriverError> {
        let (width, height) = self.resolution;
        let frame = if to_white {
            Frame::white(width, height)
        } else {
            Frame::black(width, height)
        };
        self.show(&frame, 1.0)
    }

    fn wait_until_idle(&mut self) -> Result<(), DriverError> {
        unsafe {
            let busy_wait = self.lib.get::<BusyWaitFn>(BUSY_WAIT)?;
            check_status("inky_busy_wait", busy_wait(BUSY_TIMEOUT_MS))
        }
    }
}
