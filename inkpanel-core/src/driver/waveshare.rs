//! Waveshare e-Paper driver.
//!
//! Binds the vendor C library (`DEV_Module_*` plus the per-model `EPD_<MODEL>_*`
//! exports). Model identifiers follow the `epd<size>in<size>[_rev]` convention:
//! `epd7in5_V2` resolves `EPD_7IN5_V2_Init`, `EPD_7IN5_V2_Display`, etc.

use super::vendor::{VendorLibrary, check_frame, check_status, symbol_name};
use super::{Capabilities, PanelDriver, PushCapability};
use crate::error::{DisplayError, DriverError};
use crate::pipeline::Frame;

use log::{debug, info};
use std::path::Path;

type VoidFn = unsafe extern "C" fn();
type StatusFn = unsafe extern "C" fn() -> u8;
type DisplayFn = unsafe extern "C" fn(*const u8);

const MODULE_INIT: &[u8] = b"DEV_Module_Init\0";
const MODULE_EXIT: &[u8] = b"DEV_Module_Exit\0";

struct ModelSymbols {
    init: Vec<u8>,
    display: Vec<u8>,
    clear: Vec<u8>,
    sleep: Vec<u8>,
}

impl ModelSymbols {
    fn for_model(model: &str) -> Self {
        let stem = model.strip_prefix("epd").unwrap_or(model).to_uppercase();
        let name = |op: &str| symbol_name(&format!("EPD_{}_{}", stem, op));
        Self {
            init: name("Init"),
            display: name("Display"),
            clear: name("Clear"),
            sleep: name("Sleep"),
        }
    }
}

/// Driver for the Waveshare panel family.
///
/// Frames are sent as 1-bit packed buffers. The vendor library offers no
/// readiness query (its busy-wait is internal to every call), so
/// `wait_until_idle` is not advertised.
pub struct WaveshareDriver {
    lib: VendorLibrary,
    symbols: ModelSymbols,
    model: String,
    resolution: (u32, u32),
}

impl WaveshareDriver {
    /// Open the vendor library at `path` and initialise panel `model` with the
    /// given `(width, height)`.
    ///
    /// # Errors
    ///
    /// - [`DisplayError::DriverUnavailable`] if the library or any model export is missing,
    ///   or if the GPIO/SPI module fails to initialise
    pub fn open(path: &Path, model: &str, resolution: (u32, u32)) -> Result<Self, DisplayError> {
        let lib = VendorLibrary::open("waveshare", path)?;
        let symbols = ModelSymbols::for_model(model);
        lib.require(&[
            MODULE_INIT,
            MODULE_EXIT,
            symbols.init.as_slice(),
            symbols.display.as_slice(),
            symbols.clear.as_slice(),
            symbols.sleep.as_slice(),
        ])?;

        let driver = Self {
            lib,
            symbols,
            model: model.to_string(),
            resolution,
        };
        driver.init_module().map_err(|e| DisplayError::DriverUnavailable {
            family: "waveshare",
            reason: e.to_string(),
        })?;
        driver.init_panel().map_err(|e| DisplayError::DriverUnavailable {
            family: "waveshare",
            reason: e.to_string(),
        })?;
        info!("waveshare {} initialised", driver.model);
        Ok(driver)
    }

    fn init_module(&self) -> Result<(), DriverError> {
        unsafe {
            let init = self.lib.get::<StatusFn>(MODULE_INIT)?;
            check_status("DEV_Module_Init", i32::from(init()))
        }
    }

    fn init_panel(&self) -> Result<(), DriverError> {
        unsafe {
            let init = self.lib.get::<VoidFn>(&self.symbols.init)?;
            init();
        }
        Ok(())
    }

    fn call_void(&self, symbol: &[u8]) -> Result<(), DriverError> {
        unsafe {
            let func = self.lib.get::<VoidFn>(symbol)?;
            func();
        }
        Ok(())
    }

    fn send(&self, buffer: &[u8]) -> Result<(), DriverError> {
        unsafe {
            let display = self.lib.get::<DisplayFn>(&self.symbols.display)?;
            display(buffer.as_ptr());
        }
        Ok(())
    }
}

impl PanelDriver for WaveshareDriver {
    fn name(&self) -> &'static str {
        "waveshare"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            push: Some(PushCapability::Image),
            sleep: true,
            wake: true,
            clear: true,
            wait_until_idle: false,
        }
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DriverError> {
        check_frame(frame, self.resolution)?;
        let buffer = pack_mono(frame);
        debug!("waveshare {}: sending {} byte buffer", self.model, buffer.len());
        self.send(&buffer)
    }

    fn sleep(&mut self) -> Result<(), DriverError> {
        self.call_void(&self.symbols.sleep)
    }

    fn wake(&mut self) -> Result<(), DriverError> {
        // The controller only leaves deep sleep through a full re-init.
        self.init_panel()
    }

    fn clear(&mut self, to_white: bool) -> Result<(), DriverError> {
        if to_white {
            self.call_void(&self.symbols.clear)
        } else {
            let (width, height) = self.resolution;
            self.send(&vec![0x00; packed_len(width, height)])
        }
    }
}

impl Drop for WaveshareDriver {
    fn drop(&mut self) {
        unsafe {
            if let Ok(exit) = self.lib.get::<VoidFn>(MODULE_EXIT) {
                exit();
            }
        }
    }
}

/// Pack a frame into the vendor's 1-bit format.
///
/// Rows are `ceil(width / 8)` bytes, most significant bit first; a set bit is
/// white. Pixels with luminance of 128 or more are white.
pub(crate) fn pack_mono(frame: &Frame) -> Vec<u8> {
    let (width, height) = frame.dimensions();
    let stride = width.div_ceil(8) as usize;
    let mut buffer = vec![0u8; packed_len(width, height)];
    for (x, y, p) in frame.as_rgb().enumerate_pixels() {
        let [r, g, b] = p.0.map(u32::from);
        if (r * 299 + g * 587 + b * 114) / 1000 >= 128 {
            buffer[y as usize * stride + (x / 8) as usize] |= 0x80 >> (x % 8);
        }
    }
    buffer
}

fn packed_len(width: u32, height: u32) -> usize {
    width.div_ceil(8) as usize * height as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_model_symbols() {
        let symbols = ModelSymbols::for_model("epd7in5_V2");
        assert_eq!(symbols.init, b"EPD_7IN5_V2_Init\0".to_vec());
        assert_eq!(symbols.display, b"EPD_7IN5_V2_Display\0".to_vec());
        assert_eq!(symbols.sleep, b"EPD_7IN5_V2_Sleep\0".to_vec());
    }

    #[test]
    fn test_pack_mono_layout() {
        // 10 px wide -> 2 bytes per row; only (0,0) and (9,1) are white.
        let mut image = RgbImage::new(10, 2);
        image.put_pixel(0, 0, Rgb([255, 255, 255]));
        image.put_pixel(9, 1, Rgb([200, 200, 200]));
        let buffer = pack_mono(&Frame::new(image));
        assert_eq!(buffer, vec![0x80, 0x00, 0x00, 0x40]);
    }

    #[test]
    fn test_pack_mono_white_frame_is_all_ones() {
        let buffer = pack_mono(&Frame::white(16, 3));
        assert_eq!(buffer, vec![0xFF; 6]);
    }
}
