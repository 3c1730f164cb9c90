//! Runtime binding to vendor panel libraries.

use crate::error::{DisplayError, DriverError};
use crate::pipeline::Frame;

use libloading::{Library, Symbol};
use log::debug;
use std::path::Path;

/// A vendor shared library opened at construction.
///
/// Symbols are checked once in [`require`](VendorLibrary::require) so a
/// missing export fails start-up instead of the first draw.
pub(crate) struct VendorLibrary {
    lib: Library,
    family: &'static str,
}

impl VendorLibrary {
    pub(crate) fn open(family: &'static str, path: &Path) -> Result<Self, DisplayError> {
        debug!("loading {} binding from {}", family, path.display());
        // Safety: vendor libraries run no initialisers we depend on; the
        // panel is only touched through explicit calls below.
        let lib = unsafe { Library::new(path) }.map_err(|e| DisplayError::DriverUnavailable {
            family,
            reason: e.to_string(),
        })?;
        Ok(Self { lib, family })
    }

    /// Fail with [`DisplayError::DriverUnavailable`] unless every symbol resolves.
    pub(crate) fn require(&self, symbols: &[&[u8]]) -> Result<(), DisplayError> {
        for &symbol in symbols {
            // Safety: only the address is looked up; the type is never called.
            unsafe { self.lib.get::<unsafe extern "C" fn()>(symbol) }.map_err(|e| {
                DisplayError::DriverUnavailable {
                    family: self.family,
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    /// Resolve `symbol` as a function of type `T`.
    ///
    /// # Safety
    ///
    /// `T` must match the exported function's real signature.
    pub(crate) unsafe fn get<T>(&self, symbol: &[u8]) -> Result<Symbol<'_, T>, DriverError> {
        Ok(unsafe { self.lib.get::<T>(symbol) }?)
    }
}

/// Null-terminated symbol name.
pub(crate) fn symbol_name(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    bytes
}

/// Map a vendor status code (0 = success) to a driver result.
pub(crate) fn check_status(op: &'static str, code: i32) -> Result<(), DriverError> {
    if code == 0 {
        Ok(())
    } else {
        Err(DriverError::Call { op, code })
    }
}

/// Reject frames whose size differs from the panel's.
///
/// Vendor calls read a buffer sized for the resolution given at open time.
pub(crate) fn check_frame(frame: &Frame, resolution: (u32, u32)) -> Result<(), DriverError> {
    let actual = frame.dimensions();
    if actual == resolution {
        Ok(())
    } else {
        Err(DriverError::FrameSize {
            expected: resolution,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_library_is_unavailable() {
        let err = VendorLibrary::open("inky", Path::new("/nonexistent/libinky.so"))
            .err()
            .unwrap();
        assert!(matches!(err, DisplayError::DriverUnavailable { family: "inky", .. }));
    }

    #[test]
    fn test_symbol_name_is_nul_terminated() {
        assert_eq!(symbol_name("EPD_7IN5_V2_Init"), b"EPD_7IN5_V2_Init\0".to_vec());
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("inky_show", 0).is_ok());
        assert!(matches!(
            check_status("inky_show", -5),
            Err(DriverError::Call { op: "inky_show", code: -5 })
        ));
    }

    #[test]
    fn test_check_frame_rejects_other_sizes() {
        assert!(check_frame(&Frame::white(800, 480), (800, 480)).is_ok());
        assert!(matches!(
            check_frame(&Frame::white(16, 2), (800, 480)),
            Err(DriverError::FrameSize {
                expected: (800, 480),
                actual: (16, 2)
            })
        ));
    }
}
