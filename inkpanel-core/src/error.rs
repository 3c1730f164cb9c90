//! Error types for the panel subsystem.

/// Errors raised while building or configuring the display subsystem.
///
/// These are the fatal classes: they surface at construction or on the first
/// draw and are expected to abort start-up. Transient hardware failures are
/// reported as [`DriverError`] and never escape the [`DisplayManager`](crate::DisplayManager).
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// The configured display type matches none of the known panel families.
    #[error("Unsupported display type: {0}")]
    UnsupportedDisplayType(String),

    /// The vendor binding for the requested panel family could not be loaded.
    #[error("{family} display not available: {reason}")]
    DriverUnavailable {
        /// The panel family that was requested.
        family: &'static str,
        /// Why the binding could not be used.
        reason: String,
    },

    /// The resolved driver exposes no way to push a frame.
    #[error("Display driver {0} exposes no known draw method")]
    NoPushCapability(&'static str),

    /// A resolution with a zero dimension was supplied.
    #[error("Invalid panel resolution {width}x{height}")]
    InvalidResolution {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// The input image has no pixels.
    #[error("Cannot render an empty image")]
    EmptyImage,

    /// The configuration document could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// An I/O error occurred (e.g., reading the configuration file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors raised by a single driver call.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// The driver does not implement the requested operation.
    #[error("Operation {0} not supported by this driver")]
    Unsupported(&'static str),

    /// A vendor call returned a failure status.
    #[error("Driver call {op} failed (status: {code})")]
    Call {
        /// The vendor operation that failed.
        op: &'static str,
        /// The status code it returned.
        code: i32,
    },

    /// A frame does not match the resolution the panel was opened with.
    #[error("Frame is {actual:?}, panel expects {expected:?}")]
    FrameSize {
        /// The panel resolution.
        expected: (u32, u32),
        /// The frame's dimensions.
        actual: (u32, u32),
    },

    /// A vendor symbol could not be resolved.
    #[error("Failed to resolve driver symbol: {0}")]
    Library(#[from] libloading::Error),

    /// An I/O error occurred while talking to the panel.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding a frame for the panel failed.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Injected failure from the mock driver.
    #[error("Simulated hardware failure during {0}")]
    Simulated(&'static str),
}

/// Errors raised when asking the scheduler to regenerate content.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    /// The scheduler side of the request channel is gone.
    #[error("Refresh scheduler is not accepting requests")]
    Closed,

    /// The scheduler refused the request.
    #[error("Refresh request for {source_id} rejected: {reason}")]
    Rejected {
        /// The content source that was requested.
        source_id: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Errors raised while installing the physical input watchers.
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    /// A GPIO line could not be opened or requested.
    #[cfg(feature = "gpio")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] gpio_cdev::Error),

    /// The watcher or listener thread could not be started.
    #[error("Failed to spawn input thread: {0}")]
    Spawn(#[from] std::io::Error),
}
