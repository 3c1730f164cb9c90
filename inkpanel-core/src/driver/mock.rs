//! Mock panel driver for development and testing.

use super::{Capabilities, PanelDriver, PushCapability};
use crate::config::{DeviceConfig, ImageSettings};
use crate::error::DriverError;
use crate::pipeline::Frame;

use log::{debug, warn};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

/// A driver call observed by the [`MockDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// `display_image` with the frame's dimensions and whether it was black.
    DisplayImage {
        /// Frame dimensions.
        dimensions: (u32, u32),
        /// Whether the frame was a blanking frame.
        black: bool,
    },
    /// `display` with the frame's dimensions and whether it was black.
    Display {
        /// Frame dimensions.
        dimensions: (u32, u32),
        /// Whether the frame was a blanking frame.
        black: bool,
    },
    /// `draw` with the frame's dimensions and whether it was black.
    Draw {
        /// Frame dimensions.
        dimensions: (u32, u32),
        /// Whether the frame was a blanking frame.
        black: bool,
    },
    /// `refresh`.
    Refresh,
    /// `sleep`.
    Sleep,
    /// `wake`.
    Wake,
    /// `clear`.
    Clear {
        /// Whether the panel was cleared to white.
        to_white: bool,
    },
    /// `wait_until_idle`.
    WaitUntilIdle,
}

impl MockEvent {
    /// Whether this event put a frame on (or into) the panel.
    pub fn is_push(&self) -> bool {
        matches!(
            self,
            MockEvent::DisplayImage { .. } | MockEvent::Display { .. } | MockEvent::Draw { .. }
        )
    }
}

/// Most recent calls kept by a [`MockHandle`]; older ones are dropped.
pub const MOCK_EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct MockLog {
    events: VecDeque<MockEvent>,
    last_frame: Option<Frame>,
    failing: bool,
    in_flight: usize,
    max_in_flight: usize,
}

/// Shared view of a [`MockDisplay`]'s recorded calls.
///
/// Cloned handles observe the same log, so tests keep one after moving the
/// driver into a [`DisplayManager`](crate::DisplayManager).
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    log: Arc<Mutex<MockLog>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The recorded calls, oldest first (at most [`MOCK_EVENT_CAPACITY`]).
    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().events.iter().cloned().collect()
    }

    /// Number of recorded frame pushes (`display_image`, `display` or `draw`).
    pub fn push_count(&self) -> usize {
        self.lock().events.iter().filter(|e| e.is_push()).count()
    }

    /// The most recently pushed frame.
    pub fn last_frame(&self) -> Option<Frame> {
        self.lock().last_frame.clone()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    /// Highest number of pushes ever observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Forget recorded events.
    pub fn clear_events(&self) {
        self.lock().events.clear();
    }
}

/// A display driver that needs no hardware.
///
/// Records every call through its [`MockHandle`] and, when configured with an
/// output path, writes each pushed frame there as a PNG.
///
/// # Example
///
/// ```
/// use inkpanel_core::{Frame, MockDisplay, PanelDriver};
///
/// let mut mock = MockDisplay::new();
/// let handle = mock.handle();
/// mock.display(&Frame::white(4, 4)).unwrap();
/// assert_eq!(handle.push_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    handle: MockHandle,
    capabilities: Capabilities,
    output: Option<PathBuf>,
    push_delay: Duration,
}

impl MockDisplay {
    /// Create a mock exposing every capability with a plain image push.
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::full(PushCapability::Image))
    }

    /// Create a mock exposing exactly `capabilities`.
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            handle: MockHandle::default(),
            capabilities,
            output: None,
            push_delay: Duration::ZERO,
        }
    }

    /// Create a mock from configuration, honouring `mock_output_file`.
    pub fn from_config(config: &dyn DeviceConfig) -> Self {
        let mut mock = Self::new();
        mock.output = config.config_string("mock_output_file").map(PathBuf::from);
        mock
    }

    /// Sleep for `delay` inside every push, to widen race windows in tests.
    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = delay;
        self
    }

    /// A handle observing this mock's calls.
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }

    fn record(&self, op: &'static str, event: MockEvent) -> Result<(), DriverError> {
        let mut log = self.handle.lock();
        if log.failing {
            return Err(DriverError::Simulated(op));
        }
        debug!("mock display: {:?}", event);
        if log.events.len() == MOCK_EVENT_CAPACITY {
            log.events.pop_front();
        }
        log.events.push_back(event);
        Ok(())
    }

    fn push(&mut self, op: &'static str, frame: &Frame, event: MockEvent) -> Result<(), DriverError> {
        {
            let mut log = self.handle.lock();
            log.in_flight += 1;
            log.max_in_flight = log.max_in_flight.max(log.in_flight);
        }
        if !self.push_delay.is_zero() {
            thread::sleep(self.push_delay);
        }
        let result = self.record(op, event);
        {
            let mut log = self.handle.lock();
            log.in_flight -= 1;
            if result.is_ok() {
                log.last_frame = Some(frame.clone());
            }
        }
        result?;

        if let Some(path) = &self.output {
            if let Err(e) = frame.as_rgb().save(path) {
                warn!("mock display could not write {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelDriver for MockDisplay {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn display_image(&mut self, frame: &Frame, _settings: &ImageSettings) -> Result<(), DriverError> {
        let event = MockEvent::DisplayImage {
            dimensions: frame.dimensions(),
            black: frame.is_solid_black(),
        };
        self.push("display_image", frame, event)
    }

    fn display(&mut self, frame: &Frame) -> Result<(), DriverError> {
        let event = MockEvent::Display {
            dimensions: frame.dimensions(),
            black: frame.is_solid_black(),
        };
        self.push("display", frame, event)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), DriverError> {
        let event = MockEvent::Draw {
            dimensions: frame.dimensions(),
            black: frame.is_solid_black(),
        };
        self.push("draw", frame, event)
    }

    fn refresh(&mut self) -> Result<(), DriverError> {
        self.record("refresh", MockEvent::Refresh)
    }

    fn sleep(&mut self) -> Result<(), DriverError> {
        self.record("sleep", MockEvent::Sleep)
    }

    fn wake(&mut self) -> Result<(), DriverError> {
        self.record("wake", MockEvent::Wake)
    }

    fn clear(&mut self, to_white: bool) -> Result<(), DriverError> {
        self.record("clear", MockEvent::Clear { to_white })
    }

    fn wait_until_idle(&mut self) -> Result<(), DriverError> {
        self.record("wait_until_idle", MockEvent::WaitUntilIdle)
    }
}
