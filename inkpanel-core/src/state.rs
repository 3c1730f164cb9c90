//! Panel power state and manager snapshots.

/// Power state of the panel as tracked by the [`DisplayManager`](crate::DisplayManager).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerState {
    /// Frames reach the hardware and may overwrite the cache.
    #[default]
    Awake,
    /// Frames are held back unless a draw is forced.
    Asleep,
}

impl PowerState {
    /// Whether this is [`PowerState::Asleep`].
    pub fn is_asleep(self) -> bool {
        matches!(self, PowerState::Asleep)
    }
}

/// A snapshot of the manager's current state.
///
/// Use [`PanelController::get_state`](crate::PanelController::get_state) to obtain one.
#[derive(Debug, Clone, Default)]
pub struct ManagerState {
    /// Current power state.
    pub power: PowerState,
    /// Name of the resolved driver.
    pub driver: &'static str,
    /// Number of frames handed to the driver so far (failed pushes included).
    pub pushes: u64,
    /// Number of times the cache artifact was overwritten.
    pub cache_writes: u64,
}
