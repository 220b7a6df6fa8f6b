//! Per-overlay runtime state
//!
//! Owned exclusively by the lifecycle manager. Two orthogonal flags plus an
//! optional timer instead of an enumerated machine:
//!
//! | is_open | manually_opened | timer | meaning              |
//! |---------|-----------------|-------|----------------------|
//! | false   | false           | -     | Closed               |
//! | true    | false           | ±     | Open (logic)         |
//! | true    | true            | ±     | Open (manual)        |

use chrono::NaiveDateTime;
use vantage_types::OverlayConfig;

use super::surface::SurfaceHandle;
use super::timer::TimerHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlayRuntimeState {
    pub(crate) is_open: bool,
    /// Set by user or explicit open requests; only an explicit close clears it
    pub(crate) manually_opened: bool,
    /// Last observed `open_rule` result, for edge detection only
    pub(crate) last_logic_state: Option<bool>,
    pub(crate) timer: Option<TimerHandle>,
    pub(crate) surface: Option<SurfaceHandle>,
    /// Content should be rendered again even though the surface exists
    pub(crate) needs_refresh: bool,
    /// Deferred follow-up refresh after opening
    pub(crate) refresh_at: Option<NaiveDateTime>,
    /// First evaluation pass has run (page-load triggers fire only then)
    pub(crate) evaluated: bool,
    /// Consecutive failed mount attempts
    pub(crate) mount_failures: u32,
}

impl OverlayRuntimeState {
    pub(crate) fn initial(config: &OverlayConfig) -> Self {
        Self {
            is_open: config.default_open,
            ..Self::default()
        }
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn manually_opened(&self) -> bool {
        self.manually_opened
    }

    pub fn last_logic_state(&self) -> Option<bool> {
        self.last_logic_state
    }

    pub fn has_timer(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    pub fn mount_failures(&self) -> u32 {
        self.mount_failures
    }

    /// Restore the flag invariants after a mutation.
    ///
    /// `manually_opened` forces `is_open`. Returns a timer handle that must be
    /// cancelled because the overlay is closed.
    pub(crate) fn normalize(&mut self) -> Option<TimerHandle> {
        if self.manually_opened {
            self.is_open = true;
        }
        if self.is_open {
            None
        } else {
            self.needs_refresh = false;
            self.refresh_at = None;
            self.timer.take()
        }
    }
}
