//! Triggered-overlay lifecycle
//!
//! ```text
//!   trigger tap ──┐                    ┌──> SurfaceHost (portal)
//!   open_by_id ───┼──> OverlayManager ─┤
//!   open_rule ────┘    (state by key)  └──> TimerQueue (auto-close)
//! ```
//!
//! State is keyed by `container:overlay` and outlives re-renders of the
//! hosting container. Only explicit close, timer expiry, or container
//! teardown discard it.

mod key;
mod listeners;
mod manager;
mod state;
mod surface;
mod timer;

#[cfg(test)]
mod manager_tests;

pub use key::{ContainerId, OverlayKey};
pub use listeners::{OpenListener, OverlayListeners};
pub use manager::{
    DEFAULT_MOUNT_FAILURE_THRESHOLD, DEFAULT_REFRESH_DELAY, OverlayManager, OverlayRegistration,
    RegisterOutcome,
};
pub use state::OverlayRuntimeState;
pub use surface::{HeadlessHost, MountError, SurfaceHandle, SurfaceHost};
pub use timer::{TimerHandle, TimerQueue};
