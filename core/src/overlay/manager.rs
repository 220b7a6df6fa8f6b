//! Overlay lifecycle manager
//!
//! Owns runtime state for every registered overlay, keyed by
//! [`OverlayKey`]. State is created lazily on first registration, survives
//! re-registration from repeated re-renders, and is only dropped when the
//! hosting container is torn down.
//!
//! Transitions:
//! - **Trigger activation / explicit open**: open + manual, (re)start timer
//! - **Logic rising edge**: open; manual too if the rule may not auto-close
//! - **Logic falling edge**: close, unless manual or auto-close is off
//! - **Explicit close / timer expiry**: the only path that clears manual

use std::time::Duration;

use chrono::NaiveDateTime;
use hashbrown::HashMap;
use vantage_types::{OverlayConfig, TriggerKind, VisibilityRule};

use super::listeners::{OpenListener, OverlayListeners};
use super::state::OverlayRuntimeState;
use super::surface::{SurfaceHandle, SurfaceHost};
use super::timer::TimerQueue;
use super::{ContainerId, OverlayKey};
use crate::diagnostics::Diagnostics;
use crate::error::EngineError;

/// Delay before the follow-up content refresh after opening
pub const DEFAULT_REFRESH_DELAY: Duration = Duration::from_millis(250);

/// Consecutive mount failures before escalating the log level
pub const DEFAULT_MOUNT_FAILURE_THRESHOLD: u32 = 5;

/// What `register` did with an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First registration for this key
    Created,
    /// Same registration as before, nothing changed
    Unchanged,
    /// Non-state parts updated, runtime state kept
    Updated,
    /// A different host module claimed the key; old state discarded
    Replaced,
}

/// The non-state half of an overlay entry
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayRegistration {
    /// Module that declares the overlay
    pub host_module: String,
    pub config: OverlayConfig,
}

#[derive(Debug)]
struct OverlayEntry {
    registration: OverlayRegistration,
    state: OverlayRuntimeState,
}

pub struct OverlayManager {
    entries: HashMap<OverlayKey, OverlayEntry>,
    timers: TimerQueue,
    listeners: OverlayListeners,
    host: Box<dyn SurfaceHost>,
    refresh_delay: Duration,
    mount_failure_threshold: u32,
}

impl std::fmt::Debug for OverlayManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayManager")
            .field("entries", &self.entries.keys().collect::<Vec<_>>())
            .field("pending_timers", &self.timers.len())
            .field("listeners", &self.listeners)
            .finish()
    }
}

impl OverlayManager {
    pub fn new(host: Box<dyn SurfaceHost>) -> Self {
        Self {
            entries: HashMap::new(),
            timers: TimerQueue::new(),
            listeners: OverlayListeners::new(),
            host,
            refresh_delay: DEFAULT_REFRESH_DELAY,
            mount_failure_threshold: DEFAULT_MOUNT_FAILURE_THRESHOLD,
        }
    }

    pub fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub fn with_mount_failure_threshold(mut self, threshold: u32) -> Self {
        self.mount_failure_threshold = threshold.max(1);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Register (or re-register) an overlay declared by `host_module`.
    ///
    /// Re-registering the same key reuses the existing runtime state. If a
    /// different host module claims an existing key, the later registration
    /// wins and the earlier entry's timer and surface are released.
    pub fn register(
        &mut self,
        container: &ContainerId,
        host_module: &str,
        config: OverlayConfig,
    ) -> RegisterOutcome {
        let key = OverlayKey::new(container.clone(), config.id.clone());
        self.listeners.bind(&config.id, container);

        let registration = OverlayRegistration {
            host_module: host_module.to_string(),
            config,
        };

        match self.entries.get_mut(&key) {
            None => {
                tracing::debug!(%key, "Registered overlay");
                let state = OverlayRuntimeState::initial(&registration.config);
                self.entries.insert(key, OverlayEntry { registration, state });
                RegisterOutcome::Created
            }
            Some(entry) if entry.registration.host_module != registration.host_module => {
                tracing::warn!(
                    %key,
                    previous = %entry.registration.host_module,
                    host = %registration.host_module,
                    "Overlay key collision, replacing earlier registration"
                );
                if let Some(timer) = entry.state.timer.take() {
                    self.timers.cancel(timer);
                }
                if let Some(surface) = entry.state.surface.take() {
                    self.host.release_surface(&key, surface);
                }
                entry.state = OverlayRuntimeState::initial(&registration.config);
                entry.registration = registration;
                RegisterOutcome::Replaced
            }
            Some(entry) if entry.registration == registration => RegisterOutcome::Unchanged,
            Some(entry) => {
                entry.registration = registration;
                RegisterOutcome::Updated
            }
        }
    }

    /// Listen for external open requests on `overlay_id`.
    /// Replaces any prior listener for that id.
    pub fn add_open_listener(&mut self, overlay_id: &str, container: ContainerId, notify: OpenListener) {
        if self.listeners.register(overlay_id, container, Some(notify)) {
            tracing::debug!(overlay = overlay_id, "Replaced open listener");
        }
    }

    /// Tear down a container: cancel timers, release surfaces and listeners
    /// for its keys only.
    ///
    /// Listeners bound to this container move to another container still
    /// hosting the same overlay id. Returns the overlay ids no container
    /// hosts any more.
    pub fn unregister_container(&mut self, container: &ContainerId) -> Vec<String> {
        let keys: Vec<OverlayKey> = self
            .entries
            .keys()
            .filter(|key| key.container == *container)
            .cloned()
            .collect();

        for key in &keys {
            if let Some(mut entry) = self.entries.remove(key) {
                if let Some(timer) = entry.state.timer.take() {
                    self.timers.cancel(timer);
                }
                if let Some(surface) = entry.state.surface.take() {
                    self.host.release_surface(key, surface);
                }
            }
        }

        let mut unbound = Vec::new();
        for overlay_id in self.listeners.unregister_container(container) {
            // Another live container may still host the same overlay id
            let survivor = self
                .entries
                .keys()
                .filter(|key| key.overlay == overlay_id)
                .map(|key| key.container.clone())
                .min();
            match survivor {
                Some(other) => {
                    tracing::debug!(overlay = %overlay_id, container = %other, "Rebound overlay listener");
                    self.listeners.register(&overlay_id, other, None);
                }
                None => unbound.push(overlay_id),
            }
        }

        tracing::debug!(%container, overlays = keys.len(), "Container torn down");
        unbound
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one evaluation pass for `key`.
    ///
    /// `resolve` is only called for logic-triggered overlays. Returns whether
    /// the overlay is open afterwards; unregistered keys are closed.
    pub fn evaluate(
        &mut self,
        key: &OverlayKey,
        now: NaiveDateTime,
        resolve: impl FnOnce(&VisibilityRule) -> bool,
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };

        let trigger = entry.registration.config.effective_trigger();
        let first_pass = !entry.state.evaluated;
        entry.state.evaluated = true;

        if first_pass && trigger == TriggerKind::PageLoad {
            tracing::debug!(%key, "Page-load trigger");
            open_manual(entry, key, now, &mut self.timers, self.refresh_delay);
        }

        if trigger == TriggerKind::Logic {
            let current = resolve(&entry.registration.config.open_rule);
            // Recorded before deciding so the next pass sees this result
            let previous = entry.state.last_logic_state.replace(current);
            let rising = current && previous != Some(true);
            let falling = !current && previous == Some(true);

            if rising {
                tracing::debug!(%key, "Open rule rising edge");
                let was_open = entry.state.is_open;
                entry.state.is_open = true;
                if !entry.registration.config.auto_close_on_rule_false {
                    entry.state.manually_opened = true;
                }
                if !was_open {
                    restart_timer(entry, key, now, &mut self.timers);
                    schedule_refresh(&mut entry.state, now, self.refresh_delay);
                }
            } else if falling
                && !entry.state.manually_opened
                && entry.registration.config.auto_close_on_rule_false
            {
                tracing::debug!(%key, "Open rule falling edge");
                close_entry(entry, key, &mut self.timers, self.host.as_mut());
            }
        }

        if let Some(stale) = entry.state.normalize() {
            self.timers.cancel(stale);
        }
        entry.state.is_open
    }

    /// User trigger activation or explicit external open request.
    /// Returns `false` if the key is not registered.
    pub fn open(&mut self, key: &OverlayKey, now: NaiveDateTime) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            tracing::debug!(%key, "Open requested for unregistered overlay");
            return false;
        };
        open_manual(entry, key, now, &mut self.timers, self.refresh_delay);
        true
    }

    /// Explicit close (close control, background dismiss).
    /// Returns `false` if the key is not registered.
    pub fn close(&mut self, key: &OverlayKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        close_entry(entry, key, &mut self.timers, self.host.as_mut());
        true
    }

    /// Open if closed, close if open. Returns the new open state.
    pub fn toggle(&mut self, key: &OverlayKey, now: NaiveDateTime) -> bool {
        if self.is_open(key) {
            self.close(key);
            false
        } else {
            self.open(key, now)
        }
    }

    /// Resolve `overlay_id` to its bound container, open it there and notify
    /// the listener so an unmounted overlay gets mounted.
    pub fn open_by_id(&mut self, overlay_id: &str, now: NaiveDateTime) -> Option<OverlayKey> {
        let Some(container) = self.listeners.container_for(overlay_id).cloned() else {
            tracing::debug!(overlay = overlay_id, "No container bound for overlay");
            return None;
        };
        let key = OverlayKey::new(container, overlay_id);
        if !self.open(&key, now) {
            return None;
        }
        self.listeners.notify(overlay_id, &key);
        Some(key)
    }

    /// Fire due timers and deferred refreshes. Returns keys closed by timers.
    pub fn tick(&mut self, now: NaiveDateTime) -> Vec<OverlayKey> {
        let mut closed = Vec::new();

        for (handle, key) in self.timers.take_due(now) {
            let Some(entry) = self.entries.get_mut(&key) else {
                continue;
            };
            // Superseded by a newer timer or already cancelled
            if entry.state.timer != Some(handle) {
                continue;
            }
            entry.state.timer = None;

            // Only checked at fire time
            if entry.registration.config.auto_close_timer().is_none() {
                tracing::debug!(%key, "Auto-close disabled since scheduling, ignoring timer");
                continue;
            }

            tracing::debug!(%key, "Auto-close timer expired");
            close_entry(entry, &key, &mut self.timers, self.host.as_mut());
            closed.push(key);
        }

        for entry in self.entries.values_mut() {
            if let Some(at) = entry.state.refresh_at
                && at <= now
            {
                entry.state.refresh_at = None;
                entry.state.needs_refresh = entry.state.is_open;
            }
        }

        closed
    }

    /// Mark every open overlay's content for one refresh
    pub fn request_refresh_all(&mut self) {
        for entry in self.entries.values_mut() {
            if entry.state.is_open {
                entry.state.needs_refresh = true;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rendering
    // ─────────────────────────────────────────────────────────────────────────

    /// Render-or-skip: render only on first mount or when a refresh is due.
    /// Repeated passes over an already-open, mounted overlay are no-ops.
    pub fn should_render(&self, key: &OverlayKey) -> bool {
        self.entries.get(key).is_some_and(|entry| {
            entry.state.is_open && (entry.state.surface.is_none() || entry.state.needs_refresh)
        })
    }

    /// Ensure a surface exists and render `content` into it.
    ///
    /// A refused surface is reported and retried on the next pass; nothing
    /// is raised to the caller.
    pub fn mount(
        &mut self,
        key: &OverlayKey,
        diagnostics: &mut Diagnostics,
        content: impl FnOnce(SurfaceHandle),
    ) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if !entry.state.is_open {
            return false;
        }

        let handle = match entry.state.surface {
            Some(handle) => handle,
            None => match self.host.create_surface(key) {
                Ok(handle) => {
                    entry.state.surface = Some(handle);
                    entry.state.mount_failures = 0;
                    handle
                }
                Err(e) => {
                    entry.state.mount_failures += 1;
                    if entry.state.mount_failures == self.mount_failure_threshold {
                        tracing::error!(
                            %key,
                            attempts = entry.state.mount_failures,
                            "Overlay surface keeps failing to mount"
                        );
                    }
                    diagnostics.report(EngineError::MountFailure {
                        key: key.clone(),
                        reason: e.0,
                    });
                    return false;
                }
            },
        };

        content(handle);
        entry.state.needs_refresh = false;
        true
    }

    /// Release the surface without changing open state
    pub fn unmount(&mut self, key: &OverlayKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        match entry.state.surface.take() {
            Some(surface) => {
                self.host.release_surface(key, surface);
                true
            }
            None => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Unregistered keys are closed
    pub fn is_open(&self, key: &OverlayKey) -> bool {
        self.entries.get(key).is_some_and(|entry| entry.state.is_open)
    }

    pub fn state(&self, key: &OverlayKey) -> Option<&OverlayRuntimeState> {
        self.entries.get(key).map(|entry| &entry.state)
    }

    pub fn registration(&self, key: &OverlayKey) -> Option<&OverlayRegistration> {
        self.entries.get(key).map(|entry| &entry.registration)
    }

    pub fn keys(&self) -> impl Iterator<Item = &OverlayKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<NaiveDateTime> {
        self.timers.next_deadline()
    }

    pub fn bound_container(&self, overlay_id: &str) -> Option<&ContainerId> {
        self.listeners.container_for(overlay_id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry helpers (free functions so callers can split-borrow the manager)
// ─────────────────────────────────────────────────────────────────────────────

fn open_manual(
    entry: &mut OverlayEntry,
    key: &OverlayKey,
    now: NaiveDateTime,
    timers: &mut TimerQueue,
    refresh_delay: Duration,
) {
    let was_open = entry.state.is_open;
    entry.state.is_open = true;
    entry.state.manually_opened = true;
    restart_timer(entry, key, now, timers);
    if !was_open {
        schedule_refresh(&mut entry.state, now, refresh_delay);
    }
    tracing::debug!(%key, "Overlay opened");
}

/// Cancel any running timer, then start a new one if the feature is on
fn restart_timer(entry: &mut OverlayEntry, key: &OverlayKey, now: NaiveDateTime, timers: &mut TimerQueue) {
    if let Some(previous) = entry.state.timer.take() {
        timers.cancel(previous);
    }
    let config = &entry.registration.config;
    let deadline = config.auto_close_timer().and_then(|delay| {
        chrono::Duration::from_std(delay)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
    });
    let Some(deadline) = deadline else {
        if let Some(secs) = config.auto_close_timer_secs
            && secs > 0.0
        {
            tracing::warn!(%key, secs, "Auto-close timer out of range, timer disabled");
        }
        return;
    };
    entry.state.timer = Some(timers.schedule(key.clone(), deadline));
}

fn schedule_refresh(state: &mut OverlayRuntimeState, now: NaiveDateTime, delay: Duration) {
    state.refresh_at = chrono::Duration::from_std(delay)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta));
}

fn close_entry(
    entry: &mut OverlayEntry,
    key: &OverlayKey,
    timers: &mut TimerQueue,
    host: &mut dyn SurfaceHost,
) {
    let state = &mut entry.state;
    state.is_open = false;
    state.manually_opened = false;
    state.needs_refresh = false;
    state.refresh_at = None;
    state.mount_failures = 0;
    if let Some(timer) = state.timer.take() {
        timers.cancel(timer);
    }
    if let Some(surface) = state.surface.take() {
        host.release_surface(key, surface);
    }
    tracing::debug!(%key, "Overlay closed");
}
