//! Tests for the overlay lifecycle manager
//!
//! Covers edge-triggered open/close, manual sticky state, timers, mount
//! retries and container isolation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use vantage_types::{OverlayConfig, TriggerKind};

use super::manager::{OverlayManager, RegisterOutcome};
use super::surface::{MountError, SurfaceHandle, SurfaceHost};
use super::{ContainerId, OverlayKey};
use crate::diagnostics::Diagnostics;
use crate::error::EngineError;

fn t(secs: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap()
        + chrono::Duration::seconds(secs)
}

/// Shared view of what the host was asked to do
#[derive(Debug, Default)]
struct HostLog {
    live: Vec<SurfaceHandle>,
    created: u64,
    /// Refuse this many create requests before succeeding
    refuse: u32,
}

struct RecordingHost(Rc<RefCell<HostLog>>);

impl SurfaceHost for RecordingHost {
    fn create_surface(&mut self, _key: &OverlayKey) -> Result<SurfaceHandle, MountError> {
        let mut log = self.0.borrow_mut();
        if log.refuse > 0 {
            log.refuse -= 1;
            return Err(MountError("portal root not attached".to_string()));
        }
        let handle = SurfaceHandle(log.created);
        log.created += 1;
        log.live.push(handle);
        Ok(handle)
    }

    fn release_surface(&mut self, _key: &OverlayKey, handle: SurfaceHandle) {
        self.0.borrow_mut().live.retain(|h| *h != handle);
    }
}

fn make_manager() -> (OverlayManager, Rc<RefCell<HostLog>>) {
    let log = Rc::new(RefCell::new(HostLog::default()));
    let manager = OverlayManager::new(Box::new(RecordingHost(Rc::clone(&log))))
        .with_refresh_delay(Duration::from_millis(500));
    (manager, log)
}

fn logic_overlay(id: &str) -> OverlayConfig {
    OverlayConfig::new(id, TriggerKind::Logic)
}

fn timed_overlay(id: &str, secs: f32) -> OverlayConfig {
    let mut config = OverlayConfig::new(id, TriggerKind::Button);
    config.auto_close_timer_secs = Some(secs);
    config
}

fn card() -> ContainerId {
    ContainerId::new("card-1")
}

// ═══════════════════════════════════════════════════════════════════════════
// Logic edges
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_logic_rising_then_falling_edge() {
    let (mut manager, _) = make_manager();
    let mut config = logic_overlay("alarm");
    config.auto_close_timer_secs = Some(60.0);
    manager.register(&card(), "host", config);
    let key = OverlayKey::new(card(), "alarm");

    assert!(!manager.evaluate(&key, t(0), |_| false));
    assert!(manager.evaluate(&key, t(1), |_| true));
    assert!(manager.state(&key).unwrap().has_timer());
    assert!(!manager.state(&key).unwrap().manually_opened());

    assert!(!manager.evaluate(&key, t(2), |_| false));
    let state = manager.state(&key).unwrap();
    assert!(!state.has_timer());
    assert_eq!(manager.pending_timers(), 0);
    assert_eq!(state.last_logic_state(), Some(false));
}

#[test]
fn test_logic_true_on_first_evaluation_is_a_rising_edge() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", logic_overlay("alarm"));
    let key = OverlayKey::new(card(), "alarm");

    assert!(manager.evaluate(&key, t(0), |_| true));
}

#[test]
fn test_logic_open_without_auto_close_survives_falling_edge() {
    let (mut manager, _) = make_manager();
    let mut config = logic_overlay("alarm");
    config.auto_close_on_rule_false = false;
    manager.register(&card(), "host", config);
    let key = OverlayKey::new(card(), "alarm");

    assert!(manager.evaluate(&key, t(0), |_| true));
    assert!(manager.state(&key).unwrap().manually_opened());
    assert!(manager.evaluate(&key, t(1), |_| false));
    assert!(manager.evaluate(&key, t(2), |_| false));

    manager.close(&key);
    assert!(!manager.is_open(&key));
}

#[test]
fn test_manual_open_is_not_auto_closed_by_logic() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", logic_overlay("alarm"));
    let key = OverlayKey::new(card(), "alarm");

    manager.evaluate(&key, t(0), |_| true);
    manager.open(&key, t(1));
    assert!(manager.evaluate(&key, t(2), |_| false));
    assert!(manager.state(&key).unwrap().manually_opened());
}

#[test]
fn test_explicit_close_then_rule_stays_true_does_not_reopen() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", logic_overlay("alarm"));
    let key = OverlayKey::new(card(), "alarm");

    assert!(manager.evaluate(&key, t(0), |_| true));
    manager.close(&key);
    // No edge: still true
    assert!(!manager.evaluate(&key, t(1), |_| true));
    // New edge after going false
    manager.evaluate(&key, t(2), |_| false);
    assert!(manager.evaluate(&key, t(3), |_| true));
}

#[test]
fn test_non_logic_triggers_never_consult_the_rule() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");

    let consulted = Cell::new(false);
    manager.evaluate(&key, t(0), |_| {
        consulted.set(true);
        true
    });
    assert!(!consulted.get());
    assert!(!manager.is_open(&key));
}

// ═══════════════════════════════════════════════════════════════════════════
// Registration
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_reregistration_preserves_runtime_state() {
    let (mut manager, _) = make_manager();
    let key = OverlayKey::new(card(), "popup");
    let config = timed_overlay("popup", 30.0);

    assert_eq!(manager.register(&card(), "host", config.clone()), RegisterOutcome::Created);
    manager.open(&key, t(0));

    assert_eq!(manager.register(&card(), "host", config.clone()), RegisterOutcome::Unchanged);
    let mut changed = config;
    changed.default_open = true;
    assert_eq!(manager.register(&card(), "host", changed), RegisterOutcome::Updated);

    let state = manager.state(&key).unwrap();
    assert!(state.is_open());
    assert!(state.manually_opened());
    assert!(state.has_timer());
    assert_eq!(manager.pending_timers(), 1);
}

#[test]
fn test_collision_replaces_entry_and_drops_stale_timer() {
    let (mut manager, log) = make_manager();
    let key = OverlayKey::new(card(), "popup");
    let mut diagnostics = Diagnostics::new();

    manager.register(&card(), "first", timed_overlay("popup", 30.0));
    manager.open(&key, t(0));
    assert!(manager.mount(&key, &mut diagnostics, |_| {}));
    assert_eq!(log.borrow().live.len(), 1);

    let outcome = manager.register(&card(), "second", timed_overlay("popup", 30.0));
    assert_eq!(outcome, RegisterOutcome::Replaced);
    assert_eq!(manager.pending_timers(), 0);
    assert!(log.borrow().live.is_empty());
    assert!(!manager.is_open(&key));
    assert_eq!(manager.registration(&key).unwrap().host_module, "second");
    assert!(manager.tick(t(60)).is_empty());
}

#[test]
fn test_default_open_applies_on_first_registration() {
    let (mut manager, _) = make_manager();
    let mut config = OverlayConfig::new("welcome", TriggerKind::Manual);
    config.default_open = true;
    manager.register(&card(), "host", config);

    assert!(manager.is_open(&OverlayKey::new(card(), "welcome")));
}

#[test]
fn test_unknown_key_is_closed() {
    let (mut manager, _) = make_manager();
    let key = OverlayKey::new("nowhere", "ghost");
    assert!(!manager.is_open(&key));
    assert!(!manager.evaluate(&key, t(0), |_| true));
    assert!(!manager.open(&key, t(0)));
    assert!(!manager.should_render(&key));
}

// ═══════════════════════════════════════════════════════════════════════════
// Timers
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_timer_closes_overlay_at_deadline() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 30.0));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    assert!(manager.tick(t(29)).is_empty());
    assert_eq!(manager.tick(t(30)), vec![key.clone()]);

    let state = manager.state(&key).unwrap();
    assert!(!state.is_open());
    assert!(!state.manually_opened());
}

#[test]
fn test_explicit_close_cancels_timer() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 30.0));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    manager.close(&key);
    assert_eq!(manager.pending_timers(), 0);

    // Reopened later by logic or user must not be closed by the old timer
    manager.open(&key, t(20));
    assert!(manager.tick(t(30)).is_empty());
    assert!(manager.is_open(&key));
    assert_eq!(manager.tick(t(50)), vec![key]);
}

#[test]
fn test_reopen_restarts_timer() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 10.0));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    manager.open(&key, t(5));
    assert_eq!(manager.pending_timers(), 1);
    assert!(manager.tick(t(10)).is_empty());
    assert_eq!(manager.tick(t(15)).len(), 1);
}

#[test]
fn test_timer_disabled_before_fire_is_noop() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 30.0));
    let key = OverlayKey::new(card(), "popup");
    manager.open(&key, t(0));

    let mut disabled = timed_overlay("popup", 30.0);
    disabled.auto_close_timer_secs = None;
    manager.register(&card(), "host", disabled);

    assert!(manager.tick(t(31)).is_empty());
    let state = manager.state(&key).unwrap();
    assert!(state.is_open());
    assert!(!state.has_timer());
}

#[test]
fn test_zero_timer_is_disabled() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 0.0));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    assert_eq!(manager.pending_timers(), 0);
    assert!(manager.tick(t(3600)).is_empty());
    assert!(manager.is_open(&key));
}

#[test]
fn test_out_of_range_timer_is_disabled() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", timed_overlay("popup", 1e20));
    let key = OverlayKey::new(card(), "popup");

    assert!(manager.open(&key, t(0)));
    assert_eq!(manager.pending_timers(), 0);
    assert!(manager.tick(t(3600)).is_empty());
    assert!(manager.is_open(&key));
}

#[test]
fn test_logic_rising_edge_starts_timer_when_configured() {
    let (mut manager, _) = make_manager();
    let mut config = logic_overlay("alarm");
    config.auto_close_timer_secs = Some(5.0);
    manager.register(&card(), "host", config);
    let key = OverlayKey::new(card(), "alarm");

    manager.evaluate(&key, t(0), |_| true);
    assert_eq!(manager.tick(t(5)), vec![key.clone()]);
    // Rule still true: no edge, stays closed
    assert!(!manager.evaluate(&key, t(6), |_| true));
}

// ═══════════════════════════════════════════════════════════════════════════
// Triggers
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_page_load_fires_once() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", OverlayConfig::new("intro", TriggerKind::PageLoad));
    let key = OverlayKey::new(card(), "intro");

    assert!(manager.evaluate(&key, t(0), |_| false));
    manager.close(&key);
    assert!(!manager.evaluate(&key, t(1), |_| false));
    manager.register(&card(), "host", OverlayConfig::new("intro", TriggerKind::PageLoad));
    assert!(!manager.evaluate(&key, t(2), |_| false));
}

#[test]
fn test_toggle() {
    let (mut manager, _) = make_manager();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");

    assert!(manager.toggle(&key, t(0)));
    assert!(!manager.toggle(&key, t(1)));
    assert!(!manager.is_open(&key));
}

#[test]
fn test_open_by_id_notifies_single_listener() {
    let (mut manager, _) = make_manager();
    let calls = Rc::new(Cell::new(0));

    // Container re-created several times with fresh instance ids
    for instance in 0..3 {
        let container = ContainerId::new(format!("card-{instance}"));
        manager.register(&container, "host", OverlayConfig::new("popup", TriggerKind::Manual));
        let counter = Rc::clone(&calls);
        manager.add_open_listener(
            "popup",
            container,
            Box::new(move |_: &OverlayKey| counter.set(counter.get() + 1)),
        );
    }

    let key = manager.open_by_id("popup", t(0)).unwrap();
    assert_eq!(key, OverlayKey::new("card-2", "popup"));
    assert_eq!(calls.get(), 1);
    assert!(manager.is_open(&key));
    assert!(!manager.is_open(&OverlayKey::new("card-0", "popup")));
}

#[test]
fn test_open_by_id_unbound_is_none() {
    let (mut manager, _) = make_manager();
    assert_eq!(manager.open_by_id("missing", t(0)), None);
}

// ═══════════════════════════════════════════════════════════════════════════
// Rendering
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_render_or_skip() {
    let (mut manager, log) = make_manager();
    let mut diagnostics = Diagnostics::new();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");

    assert!(!manager.should_render(&key));
    manager.open(&key, t(0));
    assert!(manager.should_render(&key));

    let renders = Cell::new(0);
    assert!(manager.mount(&key, &mut diagnostics, |_| renders.set(renders.get() + 1)));
    assert!(!manager.should_render(&key));

    // Deferred refresh after opening
    manager.tick(t(1));
    assert!(manager.should_render(&key));
    manager.mount(&key, &mut diagnostics, |_| renders.set(renders.get() + 1));
    assert!(!manager.should_render(&key));

    assert_eq!(renders.get(), 2);
    assert_eq!(log.borrow().created, 1);
}

#[test]
fn test_close_releases_surface() {
    let (mut manager, log) = make_manager();
    let mut diagnostics = Diagnostics::new();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    manager.mount(&key, &mut diagnostics, |_| {});
    manager.close(&key);

    assert!(log.borrow().live.is_empty());
    assert!(!manager.state(&key).unwrap().is_mounted());
}

#[test]
fn test_mount_failure_is_retried_next_pass() {
    let (mut manager, log) = make_manager();
    log.borrow_mut().refuse = 2;
    let mut diagnostics = Diagnostics::new();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");
    manager.open(&key, t(0));

    assert!(!manager.mount(&key, &mut diagnostics, |_| {}));
    assert!(!manager.mount(&key, &mut diagnostics, |_| {}));
    assert_eq!(manager.state(&key).unwrap().mount_failures(), 2);
    assert!(manager.should_render(&key));

    assert!(manager.mount(&key, &mut diagnostics, |_| {}));
    assert_eq!(manager.state(&key).unwrap().mount_failures(), 0);
    assert!(manager.is_open(&key));

    let recorded = diagnostics.take_recorded();
    assert_eq!(recorded.len(), 2);
    assert!(matches!(&recorded[0], EngineError::MountFailure { key: k, .. } if *k == key));
}

#[test]
fn test_unmount_keeps_open_state() {
    let (mut manager, _) = make_manager();
    let mut diagnostics = Diagnostics::new();
    manager.register(&card(), "host", OverlayConfig::new("popup", TriggerKind::Button));
    let key = OverlayKey::new(card(), "popup");

    manager.open(&key, t(0));
    manager.mount(&key, &mut diagnostics, |_| {});
    assert!(manager.unmount(&key));
    assert!(manager.is_open(&key));
    assert!(manager.should_render(&key));
}

// ═══════════════════════════════════════════════════════════════════════════
// Container isolation
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_same_overlay_id_in_two_containers_is_isolated() {
    let (mut manager, _) = make_manager();
    let left = ContainerId::new("left");
    let right = ContainerId::new("right");
    manager.register(&left, "host", timed_overlay("popup", 10.0));
    manager.register(&right, "host", timed_overlay("popup", 10.0));

    let left_key = OverlayKey::new(left.clone(), "popup");
    let right_key = OverlayKey::new(right, "popup");
    manager.open(&left_key, t(0));

    assert!(manager.is_open(&left_key));
    assert!(!manager.is_open(&right_key));
    assert_eq!(manager.tick(t(10)), vec![left_key]);
}

#[test]
fn test_teardown_only_affects_its_container() {
    let (mut manager, log) = make_manager();
    let mut diagnostics = Diagnostics::new();
    let left = ContainerId::new("left");
    let right = ContainerId::new("right");
    manager.register(&left, "host", timed_overlay("a", 10.0));
    manager.register(&right, "host", timed_overlay("b", 10.0));

    let left_key = OverlayKey::new(left.clone(), "a");
    let right_key = OverlayKey::new(right.clone(), "b");
    manager.open(&left_key, t(0));
    manager.open(&right_key, t(0));
    manager.mount(&left_key, &mut diagnostics, |_| {});
    manager.mount(&right_key, &mut diagnostics, |_| {});

    let unbound = manager.unregister_container(&left);
    assert_eq!(unbound, vec!["a".to_string()]);
    assert_eq!(manager.len(), 1);
    assert_eq!(manager.pending_timers(), 1);
    assert_eq!(log.borrow().live.len(), 1);
    assert!(manager.is_open(&right_key));
    assert_eq!(manager.bound_container("b"), Some(&right));
    assert_eq!(manager.tick(t(10)), vec![right_key]);
}

#[test]
fn test_teardown_rebinds_shared_overlay_id() {
    let (mut manager, _) = make_manager();
    let left = ContainerId::new("left");
    let right = ContainerId::new("right");
    manager.register(&left, "host", OverlayConfig::new("details", TriggerKind::Module));
    manager.register(&right, "host", OverlayConfig::new("details", TriggerKind::Module));
    assert_eq!(manager.bound_container("details"), Some(&right));

    let unbound = manager.unregister_container(&right);
    assert!(unbound.is_empty());
    assert_eq!(manager.bound_container("details"), Some(&left));
    assert_eq!(manager.open_by_id("details", t(0)), Some(OverlayKey::new(left.clone(), "details")));

    assert_eq!(manager.unregister_container(&left), vec!["details".to_string()]);
    assert_eq!(manager.bound_container("details"), None);
}

#[test]
fn test_refresh_all_marks_open_overlays() {
    let (mut manager, _) = make_manager();
    let mut diagnostics = Diagnostics::new();
    manager.register(&card(), "host", OverlayConfig::new("open", TriggerKind::Button));
    manager.register(&card(), "host", OverlayConfig::new("closed", TriggerKind::Button));
    let open_key = OverlayKey::new(card(), "open");
    manager.open(&open_key, t(0));
    manager.mount(&open_key, &mut diagnostics, |_| {});
    manager.tick(t(1));
    manager.mount(&open_key, &mut diagnostics, |_| {});

    manager.request_refresh_all();
    assert!(manager.should_render(&open_key));
    assert!(!manager.should_render(&OverlayKey::new(card(), "closed")));
}
