//! Overlay definition types
//!
//! An overlay is a detached surface (popup, modal) whose open state is owned
//! by the lifecycle manager in `vantage-core`. This module only holds the
//! declarative half: how the overlay is triggered and when it closes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::condition::default_true;
use crate::rule::VisibilityRule;

/// What opens an overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Only opened by explicit external requests
    #[default]
    Manual,
    /// Built-in button
    Button,
    /// Built-in icon
    Icon,
    /// Built-in image
    Image,
    /// Another module acts as the trigger
    Module,
    /// Opens once when the overlay is first evaluated
    PageLoad,
    /// Opens on the rising edge of `open_rule`
    Logic,
}

impl TriggerKind {
    /// Trigger kinds that render their own trigger UI
    pub fn has_builtin_ui(&self) -> bool {
        matches!(self, Self::Button | Self::Icon | Self::Image)
    }
}

/// Declarative definition of one overlay instance (loaded from config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Stable identity assigned by the author
    pub id: String,

    #[serde(default, rename = "trigger")]
    pub trigger_kind: TriggerKind,

    /// Node that acts as the trigger; replaces any built-in trigger UI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_module: Option<String>,

    /// "Should be open" predicate for `trigger = "logic"`
    #[serde(default)]
    pub open_rule: VisibilityRule,

    /// Falling edge of `open_rule` closes the overlay
    #[serde(default = "default_true")]
    pub auto_close_on_rule_false: bool,

    /// Forced close after this many seconds open (None or 0 = disabled)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_close_timer_secs: Option<f32>,

    /// Initial state when no other signal applies
    #[serde(default)]
    pub default_open: bool,
}

impl OverlayConfig {
    pub fn new(id: impl Into<String>, trigger_kind: TriggerKind) -> Self {
        Self {
            id: id.into(),
            trigger_kind,
            trigger_module: None,
            open_rule: VisibilityRule::default(),
            auto_close_on_rule_false: true,
            auto_close_timer_secs: None,
            default_open: false,
        }
    }

    /// Trigger kind after applying the module reference.
    ///
    /// A module reference is mutually exclusive with built-in trigger UI, so
    /// it wins over `button`/`icon`/`image`.
    pub fn effective_trigger(&self) -> TriggerKind {
        match (&self.trigger_module, self.trigger_kind) {
            (Some(_), kind) if kind.has_builtin_ui() || kind == TriggerKind::Manual => {
                TriggerKind::Module
            }
            (_, kind) => kind,
        }
    }

    /// Auto-close delay, if the timer feature is enabled.
    /// Values too large for a `Duration` disable the timer.
    pub fn auto_close_timer(&self) -> Option<Duration> {
        self.auto_close_timer_secs
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f32(secs).ok())
    }
}
