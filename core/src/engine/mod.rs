//! Engine facade
//!
//! Ties the rule evaluator, overlay manager, trigger registry and template
//! store together behind one owner. Hosts call into it from their render
//! path:
//!
//! ```text
//!   begin_pass()                      drain pushed template results
//!   resolve_visibility(node)          per row / column / module
//!   register_overlay(...)             per overlay module, every render
//!   evaluate_overlay(key)             logic and page-load triggers
//!   should_render(key) -> mount(key)  render-or-skip
//!   tick()                            from the host event loop
//! ```

mod driver;
mod global;


pub use driver::spawn_ticker;
pub use global::{install, is_installed, uninstall, with_engine};

use tokio::sync::mpsc::UnboundedSender;
use vantage_types::{Condition, NodeVisibility, OverlayConfig, VisibilityRule};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineSettings;
use crate::diagnostics::Diagnostics;
use crate::entities::StateProvider;
use crate::error::EngineError;
use crate::overlay::{
    ContainerId, OpenListener, OverlayKey, OverlayManager, OverlayRuntimeState, RegisterOutcome,
    SurfaceHandle, SurfaceHost,
};
use crate::rules::{
    RuleEvaluator, SubscriptionRequest, TemplateStore, TemplateUpdate, resolve_node, resolve_rule,
};
use crate::triggers::TriggerRegistry;

/// Result of routing a tap on a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// The module is a trigger; its overlay was opened
    OpenedOverlay(OverlayKey),
    /// The module is a trigger but its overlay is not hosted anywhere
    TriggerUnbound { overlay_id: String },
    /// Not a trigger; run the module's own action
    RunOwnAction,
}

pub struct Engine {
    clock: Box<dyn Clock>,
    settings: EngineSettings,
    templates: TemplateStore,
    diagnostics: Diagnostics,
    triggers: TriggerRegistry,
    overlays: OverlayManager,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("settings", &self.settings)
            .field("triggers", &self.triggers)
            .field("overlays", &self.overlays)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(host: Box<dyn SurfaceHost>, clock: Box<dyn Clock>, settings: EngineSettings) -> Self {
        let overlays = OverlayManager::new(host)
            .with_refresh_delay(settings.refresh_delay())
            .with_mount_failure_threshold(settings.mount_retry_warn_after);
        Self {
            clock,
            settings,
            templates: TemplateStore::new(),
            diagnostics: Diagnostics::new(),
            triggers: TriggerRegistry::new(),
            overlays,
        }
    }

    /// Engine on the system clock with default settings
    pub fn with_host(host: Box<dyn SurfaceHost>) -> Self {
        Self::new(host, Box::new(SystemClock), EngineSettings::default())
    }

    pub fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Apply pushed template results. Open overlays are refreshed when any
    /// result changed. Returns the number of changed results.
    pub fn begin_pass(&mut self) -> usize {
        let changed = self.templates.drain_updates();
        if changed > 0 {
            self.overlays.request_refresh_all();
        }
        changed
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Visibility
    // ─────────────────────────────────────────────────────────────────────────

    fn evaluator<'a>(&'a mut self, provider: &'a dyn StateProvider) -> RuleEvaluator<'a> {
        RuleEvaluator::new(provider, self.clock.now(), &mut self.templates, &mut self.diagnostics)
            .with_template_fallback(self.settings.template_fallback)
    }

    pub fn evaluate_condition(&mut self, provider: &dyn StateProvider, condition: &Condition) -> bool {
        self.evaluator(provider).evaluate(condition)
    }

    pub fn resolve_rule(&mut self, provider: &dyn StateProvider, rule: &VisibilityRule) -> bool {
        resolve_rule(&mut self.evaluator(provider), rule)
    }

    /// Both visibility layers of a row, column or module
    pub fn resolve_visibility(&mut self, provider: &dyn StateProvider, visibility: &NodeVisibility) -> bool {
        resolve_node(&mut self.evaluator(provider), visibility)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Overlays
    // ─────────────────────────────────────────────────────────────────────────

    /// Register an overlay module. Safe to call on every render.
    ///
    /// Also keeps the trigger registry in sync with `trigger_module`.
    pub fn register_overlay(
        &mut self,
        container: &ContainerId,
        host_module: &str,
        config: &OverlayConfig,
    ) -> RegisterOutcome {
        match config.trigger_module.as_deref() {
            Some(module) => self.triggers.register(&config.id, module),
            None => {
                self.triggers.unregister(&config.id);
            }
        }
        self.overlays.register(container, host_module, config.clone())
    }

    /// Run the logic / page-load pass for one overlay; returns open state
    pub fn evaluate_overlay(&mut self, provider: &dyn StateProvider, key: &OverlayKey) -> bool {
        let now = self.clock.now();
        let Self {
            overlays,
            templates,
            diagnostics,
            settings,
            ..
        } = self;
        overlays.evaluate(key, now, |rule| {
            let mut evaluator = RuleEvaluator::new(provider, now, templates, diagnostics)
                .with_template_fallback(settings.template_fallback);
            resolve_rule(&mut evaluator, rule)
        })
    }

    pub fn is_open(&self, key: &OverlayKey) -> bool {
        self.overlays.is_open(key)
    }

    pub fn overlay_state(&self, key: &OverlayKey) -> Option<&OverlayRuntimeState> {
        self.overlays.state(key)
    }

    pub fn should_render(&self, key: &OverlayKey) -> bool {
        self.overlays.should_render(key)
    }

    pub fn mount(&mut self, key: &OverlayKey, content: impl FnOnce(SurfaceHandle)) -> bool {
        self.overlays.mount(key, &mut self.diagnostics, content)
    }

    pub fn unmount(&mut self, key: &OverlayKey) -> bool {
        self.overlays.unmount(key)
    }

    pub fn open(&mut self, key: &OverlayKey) -> bool {
        let now = self.clock.now();
        self.overlays.open(key, now)
    }

    pub fn close(&mut self, key: &OverlayKey) -> bool {
        self.overlays.close(key)
    }

    pub fn toggle(&mut self, key: &OverlayKey) -> bool {
        let now = self.clock.now();
        self.overlays.toggle(key, now)
    }

    /// External open request by logical overlay id
    pub fn open_overlay_by_id(&mut self, overlay_id: &str) -> Option<OverlayKey> {
        let now = self.clock.now();
        self.triggers.open(overlay_id, &mut self.overlays, now)
    }

    /// Route a tap on `module_id` inside `container`.
    ///
    /// A trigger module opens its overlay in the same container when it is
    /// registered there, otherwise wherever the overlay is bound.
    pub fn handle_tap(&mut self, container: &ContainerId, module_id: &str) -> TapOutcome {
        let Some(overlay_id) = self.triggers.resolve(module_id).map(str::to_string) else {
            return TapOutcome::RunOwnAction;
        };
        let now = self.clock.now();

        let local = OverlayKey::new(container.clone(), overlay_id.as_str());
        if self.overlays.open(&local, now) {
            return TapOutcome::OpenedOverlay(local);
        }

        match self.triggers.open(&overlay_id, &mut self.overlays, now) {
            Some(key) => TapOutcome::OpenedOverlay(key),
            None => {
                tracing::debug!(module = module_id, overlay = %overlay_id, "Trigger tapped but overlay is not hosted");
                TapOutcome::TriggerUnbound { overlay_id }
            }
        }
    }

    pub fn add_open_listener(&mut self, overlay_id: &str, container: ContainerId, notify: OpenListener) {
        self.overlays.add_open_listener(overlay_id, container, notify);
    }

    /// Drop every overlay, timer, surface and listener owned by `container`
    pub fn teardown_container(&mut self, container: &ContainerId) {
        for overlay_id in self.overlays.unregister_container(container) {
            self.triggers.unregister(&overlay_id);
        }
    }

    /// Fire due auto-close timers and deferred refreshes
    pub fn tick(&mut self) -> Vec<OverlayKey> {
        let now = self.clock.now();
        self.overlays.tick(now)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn triggers(&self) -> &TriggerRegistry {
        &self.triggers
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Drain diagnostics recorded since the last call
    pub fn take_diagnostics(&mut self) -> Vec<EngineError> {
        self.diagnostics.take_recorded()
    }

    /// Forget reported keys so missing data is logged again (after a reload)
    pub fn reset_diagnostics(&mut self) {
        self.diagnostics.reset();
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn templates_mut(&mut self) -> &mut TemplateStore {
        &mut self.templates
    }

    pub fn template_sender(&self) -> UnboundedSender<TemplateUpdate> {
        self.templates.sender()
    }

    pub fn take_subscription_requests(&mut self) -> Vec<SubscriptionRequest> {
        self.templates.take_subscription_requests()
    }
}
