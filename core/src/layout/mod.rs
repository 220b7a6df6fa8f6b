//! Reference layout walker
//!
//! Visits rows → columns → modules the way a renderer would: both
//! visibility layers per node, a hidden parent hides its whole subtree
//! without evaluating it, and overlay modules are registered on every pass
//! but only run their trigger logic while their host module is visible.

use serde::Serialize;
use vantage_types::{LayoutConfig, ModuleConfig, OverlayConfig, TriggerKind};

use crate::engine::Engine;
use crate::entities::StateProvider;
use crate::overlay::{ContainerId, OverlayKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Row,
    Column,
    Module,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub kind: NodeKind,
    pub id: String,
    pub visible: bool,
    /// False when an ancestor was hidden and this node was skipped
    pub evaluated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverlayReport {
    pub key: OverlayKey,
    pub host_module: String,
    pub trigger: TriggerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_module: Option<String>,
    pub open: bool,
    /// Content was rendered during this pass
    pub rendered: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutReport {
    pub layout: String,
    pub nodes: Vec<NodeReport>,
    pub overlays: Vec<OverlayReport>,
}

impl LayoutReport {
    pub fn visible(&self, id: &str) -> Option<bool> {
        self.nodes.iter().find(|n| n.id == id).map(|n| n.visible)
    }

    pub fn overlay(&self, overlay_id: &str) -> Option<&OverlayReport> {
        self.overlays.iter().find(|o| o.key.overlay == overlay_id)
    }

    pub fn visible_modules(&self) -> impl Iterator<Item = &str> {
        self.nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Module && n.visible)
            .map(|n| n.id.as_str())
    }

    fn push(&mut self, kind: NodeKind, id: &str, visible: bool, evaluated: bool) {
        self.nodes.push(NodeReport {
            kind,
            id: id.to_string(),
            visible,
            evaluated,
        });
    }
}

/// Run one full render pass of `layout` inside `container`
pub fn walk_layout(
    engine: &mut Engine,
    container: &ContainerId,
    layout: &LayoutConfig,
    provider: &dyn StateProvider,
) -> LayoutReport {
    engine.begin_pass();
    let mut report = LayoutReport {
        layout: layout.id.clone(),
        ..Default::default()
    };

    for row in &layout.rows {
        let row_visible = engine.resolve_visibility(provider, &row.visibility);
        report.push(NodeKind::Row, &row.id, row_visible, true);

        for column in &row.columns {
            let column_visible = row_visible && engine.resolve_visibility(provider, &column.visibility);
            report.push(NodeKind::Column, &column.id, column_visible, row_visible);

            for module in &column.modules {
                let module_visible =
                    column_visible && engine.resolve_visibility(provider, &module.visibility);
                report.push(NodeKind::Module, &module.id, module_visible, column_visible);

                if let Some(overlay) = &module.overlay {
                    let visited = visit_overlay(engine, container, module, overlay, provider, module_visible);
                    report.overlays.push(visited);
                }
            }
        }
    }

    tracing::debug!(
        layout = %layout.id,
        %container,
        nodes = report.nodes.len(),
        overlays = report.overlays.len(),
        "Layout pass complete"
    );
    report
}

fn visit_overlay(
    engine: &mut Engine,
    container: &ContainerId,
    module: &ModuleConfig,
    overlay: &OverlayConfig,
    provider: &dyn StateProvider,
    host_visible: bool,
) -> OverlayReport {
    engine.register_overlay(container, &module.id, overlay);
    let key = OverlayKey::new(container.clone(), overlay.id.as_str());

    let mut rendered = false;
    if host_visible {
        engine.evaluate_overlay(provider, &key);
        if engine.should_render(&key) {
            rendered = engine.mount(&key, |_| {});
        }
    }

    OverlayReport {
        open: engine.is_open(&key),
        key,
        host_module: module.id.clone(),
        trigger: overlay.effective_trigger(),
        trigger_module: overlay.trigger_module.clone(),
        rendered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineSettings;
    use crate::entities::StateStore;
    use crate::overlay::HeadlessHost;
    use vantage_types::LayoutFile;

    const LAYOUT: &str = r#"
[[layout]]
id = "hallway"

[[layout.row]]
id = "security"

[layout.row.visibility.rule]
mode = "every"

[[layout.row.visibility.rule.condition]]
id = "armed"
type = "entity_state"
entity = "alarm_control_panel.home"
operator = "="
value = "armed_away"

[[layout.row.column]]
id = "cameras"

[[layout.row.column.module]]
id = "porch_camera"
kind = "image"

[layout.row.column.module.visibility.rule]
mode = "every"

[[layout.row.column.module.visibility.rule.condition]]
id = "unknown"
type = "entity_state"
entity = "camera.never_configured"
operator = "has_value"

[[layout.row]]
id = "status"

[[layout.row.column]]
id = "main"

[[layout.row.column.module]]
id = "door_badge"
kind = "icon"

[[layout.row.column.module]]
id = "door_host"
kind = "overlay"

[layout.row.column.module.overlay]
id = "door_popup"
trigger = "logic"

[layout.row.column.module.overlay.open_rule]
mode = "every"

[[layout.row.column.module.overlay.open_rule.condition]]
id = "door_open"
type = "entity_state"
entity = "binary_sensor.front_door"
operator = "="
value = "on"

[[layout.row.column.module]]
id = "details_host"
kind = "overlay"

[layout.row.column.module.overlay]
id = "details"
trigger = "module"
trigger_module = "door_badge"
"#;

    fn layout() -> LayoutConfig {
        let mut file: LayoutFile = toml::from_str(LAYOUT).unwrap();
        file.layouts.remove(0)
    }

    fn engine() -> Engine {
        let settings = EngineSettings {
            refresh_delay_ms: 0,
            ..Default::default()
        };
        Engine::new(Box::new(HeadlessHost::new()), Box::new(ManualClock::at(18, 0)), settings)
    }

    fn store(alarm: &str, door: &str) -> StateStore {
        let mut store = StateStore::new();
        store.set_state("alarm_control_panel.home", alarm);
        store.set_state("binary_sensor.front_door", door);
        store
    }

    #[test]
    fn test_hidden_row_skips_subtree() {
        let mut engine = engine();
        let report = walk_layout(&mut engine, &ContainerId::new("card"), &layout(), &store("disarmed", "off"));

        assert_eq!(report.visible("security"), Some(false));
        assert_eq!(report.visible("porch_camera"), Some(false));
        let camera = report.nodes.iter().find(|n| n.id == "porch_camera").unwrap();
        assert!(!camera.evaluated);
        // The missing camera entity was never looked up
        assert!(engine.take_diagnostics().is_empty());
    }

    #[test]
    fn test_logic_overlay_opens_and_renders_once() {
        let mut engine = engine();
        let card = ContainerId::new("card");
        let layout = layout();

        let closed = walk_layout(&mut engine, &card, &layout, &store("disarmed", "off"));
        assert!(!closed.overlay("door_popup").unwrap().open);

        let opened = walk_layout(&mut engine, &card, &layout, &store("disarmed", "on"));
        let popup = opened.overlay("door_popup").unwrap();
        assert!(popup.open);
        assert!(popup.rendered);

        let again = walk_layout(&mut engine, &card, &layout, &store("disarmed", "on"));
        let popup = again.overlay("door_popup").unwrap();
        assert!(popup.open);
        assert!(!popup.rendered);
    }

    #[test]
    fn test_trigger_modules_are_registered() {
        let mut engine = engine();
        let card = ContainerId::new("card");
        let report = walk_layout(&mut engine, &card, &layout(), &store("disarmed", "off"));

        let details = report.overlay("details").unwrap();
        assert_eq!(details.trigger, TriggerKind::Module);
        assert_eq!(engine.triggers().resolve("door_badge"), Some("details"));
        assert_eq!(
            report.visible_modules().collect::<Vec<_>>(),
            vec!["door_badge", "door_host", "details_host"]
        );
    }
}
