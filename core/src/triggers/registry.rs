use chrono::NaiveDateTime;
use hashbrown::HashMap;

use crate::overlay::{OverlayKey, OverlayManager};

/// Bidirectional `module_id <-> overlay_id` map.
///
/// Each overlay has at most one trigger module and each module triggers at
/// most one overlay; registering either side evicts the older pairing.
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    by_module: HashMap<String, String>,
    by_overlay: HashMap<String, String>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, overlay_id: &str, module_id: &str) {
        if self.module_for(overlay_id) == Some(module_id) {
            return;
        }
        self.unregister(overlay_id);

        if let Some(previous) = self.by_module.remove(module_id) {
            tracing::debug!(
                module = module_id,
                previous = %previous,
                overlay = overlay_id,
                "Trigger module reassigned"
            );
            self.by_overlay.remove(&previous);
        }

        self.by_module
            .insert(module_id.to_string(), overlay_id.to_string());
        self.by_overlay
            .insert(overlay_id.to_string(), module_id.to_string());
    }

    /// Safe to call when nothing is registered
    pub fn unregister(&mut self, overlay_id: &str) -> bool {
        match self.by_overlay.remove(overlay_id) {
            Some(module_id) => {
                self.by_module.remove(&module_id);
                true
            }
            None => false,
        }
    }

    /// Overlay opened by tapping `module_id`
    pub fn resolve(&self, module_id: &str) -> Option<&str> {
        self.by_module.get(module_id).map(String::as_str)
    }

    /// Trigger module registered for `overlay_id`
    pub fn module_for(&self, overlay_id: &str) -> Option<&str> {
        self.by_overlay.get(overlay_id).map(String::as_str)
    }

    /// Open `overlay_id` wherever it is currently hosted and notify its
    /// listener
    pub fn open(
        &self,
        overlay_id: &str,
        overlays: &mut OverlayManager,
        now: NaiveDateTime,
    ) -> Option<OverlayKey> {
        overlays.open_by_id(overlay_id, now)
    }

    pub fn len(&self) -> usize {
        self.by_overlay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_overlay.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::{ContainerId, HeadlessHost};
    use chrono::NaiveDate;
    use vantage_types::{OverlayConfig, TriggerKind};

    #[test]
    fn test_module_has_single_owner() {
        let mut registry = TriggerRegistry::new();
        registry.register("overlay-a", "module-x");
        registry.register("overlay-b", "module-x");

        assert_eq!(registry.resolve("module-x"), Some("overlay-b"));
        assert_eq!(registry.module_for("overlay-a"), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_overlay_has_single_trigger() {
        let mut registry = TriggerRegistry::new();
        registry.register("overlay-a", "module-x");
        registry.register("overlay-a", "module-y");

        assert_eq!(registry.resolve("module-x"), None);
        assert_eq!(registry.resolve("module-y"), Some("overlay-a"));
        assert_eq!(registry.module_for("overlay-a"), Some("module-y"));
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut registry = TriggerRegistry::new();
        assert!(!registry.unregister("nothing"));

        registry.register("overlay-a", "module-x");
        assert!(registry.unregister("overlay-a"));
        assert!(!registry.unregister("overlay-a"));
        assert!(registry.resolve("module-x").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_open_reaches_bound_container() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let mut overlays = OverlayManager::new(Box::new(HeadlessHost::new()));
        let card = ContainerId::new("card");
        overlays.register(&card, "host", OverlayConfig::new("popup", TriggerKind::Module));

        let mut registry = TriggerRegistry::new();
        registry.register("popup", "badge");
        let overlay = registry.resolve("badge").unwrap().to_string();
        let key = registry.open(&overlay, &mut overlays, now).unwrap();

        assert_eq!(key, OverlayKey::new(card, "popup"));
        let state = overlays.state(&key).unwrap();
        assert!(state.is_open());
        assert!(state.manually_opened());
    }
}
