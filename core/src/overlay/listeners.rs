//! Open-request listeners
//!
//! Keyed by the logical overlay id, not the container instance id. The host
//! recreates containers with fresh ids on every teardown; keying by the
//! logical id and always replacing on registration keeps exactly one
//! listener per overlay.

use hashbrown::HashMap;

use super::{ContainerId, OverlayKey};

/// Called after an external open request changed overlay state
pub type OpenListener = Box<dyn Fn(&OverlayKey)>;

struct ListenerEntry {
    container: ContainerId,
    notify: Option<OpenListener>,
}

#[derive(Default)]
pub struct OverlayListeners {
    entries: HashMap<String, ListenerEntry>,
}

impl std::fmt::Debug for OverlayListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.entries
                    .iter()
                    .map(|(id, entry)| (id, (&entry.container, entry.notify.is_some()))),
            )
            .finish()
    }
}

impl OverlayListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove any prior listener for `overlay_id`, then add this one.
    /// Returns `true` if a prior listener was replaced.
    pub fn register(&mut self, overlay_id: &str, container: ContainerId, notify: Option<OpenListener>) -> bool {
        let replaced = self.entries.remove(overlay_id).is_some();
        self.entries
            .insert(overlay_id.to_string(), ListenerEntry { container, notify });
        replaced
    }

    /// Point `overlay_id` at `container`, keeping the callback if the
    /// container is unchanged.
    pub fn bind(&mut self, overlay_id: &str, container: &ContainerId) {
        let unchanged = self
            .entries
            .get(overlay_id)
            .is_some_and(|entry| entry.container == *container);
        if !unchanged {
            self.register(overlay_id, container.clone(), None);
        }
    }

    pub fn unregister(&mut self, overlay_id: &str) -> bool {
        self.entries.remove(overlay_id).is_some()
    }

    /// Drop every listener bound to `container`; returns their overlay ids
    pub fn unregister_container(&mut self, container: &ContainerId) -> Vec<String> {
        let ids: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.container == *container)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &ids {
            self.entries.remove(id);
        }
        ids
    }

    pub fn container_for(&self, overlay_id: &str) -> Option<&ContainerId> {
        self.entries.get(overlay_id).map(|entry| &entry.container)
    }

    pub fn notify(&self, overlay_id: &str, key: &OverlayKey) {
        if let Some(notify) = self.entries.get(overlay_id).and_then(|e| e.notify.as_ref()) {
            notify(key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
