//! In-memory entity store

use std::fs;
use std::path::Path;

use hashbrown::HashMap;
use serde::Deserialize;
use serde_json::Value;

use super::{Entity, StateProvider};
use crate::error::ConfigError;

/// Snapshot entries may be a bare state string or a full entity object
#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotEntry {
    Bare(String),
    Full(Entity),
}

/// Pure storage for entity state.
/// Mutated by the host as updates arrive; read by the engine.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    entities: HashMap<String, Entity>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entity's value, creating it if needed. Attributes are kept.
    pub fn set_state(&mut self, id: impl Into<String>, value: impl Into<String>) {
        self.entities.entry(id.into()).or_default().value = value.into();
    }

    pub fn set_attribute(&mut self, id: impl Into<String>, name: impl Into<String>, value: impl Into<Value>) {
        self.entities
            .entry(id.into())
            .or_default()
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn insert(&mut self, id: impl Into<String>, entity: Entity) {
        self.entities.insert(id.into(), entity);
    }

    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Parse a JSON snapshot: `{"light.kitchen": {"state": "on", "attributes": {...}}}`
    /// or the shorthand `{"light.kitchen": "on"}`.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: std::collections::HashMap<String, SnapshotEntry> = serde_json::from_str(json)?;
        let entities = raw
            .into_iter()
            .map(|(id, entry)| {
                let entity = match entry {
                    SnapshotEntry::Bare(value) => Entity::new(value),
                    SnapshotEntry::Full(entity) => entity,
                };
                (id, entity)
            })
            .collect();
        Ok(Self { entities })
    }

    /// Load a JSON snapshot from disk
    pub fn load_snapshot(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_json_str(&contents).map_err(|e| ConfigError::StateSnapshot {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl StateProvider for StateStore {
    fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }
}
