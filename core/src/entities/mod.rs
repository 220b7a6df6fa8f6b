//! External state boundary
//!
//! The engine only ever reads entities. Hosts implement [`StateProvider`]
//! over whatever store they already have; [`StateStore`] is the in-memory
//! implementation used by the CLI and tests.

mod store;

pub use store::StateStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A named unit of external state: a current value plus attributes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "state", default)]
    pub value: String,

    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute rendered as a comparison string.
    ///
    /// Returns `None` when the attribute is missing. A JSON `null` is present
    /// but has no value, which is rendered as the empty string.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).map(value_to_string)
    }
}

/// Render a JSON value the way authors write comparison values
pub(crate) fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Read-only access to external entities
pub trait StateProvider {
    fn entity(&self, id: &str) -> Option<&Entity>;
}

impl StateProvider for std::collections::HashMap<String, Entity> {
    fn entity(&self, id: &str) -> Option<&Entity> {
        self.get(id)
    }
}

impl StateProvider for hashbrown::HashMap<String, Entity> {
    fn entity(&self, id: &str) -> Option<&Entity> {
        self.get(id)
    }
}
