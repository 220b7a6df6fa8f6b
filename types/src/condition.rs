//! Condition types
//!
//! A condition is one testable predicate against the entity store, the wall
//! clock, or a template expression. Conditions are authored in TOML and are
//! evaluated by the engine in `vantage-core`.

use serde::{Deserialize, Deserializer, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
// Operators
// ═══════════════════════════════════════════════════════════════════════════

/// Comparison operator for entity state and attribute conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Operator {
    /// Case-sensitive string equality
    #[default]
    #[serde(rename = "=", alias = "eq", alias = "==")]
    Eq,
    /// Case-sensitive string inequality
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    #[serde(rename = ">", alias = "gt")]
    Gt,
    #[serde(rename = ">=", alias = "gte")]
    Gte,
    #[serde(rename = "<", alias = "lt")]
    Lt,
    #[serde(rename = "<=", alias = "lte")]
    Lte,
    /// Case-insensitive substring test
    #[serde(rename = "contains")]
    Contains,
    /// Negated case-insensitive substring test
    #[serde(rename = "not_contains")]
    NotContains,
    /// Value is present and non-empty
    #[serde(rename = "has_value")]
    HasValue,
    /// Value is absent or empty
    #[serde(rename = "no_value")]
    NoValue,
}

impl Operator {
    /// Symbol used in config files and diagnostics
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::HasValue => "has_value",
            Self::NoValue => "no_value",
        }
    }

    /// Ordering operators need both sides to parse as numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Conditions
// ═══════════════════════════════════════════════════════════════════════════

/// What a condition tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ConditionKind {
    /// Compare an entity's current value
    EntityState {
        entity: String,
        #[serde(default)]
        operator: Operator,
        #[serde(default, deserialize_with = "loose_string")]
        value: String,
    },

    /// Compare one named attribute of an entity
    EntityAttribute {
        entity: String,
        attribute: String,
        #[serde(default)]
        operator: Operator,
        #[serde(default, deserialize_with = "loose_string")]
        value: String,
    },

    /// Wall-clock window in `HH:MM`; `from > to` crosses midnight
    TimeRange { from: String, to: String },

    /// Raw template expression resolved by the subscription service
    Template { expression: String },
}

impl ConditionKind {
    /// Entity referenced by this condition, if any
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::EntityState { entity, .. } | Self::EntityAttribute { entity, .. } => {
                Some(entity)
            }
            Self::TimeRange { .. } | Self::Template { .. } => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::EntityState { .. } => "entity_state",
            Self::EntityAttribute { .. } => "entity_attribute",
            Self::TimeRange { .. } => "time_range",
            Self::Template { .. } => "template",
        }
    }
}

/// One testable predicate (loaded from config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Unique identifier, used for diagnostics
    pub id: String,

    /// Disabled conditions always pass
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(flatten)]
    pub kind: ConditionKind,
}

impl Condition {
    pub fn new(id: impl Into<String>, kind: ConditionKind) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            kind,
        }
    }

    pub fn entity_state(
        id: impl Into<String>,
        entity: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            ConditionKind::EntityState {
                entity: entity.into(),
                operator,
                value: value.into(),
            },
        )
    }

    pub fn entity_attribute(
        id: impl Into<String>,
        entity: impl Into<String>,
        attribute: impl Into<String>,
        operator: Operator,
        value: impl Into<String>,
    ) -> Self {
        Self::new(
            id,
            ConditionKind::EntityAttribute {
                entity: entity.into(),
                attribute: attribute.into(),
                operator,
                value: value.into(),
            },
        )
    }

    pub fn time_range(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(
            id,
            ConditionKind::TimeRange {
                from: from.into(),
                to: to.into(),
            },
        )
    }

    pub fn template(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(
            id,
            ConditionKind::Template {
                expression: expression.into(),
            },
        )
    }

    /// Builder-style toggle, mostly for tests and editors
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Serde Helpers
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn default_true() -> bool {
    true
}

/// Comparison values are strings, but authors write `value = 20` or
/// `value = true` in TOML just as often.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Loose {
        Text(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Loose::deserialize(deserializer)? {
        Loose::Text(s) => s,
        Loose::Int(n) => n.to_string(),
        Loose::Float(n) => n.to_string(),
        Loose::Bool(b) => b.to_string(),
    })
}
