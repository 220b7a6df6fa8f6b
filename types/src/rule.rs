//! Visibility rule types

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// How the conditions of a rule are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Visible regardless of conditions
    #[default]
    Always,
    /// All conditions must pass
    Every,
    /// At least one condition must pass
    Any,
}

/// An ordered list of conditions plus a combination mode
///
/// Order does not change the result, but diagnostics are reported in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisibilityRule {
    #[serde(default)]
    pub mode: VisibilityMode,

    #[serde(default, rename = "condition", skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl VisibilityRule {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn every(conditions: Vec<Condition>) -> Self {
        Self {
            mode: VisibilityMode::Every,
            conditions,
        }
    }

    pub fn any(conditions: Vec<Condition>) -> Self {
        Self {
            mode: VisibilityMode::Any,
            conditions,
        }
    }

    /// True when the rule resolves without evaluating anything
    pub fn is_unconditional(&self) -> bool {
        self.mode == VisibilityMode::Always || self.conditions.is_empty()
    }
}

/// Both visibility layers of one node.
///
/// The primary rule and the single-condition "global property" rule are
/// authored in different places, so they stay separate and are ANDed at
/// evaluation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeVisibility {
    #[serde(default)]
    pub rule: VisibilityRule,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<Condition>,
}

impl NodeVisibility {
    pub fn new(rule: VisibilityRule) -> Self {
        Self { rule, global: None }
    }

    pub fn with_global(mut self, condition: Condition) -> Self {
        self.global = Some(condition);
        self
    }
}
