//! Once-per-key diagnostic sink
//!
//! A long-lived UI evaluates the same rules many times per minute. Missing
//! data is reported the first time it is seen and then stays quiet until
//! [`Diagnostics::reset`] is called (e.g. after a config reload).

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DiagnosticKey {
    Entity(String),
    Attribute(String, String),
    Numeric(String),
    Template(String),
    Time(String, String),
}

impl DiagnosticKey {
    /// Mount failures are retried every pass and are never deduplicated
    fn of(error: &EngineError) -> Option<Self> {
        match error {
            EngineError::MissingEntity { entity, .. } => Some(Self::Entity(entity.clone())),
            EngineError::MissingAttribute {
                entity, attribute, ..
            } => Some(Self::Attribute(entity.clone(), attribute.clone())),
            EngineError::UnparseableNumericComparison { condition, .. } => {
                Some(Self::Numeric(condition.clone()))
            }
            EngineError::UnrecognizedTemplate { expression } => {
                Some(Self::Template(expression.clone()))
            }
            EngineError::InvalidTime { condition, value } => {
                Some(Self::Time(condition.clone(), value.clone()))
            }
            EngineError::MountFailure { .. } => None,
        }
    }
}

/// Undrained errors kept at most; the oldest are dropped first
pub const MAX_RECORDED: usize = 256;

#[derive(Debug, Default)]
pub struct Diagnostics {
    reported: HashSet<DiagnosticKey>,
    /// Newly reported errors, drained by the host for editor display
    recorded: VecDeque<EngineError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Returns `true` if it was new (and therefore logged).
    pub fn report(&mut self, error: EngineError) -> bool {
        match DiagnosticKey::of(&error) {
            Some(key) => {
                if !self.reported.insert(key) {
                    return false;
                }
                match &error {
                    EngineError::MissingEntity { .. } | EngineError::MissingAttribute { .. } => {
                        tracing::warn!(%error, "Missing data, condition treated as visible");
                    }
                    _ => tracing::debug!(%error, "Condition diagnostic"),
                }
            }
            None => tracing::warn!(%error, "Overlay mount failed, retrying next pass"),
        }
        if self.recorded.len() == MAX_RECORDED {
            self.recorded.pop_front();
        }
        self.recorded.push_back(error);
        true
    }

    /// Drain errors recorded since the last call
    pub fn take_recorded(&mut self) -> Vec<EngineError> {
        self.recorded.drain(..).collect()
    }

    /// Number of distinct keys reported so far
    pub fn reported_count(&self) -> usize {
        self.reported.len()
    }

    /// Forget what has been reported so missing data is logged again
    pub fn reset(&mut self) {
        self.reported.clear();
        self.recorded.clear();
    }
}
