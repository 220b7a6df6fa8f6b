//! Single-condition evaluation
//!
//! Missing data fails open (visible) and is reported once. Ordering
//! operators on non-numeric values fail closed (false).

use chrono::NaiveDateTime;
use vantage_types::{Condition, ConditionKind, Operator};

use super::template::{TemplateStore, parse_fallback};
use super::time::{in_window, parse_minutes};
use crate::clock::minutes_of_day;
use crate::diagnostics::Diagnostics;
use crate::entities::StateProvider;
use crate::error::EngineError;

/// Evaluates conditions against one snapshot of external state.
///
/// Built per evaluation pass; borrows the template store and diagnostics
/// sink from the engine for the duration of the pass.
pub struct RuleEvaluator<'a> {
    provider: &'a dyn StateProvider,
    now: NaiveDateTime,
    templates: &'a mut TemplateStore,
    diagnostics: &'a mut Diagnostics,
    template_fallback: bool,
}

impl<'a> RuleEvaluator<'a> {
    pub fn new(
        provider: &'a dyn StateProvider,
        now: NaiveDateTime,
        templates: &'a mut TemplateStore,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            provider,
            now,
            templates,
            diagnostics,
            template_fallback: true,
        }
    }

    /// Disable the synchronous template fallback (unresolved templates are visible)
    pub fn with_template_fallback(mut self, enabled: bool) -> Self {
        self.template_fallback = enabled;
        self
    }

    pub fn now(&self) -> NaiveDateTime {
        self.now
    }

    /// Evaluate one condition. Disabled conditions always pass.
    pub fn evaluate(&mut self, condition: &Condition) -> bool {
        if !condition.enabled {
            return true;
        }

        match &condition.kind {
            ConditionKind::EntityState {
                entity,
                operator,
                value,
            } => {
                let Some(state) = self.provider.entity(entity) else {
                    self.diagnostics.report(EngineError::MissingEntity {
                        condition: condition.id.clone(),
                        entity: entity.clone(),
                    });
                    return true;
                };
                let actual = state.value.clone();
                self.compare(&condition.id, *operator, &actual, value)
            }

            ConditionKind::EntityAttribute {
                entity,
                attribute,
                operator,
                value,
            } => {
                let Some(state) = self.provider.entity(entity) else {
                    self.diagnostics.report(EngineError::MissingEntity {
                        condition: condition.id.clone(),
                        entity: entity.clone(),
                    });
                    return true;
                };
                let Some(actual) = state.attribute(attribute) else {
                    // Presence checks test exactly this, so absence is an answer
                    match operator {
                        Operator::HasValue => return false,
                        Operator::NoValue => return true,
                        _ => {}
                    }
                    self.diagnostics.report(EngineError::MissingAttribute {
                        condition: condition.id.clone(),
                        entity: entity.clone(),
                        attribute: attribute.clone(),
                    });
                    return true;
                };
                self.compare(&condition.id, *operator, &actual, value)
            }

            ConditionKind::TimeRange { from, to } => {
                let (Some(from_min), Some(to_min)) = (
                    self.parse_time(&condition.id, from),
                    self.parse_time(&condition.id, to),
                ) else {
                    return true;
                };
                in_window(minutes_of_day(&self.now), from_min, to_min)
            }

            ConditionKind::Template { expression } => self.evaluate_template(expression),
        }
    }

    fn parse_time(&mut self, condition: &str, value: &str) -> Option<u32> {
        let minutes = parse_minutes(value);
        if minutes.is_none() {
            self.diagnostics.report(EngineError::InvalidTime {
                condition: condition.to_string(),
                value: value.to_string(),
            });
        }
        minutes
    }

    fn evaluate_template(&mut self, expression: &str) -> bool {
        if let Some(pushed) = self.templates.lookup_or_subscribe(expression) {
            return pushed;
        }
        if !self.template_fallback {
            return true;
        }

        let Some(check) = parse_fallback(expression) else {
            self.diagnostics.report(EngineError::UnrecognizedTemplate {
                expression: expression.to_string(),
            });
            return true;
        };

        match self.provider.entity(&check.entity) {
            Some(state) => check.matches(&state.value),
            None => {
                self.diagnostics.report(EngineError::MissingEntity {
                    condition: expression.to_string(),
                    entity: check.entity.clone(),
                });
                true
            }
        }
    }

    fn compare(&mut self, condition: &str, operator: Operator, actual: &str, expected: &str) -> bool {
        match operator {
            Operator::Eq => actual == expected,
            Operator::Ne => actual != expected,
            Operator::Contains => contains_ci(actual, expected),
            Operator::NotContains => !contains_ci(actual, expected),
            Operator::HasValue => !actual.is_empty(),
            Operator::NoValue => actual.is_empty(),
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let (Ok(left), Ok(right)) = (actual.trim().parse::<f64>(), expected.trim().parse::<f64>())
                else {
                    self.diagnostics.report(EngineError::UnparseableNumericComparison {
                        condition: condition.to_string(),
                        operator: operator.symbol(),
                        left: actual.to_string(),
                        right: expected.to_string(),
                    });
                    return false;
                };
                match operator {
                    Operator::Gt => left > right,
                    Operator::Gte => left >= right,
                    Operator::Lt => left < right,
                    _ => left <= right,
                }
            }
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
