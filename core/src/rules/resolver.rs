//! Combining conditions into one visibility decision
//!
//! Used identically for rows, columns, modules and overlay `open_rule`s.

use vantage_types::{Condition, NodeVisibility, VisibilityMode, VisibilityRule};

use super::evaluator::RuleEvaluator;

/// Resolve a list of conditions under a combination mode.
///
/// `always` and the empty list are visible without evaluating anything.
/// Every condition is evaluated even after the outcome is known, so
/// diagnostics are reported in declaration order on every pass.
pub fn resolve(evaluator: &mut RuleEvaluator<'_>, conditions: &[Condition], mode: VisibilityMode) -> bool {
    if mode == VisibilityMode::Always || conditions.is_empty() {
        return true;
    }

    let results: Vec<bool> = conditions.iter().map(|c| evaluator.evaluate(c)).collect();
    match mode {
        VisibilityMode::Every => results.iter().all(|r| *r),
        VisibilityMode::Any => results.iter().any(|r| *r),
        VisibilityMode::Always => true,
    }
}

pub fn resolve_rule(evaluator: &mut RuleEvaluator<'_>, rule: &VisibilityRule) -> bool {
    resolve(evaluator, &rule.conditions, rule.mode)
}

/// Both layers must pass: the primary rule AND the global-property condition
pub fn resolve_node(evaluator: &mut RuleEvaluator<'_>, visibility: &NodeVisibility) -> bool {
    let primary = resolve_rule(evaluator, &visibility.rule);
    let global = visibility
        .global
        .as_ref()
        .is_none_or(|condition| evaluator.evaluate(condition));
    primary && global
}
