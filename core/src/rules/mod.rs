//! Conditional visibility
//!
//! ```text
//!   Renderer ──► resolve_node ──► resolve_rule ──► RuleEvaluator::evaluate
//!                                                     │
//!                          StateProvider / Clock / TemplateStore (read-only)
//! ```

mod evaluator;
mod resolver;
pub mod template;
pub mod time;

pub use evaluator::RuleEvaluator;
pub use resolver::{resolve, resolve_node, resolve_rule};
pub use template::{SubscriptionRequest, TemplateHash, TemplateStore, TemplateUpdate};
