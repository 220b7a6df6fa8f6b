//! Shared declarative types for vantage.
//!
//! Everything here is plain serde data: conditions, visibility rules,
//! overlay definitions and the layout tree. Runtime behavior lives in
//! `vantage-core`.

pub mod condition;
pub mod layout;
pub mod overlay;
pub mod rule;

pub use condition::{Condition, ConditionKind, Operator};
pub use layout::{ColumnConfig, LayoutConfig, LayoutFile, ModuleConfig, RowConfig};
pub use overlay::{OverlayConfig, TriggerKind};
pub use rule::{NodeVisibility, VisibilityMode, VisibilityRule};
