pub mod clock;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod entities;
pub mod error;
pub mod layout;
pub mod overlay;
pub mod rules;
pub mod triggers;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineSettings, LayoutSet, load_layout, load_layouts, save_layout};
pub use diagnostics::Diagnostics;
pub use engine::{Engine, TapOutcome};
pub use entities::{Entity, StateProvider, StateStore};
pub use error::{ConfigError, EngineError};
pub use layout::{LayoutReport, walk_layout};
pub use overlay::{ContainerId, HeadlessHost, OverlayKey, OverlayManager, SurfaceHost};
pub use rules::{RuleEvaluator, TemplateHash, TemplateStore, TemplateUpdate};
pub use triggers::TriggerRegistry;
