//! Trigger modules
//!
//! Any module can act as the trigger for an overlay. The registry decouples
//! the tap-handling path from the overlay it opens.

mod registry;

pub use registry::TriggerRegistry;
