//! Error taxonomy
//!
//! None of these are fatal. Evaluation fails open to visible and overlays
//! fail closed to idle; the errors are recorded in [`Diagnostics`] instead of
//! being returned to the renderer.
//!
//! [`Diagnostics`]: crate::diagnostics::Diagnostics

use std::path::PathBuf;

use crate::overlay::OverlayKey;

/// Non-fatal problems found while evaluating rules or mounting overlays
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("entity '{entity}' not found (condition '{condition}')")]
    MissingEntity { condition: String, entity: String },

    #[error("attribute '{attribute}' not found on '{entity}' (condition '{condition}')")]
    MissingAttribute {
        condition: String,
        entity: String,
        attribute: String,
    },

    #[error("cannot compare '{left}' {operator} '{right}' numerically (condition '{condition}')")]
    UnparseableNumericComparison {
        condition: String,
        operator: &'static str,
        left: String,
        right: String,
    },

    #[error("template not recognized, defaulting to visible: {expression}")]
    UnrecognizedTemplate { expression: String },

    #[error("invalid time '{value}' in condition '{condition}'")]
    InvalidTime { condition: String, value: String },

    #[error("failed to mount surface for {key}: {reason}")]
    MountFailure { key: OverlayKey, reason: String },
}

/// Errors that can occur while loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("serialize error for {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },

    #[error("invalid state snapshot {path:?}: {source}")]
    StateSnapshot {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("settings error: {0}")]
    Settings(#[from] confy::ConfyError),

    #[error("layout '{0}' not found")]
    UnknownLayout(String),
}
