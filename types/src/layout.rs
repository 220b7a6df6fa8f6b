//! Layout tree types
//!
//! A layout is a tree of rows → columns → modules. Each node carries its own
//! visibility layers; a module may additionally declare an overlay.

use serde::{Deserialize, Serialize};

use crate::overlay::OverlayConfig;
use crate::rule::NodeVisibility;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub id: String,

    /// Presentational module type ("text", "image", "overlay", ...)
    #[serde(default)]
    pub kind: String,

    #[serde(default)]
    pub visibility: NodeVisibility,

    /// Overlay hosted by this module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlay: Option<OverlayConfig>,

    /// The module's own tap action, run when it is not an overlay trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tap_action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,

    #[serde(default)]
    pub visibility: NodeVisibility,

    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowConfig {
    pub id: String,

    #[serde(default)]
    pub visibility: NodeVisibility,

    #[serde(default, rename = "column")]
    pub columns: Vec<ColumnConfig>,
}

/// One complete layout
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, rename = "row")]
    pub rows: Vec<RowConfig>,
}

impl LayoutConfig {
    /// All modules in tree order
    pub fn modules(&self) -> impl Iterator<Item = &ModuleConfig> {
        self.rows
            .iter()
            .flat_map(|row| row.columns.iter())
            .flat_map(|column| column.modules.iter())
    }

    /// All overlays declared anywhere in the tree, with their host module
    pub fn overlays(&self) -> impl Iterator<Item = (&ModuleConfig, &OverlayConfig)> {
        self.modules()
            .filter_map(|module| module.overlay.as_ref().map(|overlay| (module, overlay)))
    }
}

/// Root structure for layout config files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutFile {
    #[serde(default, rename = "layout")]
    pub layouts: Vec<LayoutConfig>,
}
