//! Configuration loading for layouts and engine settings
//!
//! Layouts are loaded from TOML files in two locations:
//! - **Builtin**: Shipped with the host application (read-only)
//! - **Custom**: User-created layouts (editable, override builtin by id)
//!
//! Engine settings are small and persisted with `confy`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vantage_types::{LayoutConfig, LayoutFile};

use crate::error::ConfigError;

pub const APP_NAME: &str = "vantage";

// ═══════════════════════════════════════════════════════════════════════════
// Engine settings
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Evaluate simple template expressions locally until a result arrives
    pub template_fallback: bool,

    /// Delay before the follow-up content refresh after an overlay opens
    pub refresh_delay_ms: u64,

    /// Consecutive mount failures before logging an error
    pub mount_retry_warn_after: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            template_fallback: true,
            refresh_delay_ms: 250,
            mount_retry_warn_after: 5,
        }
    }
}

impl EngineSettings {
    /// Load from the platform config dir, falling back to defaults
    pub fn load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, Some("engine"))?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Ok(confy::load_path(path)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        Ok(confy::store(APP_NAME, Some("engine"), self)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        Ok(confy::store_path(path, self)?)
    }

    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Layouts
// ═══════════════════════════════════════════════════════════════════════════

/// Layouts merged from one or more files, keyed by id
#[derive(Debug, Clone, Default)]
pub struct LayoutSet {
    pub layouts: HashMap<String, LayoutConfig>,
}

impl LayoutSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add layouts from a file, returns ids of any duplicates (later wins)
    pub fn add_file(&mut self, file: LayoutFile) -> Vec<String> {
        let mut duplicates = Vec::new();
        for layout in file.layouts {
            if self.layouts.contains_key(&layout.id) {
                duplicates.push(layout.id.clone());
            }
            self.layouts.insert(layout.id.clone(), layout);
        }
        duplicates
    }

    pub fn get(&self, id: &str) -> Option<&LayoutConfig> {
        self.layouts.get(id)
    }

    /// Look up a layout, or fail with [`ConfigError::UnknownLayout`]
    pub fn require(&self, id: &str) -> Result<&LayoutConfig, ConfigError> {
        self.get(id)
            .ok_or_else(|| ConfigError::UnknownLayout(id.to_string()))
    }

    /// Layout ids in sorted order
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }
}

/// Load layouts from builtin and custom directories.
///
/// Builtin layouts are loaded first; custom layouts with the same id
/// override them. Missing directories are skipped.
pub fn load_layouts(builtin_dir: Option<&Path>, custom_dir: Option<&Path>) -> Result<LayoutSet, ConfigError> {
    let mut set = LayoutSet::new();

    if let Some(dir) = builtin_dir
        && dir.exists()
    {
        load_directory(&mut set, dir, "builtin")?;
    }

    if let Some(dir) = custom_dir
        && dir.exists()
    {
        load_directory(&mut set, dir, "custom")?;
    }

    Ok(set)
}

/// Load every `.toml` file in `dir`, skipping files that fail to parse
fn load_directory(set: &mut LayoutSet, dir: &Path, source: &str) -> Result<(), ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    // Deterministic override order within a directory
    paths.sort();

    for path in paths {
        match load_layout(&path) {
            Ok(file) => {
                let duplicates = set.add_file(file);
                if !duplicates.is_empty() {
                    tracing::warn!(
                        source,
                        file = ?path.file_name(),
                        ?duplicates,
                        "Duplicate layout ids"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "Skipping layout file");
            }
        }
    }

    Ok(())
}

/// Load a single TOML layout file
pub fn load_layout(path: &Path) -> Result<LayoutFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save layouts to a TOML file
pub fn save_layout(path: &Path, file: &LayoutFile) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(file).map_err(|e| ConfigError::Serialize {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, contents).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Get the default custom layouts directory
pub fn default_custom_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME).join("layouts"))
}
