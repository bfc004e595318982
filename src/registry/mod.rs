//! Plugin registry: compile-time factory table plus on-disk metadata.
//!
//! Implementations are registered in code as factories; the plugins root is
//! scanned for `plugin.toml` manifests that carry metadata only (display
//! name, version, settings schema). A manifest with no matching factory is
//! skipped with a warning.

mod plugin;

pub use plugin::{Plugin, Settings};

use crate::error::{InkframeError, InkframeResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Constructor for a plugin implementation.
pub type PluginFactory = fn() -> Arc<dyn Plugin>;

/// Metadata describing one plugin, immutable at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub plugin_id: String,
    pub name: String,
    pub version: String,
    pub icon: Option<String>,
    /// Opaque settings schema handed to the UI; the core never interprets it.
    pub settings_schema: serde_json::Value,
}

/// On-disk manifest shape (`plugin.toml`).
#[derive(Debug, Deserialize)]
struct Manifest {
    /// Defaults to the directory name.
    id: Option<String>,
    name: String,
    #[serde(default = "default_version")]
    version: String,
    icon: Option<String>,
    settings_schema: Option<toml::Value>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

struct RegistryEntry {
    metadata: PluginMetadata,
    plugin: Arc<dyn Plugin>,
}

/// Registry of loaded plugins. Reload replaces the table atomically.
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register an implementation factory. Build configuration calls this
    /// for every compiled-in plugin before `load_all`.
    pub fn register_factory(&mut self, plugin_id: &str, factory: PluginFactory) {
        self.factories.insert(plugin_id.to_string(), factory);
    }

    /// Register a plugin directly with its metadata, bypassing manifest
    /// discovery. Used by embedded plugins and tests.
    pub fn register_plugin(&self, metadata: PluginMetadata, plugin: Arc<dyn Plugin>) {
        let plugin_id = metadata.plugin_id.clone();
        self.entries
            .write()
            .insert(plugin_id, RegistryEntry { metadata, plugin });
    }

    /// Scan the plugins root and build a fresh table from manifests paired
    /// with registered factories. Replaces the previous table atomically and
    /// returns the number of plugins loaded.
    pub fn load_all(&self, root: &Path) -> InkframeResult<usize> {
        let mut loaded: HashMap<String, RegistryEntry> = HashMap::new();

        if !root.exists() {
            info!("Plugins root {} does not exist; registry empty", root.display());
            *self.entries.write() = loaded;
            return Ok(0);
        }

        let dir = fs::read_dir(root).map_err(|e| {
            InkframeError::Configuration(format!("Unreadable plugins root {}: {}", root.display(), e))
        })?;

        for entry in dir.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let manifest_path = path.join("plugin.toml");
            if !manifest_path.exists() {
                continue;
            }

            let metadata = match read_manifest(&manifest_path) {
                Ok(mut metadata) => {
                    if metadata.plugin_id.is_empty() {
                        metadata.plugin_id = entry.file_name().to_string_lossy().into_owned();
                    }
                    metadata
                }
                Err(e) => {
                    warn!("Skipping manifest {}: {}", manifest_path.display(), e);
                    continue;
                }
            };

            match self.factories.get(&metadata.plugin_id) {
                Some(factory) => {
                    let plugin_id = metadata.plugin_id.clone();
                    loaded.insert(
                        plugin_id,
                        RegistryEntry {
                            metadata,
                            plugin: factory(),
                        },
                    );
                }
                None => {
                    warn!(
                        "No factory registered for plugin {}; skipping",
                        metadata.plugin_id
                    );
                }
            }
        }

        let count = loaded.len();
        *self.entries.write() = loaded;
        info!("Loaded {} plugins from {}", count, root.display());
        Ok(count)
    }

    pub fn get(&self, plugin_id: &str) -> Option<Arc<dyn Plugin>> {
        self.entries.read().get(plugin_id).map(|e| e.plugin.clone())
    }

    pub fn metadata(&self, plugin_id: &str) -> Option<PluginMetadata> {
        self.entries
            .read()
            .get(plugin_id)
            .map(|e| e.metadata.clone())
    }

    pub fn list_metadata(&self) -> Vec<PluginMetadata> {
        let mut all: Vec<_> = self
            .entries
            .read()
            .values()
            .map(|e| e.metadata.clone())
            .collect();
        all.sort_by(|a, b| a.plugin_id.cmp(&b.plugin_id));
        all
    }

    pub fn is_loaded(&self, plugin_id: &str) -> bool {
        self.entries.read().contains_key(plugin_id)
    }

    pub fn loaded_count(&self) -> usize {
        self.entries.read().len()
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn read_manifest(path: &Path) -> InkframeResult<PluginMetadata> {
    let raw = fs::read_to_string(path)
        .map_err(|e| InkframeError::Configuration(format!("read failed: {}", e)))?;
    let manifest: Manifest = toml::from_str(&raw)
        .map_err(|e| InkframeError::Configuration(format!("parse failed: {}", e)))?;

    let settings_schema = match manifest.settings_schema {
        Some(value) => serde_json::to_value(value)
            .map_err(|e| InkframeError::Configuration(format!("bad settings schema: {}", e)))?,
        None => serde_json::Value::Null,
    };

    Ok(PluginMetadata {
        plugin_id: manifest.id.unwrap_or_default(),
        name: manifest.name,
        version: manifest.version,
        icon: manifest.icon,
        settings_schema,
    })
}
