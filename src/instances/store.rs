//! CRUD, persistence, and lifecycle callbacks for plugin instances.

use crate::clock::Clock;
use crate::display::DeviceConfig;
use crate::error::{InkframeError, InkframeResult};
use crate::registry::{PluginRegistry, Settings};
use crate::storage::{load_json, save_json};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::PluginInstance;

const INSTANCES_FILE: &str = "plugin_instances.json";

/// On-disk shape of `plugin_instances.json`.
#[derive(Debug, Serialize, Deserialize)]
struct InstanceFile {
    #[serde(default)]
    instances: Vec<PluginInstance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Exclusive owner of `PluginInstance` records.
///
/// Each successful mutation is followed by a save; a save failure aborts the
/// mutation and restores the prior map. Lifecycle callbacks run after the
/// mutation commits, outside the store lock, and their failures are logged
/// rather than propagated.
pub struct InstanceStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    registry: Arc<PluginRegistry>,
    instances: RwLock<HashMap<String, PluginInstance>>,
}

impl InstanceStore {
    /// Open the store, loading any existing `plugin_instances.json`.
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>, registry: Arc<PluginRegistry>) -> Self {
        let path = data_dir.join(INSTANCES_FILE);
        let mut instances = HashMap::new();

        if let Some(file) = load_json::<InstanceFile>(&path) {
            for instance in file.instances {
                instances.insert(instance.id.to_string(), instance);
            }
            info!("Loaded {} plugin instances", instances.len());
        }

        Self {
            path,
            clock,
            registry,
            instances: RwLock::new(instances),
        }
    }

    /// Create an instance. Rejected when the plugin is unknown or the
    /// settings fail the plugin's validation. `on_enable` runs best-effort
    /// after the record is persisted.
    pub async fn create(
        &self,
        plugin_id: &str,
        name: &str,
        settings: Settings,
    ) -> InkframeResult<PluginInstance> {
        let plugin = self
            .registry
            .get(plugin_id)
            .ok_or_else(|| InkframeError::PluginNotFound(plugin_id.to_string()))?;

        plugin
            .validate_settings(&settings)
            .map_err(InkframeError::Validation)?;

        let now = self.clock.now().fixed_offset();
        let instance = PluginInstance {
            id: Uuid::new_v4(),
            plugin_id: plugin_id.to_string(),
            name: name.to_string(),
            settings,
            enabled: true,
            created_at: now,
            updated_at: now,
        };

        {
            let mut instances = self.instances.write();
            let key = instance.id.to_string();
            instances.insert(key.clone(), instance.clone());
            if let Err(e) = self.persist(&instances) {
                instances.remove(&key);
                return Err(e);
            }
        }

        if let Err(e) = plugin.on_enable(&instance.settings.clone()).await {
            warn!("Plugin on_enable failed: {}", e);
        }

        info!(
            "Created instance {} ({}) for plugin {}",
            instance.name, instance.id, plugin_id
        );
        Ok(instance)
    }

    /// Update name and/or settings. A settings change triggers a best-effort
    /// `on_settings_change(old, new)` after the save.
    pub async fn update(
        &self,
        instance_id: &str,
        name: Option<String>,
        settings: Option<Settings>,
    ) -> InkframeResult<PluginInstance> {
        let mut settings_change: Option<(Settings, Settings)> = None;

        let updated = {
            let mut instances = self.instances.write();
            let current = instances
                .get(instance_id)
                .cloned()
                .ok_or_else(|| InkframeError::InstanceNotFound(instance_id.to_string()))?;

            let mut next = current.clone();
            if let Some(new_settings) = settings {
                let plugin = self
                    .registry
                    .get(&next.plugin_id)
                    .ok_or_else(|| InkframeError::PluginNotFound(next.plugin_id.clone()))?;
                plugin
                    .validate_settings(&new_settings)
                    .map_err(InkframeError::Validation)?;

                settings_change = Some((next.settings.clone(), new_settings.clone()));
                next.settings = new_settings;
            }
            if let Some(new_name) = name {
                next.name = new_name;
            }
            next.updated_at = self.clock.now().fixed_offset();

            instances.insert(instance_id.to_string(), next.clone());
            if let Err(e) = self.persist(&instances) {
                instances.insert(instance_id.to_string(), current);
                return Err(e);
            }
            next
        };

        if let Some((old, new)) = settings_change {
            if let Some(plugin) = self.registry.get(&updated.plugin_id) {
                if let Err(e) = plugin.on_settings_change(&old, &new).await {
                    warn!("Plugin on_settings_change failed: {}", e);
                }
            }
        }

        info!("Updated instance {} ({})", updated.name, instance_id);
        Ok(updated)
    }

    /// Enable an instance. Idempotent; `on_enable` runs only on the
    /// disabled -> enabled transition.
    pub async fn enable(&self, instance_id: &str) -> InkframeResult<()> {
        self.set_enabled(instance_id, true).await
    }

    /// Disable an instance. Idempotent; `on_disable` runs only on the
    /// enabled -> disabled transition.
    pub async fn disable(&self, instance_id: &str) -> InkframeResult<()> {
        self.set_enabled(instance_id, false).await
    }

    /// Delete an instance: best-effort `on_disable` (for instances still
    /// enabled), then remove and save.
    pub async fn delete(&self, instance_id: &str) -> InkframeResult<()> {
        let instance = self
            .get(instance_id)
            .ok_or_else(|| InkframeError::InstanceNotFound(instance_id.to_string()))?;

        if instance.enabled {
            if let Some(plugin) = self.registry.get(&instance.plugin_id) {
                if let Err(e) = plugin.on_disable(&instance.settings).await {
                    warn!("Plugin on_disable failed: {}", e);
                }
            }
        }

        let mut instances = self.instances.write();
        let Some(removed) = instances.remove(instance_id) else {
            return Err(InkframeError::InstanceNotFound(instance_id.to_string()));
        };
        if let Err(e) = self.persist(&instances) {
            instances.insert(instance_id.to_string(), removed);
            return Err(e);
        }

        info!("Deleted instance {} ({})", instance.name, instance_id);
        Ok(())
    }

    pub fn get(&self, instance_id: &str) -> Option<PluginInstance> {
        self.instances.read().get(instance_id).cloned()
    }

    /// All instances, optionally filtered by plugin, ordered by creation.
    pub fn list(&self, plugin_id: Option<&str>) -> Vec<PluginInstance> {
        let mut all: Vec<_> = self
            .instances
            .read()
            .values()
            .filter(|inst| plugin_id.map_or(true, |p| inst.plugin_id == p))
            .cloned()
            .collect();
        all.sort_by_key(|inst| inst.created_at);
        all
    }

    pub fn list_enabled(&self) -> Vec<PluginInstance> {
        let mut all: Vec<_> = self
            .instances
            .read()
            .values()
            .filter(|inst| inst.enabled)
            .cloned()
            .collect();
        all.sort_by_key(|inst| inst.created_at);
        all
    }

    pub fn count(&self) -> usize {
        self.instances.read().len()
    }

    /// One-shot render to validate an instance. Never touches the display.
    pub async fn test(&self, instance_id: &str, device: &DeviceConfig) -> (bool, Option<String>) {
        let Some(instance) = self.get(instance_id) else {
            return (false, Some(format!("Instance not found: {}", instance_id)));
        };
        let Some(plugin) = self.registry.get(&instance.plugin_id) else {
            return (
                false,
                Some(format!("Plugin not found: {}", instance.plugin_id)),
            );
        };

        match plugin.generate_image(&instance.settings.clone(), device).await {
            Ok(_) => {
                info!("Test successful for instance {}", instance.name);
                (true, None)
            }
            Err(e) => {
                warn!("Test failed for instance {}: {}", instance.name, e);
                (false, Some(format!("Test failed: {}", e)))
            }
        }
    }

    async fn set_enabled(&self, instance_id: &str, enabled: bool) -> InkframeResult<()> {
        let transition = {
            let mut instances = self.instances.write();
            let current = instances
                .get(instance_id)
                .cloned()
                .ok_or_else(|| InkframeError::InstanceNotFound(instance_id.to_string()))?;

            if current.enabled == enabled {
                return Ok(());
            }

            let mut next = current.clone();
            next.enabled = enabled;
            next.updated_at = self.clock.now().fixed_offset();
            instances.insert(instance_id.to_string(), next.clone());
            if let Err(e) = self.persist(&instances) {
                instances.insert(instance_id.to_string(), current);
                return Err(e);
            }
            next
        };

        if let Some(plugin) = self.registry.get(&transition.plugin_id) {
            let result = if enabled {
                plugin.on_enable(&transition.settings.clone()).await
            } else {
                plugin.on_disable(&transition.settings.clone()).await
            };
            if let Err(e) = result {
                warn!(
                    "Plugin {} callback failed: {}",
                    if enabled { "on_enable" } else { "on_disable" },
                    e
                );
            }
        }

        info!(
            "{} instance {} ({})",
            if enabled { "Enabled" } else { "Disabled" },
            transition.name,
            instance_id
        );
        Ok(())
    }

    fn persist(&self, instances: &HashMap<String, PluginInstance>) -> InkframeResult<()> {
        let mut records: Vec<_> = instances.values().cloned().collect();
        records.sort_by_key(|inst| inst.created_at);
        let file = InstanceFile {
            instances: records,
            last_updated: Some(self.clock.now().to_rfc3339()),
        };
        save_json(&self.path, &file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::display::{ColorMode, FrameImage};
    use crate::registry::{Plugin, PluginMetadata};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Plugin that counts lifecycle callbacks and rejects settings
    /// containing a `reject` key.
    #[derive(Default)]
    struct ProbePlugin {
        enables: AtomicU32,
        disables: AtomicU32,
        settings_changes: AtomicU32,
    }

    #[async_trait]
    impl Plugin for ProbePlugin {
        fn validate_settings(&self, settings: &Settings) -> Result<(), String> {
            if settings.contains_key("reject") {
                return Err("settings rejected".to_string());
            }
            Ok(())
        }

        async fn generate_image(
            &self,
            settings: &Settings,
            device: &DeviceConfig,
        ) -> InkframeResult<FrameImage> {
            if settings.contains_key("fail_render") {
                return Err(InkframeError::PluginExecution("render failed".to_string()));
            }
            Ok(FrameImage::blank(device.width, device.height))
        }

        async fn on_enable(&self, _settings: &Settings) -> anyhow::Result<()> {
            self.enables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_disable(&self, _settings: &Settings) -> anyhow::Result<()> {
            self.disables.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn on_settings_change(
            &self,
            _old: &Settings,
            _new: &Settings,
        ) -> anyhow::Result<()> {
            self.settings_changes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn device() -> DeviceConfig {
        DeviceConfig {
            width: 64,
            height: 32,
            rotation: 0,
            color_mode: ColorMode::Grayscale,
            timezone: "UTC".to_string(),
        }
    }

    fn fixture() -> (TempDir, Arc<ProbePlugin>, InstanceStore) {
        let dir = TempDir::new().unwrap();
        let plugin = Arc::new(ProbePlugin::default());
        let registry = Arc::new(PluginRegistry::new());
        registry.register_plugin(
            PluginMetadata {
                plugin_id: "probe".to_string(),
                name: "Probe".to_string(),
                version: "1.0.0".to_string(),
                icon: None,
                settings_schema: serde_json::Value::Null,
            },
            plugin.clone(),
        );

        let clock = Arc::new(SystemClock::new("UTC").unwrap());
        let store = InstanceStore::new(dir.path(), clock, registry);
        (dir, plugin, store)
    }

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect()
    }

    #[tokio::test]
    async fn create_validates_and_fires_on_enable() {
        let (_dir, plugin, store) = fixture();

        let instance = store
            .create("probe", "Morning", settings(&[("mode", "fast")]))
            .await
            .unwrap();
        assert!(instance.enabled);
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);

        let err = store
            .create("probe", "Bad", settings(&[("reject", "yes")]))
            .await
            .unwrap_err();
        assert!(matches!(err, InkframeError::Validation(_)));

        let err = store.create("missing", "X", Settings::new()).await.unwrap_err();
        assert!(matches!(err, InkframeError::PluginNotFound(_)));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn lifecycle_callbacks_fire_once_per_transition() {
        let (_dir, plugin, store) = fixture();
        let instance = store
            .create("probe", "A", Settings::new())
            .await
            .unwrap();
        let id = instance.id.to_string();

        // create counted as one enable
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 1);

        store.disable(&id).await.unwrap();
        store.disable(&id).await.unwrap(); // idempotent, no extra callback
        assert_eq!(plugin.disables.load(Ordering::SeqCst), 1);

        store.enable(&id).await.unwrap();
        store.enable(&id).await.unwrap();
        assert_eq!(plugin.enables.load(Ordering::SeqCst), 2);

        store.delete(&id).await.unwrap();
        assert_eq!(plugin.disables.load(Ordering::SeqCst), 2);
        assert!(store.get(&id).is_none());
    }

    #[tokio::test]
    async fn delete_of_disabled_instance_skips_on_disable() {
        let (_dir, plugin, store) = fixture();
        let id = store
            .create("probe", "A", Settings::new())
            .await
            .unwrap()
            .id
            .to_string();

        store.disable(&id).await.unwrap();
        store.delete(&id).await.unwrap();
        // One disable from the transition, none from the delete.
        assert_eq!(plugin.disables.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_settings_fires_change_callback() {
        let (_dir, plugin, store) = fixture();
        let id = store
            .create("probe", "A", settings(&[("mode", "fast")]))
            .await
            .unwrap()
            .id
            .to_string();

        let updated = store
            .update(&id, Some("B".to_string()), Some(settings(&[("mode", "slow")])))
            .await
            .unwrap();
        assert_eq!(updated.name, "B");
        assert_eq!(plugin.settings_changes.load(Ordering::SeqCst), 1);

        // Name-only update does not fire the settings callback.
        store.update(&id, Some("C".to_string()), None).await.unwrap();
        assert_eq!(plugin.settings_changes.load(Ordering::SeqCst), 1);

        let err = store
            .update(&id, None, Some(settings(&[("reject", "yes")])))
            .await
            .unwrap_err();
        assert!(matches!(err, InkframeError::Validation(_)));
    }

    #[tokio::test]
    async fn settings_survive_reload() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(PluginRegistry::new());
        registry.register_plugin(
            PluginMetadata {
                plugin_id: "probe".to_string(),
                name: "Probe".to_string(),
                version: "1.0.0".to_string(),
                icon: None,
                settings_schema: serde_json::Value::Null,
            },
            Arc::new(ProbePlugin::default()),
        );
        let clock = Arc::new(SystemClock::new("UTC").unwrap());

        let wanted = settings(&[("mode", "fast"), ("city", "Sydney")]);
        let id = {
            let store = InstanceStore::new(dir.path(), clock.clone(), registry.clone());
            store
                .create("probe", "A", wanted.clone())
                .await
                .unwrap()
                .id
                .to_string()
        };

        let reopened = InstanceStore::new(dir.path(), clock, registry);
        let loaded = reopened.get(&id).unwrap();
        assert_eq!(loaded.settings, wanted);
        assert_eq!(loaded.name, "A");
        assert!(loaded.enabled);
    }

    #[tokio::test]
    async fn test_renders_without_touching_display() {
        let (_dir, _plugin, store) = fixture();
        let id = store
            .create("probe", "A", Settings::new())
            .await
            .unwrap()
            .id
            .to_string();

        let (ok, error) = store.test(&id, &device()).await;
        assert!(ok);
        assert!(error.is_none());

        let failing = store
            .create("probe", "B", settings(&[("fail_render", "yes")]))
            .await
            .unwrap()
            .id
            .to_string();
        let (ok, error) = store.test(&failing, &device()).await;
        assert!(!ok);
        assert!(error.unwrap().contains("render failed"));

        let (ok, error) = store.test("not-an-id", &device()).await;
        assert!(!ok);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn list_filters_by_plugin() {
        let (_dir, _plugin, store) = fixture();
        store.create("probe", "A", Settings::new()).await.unwrap();
        let b = store.create("probe", "B", Settings::new()).await.unwrap();
        store.disable(&b.id.to_string()).await.unwrap();

        assert_eq!(store.list(None).len(), 2);
        assert_eq!(store.list(Some("probe")).len(), 2);
        assert_eq!(store.list(Some("other")).len(), 0);
        assert_eq!(store.list_enabled().len(), 1);
        assert_eq!(store.count(), 2);
    }
}
