//! Configuration: TOML file, environment overrides, and the runtime
//! config manager backing the `/api/config` surface.
//!
//! Loading hierarchy: flags > env > file > defaults.

use crate::display::{ColorMode, DeviceConfig};
use crate::error::{InkframeError, InkframeResult};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Full daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub time: TimeConfig,
    pub display: DisplayConfig,
    pub plugins: PluginsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataConfig {
    pub dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeConfig {
    /// IANA timezone name; validated at boot by the clock service.
    pub timezone: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisplayConfig {
    /// Driver name; `mock` is built in, hardware drivers register here.
    pub driver: String,
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
    pub color_mode: ColorMode,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            driver: "mock".to_string(),
            width: 800,
            height: 480,
            rotation: 0,
            color_mode: ColorMode::Grayscale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginsConfig {
    pub dir: PathBuf,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./plugins"),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file (defaults when the file is absent), then apply
    /// environment overrides. A present-but-malformed file is fatal.
    pub fn load(path: Option<&Path>) -> InkframeResult<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path).map_err(|e| {
                    InkframeError::Configuration(format!(
                        "Unreadable config {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                toml::from_str(&raw).map_err(|e| {
                    InkframeError::Configuration(format!(
                        "Malformed config {}: {}",
                        path.display(),
                        e
                    ))
                })?
            }
            Some(path) => {
                info!("Config {} not found; using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment overrides for the two required inputs.
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("INKFRAME_DATA_DIR") {
            self.data.dir = PathBuf::from(dir);
        }
        if let Ok(tz) = env::var("INKFRAME_TIMEZONE") {
            self.time.timezone = tz;
        }
    }

    /// The device description handed to plugins when rendering.
    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            width: self.display.width,
            height: self.display.height,
            rotation: self.display.rotation,
            color_mode: self.display.color_mode,
            timezone: self.time.timezone.clone(),
        }
    }
}

/// Runtime configuration holder behind the `/api/config` surface.
///
/// `update` validates and replaces the in-memory config only; `save`
/// persists it (with a backup of the previous file); `revert` reloads from
/// disk, discarding in-memory changes.
pub struct ConfigManager {
    path: PathBuf,
    current: RwLock<AppConfig>,
}

impl ConfigManager {
    pub fn new(path: PathBuf, config: AppConfig) -> Self {
        Self {
            path,
            current: RwLock::new(config),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        self.current.read().clone()
    }

    /// Validate a JSON document as a full config and replace the in-memory
    /// copy. Does NOT save.
    pub fn update(&self, value: serde_json::Value) -> InkframeResult<()> {
        let config: AppConfig = serde_json::from_value(value)
            .map_err(|e| InkframeError::Validation(format!("Invalid configuration: {}", e)))?;
        *self.current.write() = config;
        info!("Configuration updated in memory (not saved)");
        Ok(())
    }

    /// Persist the in-memory config, keeping a `.bak` of the previous file.
    pub fn save(&self) -> InkframeResult<()> {
        let raw = toml::to_string_pretty(&self.snapshot())
            .map_err(|e| InkframeError::Internal(format!("Config serialization: {}", e)))?;

        if self.path.exists() {
            let backup = self.path.with_extension("toml.bak");
            fs::copy(&self.path, &backup).map_err(|e| {
                InkframeError::StorePersistence(format!("Config backup failed: {}", e))
            })?;
        }

        let tmp = self.path.with_extension("toml.tmp");
        fs::write(&tmp, raw)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| InkframeError::StorePersistence(format!("Config save failed: {}", e)))?;

        info!("Configuration saved to {}", self.path.display());
        Ok(())
    }

    /// Reload the on-disk config, discarding in-memory changes.
    pub fn revert(&self) -> InkframeResult<()> {
        let from_disk = AppConfig::load(Some(&self.path))?;
        *self.current.write() = from_disk;
        info!("Configuration reverted to saved version");
        Ok(())
    }
}
