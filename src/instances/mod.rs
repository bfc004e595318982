//! Plugin-instance records and their lifecycle.

mod store;

pub use store::InstanceStore;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::registry::Settings;

/// A named, settings-bound use of a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginInstance {
    pub id: Uuid,
    pub plugin_id: String,
    pub name: String,
    /// Opaque to the core; validated by the plugin on create/update.
    pub settings: Settings,
    pub enabled: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}
