//! What should be on the panel right now.

use crate::instances::PluginInstance;
use serde::Serialize;

/// Where a content decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Schedule,
    None,
}

/// The orchestrator's per-evaluation output: which instance to run, for how
/// long, and where the decision came from. Never persisted.
#[derive(Debug, Clone)]
pub struct ContentSource {
    pub instance: Option<PluginInstance>,
    pub duration_seconds: u64,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub source_name: Option<String>,
}

impl ContentSource {
    /// Nothing to display.
    pub fn empty() -> Self {
        Self {
            instance: None,
            duration_seconds: 0,
            source_type: SourceType::None,
            source_id: None,
            source_name: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instance.is_none()
    }
}
