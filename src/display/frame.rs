//! Frame payloads and display-state bookkeeping.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::driver::ColorMode;

/// Opaque rendered frame. The core never inspects pixels; layout and
/// packing are a contract between the plugin and the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameImage {
    /// An all-white frame, one byte per pixel.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0xFF; (width as usize) * (height as usize)],
        }
    }
}

/// Who produced the frame that is (or was last) on the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub plugin_id: String,
    pub instance_id: String,
    pub plugin_name: String,
    pub instance_name: String,
    pub generated_at: DateTime<FixedOffset>,
}

/// Panel status as tracked by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayStatus {
    Idle,
    Updating,
    Sleeping,
    Error,
}

/// Controller-owned view of the panel. Mutated only by `DisplayController`.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayState {
    pub status: DisplayStatus,
    pub last_provenance: Option<Provenance>,
    pub last_push: Option<DateTime<FixedOffset>>,
    pub error_count: u32,
    pub display_count: u64,
}

impl DisplayState {
    pub fn new() -> Self {
        Self {
            status: DisplayStatus::Idle,
            last_provenance: None,
            last_push: None,
            error_count: 0,
            display_count: 0,
        }
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Device description handed to plugins when rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub width: u32,
    pub height: u32,
    pub rotation: u16,
    pub color_mode: ColorMode,
    pub timezone: String,
}
