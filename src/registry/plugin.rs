//! The stable contract every content plugin implements.

use crate::display::{DeviceConfig, DisplayController, FrameImage, Provenance};
use crate::error::InkframeResult;
use crate::signal::StopSignal;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::error;

/// Plugin-instance settings, opaque to the core. Plugins parse the map into
/// their own typed shape inside `validate_settings` and `generate_image`.
pub type Settings = serde_json::Map<String, serde_json::Value>;

/// Content plugin contract.
///
/// The core only ever calls these methods; plugins never see the stores or
/// the schedule. Settings are cloned into every call, so a plugin mutating
/// its copy cannot leak state back into the instance store.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Pure settings validation, called on instance create and update.
    fn validate_settings(&self, _settings: &Settings) -> Result<(), String> {
        Ok(())
    }

    /// Render one frame. May perform network I/O; must not touch core state.
    async fn generate_image(
        &self,
        settings: &Settings,
        device: &DeviceConfig,
    ) -> InkframeResult<FrameImage>;

    /// Seconds a generated frame stays fresh. 0 means redraw each cycle.
    /// Advisory: the plugin honours it inside `run_active`.
    fn cache_ttl(&self, _settings: &Settings) -> u64 {
        0
    }

    /// Called when an instance of this plugin is enabled (including create).
    /// Best-effort: a failure is logged by the caller and otherwise ignored.
    async fn on_enable(&self, _settings: &Settings) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when an instance is disabled (including delete). Best-effort.
    async fn on_disable(&self, _settings: &Settings) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called when an instance's settings change. Best-effort.
    async fn on_settings_change(&self, _old: &Settings, _new: &Settings) -> anyhow::Result<()> {
        Ok(())
    }

    /// Worker body while this plugin owns the panel.
    ///
    /// Runs until `stop` is set; the orchestrator bounded-joins it on
    /// handover. Plugins that repaint on their own cadence override this and
    /// loop on `stop.wait_timeout(...)`; they must observe `stop` at least
    /// once per minute. The default renders once, pushes, then parks.
    async fn run_active(
        &self,
        display: Arc<DisplayController>,
        settings: &Settings,
        device: &DeviceConfig,
        stop: Arc<StopSignal>,
        provenance: Provenance,
    ) {
        match self.generate_image(settings, device).await {
            Ok(frame) => {
                if let Err(e) = display.display_image(frame, Some(provenance)).await {
                    error!("Failed to push frame: {}", e);
                }
            }
            Err(e) => error!("Failed to generate frame: {}", e),
        }

        stop.wait().await;
    }
}
