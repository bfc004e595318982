//! The driver seam between the controller and panel hardware.

use crate::error::InkframeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::frame::FrameImage;

/// Pixel interpretation a panel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Grayscale,
    Color,
}

/// Panel driver contract.
///
/// The required set covers every panel; the capability probes return `None`
/// when a driver does not support them. Capabilities are probed explicitly,
/// never detected by method presence.
#[async_trait]
pub trait DisplayDriver: Send + Sync {
    /// Stable driver name, as referenced from configuration.
    fn name(&self) -> &str;

    /// Bring the hardware up. Called once at boot.
    async fn init(&self) -> InkframeResult<()>;

    /// Push one frame to the panel. Blocks until the refresh completes.
    async fn display_image(&self, frame: &FrameImage) -> InkframeResult<()>;

    /// Blank the panel.
    async fn clear(&self) -> InkframeResult<()>;

    /// Enter low-power mode. Drivers for panels that can be damaged by
    /// staying powered must make this release the hardware.
    async fn sleep(&self) -> InkframeResult<()>;

    /// Leave low-power mode.
    async fn wake(&self) -> InkframeResult<()>;

    /// Panel dimensions in pixels, `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// Mounting rotation in degrees.
    fn rotation(&self) -> u16 {
        0
    }

    fn color_mode(&self) -> ColorMode {
        ColorMode::Grayscale
    }

    /// Capability probe: on-disk copy of the last frame, for previews.
    fn preview_path(&self) -> Option<PathBuf> {
        None
    }

    /// Capability probe: the last frame pushed, if the driver retains it.
    fn last_frame(&self) -> Option<FrameImage> {
        None
    }
}
