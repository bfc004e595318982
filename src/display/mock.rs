//! Mock panel driver for development and tests.

use crate::error::{InkframeError, InkframeResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::driver::{ColorMode, DisplayDriver};
use super::frame::FrameImage;

/// In-memory panel. Retains the last frame, counts pushes, and can dump raw
/// frames to a directory for the preview endpoint.
pub struct MockDriver {
    width: u32,
    height: u32,
    dump_dir: Option<PathBuf>,
    /// Simulated refresh latency; electronic paper takes seconds per frame.
    refresh_latency: Duration,
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    current: Option<FrameImage>,
    current_path: Option<PathBuf>,
    display_count: u64,
}

impl MockDriver {
    pub fn new(width: u32, height: u32, dump_dir: Option<PathBuf>) -> Self {
        Self {
            width,
            height,
            dump_dir,
            refresh_latency: Duration::from_millis(100),
            inner: Mutex::new(MockState::default()),
        }
    }

    /// Frames pushed since construction.
    pub fn display_count(&self) -> u64 {
        self.inner.lock().display_count
    }
}

#[async_trait]
impl DisplayDriver for MockDriver {
    fn name(&self) -> &str {
        "mock"
    }

    async fn init(&self) -> InkframeResult<()> {
        if let Some(dir) = &self.dump_dir {
            fs::create_dir_all(dir).map_err(|e| {
                InkframeError::Display(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        debug!("Mock panel initialized: {}x{}", self.width, self.height);
        Ok(())
    }

    async fn display_image(&self, frame: &FrameImage) -> InkframeResult<()> {
        tokio::time::sleep(self.refresh_latency).await;

        let mut inner = self.inner.lock();
        inner.display_count += 1;

        if let Some(dir) = &self.dump_dir {
            let numbered = dir.join(format!("frame_{:04}.raw", inner.display_count));
            let latest = dir.join("latest.raw");
            fs::write(&numbered, &frame.pixels)
                .and_then(|_| fs::write(&latest, &frame.pixels))
                .map_err(|e| InkframeError::Display(format!("Mock frame dump failed: {}", e)))?;
            inner.current_path = Some(latest);
        }

        inner.current = Some(frame.clone());
        debug!("Mock panel displayed frame {}", inner.display_count);
        Ok(())
    }

    async fn clear(&self) -> InkframeResult<()> {
        let blank = FrameImage::blank(self.width, self.height);
        self.display_image(&blank).await
    }

    async fn sleep(&self) -> InkframeResult<()> {
        Ok(())
    }

    async fn wake(&self) -> InkframeResult<()> {
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn color_mode(&self) -> ColorMode {
        ColorMode::Grayscale
    }

    fn preview_path(&self) -> Option<PathBuf> {
        self.inner.lock().current_path.clone()
    }

    fn last_frame(&self) -> Option<FrameImage> {
        self.inner.lock().current.clone()
    }
}
