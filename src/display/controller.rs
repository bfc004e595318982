//! Single-owner boundary to the physical panel.

use crate::clock::Clock;
use crate::error::InkframeResult;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::driver::{ColorMode, DisplayDriver};
use super::frame::{DisplayState, DisplayStatus, FrameImage, Provenance};

/// The sole writer to the panel.
///
/// Frame pushes are serialised by an internal mutex regardless of where they
/// come from (active worker, force refresh, clear), so frames reach the
/// hardware in the order they leave their producers. After every push or
/// error the panel is returned to sleep; electronic paper can be damaged by
/// being left powered.
pub struct DisplayController {
    driver: Box<dyn DisplayDriver>,
    clock: Arc<dyn Clock>,
    push_lock: tokio::sync::Mutex<()>,
    state: Mutex<DisplayState>,
}

impl DisplayController {
    pub fn new(driver: Box<dyn DisplayDriver>, clock: Arc<dyn Clock>) -> Self {
        Self {
            driver,
            clock,
            push_lock: tokio::sync::Mutex::new(()),
            state: Mutex::new(DisplayState::new()),
        }
    }

    /// Bring the panel up. Called once at boot.
    pub async fn init(&self) -> InkframeResult<()> {
        self.driver.init().await
    }

    /// Push one frame, recording provenance on success.
    ///
    /// Synchronous in effect: the call returns after the refresh completes,
    /// and a concurrent call waits its turn. On driver failure the error
    /// count is incremented, status transitions to `Error`, and the error
    /// propagates; the caller decides whether to retry.
    pub async fn display_image(
        &self,
        frame: FrameImage,
        provenance: Option<Provenance>,
    ) -> InkframeResult<()> {
        let _guard = self.push_lock.lock().await;

        self.state.lock().status = DisplayStatus::Updating;
        let result = self.driver.display_image(&frame).await;
        self.sleep_panel().await;

        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.status = DisplayStatus::Sleeping;
                state.last_provenance = provenance;
                state.last_push = Some(self.clock.now().fixed_offset());
                state.display_count += 1;
                debug!("Frame {} pushed to panel", state.display_count);
                Ok(())
            }
            Err(e) => {
                state.status = DisplayStatus::Error;
                state.error_count += 1;
                error!("Display push failed: {}", e);
                Err(e)
            }
        }
    }

    /// Blank the panel and drop provenance.
    pub async fn clear(&self) -> InkframeResult<()> {
        let _guard = self.push_lock.lock().await;

        let result = self.driver.clear().await;
        self.sleep_panel().await;

        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.status = DisplayStatus::Sleeping;
                state.last_provenance = None;
                Ok(())
            }
            Err(e) => {
                state.status = DisplayStatus::Error;
                state.error_count += 1;
                Err(e)
            }
        }
    }

    pub async fn sleep(&self) -> InkframeResult<()> {
        let _guard = self.push_lock.lock().await;
        self.driver.sleep().await?;
        self.state.lock().status = DisplayStatus::Sleeping;
        Ok(())
    }

    pub async fn wake(&self) -> InkframeResult<()> {
        let _guard = self.push_lock.lock().await;
        self.driver.wake().await?;
        self.state.lock().status = DisplayStatus::Idle;
        Ok(())
    }

    pub fn get_state(&self) -> DisplayState {
        self.state.lock().clone()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.driver.dimensions()
    }

    pub fn rotation(&self) -> u16 {
        self.driver.rotation()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.driver.color_mode()
    }

    pub fn preview_path(&self) -> Option<PathBuf> {
        self.driver.preview_path()
    }

    pub fn last_frame(&self) -> Option<FrameImage> {
        self.driver.last_frame()
    }

    /// Best-effort sleep after a push or error; failure is logged, not fatal.
    async fn sleep_panel(&self) {
        if let Err(e) = self.driver.sleep().await {
            warn!("Failed to sleep panel: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::display::MockDriver;

    fn controller() -> DisplayController {
        let clock = Arc::new(SystemClock::new("UTC").unwrap());
        DisplayController::new(Box::new(MockDriver::new(64, 32, None)), clock)
    }

    fn provenance(plugin: &str) -> Provenance {
        Provenance {
            plugin_id: plugin.to_string(),
            instance_id: "i-1".to_string(),
            plugin_name: plugin.to_string(),
            instance_name: "test".to_string(),
            generated_at: chrono::Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn push_records_provenance_and_sleeps_panel() {
        let controller = controller();
        controller
            .display_image(FrameImage::blank(64, 32), Some(provenance("clock")))
            .await
            .unwrap();

        let state = controller.get_state();
        assert_eq!(state.status, DisplayStatus::Sleeping);
        assert_eq!(state.display_count, 1);
        assert_eq!(
            state.last_provenance.map(|p| p.plugin_id),
            Some("clock".to_string())
        );
        assert!(state.last_push.is_some());
    }

    #[tokio::test]
    async fn clear_drops_provenance() {
        let controller = controller();
        controller
            .display_image(FrameImage::blank(64, 32), Some(provenance("clock")))
            .await
            .unwrap();
        controller.clear().await.unwrap();

        let state = controller.get_state();
        assert!(state.last_provenance.is_none());
    }

    #[tokio::test]
    async fn concurrent_pushes_are_serialised() {
        let controller = Arc::new(controller());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move {
                controller
                    .display_image(FrameImage::blank(64, 32), None)
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(controller.get_state().display_count, 4);
    }
}
