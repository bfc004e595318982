//! Shared fixtures for the integration suites.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use inkframe::clock::ManualClock;
use inkframe::display::{DeviceConfig, DisplayController, FrameImage, MockDriver, Provenance};
use inkframe::error::InkframeResult;
use inkframe::instances::InstanceStore;
use inkframe::orchestrator::ContentOrchestrator;
use inkframe::registry::{Plugin, PluginMetadata, PluginRegistry, Settings};
use inkframe::schedule::ScheduleStore;
use inkframe::signal::StopSignal;
use inkframe::{ColorMode, InkframeError};
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A Monday. All orchestration scenarios anchor here.
pub fn monday_at(hour: u32, minute: u32, second: u32) -> DateTime<Tz> {
    let tz: Tz = "UTC".parse().unwrap();
    tz.with_ymd_and_hms(2026, 3, 2, hour, minute, second).unwrap()
}

pub fn device() -> DeviceConfig {
    DeviceConfig {
        width: 64,
        height: 32,
        rotation: 0,
        color_mode: ColorMode::Grayscale,
        timezone: "UTC".to_string(),
    }
}

/// Renders a blank frame and tracks how many workers run concurrently, so
/// tests can assert the at-most-one-active invariant.
#[derive(Default)]
pub struct CountingPlugin {
    pub renders: AtomicU32,
    pub live_workers: AtomicI32,
    pub max_live_workers: AtomicI32,
}

#[async_trait]
impl Plugin for CountingPlugin {
    async fn generate_image(
        &self,
        _settings: &Settings,
        device: &DeviceConfig,
    ) -> InkframeResult<FrameImage> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        Ok(FrameImage::blank(device.width, device.height))
    }

    async fn run_active(
        &self,
        display: Arc<DisplayController>,
        settings: &Settings,
        device: &DeviceConfig,
        stop: Arc<StopSignal>,
        provenance: Provenance,
    ) {
        let live = self.live_workers.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_workers.fetch_max(live, Ordering::SeqCst);

        match self.generate_image(settings, device).await {
            Ok(frame) => {
                let _ = display.display_image(frame, Some(provenance)).await;
            }
            Err(_) => {}
        }
        stop.wait().await;

        self.live_workers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Repaints on its own cadence until stopped, the way a clock face would.
pub struct TickerPlugin {
    pub interval: Duration,
}

#[async_trait]
impl Plugin for TickerPlugin {
    async fn generate_image(
        &self,
        _settings: &Settings,
        device: &DeviceConfig,
    ) -> InkframeResult<FrameImage> {
        Ok(FrameImage::blank(device.width, device.height))
    }

    fn cache_ttl(&self, _settings: &Settings) -> u64 {
        self.interval.as_secs()
    }

    async fn run_active(
        &self,
        display: Arc<DisplayController>,
        settings: &Settings,
        device: &DeviceConfig,
        stop: Arc<StopSignal>,
        provenance: Provenance,
    ) {
        while !stop.is_set() {
            if let Ok(frame) = self.generate_image(settings, device).await {
                let _ = display.display_image(frame, Some(provenance.clone())).await;
            }
            let ttl = Duration::from_secs(self.cache_ttl(settings).max(1));
            if stop.wait_timeout(ttl).await {
                break;
            }
        }
    }
}

/// Ignores its stop signal entirely; used to exercise the join timeout.
pub struct StubbornPlugin;

#[async_trait]
impl Plugin for StubbornPlugin {
    async fn generate_image(
        &self,
        _settings: &Settings,
        device: &DeviceConfig,
    ) -> InkframeResult<FrameImage> {
        Ok(FrameImage::blank(device.width, device.height))
    }

    async fn run_active(
        &self,
        display: Arc<DisplayController>,
        settings: &Settings,
        device: &DeviceConfig,
        _stop: Arc<StopSignal>,
        provenance: Provenance,
    ) {
        if let Ok(frame) = self.generate_image(settings, device).await {
            let _ = display.display_image(frame, Some(provenance)).await;
        }
        std::future::pending::<()>().await;
    }
}

/// Always fails to render.
pub struct BrokenPlugin;

#[async_trait]
impl Plugin for BrokenPlugin {
    async fn generate_image(
        &self,
        _settings: &Settings,
        _device: &DeviceConfig,
    ) -> InkframeResult<FrameImage> {
        Err(InkframeError::PluginExecution("render exploded".to_string()))
    }
}

pub fn metadata(plugin_id: &str) -> PluginMetadata {
    PluginMetadata {
        plugin_id: plugin_id.to_string(),
        name: format!("{} plugin", plugin_id),
        version: "1.0.0".to_string(),
        icon: None,
        settings_schema: serde_json::Value::Null,
    }
}

/// Everything an orchestration scenario needs, wired like the daemon does.
pub struct Harness {
    /// Kept alive so the stores' files outlive the scenario.
    pub data_dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub registry: Arc<PluginRegistry>,
    pub instances: Arc<InstanceStore>,
    pub schedule: Arc<ScheduleStore>,
    pub display: Arc<DisplayController>,
    pub orchestrator: Arc<ContentOrchestrator>,
}

impl Harness {
    pub async fn new(start: DateTime<Tz>) -> Self {
        let data_dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let registry = Arc::new(PluginRegistry::new());

        let display = Arc::new(DisplayController::new(
            Box::new(MockDriver::new(64, 32, None)),
            clock.clone(),
        ));
        display.init().await.unwrap();

        let instances = Arc::new(InstanceStore::new(
            data_dir.path(),
            clock.clone(),
            registry.clone(),
        ));
        let schedule = Arc::new(ScheduleStore::new(data_dir.path(), clock.clone()));

        let orchestrator = Arc::new(ContentOrchestrator::new(
            schedule.clone(),
            instances.clone(),
            registry.clone(),
            display.clone(),
            clock.clone(),
            device(),
        ));

        Self {
            data_dir,
            clock,
            registry,
            instances,
            schedule,
            display,
            orchestrator,
        }
    }

    pub fn add_plugin(&self, plugin_id: &str, plugin: Arc<dyn Plugin>) {
        self.registry.register_plugin(metadata(plugin_id), plugin);
    }

    /// Create an enabled instance of `plugin_id` and return its id.
    pub async fn instance_of(&self, plugin_id: &str, name: &str) -> String {
        self.instances
            .create(plugin_id, name, Settings::new())
            .await
            .unwrap()
            .id
            .to_string()
    }
}

/// Poll `condition` until it holds or two hours of (virtual) time pass,
/// enough for scenarios that sleep across an hour boundary.
pub async fn wait_until<F: FnMut() -> bool>(mut condition: F) -> bool {
    for _ in 0..7200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    false
}
