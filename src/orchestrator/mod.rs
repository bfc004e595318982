//! Content orchestration: couples the schedule to the display.
//!
//! The orchestrator decides WHICH plugin instance owns the panel; each
//! plugin manages its own repaint cadence inside `run_active`. The schedule
//! has one-hour resolution, so the main loop only re-evaluates at hour
//! boundaries (or when nudged by `resume`/`stop`).

mod source;

pub use source::{ContentSource, SourceType};

use crate::clock::{seconds_until_next_hour, Clock};
use crate::display::{DeviceConfig, DisplayController, Provenance};
use crate::error::{InkframeError, InkframeResult};
use crate::instances::{InstanceStore, PluginInstance};
use crate::registry::PluginRegistry;
use crate::schedule::ScheduleStore;
use crate::signal::StopSignal;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How long a worker gets to acknowledge its stop signal before it is
/// detached. Tight enough for handover latency, loose enough for a worker
/// mid-push on a seconds-per-frame panel.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// The main loop sleeps in chunks of at most this, so stop is prompt.
const TICK_CHUNK: Duration = Duration::from_secs(10);

struct ActiveWorker {
    instance_id: String,
    stop: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

/// Display-tracking state shared with status reporting.
#[derive(Default)]
struct Tracking {
    last_content_source: Option<ContentSource>,
    last_displayed_instance_id: Option<String>,
    current_item_start: Option<DateTime<Tz>>,
    last_refresh: Option<DateTime<Tz>>,
    /// Last unresolvable slot reported, so the log fires once per target.
    reported_unresolved: Option<String>,
}

/// Per-hour schedule evaluator and owner of the single active worker.
pub struct ContentOrchestrator {
    schedule: Arc<ScheduleStore>,
    instances: Arc<InstanceStore>,
    registry: Arc<PluginRegistry>,
    display: Arc<DisplayController>,
    clock: Arc<dyn Clock>,
    device: DeviceConfig,

    running: AtomicBool,
    paused: AtomicBool,
    /// Wakes the main loop out of its hourly sleep (resume, stop).
    nudge: Notify,
    /// Holds the at-most-one active worker; the lock serialises handovers.
    active: tokio::sync::Mutex<Option<ActiveWorker>>,
    tracking: Mutex<Tracking>,
}

impl ContentOrchestrator {
    pub fn new(
        schedule: Arc<ScheduleStore>,
        instances: Arc<InstanceStore>,
        registry: Arc<PluginRegistry>,
        display: Arc<DisplayController>,
        clock: Arc<dyn Clock>,
        device: DeviceConfig,
    ) -> Self {
        Self {
            schedule,
            instances,
            registry,
            display,
            clock,
            device,
            running: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            nudge: Notify::new(),
            active: tokio::sync::Mutex::new(None),
            tracking: Mutex::new(Tracking::default()),
        }
    }

    /// Resolve what should be on the panel right now.
    ///
    /// A slot pointing at a missing or disabled instance resolves to empty
    /// and is reported, not repaired: the slot itself stays in the store.
    pub fn get_current_content_source(&self) -> ContentSource {
        let Some(slot) = self.schedule.get_current_slot(None) else {
            debug!("No slot assigned for the current time");
            return ContentSource::empty();
        };

        let instance = self.instances.get(&slot.target_id);
        let resolved = match instance {
            Some(inst) if inst.enabled => inst,
            Some(_) => {
                self.report_unresolved(&slot.target_id, "disabled");
                return ContentSource::empty();
            }
            None => {
                self.report_unresolved(&slot.target_id, "missing");
                return ContentSource::empty();
            }
        };

        let now = self.clock.now();
        let remaining = 3600 - (u64::from(now.minute()) * 60 + u64::from(now.second()));

        ContentSource {
            duration_seconds: remaining.max(60),
            source_type: SourceType::Schedule,
            source_id: Some(slot.key()),
            source_name: Some(resolved.name.clone()),
            instance: Some(resolved),
        }
    }

    /// Run until `stop()`. Evaluates the schedule, hands the panel over when
    /// the scheduled instance changes, then sleeps to the next hour boundary
    /// in interruptible chunks.
    pub async fn run_loop(&self) {
        self.running.store(true, Ordering::Release);
        info!("Content orchestrator loop started (hourly schedule checks)");

        while self.running.load(Ordering::Acquire) {
            self.evaluate_once().await;

            let sleep_for = Duration::from_secs(seconds_until_next_hour(&*self.clock));
            debug!("Sleeping {:?} until the next hour boundary", sleep_for);
            self.interruptible_sleep(sleep_for).await;
        }

        self.stop_active().await;
        info!("Content orchestrator loop stopped");
    }

    /// One scheduling decision: switch the active worker if the resolved
    /// instance differs from the one currently active. No-op while paused.
    pub async fn evaluate_once(&self) {
        if self.paused.load(Ordering::Acquire) {
            return;
        }

        let source = self.get_current_content_source();
        let new_id = source
            .instance
            .as_ref()
            .map(|inst| inst.id.to_string());

        let current_id = {
            let active = self.active.lock().await;
            active.as_ref().map(|worker| worker.instance_id.clone())
        };

        if new_id != current_id {
            self.switch_active(source).await;
        }
    }

    /// Hand the panel over to a new content source.
    ///
    /// The previous worker is stopped and joined with a bounded timeout; a
    /// worker that refuses to join is detached, and any late frame it pushes
    /// is serialised (and tolerated) by the display controller's mutex.
    async fn switch_active(&self, source: ContentSource) {
        let mut active = self.active.lock().await;

        if let Some(worker) = active.take() {
            worker.stop.set();
            match tokio::time::timeout(WORKER_JOIN_TIMEOUT, worker.handle).await {
                Ok(Ok(())) => debug!("Worker for instance {} stopped", worker.instance_id),
                Ok(Err(e)) => warn!("Worker for instance {} panicked: {}", worker.instance_id, e),
                Err(_) => warn!(
                    "Worker for instance {} did not stop within {:?}; detaching",
                    worker.instance_id, WORKER_JOIN_TIMEOUT
                ),
            }
        }

        let Some(instance) = source.instance.clone() else {
            info!("No content to display");
            return;
        };

        let Some(plugin) = self.registry.get(&instance.plugin_id) else {
            error!("Plugin not found: {}", instance.plugin_id);
            return;
        };

        let stop = Arc::new(StopSignal::new());
        let provenance = self.provenance_for(&instance);
        let display = self.display.clone();
        let device = self.device.clone();
        // Defensive copy: the worker owns its settings snapshot.
        let settings = instance.settings.clone();
        let worker_stop = stop.clone();

        let handle = tokio::spawn(async move {
            plugin
                .run_active(display, &settings, &device, worker_stop, provenance)
                .await;
        });

        *active = Some(ActiveWorker {
            instance_id: instance.id.to_string(),
            stop,
            handle,
        });

        {
            let mut tracking = self.tracking.lock();
            tracking.current_item_start = Some(self.clock.now());
            tracking.last_displayed_instance_id = Some(instance.id.to_string());
            tracking.last_content_source = Some(source);
        }

        info!("Started plugin {} ({})", instance.name, instance.plugin_id);
    }

    /// Stop and join the active worker, if any.
    async fn stop_active(&self) {
        let mut active = self.active.lock().await;
        if let Some(worker) = active.take() {
            worker.stop.set();
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, worker.handle)
                .await
                .is_err()
            {
                warn!(
                    "Worker for instance {} did not stop within {:?}; detaching",
                    worker.instance_id, WORKER_JOIN_TIMEOUT
                );
            }
        }
    }

    /// One-shot render-and-push of the current content, out of band.
    ///
    /// Does not disturb the active worker or any scheduling state; the push
    /// serialises behind the display mutex. Safe to call concurrently with
    /// the main loop, and idempotent with respect to scheduling.
    pub async fn force_refresh(&self) -> InkframeResult<()> {
        let source = self.get_current_content_source();
        let Some(instance) = source.instance.clone() else {
            return Err(InkframeError::Validation(
                "No content scheduled for the current slot".to_string(),
            ));
        };

        let plugin = self
            .registry
            .get(&instance.plugin_id)
            .ok_or_else(|| InkframeError::PluginNotFound(instance.plugin_id.clone()))?;

        info!("Force refresh: {} ({})", instance.name, instance.plugin_id);
        let frame = plugin
            .generate_image(&instance.settings.clone(), &self.device)
            .await?;

        let provenance = self.provenance_for(&instance);
        self.display.display_image(frame, Some(provenance)).await?;

        let mut tracking = self.tracking.lock();
        let now = self.clock.now();
        tracking.last_displayed_instance_id = Some(instance.id.to_string());
        tracking.last_content_source = Some(source);
        tracking.last_refresh = Some(now);
        Ok(())
    }

    /// Suspend handovers. The worker already active stays active.
    pub fn pause(&self) {
        info!("Pausing content orchestrator");
        self.paused.store(true, Ordering::Release);
    }

    /// Resume handovers and re-evaluate immediately.
    pub fn resume(&self) {
        info!("Resuming content orchestrator");
        self.paused.store(false, Ordering::Release);
        // notify_one stores a permit, so a nudge landing between two sleep
        // chunks still wakes the loop.
        self.nudge.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the main loop to exit. The loop joins the active worker on its
    /// way out.
    pub fn stop(&self) {
        info!("Stopping content orchestrator");
        self.running.store(false, Ordering::Release);
        self.nudge.notify_one();
    }

    /// Stop the loop and join the active worker directly. For callers that
    /// are not inside `run_loop` (shutdown paths, tests).
    pub async fn shutdown(&self) {
        self.stop();
        self.stop_active().await;
    }

    /// The id of the instance whose worker currently owns the panel.
    pub async fn active_instance_id(&self) -> Option<String> {
        let active = self.active.lock().await;
        active.as_ref().map(|worker| worker.instance_id.clone())
    }

    /// Orchestrator status for the system surface.
    pub fn status(&self) -> Value {
        let source = self.get_current_content_source();

        let (last_displayed, last_source_name) = {
            let tracking = self.tracking.lock();
            (
                tracking.last_displayed_instance_id.clone(),
                tracking
                    .last_content_source
                    .as_ref()
                    .and_then(|cs| cs.source_name.clone()),
            )
        };

        let mut status = json!({
            "running": self.is_running(),
            "paused": self.is_paused(),
            "source_type": source.source_type,
            "source_name": source.source_name,
            "source_id": source.source_id,
            "has_content": !source.is_empty(),
            "last_displayed_instance_id": last_displayed,
            "last_source_name": last_source_name,
        });

        if let Some(instance) = &source.instance {
            status["instance"] = json!({
                "id": instance.id,
                "name": instance.name,
                "plugin_id": instance.plugin_id,
            });
        }

        if let Some(slot) = self.schedule.get_current_slot(None) {
            status["slot"] = json!({
                "day": slot.day,
                "hour": slot.hour,
                "target_type": slot.target_type,
                "target_id": slot.target_id,
            });
        }

        status
    }

    /// Tick state for the scheduler surface.
    pub fn scheduler_status(&self) -> Value {
        let now = self.clock.now();
        let next_update = seconds_until_next_hour(&*self.clock);
        let tracking = self.tracking.lock();

        json!({
            "running": self.is_running(),
            "paused": self.is_paused(),
            "update_time": format!("{:02}:00", now.hour()),
            "next_update_in_seconds": next_update,
            "current_item_start": tracking.current_item_start.map(|t| t.to_rfc3339()),
            "last_refresh": tracking.last_refresh.map(|t| t.to_rfc3339()),
            "current_time": now.to_rfc3339(),
            "timezone": self.clock.timezone().name(),
        })
    }

    fn provenance_for(&self, instance: &PluginInstance) -> Provenance {
        let plugin_name = self
            .registry
            .metadata(&instance.plugin_id)
            .map(|meta| meta.name)
            .unwrap_or_else(|| instance.plugin_id.clone());

        Provenance {
            plugin_id: instance.plugin_id.clone(),
            instance_id: instance.id.to_string(),
            plugin_name,
            instance_name: instance.name.clone(),
            generated_at: self.clock.now().fixed_offset(),
        }
    }

    fn report_unresolved(&self, target_id: &str, why: &str) {
        let mut tracking = self.tracking.lock();
        if tracking.reported_unresolved.as_deref() != Some(target_id) {
            warn!("Slot targets {} instance {}; showing nothing", why, target_id);
            tracking.reported_unresolved = Some(target_id.to_string());
        }
    }

    /// Sleep for up to `total`, in chunks, waking early on nudge or stop.
    async fn interruptible_sleep(&self, total: Duration) {
        let deadline = tokio::time::Instant::now() + total;

        while self.running.load(Ordering::Acquire) {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return;
            }
            let chunk = TICK_CHUNK.min(deadline - now);

            tokio::select! {
                _ = tokio::time::sleep(chunk) => {}
                _ = self.nudge.notified() => return,
            }
        }
    }
}
