//! inkframe: content orchestration for electronic paper panels.
//!
//! A long-running daemon that schedules content plugins on a 168-slot
//! weekly grid (7 days x 24 hours). At any moment at most one plugin
//! instance is active; the active instance controls its own repaint cadence
//! while the orchestrator decides which instance owns the panel.

pub mod api;
pub mod clock;
pub mod conditions;
pub mod config;
pub mod display;
pub mod error;
pub mod instances;
pub mod orchestrator;
pub mod registry;
pub mod schedule;
pub mod signal;
pub mod storage;
pub mod system;

pub use clock::{Clock, ManualClock, SystemClock};
pub use conditions::ConditionEvaluator;
pub use config::{AppConfig, ConfigManager};
pub use display::{
    ColorMode, DeviceConfig, DisplayController, DisplayDriver, DisplayState, DisplayStatus,
    FrameImage, MockDriver, Provenance,
};
pub use error::{InkframeError, InkframeResult};
pub use instances::{InstanceStore, PluginInstance};
pub use orchestrator::{ContentOrchestrator, ContentSource, SourceType};
pub use registry::{Plugin, PluginMetadata, PluginRegistry, Settings};
pub use schedule::{ScheduleStore, TargetType, TimeSlot};
pub use signal::StopSignal;
