//! Display ownership: frames, the driver seam, and the single-owner controller.

mod controller;
mod driver;
mod frame;
mod mock;

pub use controller::DisplayController;
pub use driver::{ColorMode, DisplayDriver};
pub use frame::{DeviceConfig, DisplayState, DisplayStatus, FrameImage, Provenance};
pub use mock::MockDriver;
