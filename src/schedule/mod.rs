//! Slot-keyed weekly schedule: 7 days x 24 hours, one assignment per slot.

mod store;

pub use store::ScheduleStore;

use crate::error::{InkframeError, InkframeResult};
use serde::{Deserialize, Serialize};

/// What a slot points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Instance,
}

/// One cell of the weekly grid. At most one exists per `(day, hour)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    /// Day of week, 0 = Monday through 6 = Sunday.
    pub day: u8,
    /// Hour of day, 0-23.
    pub hour: u8,
    pub target_type: TargetType,
    pub target_id: String,
}

impl TimeSlot {
    pub fn new(
        day: u8,
        hour: u8,
        target_type: TargetType,
        target_id: impl Into<String>,
    ) -> InkframeResult<Self> {
        check_bounds(day, hour)?;
        Ok(Self {
            day,
            hour,
            target_type,
            target_id: target_id.into(),
        })
    }

    /// The unique `"day-hour"` key for this slot.
    pub fn key(&self) -> String {
        format!("{}-{}", self.day, self.hour)
    }

    /// Parse a `"day-hour"` key back into coordinates.
    pub fn parse_key(key: &str) -> InkframeResult<(u8, u8)> {
        let (day, hour) = key
            .split_once('-')
            .ok_or_else(|| InkframeError::Validation(format!("Malformed slot key: {}", key)))?;
        let day: u8 = day
            .parse()
            .map_err(|_| InkframeError::Validation(format!("Malformed slot key: {}", key)))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| InkframeError::Validation(format!("Malformed slot key: {}", key)))?;
        check_bounds(day, hour)?;
        Ok((day, hour))
    }
}

/// Slot payload without its coordinates, as exposed in snapshots and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTarget {
    pub target_type: TargetType,
    pub target_id: String,
}

pub(crate) fn check_bounds(day: u8, hour: u8) -> InkframeResult<()> {
    if day > 6 {
        return Err(InkframeError::Validation(format!(
            "day must be 0-6, got {}",
            day
        )));
    }
    if hour > 23 {
        return Err(InkframeError::Validation(format!(
            "hour must be 0-23, got {}",
            hour
        )));
    }
    Ok(())
}
