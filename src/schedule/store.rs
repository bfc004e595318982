//! Persistence and queries for the weekly slot grid.

use crate::clock::{slot_coordinates, Clock};
use crate::error::InkframeResult;
use crate::storage::{load_json, save_json};
use chrono::DateTime;
use chrono_tz::Tz;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::{check_bounds, SlotTarget, TargetType, TimeSlot};

const SCHEDULES_FILE: &str = "schedules.json";

/// On-disk shape of `schedules.json`.
#[derive(Debug, Serialize, Deserialize)]
struct ScheduleFile {
    #[serde(default)]
    slots: BTreeMap<String, SlotTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_updated: Option<String>,
}

/// Owner of all `TimeSlot` records.
///
/// Every mutation persists before it returns; a failed save rolls the
/// in-memory map back to its pre-call state, so memory and disk always agree.
pub struct ScheduleStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    slots: RwLock<HashMap<String, TimeSlot>>,
}

impl ScheduleStore {
    /// Open the store, loading any existing `schedules.json` in `data_dir`.
    pub fn new(data_dir: &Path, clock: Arc<dyn Clock>) -> Self {
        let path = data_dir.join(SCHEDULES_FILE);
        let mut slots = HashMap::new();

        if let Some(file) = load_json::<ScheduleFile>(&path) {
            for (key, target) in file.slots {
                match TimeSlot::parse_key(&key) {
                    Ok((day, hour)) => {
                        slots.insert(
                            key,
                            TimeSlot {
                                day,
                                hour,
                                target_type: target.target_type,
                                target_id: target.target_id,
                            },
                        );
                    }
                    Err(e) => warn!("Dropping slot with bad key {}: {}", key, e),
                }
            }
            info!("Loaded {} schedule slots", slots.len());
        }

        Self {
            path,
            clock,
            slots: RwLock::new(slots),
        }
    }

    /// Assign content to a slot, overwriting any existing assignment.
    pub fn set_slot(
        &self,
        day: u8,
        hour: u8,
        target_type: TargetType,
        target_id: &str,
    ) -> InkframeResult<TimeSlot> {
        let slot = TimeSlot::new(day, hour, target_type, target_id)?;
        let key = slot.key();

        let mut slots = self.slots.write();
        let previous = slots.insert(key.clone(), slot.clone());
        if let Err(e) = self.persist(&slots) {
            match previous {
                Some(prev) => slots.insert(key, prev),
                None => slots.remove(&key),
            };
            return Err(e);
        }

        info!("Set slot {} to instance {}", slot.key(), slot.target_id);
        Ok(slot)
    }

    /// Clear a slot. Returns whether an assignment existed.
    pub fn clear_slot(&self, day: u8, hour: u8) -> InkframeResult<bool> {
        check_bounds(day, hour)?;
        let key = format!("{}-{}", day, hour);

        let mut slots = self.slots.write();
        let Some(removed) = slots.remove(&key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&slots) {
            slots.insert(key, removed);
            return Err(e);
        }

        info!("Cleared slot {}", key);
        Ok(true)
    }

    pub fn get_slot(&self, day: u8, hour: u8) -> InkframeResult<Option<TimeSlot>> {
        check_bounds(day, hour)?;
        Ok(self.slots.read().get(&format!("{}-{}", day, hour)).cloned())
    }

    /// The slot covering `now` (or the clock's now when not supplied).
    pub fn get_current_slot(&self, now: Option<DateTime<Tz>>) -> Option<TimeSlot> {
        let moment = now.unwrap_or_else(|| self.clock.now());
        let (day, hour) = slot_coordinates(&moment);
        self.slots.read().get(&format!("{}-{}", day, hour)).cloned()
    }

    /// Set many slots in one call: all-or-nothing in memory, single save.
    pub fn bulk_set(&self, assignments: &[TimeSlot]) -> InkframeResult<usize> {
        for slot in assignments {
            check_bounds(slot.day, slot.hour)?;
        }

        let mut slots = self.slots.write();
        let snapshot = slots.clone();
        for slot in assignments {
            slots.insert(slot.key(), slot.clone());
        }
        if let Err(e) = self.persist(&slots) {
            *slots = snapshot;
            return Err(e);
        }

        info!("Bulk set {} slots", assignments.len());
        Ok(assignments.len())
    }

    /// Clear every assignment. Returns how many were removed.
    pub fn clear_all(&self) -> InkframeResult<usize> {
        let mut slots = self.slots.write();
        let snapshot = std::mem::take(&mut *slots);
        let count = snapshot.len();
        if let Err(e) = self.persist(&slots) {
            *slots = snapshot;
            return Err(e);
        }

        info!("Cleared all {} slots", count);
        Ok(count)
    }

    /// All assignments keyed `"day-hour"`, for the HTTP surface.
    pub fn snapshot(&self) -> BTreeMap<String, SlotTarget> {
        self.slots
            .read()
            .iter()
            .map(|(key, slot)| {
                (
                    key.clone(),
                    SlotTarget {
                        target_type: slot.target_type,
                        target_id: slot.target_id.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.read().len()
    }

    /// All assignments for one day, ordered by hour.
    pub fn slots_for_day(&self, day: u8) -> InkframeResult<Vec<TimeSlot>> {
        check_bounds(day, 0)?;
        let mut slots: Vec<_> = self
            .slots
            .read()
            .values()
            .filter(|slot| slot.day == day)
            .cloned()
            .collect();
        slots.sort_by_key(|slot| slot.hour);
        Ok(slots)
    }

    fn persist(&self, slots: &HashMap<String, TimeSlot>) -> InkframeResult<()> {
        let file = ScheduleFile {
            slots: slots
                .iter()
                .map(|(key, slot)| {
                    (
                        key.clone(),
                        SlotTarget {
                            target_type: slot.target_type,
                            target_id: slot.target_id.clone(),
                        },
                    )
                })
                .collect(),
            last_updated: Some(self.clock.now().to_rfc3339()),
        };
        save_json(&self.path, &file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn store_at(dir: &Path, day_time: (u32, u32, u32)) -> ScheduleStore {
        let tz: Tz = "UTC".parse().unwrap();
        // 2026-03-02 is a Monday; pick the day via date offset.
        let (d, h, m) = day_time;
        let start = tz
            .with_ymd_and_hms(2026, 3, 2 + d, h, m, 0)
            .unwrap();
        ScheduleStore::new(dir, Arc::new(ManualClock::new(start)))
    }

    #[test]
    fn set_get_clear() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        let slot = store
            .set_slot(0, 9, TargetType::Instance, "inst-a")
            .unwrap();
        assert_eq!(slot.key(), "0-9");
        assert_eq!(
            store.get_slot(0, 9).unwrap().map(|s| s.target_id),
            Some("inst-a".to_string())
        );

        assert!(store.clear_slot(0, 9).unwrap());
        assert!(!store.clear_slot(0, 9).unwrap());
        assert!(store.get_slot(0, 9).unwrap().is_none());
    }

    #[test]
    fn set_slot_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        store.set_slot(0, 9, TargetType::Instance, "a").unwrap();
        store.set_slot(0, 9, TargetType::Instance, "b").unwrap();

        assert_eq!(store.slot_count(), 1);
        assert_eq!(
            store.get_slot(0, 9).unwrap().map(|s| s.target_id),
            Some("b".to_string())
        );
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        assert!(store.set_slot(7, 0, TargetType::Instance, "a").is_err());
        assert!(store.set_slot(0, 24, TargetType::Instance, "a").is_err());
        assert!(store.clear_slot(9, 9).is_err());
        assert!(store.get_slot(0, 99).is_err());
    }

    #[test]
    fn current_slot_follows_the_clock() {
        let dir = TempDir::new().unwrap();
        let tz: Tz = "UTC".parse().unwrap();
        let clock = Arc::new(ManualClock::new(
            tz.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap(),
        ));
        let store = ScheduleStore::new(dir.path(), clock.clone());

        store.set_slot(0, 9, TargetType::Instance, "a").unwrap();
        assert_eq!(
            store.get_current_slot(None).map(|s| s.target_id),
            Some("a".to_string())
        );

        clock.advance(1800); // 10:00, slot unset
        assert!(store.get_current_slot(None).is_none());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = store_at(dir.path(), (0, 9, 0));
            store.set_slot(2, 14, TargetType::Instance, "a").unwrap();
            store.set_slot(6, 0, TargetType::Instance, "b").unwrap();
        }

        let reopened = store_at(dir.path(), (0, 9, 0));
        assert_eq!(reopened.slot_count(), 2);
        assert_eq!(
            reopened.get_slot(6, 0).unwrap().map(|s| s.target_id),
            Some("b".to_string())
        );
    }

    #[test]
    fn bulk_set_is_all_or_nothing_on_bad_input() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));
        store.set_slot(0, 9, TargetType::Instance, "a").unwrap();

        let assignments = vec![
            TimeSlot {
                day: 0,
                hour: 9,
                target_type: TargetType::Instance,
                target_id: "b".to_string(),
            },
            TimeSlot {
                day: 9,
                hour: 9,
                target_type: TargetType::Instance,
                target_id: "c".to_string(),
            },
        ];
        assert!(store.bulk_set(&assignments).is_err());

        // Nothing changed: the invalid entry rejected the whole batch.
        assert_eq!(
            store.get_slot(0, 9).unwrap().map(|s| s.target_id),
            Some("a".to_string())
        );
    }

    #[test]
    fn clear_all_reports_count() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        store.set_slot(0, 9, TargetType::Instance, "a").unwrap();
        store.set_slot(1, 9, TargetType::Instance, "b").unwrap();
        assert_eq!(store.clear_all().unwrap(), 2);
        assert_eq!(store.slot_count(), 0);
    }

    #[test]
    fn slots_for_day_orders_by_hour() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        store.set_slot(2, 18, TargetType::Instance, "b").unwrap();
        store.set_slot(2, 7, TargetType::Instance, "a").unwrap();
        store.set_slot(4, 7, TargetType::Instance, "c").unwrap();

        let day = store.slots_for_day(2).unwrap();
        assert_eq!(
            day.iter().map(|s| s.hour).collect::<Vec<_>>(),
            vec![7, 18]
        );
        assert!(store.slots_for_day(9).is_err());
    }

    #[test]
    fn snapshot_lists_every_slot() {
        let dir = TempDir::new().unwrap();
        let store = store_at(dir.path(), (0, 9, 0));

        store.set_slot(0, 9, TargetType::Instance, "a").unwrap();
        store.set_slot(3, 12, TargetType::Instance, "b").unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("3-12").map(|t| t.target_id.as_str()), Some("b"));
    }
}
