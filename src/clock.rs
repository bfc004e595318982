//! Wall-clock service pinned to a configured IANA timezone.
//!
//! Every wall-clock decision in the daemon funnels through a shared
//! `Arc<dyn Clock>` so tests can substitute a deterministic clock.

use crate::error::{InkframeError, InkframeResult};
use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

/// Source of "now" for the whole process.
///
/// Successive `now()` values are non-decreasing within a process.
pub trait Clock: Send + Sync {
    /// Current time in the configured timezone.
    fn now(&self) -> DateTime<Tz>;

    /// The configured timezone.
    fn timezone(&self) -> Tz;
}

/// Production clock backed by the system time.
pub struct SystemClock {
    tz: Tz,
    /// Last value handed out, so wall-clock steps never move us backwards.
    last: Mutex<Option<DateTime<Tz>>>,
}

impl SystemClock {
    /// Create a clock for an IANA timezone name.
    ///
    /// An unknown timezone is a fatal configuration error.
    pub fn new(timezone: &str) -> InkframeResult<Self> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| InkframeError::Configuration(format!("Unknown timezone: {}", timezone)))?;
        Ok(Self {
            tz,
            last: Mutex::new(None),
        })
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        let now = Utc::now().with_timezone(&self.tz);
        let mut last = self.last.lock();
        match *last {
            Some(prev) if now < prev => prev,
            _ => {
                *last = Some(now);
                now
            }
        }
    }

    fn timezone(&self) -> Tz {
        self.tz
    }
}

/// Deterministic clock for tests: time moves only when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Tz>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Tz>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jump to an absolute moment. Callers must not move time backwards.
    pub fn set(&self, moment: DateTime<Tz>) {
        *self.now.lock() = moment;
    }

    /// Advance by a number of seconds.
    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock();
        *now += chrono::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Tz> {
        *self.now.lock()
    }

    fn timezone(&self) -> Tz {
        self.now.lock().timezone()
    }
}

/// Seconds until the next hour boundary, always in `[1, 3600]`.
///
/// Never 0, so a loop sleeping on this cannot busy-wait across the boundary.
pub fn seconds_until_next_hour(clock: &dyn Clock) -> u64 {
    let now = clock.now();
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    3600 - into_hour
}

/// The `(day_of_week, hour)` slot cell covering a wall-clock moment.
///
/// Monday = 0, Sunday = 6.
pub fn slot_coordinates(moment: &DateTime<Tz>) -> (u8, u8) {
    (
        moment.weekday().num_days_from_monday() as u8,
        moment.hour() as u8,
    )
}
