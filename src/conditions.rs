//! Condition evaluation for time- and state-gated content.
//!
//! Conditions are JSON objects mapping operator names to parameters. The
//! evaluator is pure over the clock and registered providers, and fails
//! open: malformed input evaluates to `true` (content is shown rather than
//! suppressed) and is logged once per operator key.

use crate::clock::Clock;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

/// Closure returning the current state of an external provider
/// (weather, API status, ...).
pub type ProviderFn = Box<dyn Fn() -> Value + Send + Sync>;

/// Named hour ranges; a range whose start exceeds its end wraps midnight.
const TIME_PERIODS: &[(&str, u32, u32)] = &[
    ("early_morning", 5, 7),
    ("morning", 7, 12),
    ("afternoon", 12, 17),
    ("evening", 17, 21),
    ("night", 21, 24),
    ("late_night", 0, 5),
];

pub struct ConditionEvaluator {
    clock: Arc<dyn Clock>,
    providers: RwLock<HashMap<String, ProviderFn>>,
    /// Operator keys already reported as malformed, so logs don't repeat.
    reported: Mutex<HashSet<String>>,
}

impl ConditionEvaluator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            providers: RwLock::new(HashMap::new()),
            reported: Mutex::new(HashSet::new()),
        }
    }

    /// Register an external condition provider.
    pub fn register_provider(&self, name: &str, provider: ProviderFn) {
        self.providers.write().insert(name.to_string(), provider);
    }

    /// Evaluate a condition document. A missing/null document and an empty
    /// object are both `true`; top-level keys combine with AND.
    pub fn evaluate(&self, conditions: &Value) -> bool {
        let map = match conditions {
            Value::Null => return true,
            Value::Object(map) => map,
            _ => return self.fail_open("<root>", "condition document is not an object"),
        };

        for (key, params) in map {
            let passed = match key.as_str() {
                "time_of_day" => self.eval_time_of_day(params),
                "day_of_week" => self.eval_day_of_week(params),
                "date_range" => self.eval_date_range(params),
                "time_range" => self.eval_time_range(params),
                "all_of" => self.eval_all_of(params),
                "any_of" => self.eval_any_of(params),
                "not" => !self.evaluate(params),
                provider => self.eval_provider(provider, params),
            };
            if !passed {
                return false;
            }
        }

        true
    }

    /// Context snapshot for the status/debug surface.
    pub fn current_context(&self) -> Value {
        let now = self.clock.now();
        let hour = now.hour();
        let period = TIME_PERIODS
            .iter()
            .find(|(_, start, end)| hour_in_period(hour, *start, *end))
            .map(|(name, _, _)| *name);

        let mut context = serde_json::json!({
            "time": now.format("%H:%M:%S").to_string(),
            "date": now.format("%Y-%m-%d").to_string(),
            "day_of_week": now.weekday().num_days_from_monday(),
            "hour": hour,
            "time_period": period,
        });

        let providers = self.providers.read();
        for (name, provider) in providers.iter() {
            context[format!("provider_{}", name)] = provider();
        }
        context
    }

    fn eval_time_of_day(&self, params: &Value) -> bool {
        let Some(periods) = params.get("periods").and_then(Value::as_array) else {
            return self.fail_open("time_of_day", "missing periods list");
        };
        if periods.is_empty() {
            return true;
        }

        let hour = self.clock.now().hour();
        periods.iter().any(|period| {
            period.as_str().is_some_and(|name| {
                TIME_PERIODS
                    .iter()
                    .any(|(known, start, end)| *known == name && hour_in_period(hour, *start, *end))
            })
        })
    }

    fn eval_day_of_week(&self, params: &Value) -> bool {
        let Some(days) = params.get("days").and_then(Value::as_array) else {
            return self.fail_open("day_of_week", "missing days list");
        };
        if days.is_empty() {
            return true;
        }

        let today = u64::from(self.clock.now().weekday().num_days_from_monday());
        days.iter().any(|day| day.as_u64() == Some(today))
    }

    fn eval_date_range(&self, params: &Value) -> bool {
        let today = self.clock.now().date_naive();

        if let Some(start) = params.get("start_date").and_then(Value::as_str) {
            match NaiveDate::parse_from_str(start, "%Y-%m-%d") {
                Ok(start) if today < start => return false,
                Ok(_) => {}
                Err(_) => return self.fail_open("date_range", "invalid start_date"),
            }
        }
        if let Some(end) = params.get("end_date").and_then(Value::as_str) {
            match NaiveDate::parse_from_str(end, "%Y-%m-%d") {
                Ok(end) if today > end => return false,
                Ok(_) => {}
                Err(_) => return self.fail_open("date_range", "invalid end_date"),
            }
        }

        true
    }

    fn eval_time_range(&self, params: &Value) -> bool {
        let start = params.get("start_time").and_then(Value::as_str);
        let end = params.get("end_time").and_then(Value::as_str);
        let (Some(start), Some(end)) = (start, end) else {
            // Absent bounds leave the range open.
            return true;
        };

        let (Ok(start), Ok(end)) = (
            NaiveTime::parse_from_str(start, "%H:%M"),
            NaiveTime::parse_from_str(end, "%H:%M"),
        ) else {
            return self.fail_open("time_range", "times must be HH:MM");
        };

        let now = self.clock.now().time();
        if start <= end {
            start <= now && now < end
        } else {
            // Wraps past midnight, e.g. 22:00-06:00.
            now >= start || now < end
        }
    }

    fn eval_all_of(&self, params: &Value) -> bool {
        let Some(items) = params.as_array() else {
            return self.fail_open("all_of", "expected a list of conditions");
        };
        items.iter().all(|condition| self.evaluate(condition))
    }

    fn eval_any_of(&self, params: &Value) -> bool {
        let Some(items) = params.as_array() else {
            return self.fail_open("any_of", "expected a list of conditions");
        };
        if items.is_empty() {
            return true;
        }
        items.iter().any(|condition| self.evaluate(condition))
    }

    fn eval_provider(&self, name: &str, params: &Value) -> bool {
        let providers = self.providers.read();
        let Some(provider) = providers.get(name) else {
            return self.fail_open(name, "unknown operator and no such provider");
        };
        let state = provider();

        let Some(matchers) = params.as_object() else {
            return self.fail_open(name, "provider match must be an object");
        };

        for (key, expected) in matchers {
            let matched = match key.as_str() {
                "equals" => &state == expected,
                "contains" => contains(&state, expected),
                "in" => expected
                    .as_array()
                    .map_or(false, |options| options.contains(&state)),
                nested => match state.get(nested) {
                    Some(actual) => actual == expected,
                    // Keys the state doesn't carry are ignored.
                    None => true,
                },
            };
            if !matched {
                return false;
            }
        }

        true
    }

    fn fail_open(&self, key: &str, reason: &str) -> bool {
        if self.reported.lock().insert(key.to_string()) {
            warn!("Malformed condition {}: {} (failing open)", key, reason);
        }
        true
    }
}

fn hour_in_period(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}

fn contains(state: &Value, expected: &Value) -> bool {
    match (state, expected) {
        (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
        (Value::Array(items), needle) => items.contains(needle),
        _ => false,
    }
}
