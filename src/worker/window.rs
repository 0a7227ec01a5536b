//! Pause-window scheduling
//!
//! Workers can be kept off the queue during configured wall-clock
//! windows, either a simple daily hour range or a per-weekday schedule
//! of active windows. All checks run in the worker's configured time
//! zone.

use crate::config::PauseConfig;
use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("unknown time zone '{0}'")]
    TimeZone(String),

    #[error("invalid window time '{0}' (expected HH:MM)")]
    Time(String),

    #[error("unknown weekday key '{0}'")]
    Weekday(String),
}

#[derive(Debug, Clone)]
struct DayRule {
    enabled: bool,
    /// Active windows; empty means the whole day is active.
    windows: Vec<(NaiveTime, NaiveTime)>,
}

/// Compiled pause schedule for one worker.
#[derive(Debug, Clone)]
pub struct PauseWindow {
    tz: Tz,
    simple: Option<(u32, u32)>,
    weekdays: Option<HashMap<Weekday, DayRule>>,
}

fn parse_weekday(key: &str) -> Result<Weekday, WindowError> {
    match key {
        "mon" => Ok(Weekday::Mon),
        "tue" => Ok(Weekday::Tue),
        "wed" => Ok(Weekday::Wed),
        "thu" => Ok(Weekday::Thu),
        "fri" => Ok(Weekday::Fri),
        "sat" => Ok(Weekday::Sat),
        "sun" => Ok(Weekday::Sun),
        other => Err(WindowError::Weekday(other.to_string())),
    }
}

fn parse_time(text: &str) -> Result<NaiveTime, WindowError> {
    NaiveTime::parse_from_str(text, "%H:%M").map_err(|_| WindowError::Time(text.to_string()))
}

impl PauseWindow {
    pub fn from_config(config: &PauseConfig) -> Result<Self, WindowError> {
        let tz = config
            .time_zone
            .parse::<Tz>()
            .map_err(|_| WindowError::TimeZone(config.time_zone.clone()))?;

        let simple = match (config.from_hour, config.to_hour_exclusive) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        };

        let weekdays = match &config.weekdays {
            None => None,
            Some(days) => {
                let mut compiled = HashMap::new();
                for (key, schedule) in days {
                    let mut windows = Vec::with_capacity(schedule.windows.len());
                    for window in &schedule.windows {
                        windows.push((parse_time(&window.from)?, parse_time(&window.to)?));
                    }
                    compiled.insert(
                        parse_weekday(key)?,
                        DayRule {
                            enabled: schedule.enabled,
                            windows,
                        },
                    );
                }
                Some(compiled)
            }
        };

        Ok(Self {
            tz,
            simple,
            weekdays,
        })
    }

    /// Whether the worker should skip acquisition right now.
    ///
    /// The weekday schedule, when configured, takes precedence over the
    /// simple hour range. A weekday with no entry is fully active; a
    /// disabled day is fully paused; an enabled day with an empty window
    /// list is fully active; otherwise the worker runs only inside a
    /// listed window.
    pub fn should_pause(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);

        if let Some(days) = &self.weekdays {
            return match days.get(&local.weekday()) {
                None => false,
                Some(rule) if !rule.enabled => true,
                Some(rule) if rule.windows.is_empty() => false,
                Some(rule) => {
                    let time = local.time();
                    !rule
                        .windows
                        .iter()
                        .any(|(from, to)| time >= *from && time < *to)
                }
            };
        }

        if let Some((from, to)) = self.simple {
            let hour = local.hour();
            return hour >= from && hour < to;
        }

        false
    }
}
