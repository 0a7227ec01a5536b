//! Configuration validation
//!
//! Runs once after deserialization; a process with an invalid worker
//! definition refuses to start rather than limping along.

use super::models::{Config, PauseConfig, WorkerConfig};
use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;

const WEEKDAY_KEYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no workers configured")]
    NoWorkers,

    #[error("engine base_url must not be empty")]
    MissingBaseUrl,

    #[error("worker {worker}: {field} must not be empty")]
    MissingField { worker: String, field: &'static str },

    #[error("worker {worker}: {field} must be at least 1")]
    ZeroLimit { worker: String, field: &'static str },

    #[error("worker {worker}: backoff multiplier {value} must be >= 1.0")]
    InvalidMultiplier { worker: String, value: f64 },

    #[error("worker {worker}: unknown time zone '{zone}'")]
    UnknownTimeZone { worker: String, zone: String },

    #[error("worker {worker}: pause hours {from}..{to} are invalid (0..=24, from < to)")]
    InvalidHourRange { worker: String, from: u32, to: u32 },

    #[error("worker {worker}: pause from_hour and to_hour_exclusive must be set together")]
    HalfOpenHourRange { worker: String },

    #[error("worker {worker}: unknown weekday key '{key}' (expected mon..sun)")]
    UnknownWeekday { worker: String, key: String },

    #[error("worker {worker}: window '{from}'..'{to}' is invalid (HH:MM, from < to)")]
    InvalidWindow {
        worker: String,
        from: String,
        to: String,
    },
}

pub fn validate(config: &Config) -> Result<(), ValidationError> {
    if config.engine.base_url.trim().is_empty() {
        return Err(ValidationError::MissingBaseUrl);
    }
    if config.workers.is_empty() {
        return Err(ValidationError::NoWorkers);
    }
    for worker in &config.workers {
        validate_worker(worker)?;
    }
    Ok(())
}

fn validate_worker(worker: &WorkerConfig) -> Result<(), ValidationError> {
    let id = worker.worker_id.clone();
    let require = |value: &str, field: &'static str| {
        if value.trim().is_empty() {
            Err(ValidationError::MissingField {
                worker: id.clone(),
                field,
            })
        } else {
            Ok(())
        }
    };
    require(&worker.worker_id, "worker_id")?;
    require(&worker.topic, "topic")?;
    require(&worker.target_url, "target_url")?;
    require(&worker.lock_duration, "lock_duration")?;
    require(&worker.payload_variable, "payload_variable")?;
    require(&worker.business_error_code_field, "business_error_code_field")?;

    if worker.max_concurrency == 0 {
        return Err(ValidationError::ZeroLimit {
            worker: id,
            field: "max_concurrency",
        });
    }
    if worker.max_jobs_per_tick == 0 {
        return Err(ValidationError::ZeroLimit {
            worker: id,
            field: "max_jobs_per_tick",
        });
    }
    if worker.retry.backoff_multiplier < 1.0 {
        return Err(ValidationError::InvalidMultiplier {
            worker: id,
            value: worker.retry.backoff_multiplier,
        });
    }

    validate_pause(&id, &worker.pause)
}

fn validate_pause(worker: &str, pause: &PauseConfig) -> Result<(), ValidationError> {
    if pause.time_zone.parse::<Tz>().is_err() {
        return Err(ValidationError::UnknownTimeZone {
            worker: worker.to_string(),
            zone: pause.time_zone.clone(),
        });
    }

    match (pause.from_hour, pause.to_hour_exclusive) {
        (None, None) => {}
        (Some(from), Some(to)) => {
            if from >= to || to > 24 {
                return Err(ValidationError::InvalidHourRange {
                    worker: worker.to_string(),
                    from,
                    to,
                });
            }
        }
        _ => {
            return Err(ValidationError::HalfOpenHourRange {
                worker: worker.to_string(),
            });
        }
    }

    if let Some(weekdays) = &pause.weekdays {
        for (key, schedule) in weekdays {
            if !WEEKDAY_KEYS.contains(&key.as_str()) {
                return Err(ValidationError::UnknownWeekday {
                    worker: worker.to_string(),
                    key: key.clone(),
                });
            }
            for window in &schedule.windows {
                let parsed_from = NaiveTime::parse_from_str(&window.from, "%H:%M");
                let parsed_to = NaiveTime::parse_from_str(&window.to, "%H:%M");
                match (parsed_from, parsed_to) {
                    (Ok(from), Ok(to)) if from < to => {}
                    _ => {
                        return Err(ValidationError::InvalidWindow {
                            worker: worker.to_string(),
                            from: window.from.clone(),
                            to: window.to.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::{DaySchedule, EngineConfig, TimeWindow};

    fn sample_worker() -> WorkerConfig {
        toml::from_str(
            r#"
topic = "httpTask"
worker_id = "w1"
target_url = "http://svc/task"
            "#,
        )
        .unwrap()
    }

    fn sample_config() -> Config {
        Config {
            engine: EngineConfig::default(),
            workers: vec![sample_worker()],
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&sample_config()).is_ok());
    }

    #[test]
    fn test_empty_workers_rejected() {
        let config = Config {
            workers: vec![],
            ..sample_config()
        };
        assert!(matches!(validate(&config), Err(ValidationError::NoWorkers)));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let mut config = sample_config();
        config.workers[0].topic = " ".into();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::MissingField { field: "topic", .. })
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = sample_config();
        config.workers[0].max_concurrency = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroLimit {
                field: "max_concurrency",
                ..
            })
        ));
    }

    #[test]
    fn test_shrinking_multiplier_rejected() {
        let mut config = sample_config();
        config.workers[0].retry.backoff_multiplier = 0.5;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidMultiplier { .. })
        ));
    }

    #[test]
    fn test_unknown_time_zone_rejected() {
        let mut config = sample_config();
        config.workers[0].pause.time_zone = "Mars/Olympus".into();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnknownTimeZone { .. })
        ));
    }

    #[test]
    fn test_inverted_hour_range_rejected() {
        let mut config = sample_config();
        config.workers[0].pause.from_hour = Some(15);
        config.workers[0].pause.to_hour_exclusive = Some(14);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidHourRange { .. })
        ));
    }

    #[test]
    fn test_half_open_hour_range_rejected() {
        let mut config = sample_config();
        config.workers[0].pause.from_hour = Some(14);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::HalfOpenHourRange { .. })
        ));
    }

    #[test]
    fn test_bad_weekday_key_rejected() {
        let mut config = sample_config();
        config.workers[0].pause.weekdays = Some(
            [(
                "monday".to_string(),
                DaySchedule {
                    enabled: true,
                    windows: vec![],
                },
            )]
            .into(),
        );
        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnknownWeekday { .. })
        ));
    }

    #[test]
    fn test_bad_window_rejected() {
        let mut config = sample_config();
        config.workers[0].pause.weekdays = Some(
            [(
                "mon".to_string(),
                DaySchedule {
                    enabled: true,
                    windows: vec![TimeWindow {
                        from: "17:00".into(),
                        to: "08:00".into(),
                    }],
                },
            )]
            .into(),
        );
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidWindow { .. })
        ));
    }
}
