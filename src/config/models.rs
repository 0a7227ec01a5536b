use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

/// Engine connection settings. Credentials are never read from the
/// config file, only from the environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(skip)]
    pub user: String,
    #[serde(skip)]
    pub pass: String,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user: String::new(),
            pass: String::new(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/external-job-api".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

/// One polling worker. A process can run several, each with its own
/// topic, endpoint, and scheduling policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    pub topic: String,
    pub worker_id: String,
    #[serde(default = "default_lock_duration")]
    pub lock_duration: String,
    #[serde(default = "default_max_jobs_per_tick")]
    pub max_jobs_per_tick: u32,
    #[serde(default = "default_poll_period_secs")]
    pub poll_period_secs: u64,
    /// Cap on concurrently processed jobs within one worker.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Retry budget assumed for freshly created jobs; used to derive the
    /// backoff attempt number.
    #[serde(default = "default_initial_retries")]
    pub initial_retries: u32,
    /// Business endpoint the handler forwards payloads to.
    pub target_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_payload_variable")]
    pub payload_variable: String,
    /// When set, forward only the value at this path inside the payload
    /// variable; when absent, forward the whole (unwrapped) value.
    #[serde(default)]
    pub payload_path: Option<Vec<String>>,
    #[serde(default = "default_business_error_code_field")]
    pub business_error_code_field: String,
    #[serde(default = "default_business_error_message_field")]
    pub business_error_message_field: String,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub pause: PauseConfig,
}

fn default_lock_duration() -> String {
    "PT30S".to_string()
}

fn default_max_jobs_per_tick() -> u32 {
    5
}

fn default_poll_period_secs() -> u64 {
    3
}

fn default_max_concurrency() -> usize {
    2
}

fn default_initial_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_payload_variable() -> String {
    "JsonPayload".to_string()
}

fn default_business_error_code_field() -> String {
    "businessErrorCode".to_string()
}

fn default_business_error_message_field() -> String {
    "businessErrorMessage".to_string()
}

/// Pause scheduling: either a simple daily hour range, or a per-weekday
/// schedule of active time-of-day windows. The weekday schedule wins
/// when both are present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PauseConfig {
    #[serde(default = "default_time_zone")]
    pub time_zone: String,
    #[serde(default)]
    pub from_hour: Option<u32>,
    #[serde(default)]
    pub to_hour_exclusive: Option<u32>,
    /// Keyed by lower-case weekday abbreviation: mon, tue, wed, thu,
    /// fri, sat, sun.
    #[serde(default)]
    pub weekdays: Option<HashMap<String, DaySchedule>>,
}

impl Default for PauseConfig {
    fn default() -> Self {
        Self {
            time_zone: default_time_zone(),
            from_hour: None,
            to_hour_exclusive: None,
            weekdays: None,
        }
    }
}

fn default_time_zone() -> String {
    "Europe/Prague".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaySchedule {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Active windows within the day. An empty list means the whole day
    /// is active.
    #[serde(default)]
    pub windows: Vec<TimeWindow>,
}

fn default_enabled() -> bool {
    true
}

/// `HH:MM` wall-clock window, `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeWindow {
    pub from: String,
    pub to: String,
}
