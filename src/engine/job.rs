//! Engine wire model for external jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One named job variable. Values are plain JSON trees; the optional
/// type tag is whatever the engine understands ("string", "integer",
/// "json", ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_tag: Option<String>,
}

impl Variable {
    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Value::String(value.into()),
            type_tag: Some("string".into()),
        }
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value: Value::from(value),
            type_tag: Some("integer".into()),
        }
    }

    pub fn boolean(name: impl Into<String>, value: bool) -> Self {
        Self {
            name: name.into(),
            value: Value::Bool(value),
            type_tag: Some("boolean".into()),
        }
    }

    pub fn json(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            type_tag: Some("json".into()),
        }
    }
}

/// An external job as returned by the acquire endpoint.
///
/// The engine is the sole authority on job state; this struct is a
/// read-only snapshot taken under the acquisition lock.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub correlation_id: String,
    #[serde(default)]
    pub process_instance_id: String,
    #[serde(default)]
    pub process_definition_id: String,
    #[serde(default)]
    pub execution_id: String,
    #[serde(default)]
    pub scope_id: Option<String>,
    #[serde(default)]
    pub sub_scope_id: Option<String>,
    #[serde(default)]
    pub scope_definition_id: Option<String>,
    #[serde(default)]
    pub scope_type: Option<String>,
    #[serde(default)]
    pub element_id: String,
    #[serde(default)]
    pub element_name: String,
    #[serde(default)]
    pub retries: i32,
    #[serde(default)]
    pub exception_message: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub create_time: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub lock_owner: Option<String>,
    #[serde(default)]
    pub lock_expiration_time: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

impl Job {
    /// Name → value lookup. Variable names are not unique on the wire;
    /// the last occurrence wins.
    pub fn variable_map(&self) -> HashMap<String, Value> {
        self.variables
            .iter()
            .map(|v| (v.name.clone(), v.value.clone()))
            .collect()
    }

    pub fn lock_expiration(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.lock_expiration_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// A job is only safe to process while its lock is held.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.lock_expiration().is_some_and(|exp| exp > now)
    }
}

/// Body of the acquire call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcquireRequest {
    pub worker_id: String,
    pub max_jobs: u32,
    pub lock_duration: String,
    pub topic: String,
    pub fetch_variables: bool,
}
