//! HTTP-forwarding task handler
//!
//! Forwards the job's business payload to a configured HTTP endpoint and
//! translates the response into a [`JobOutcome`]: 2xx completes the job,
//! 5xx and transport failures retry, a structured 422 raises a BPMN
//! business error, and everything else becomes an incident.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::traits::{HandlerError, TaskHandler};
use super::types::{FinalFailureAction, JobOutcome};
use crate::engine::{Job, Variable};
use crate::json;
use crate::response::{self, BodyKind};

/// How the business payload is shaped from the configured job variable.
#[derive(Debug, Clone)]
pub enum PayloadStrategy {
    /// Forward the variable's value as-is (after unwrapping embedded JSON).
    ForwardRaw,
    /// Forward the value found at the given path inside the variable.
    ResolvePath(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct HttpHandlerOptions {
    pub worker_id: String,
    pub target_url: String,
    pub request_timeout: Duration,
    /// Name of the job variable carrying the business payload.
    pub payload_variable: String,
    pub strategy: PayloadStrategy,
    /// Top-level field of a 422 body that marks a modeled business error.
    pub business_error_code_field: String,
    pub business_error_message_field: String,
}

/// Handler that relays job payloads to one HTTP endpoint.
pub struct HttpTaskHandler {
    http: reqwest::Client,
    options: HttpHandlerOptions,
}

#[derive(Debug, Serialize)]
struct OutboundRequest<'a> {
    id: &'a str,
    #[serde(rename = "clientTs")]
    client_ts: String,
    data: OutboundData<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutboundData<'a> {
    job_id: &'a str,
    process_instance_id: &'a str,
    execution_id: &'a str,
    payload: Value,
}

impl HttpHandlerOptions {
    pub fn from_worker(config: &crate::config::WorkerConfig) -> Self {
        let strategy = match &config.payload_path {
            Some(path) => PayloadStrategy::ResolvePath(path.clone()),
            None => PayloadStrategy::ForwardRaw,
        };
        Self {
            worker_id: config.worker_id.clone(),
            target_url: config.target_url.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            payload_variable: config.payload_variable.clone(),
            strategy,
            business_error_code_field: config.business_error_code_field.clone(),
            business_error_message_field: config.business_error_message_field.clone(),
        }
    }
}

impl HttpTaskHandler {
    pub fn new(options: HttpHandlerOptions) -> Result<Self, HandlerError> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self { http, options })
    }

    /// Shape the business payload per the configured strategy. A missing
    /// variable or unresolvable path forwards null rather than failing
    /// the job; the endpoint decides what an empty payload means.
    fn resolve_payload(&self, variables: &HashMap<String, Value>) -> Value {
        let Some(raw) = variables.get(&self.options.payload_variable) else {
            warn!(
                variable = %self.options.payload_variable,
                "Payload variable missing, forwarding null"
            );
            return Value::Null;
        };

        match &self.options.strategy {
            PayloadStrategy::ForwardRaw => json::coerce(raw),
            PayloadStrategy::ResolvePath(path) => match json::find_path(raw, path) {
                Some(resolved) => resolved,
                None => {
                    warn!(
                        variable = %self.options.payload_variable,
                        path = %path.join("."),
                        "Payload path not found, forwarding null"
                    );
                    Value::Null
                }
            },
        }
    }

    /// Map a completed HTTP exchange to an outcome. Pure so the status
    /// taxonomy is testable without a live endpoint.
    fn interpret_response(
        &self,
        job: &Job,
        status: u16,
        content_type: Option<&str>,
        headers: BTreeMap<String, Vec<String>>,
        body: &str,
    ) -> JobOutcome {
        let target = &self.options.target_url;

        if !(200..300).contains(&status) {
            if status >= 500 {
                return JobOutcome::retry(format!("Call to {target} failed with {status}"));
            }

            if status == 422 {
                if let Some(action) = self.business_error_action(body) {
                    return JobOutcome::Final(action);
                }
            }

            return JobOutcome::Final(FinalFailureAction::Incident {
                message: format!("HTTP call failed with status {status}"),
                variables: vec![
                    Variable::integer("httpStatus", i64::from(status)),
                    Variable::string("httpResponse", body),
                ],
            });
        }

        let kind = response::classify(content_type, body);
        let (kind, value) = match kind {
            BodyKind::Json => match serde_json::from_str::<Value>(body) {
                Ok(parsed) => (BodyKind::Json, parsed),
                Err(_) => (BodyKind::Text, Value::String(body.to_string())),
            },
            other => (other, Value::String(body.to_string())),
        };

        let element = &job.element_id;
        let headers_value = serde_json::to_value(&headers).unwrap_or(Value::Null);
        let variables = vec![
            Variable::integer(format!("{element}_statusCode"), i64::from(status)),
            Variable::string(format!("{element}_response_type"), kind.as_str()),
            Variable {
                name: format!("{element}_response"),
                value: value.clone(),
                type_tag: Some(kind.type_tag().into()),
            },
            Variable::json(format!("{element}_headers"), headers_value),
            Variable {
                name: "JsonResponsePayload".into(),
                value,
                type_tag: Some(kind.type_tag().into()),
            },
        ];

        JobOutcome::success(variables)
    }

    /// A 422 body is a modeled business error only when it is a JSON
    /// object carrying the configured code field as a string.
    fn business_error_action(&self, body: &str) -> Option<FinalFailureAction> {
        let parsed: Value = serde_json::from_str(body).ok()?;
        let code = parsed
            .get(&self.options.business_error_code_field)?
            .as_str()?
            .to_string();
        let message = parsed
            .get(&self.options.business_error_message_field)
            .and_then(Value::as_str)
            .unwrap_or("Business validation failed.")
            .to_string();

        Some(FinalFailureAction::BpmnError {
            code,
            message,
            variables: vec![Variable::json("businessErrorPayload", parsed)],
        })
    }
}

#[async_trait]
impl TaskHandler for HttpTaskHandler {
    async fn handle(
        &self,
        job: &Job,
        variables: &HashMap<String, Value>,
    ) -> Result<JobOutcome, HandlerError> {
        let payload = self.resolve_payload(variables);
        let request = OutboundRequest {
            id: &self.options.worker_id,
            client_ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data: OutboundData {
                job_id: &job.id,
                process_instance_id: &job.process_instance_id,
                execution_id: &job.execution_id,
                payload,
            },
        };

        let target = &self.options.target_url;
        debug!(url = %target, job_id = %job.id, "Calling external service");
        let started = Instant::now();

        let response = match self.http.post(target).json(&request).send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Ok(JobOutcome::retry(format!(
                    "Call to {target} timed out after {} ms",
                    started.elapsed().as_millis()
                )));
            }
            Err(err) => {
                return Ok(JobOutcome::retry(format!("Call to {target} failed: {err}")));
            }
        };

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let headers = response::extract_headers(response.headers());

        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                return Ok(JobOutcome::retry(format!(
                    "Reading response from {target} failed: {err}"
                )));
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if (200..300).contains(&status) {
            info!(status, elapsed_ms, "External call succeeded");
        } else {
            warn!(status, elapsed_ms, response = %body, "External call failed");
        }

        Ok(self.interpret_response(job, status, content_type.as_deref(), headers, &body))
    }

    async fn on_final_failure(&self, job: &Job, action: &FinalFailureAction) {
        error!(job_id = %job.id, action = action.kind(), "Final failure for job");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handler(strategy: PayloadStrategy) -> HttpTaskHandler {
        HttpTaskHandler::new(HttpHandlerOptions {
            worker_id: "w1".into(),
            target_url: "http://svc.local/task".into(),
            request_timeout: Duration::from_secs(10),
            payload_variable: "JsonPayload".into(),
            strategy,
            business_error_code_field: "businessErrorCode".into(),
            business_error_message_field: "businessErrorMessage".into(),
        })
        .unwrap()
    }

    fn sample_job() -> Job {
        serde_json::from_value(json!({
            "id": "job-1",
            "processInstanceId": "pi-1",
            "executionId": "ex-1",
            "elementId": "httpTask1",
            "retries": 3
        }))
        .unwrap()
    }

    fn var_named(variables: &[Variable], name: &str) -> Variable {
        variables
            .iter()
            .find(|v| v.name == name)
            .unwrap_or_else(|| panic!("missing variable {name}"))
            .clone()
    }

    #[test]
    fn test_resolve_payload_raw_unwraps_encoded_string() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let vars = HashMap::from([("JsonPayload".to_string(), json!(r#"{"x":1}"#))]);
        assert_eq!(h.resolve_payload(&vars), json!({"x": 1}));
    }

    #[test]
    fn test_resolve_payload_missing_variable_is_null() {
        let h = handler(PayloadStrategy::ForwardRaw);
        assert_eq!(h.resolve_payload(&HashMap::new()), Value::Null);
    }

    #[test]
    fn test_resolve_payload_by_path() {
        let h = handler(PayloadStrategy::ResolvePath(vec!["payload".into()]));
        let vars = HashMap::from([(
            "JsonPayload".to_string(),
            json!(r#"{"payload":{"x":1}}"#),
        )]);
        assert_eq!(h.resolve_payload(&vars), json!({"x": 1}));

        let miss = HashMap::from([("JsonPayload".to_string(), json!({"other": 1}))]);
        assert_eq!(h.resolve_payload(&miss), Value::Null);
    }

    #[test]
    fn test_success_response_builds_scoped_variables() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let headers = BTreeMap::from([(
            "content-type".to_string(),
            vec!["application/json".to_string()],
        )]);
        let outcome = h.interpret_response(
            &sample_job(),
            200,
            Some("application/json"),
            headers,
            r#"{"ok":true}"#,
        );

        let JobOutcome::Success { variables, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(
            var_named(&variables, "httpTask1_statusCode").value,
            json!(200)
        );
        assert_eq!(
            var_named(&variables, "httpTask1_response_type").value,
            json!("json")
        );
        let response_var = var_named(&variables, "httpTask1_response");
        assert_eq!(response_var.value, json!({"ok": true}));
        assert_eq!(response_var.type_tag.as_deref(), Some("json"));
        let alias = var_named(&variables, "JsonResponsePayload");
        assert_eq!(alias.value, json!({"ok": true}));
        assert_eq!(
            var_named(&variables, "httpTask1_headers").value,
            json!({"content-type": ["application/json"]})
        );
    }

    #[test]
    fn test_success_with_unparseable_json_falls_back_to_string() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let outcome = h.interpret_response(
            &sample_job(),
            200,
            Some("application/json"),
            BTreeMap::new(),
            "{broken",
        );
        let JobOutcome::Success { variables, .. } = outcome else {
            panic!("expected success");
        };
        let response_var = var_named(&variables, "httpTask1_response");
        assert_eq!(response_var.value, json!("{broken"));
        assert_eq!(response_var.type_tag.as_deref(), Some("string"));
    }

    #[test]
    fn test_xml_response_kept_as_string_with_xml_type() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let outcome = h.interpret_response(
            &sample_job(),
            200,
            Some("application/xml"),
            BTreeMap::new(),
            "<root/>",
        );
        let JobOutcome::Success { variables, .. } = outcome else {
            panic!("expected success");
        };
        assert_eq!(
            var_named(&variables, "httpTask1_response_type").value,
            json!("xml")
        );
        assert_eq!(
            var_named(&variables, "httpTask1_response").type_tag.as_deref(),
            Some("string")
        );
    }

    #[test]
    fn test_server_error_retries() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let outcome = h.interpret_response(&sample_job(), 502, None, BTreeMap::new(), "bad gateway");
        assert!(matches!(outcome, JobOutcome::Retry { retry_after: None, .. }));
    }

    #[test]
    fn test_unprocessable_with_business_code_raises_bpmn_error() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let body = r#"{"businessErrorCode":"INVALID_INPUT","businessErrorMessage":"bad"}"#;
        let outcome = h.interpret_response(&sample_job(), 422, None, BTreeMap::new(), body);

        let JobOutcome::Final(FinalFailureAction::BpmnError {
            code,
            message,
            variables,
        }) = outcome
        else {
            panic!("expected bpmn error");
        };
        assert_eq!(code, "INVALID_INPUT");
        assert_eq!(message, "bad");
        assert_eq!(variables[0].name, "businessErrorPayload");
        assert_eq!(variables[0].type_tag.as_deref(), Some("json"));
    }

    #[test]
    fn test_unprocessable_without_code_becomes_incident() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let outcome =
            h.interpret_response(&sample_job(), 422, None, BTreeMap::new(), r#"{"nope":1}"#);
        assert!(matches!(
            outcome,
            JobOutcome::Final(FinalFailureAction::Incident { .. })
        ));
    }

    #[test]
    fn test_client_error_becomes_incident_with_diagnostics() {
        let h = handler(PayloadStrategy::ForwardRaw);
        let outcome = h.interpret_response(&sample_job(), 403, None, BTreeMap::new(), "denied");
        let JobOutcome::Final(FinalFailureAction::Incident { message, variables }) = outcome
        else {
            panic!("expected incident");
        };
        assert_eq!(message, "HTTP call failed with status 403");
        assert_eq!(var_named(&variables, "httpStatus").value, json!(403));
        assert_eq!(var_named(&variables, "httpResponse").value, json!("denied"));
    }

    #[test]
    fn test_custom_business_error_field() {
        let mut h = handler(PayloadStrategy::ForwardRaw);
        h.options.business_error_code_field = "errCode".into();
        let outcome =
            h.interpret_response(&sample_job(), 422, None, BTreeMap::new(), r#"{"errCode":"X"}"#);
        let JobOutcome::Final(FinalFailureAction::BpmnError { code, message, .. }) = outcome
        else {
            panic!("expected bpmn error");
        };
        assert_eq!(code, "X");
        assert_eq!(message, "Business validation failed.");
    }
}
