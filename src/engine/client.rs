//! REST client for the engine's external job API

use super::job::{AcquireRequest, Job, Variable};
use crate::config::EngineConfig;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine returned {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Client for the acquire/complete/fail/bpmnError endpoints.
///
/// One instance per process; it is cheap to clone and safe to share
/// across concurrent job units.
#[derive(Debug, Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    pass: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteRequest<'a> {
    worker_id: &'a str,
    variables: &'a [Variable],
    #[serde(skip_serializing_if = "Option::is_none")]
    local_variables: Option<&'a [Variable]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FailRequest<'a> {
    worker_id: &'a str,
    retries: i32,
    retry_timeout: &'a str,
    error_message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BpmnErrorRequest<'a> {
    worker_id: &'a str,
    error_code: &'a str,
    error_message: &'a str,
    variables: &'a [Variable],
}

impl EngineClient {
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}/", config.base_url.trim_end_matches('/')),
            user: config.user.clone(),
            pass: config.pass.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.url(path))
            .basic_auth(&self.user, Some(&self.pass))
            .json(body)
            .send()
            .await?;
        Ok(response)
    }

    /// Ensure a success status, turning anything else into an error that
    /// carries the response body for logging.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EngineError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Acquire a batch of jobs under the worker's lock.
    pub async fn acquire_jobs(&self, request: &AcquireRequest) -> Result<Vec<Job>> {
        let response = self.post_json("acquire/jobs", request).await?;
        let response = Self::ensure_success(response).await?;
        let jobs = response.json::<Vec<Job>>().await?;
        debug!(count = jobs.len(), topic = %request.topic, "Acquired jobs");
        Ok(jobs)
    }

    pub async fn complete_job(
        &self,
        job_id: &str,
        worker_id: &str,
        variables: &[Variable],
        local_variables: Option<&[Variable]>,
    ) -> Result<()> {
        let body = CompleteRequest {
            worker_id,
            variables,
            local_variables,
        };
        let response = self
            .post_json(&format!("acquire/jobs/{job_id}/complete"), &body)
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    pub async fn fail_job(
        &self,
        job_id: &str,
        worker_id: &str,
        retries: i32,
        retry_timeout: &str,
        error_message: &str,
    ) -> Result<()> {
        let body = FailRequest {
            worker_id,
            retries,
            retry_timeout,
            error_message,
        };
        let response = self
            .post_json(&format!("acquire/jobs/{job_id}/fail"), &body)
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }

    pub async fn raise_bpmn_error(
        &self,
        job_id: &str,
        worker_id: &str,
        error_code: &str,
        error_message: &str,
        variables: &[Variable],
    ) -> Result<()> {
        let body = BpmnErrorRequest {
            worker_id,
            error_code,
            error_message,
            variables,
        };
        let response = self
            .post_json(&format!("acquire/jobs/{job_id}/bpmnError"), &body)
            .await?;
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complete_request_omits_empty_local_variables() {
        let variables = vec![Variable::integer("n", 1)];
        let body = CompleteRequest {
            worker_id: "w1",
            variables: &variables,
            local_variables: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "workerId": "w1",
                "variables": [{"name": "n", "value": 1, "type": "integer"}]
            })
        );
    }

    #[test]
    fn test_fail_request_wire_shape() {
        let body = FailRequest {
            worker_id: "w1",
            retries: 2,
            retry_timeout: "PT60S",
            error_message: "boom",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({
                "workerId": "w1",
                "retries": 2,
                "retryTimeout": "PT60S",
                "errorMessage": "boom"
            })
        );
    }
}
