use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::types::{FinalFailureAction, JobOutcome};
use crate::engine::Job;

/// Local handler failures. These are bugs or environment problems inside
/// the handler itself, not business outcomes; the worker engine maps
/// them to a retry so jobs are never silently lost.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("failed to build outbound payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("handler failed: {0}")]
    Internal(String),
}

/// Task handler seam. Handlers perform one unit of work for an acquired
/// job and report the result as a [`JobOutcome`] value; control flow
/// through errors is reserved for genuine handler faults.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Execute the job. `variables` is the name → value map built from
    /// the job's variable list (last write wins).
    async fn handle(
        &self,
        job: &Job,
        variables: &HashMap<String, Value>,
    ) -> Result<JobOutcome, HandlerError>;

    /// Observability hook invoked before a final failure is reported to
    /// the engine. Must not change state.
    async fn on_final_failure(&self, _job: &Job, _action: &FinalFailureAction) {}
}
