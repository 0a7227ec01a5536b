//! Job outcome state machine

use crate::engine::Variable;
use std::time::Duration;

/// Terminal outcome of one job attempt. Exactly one applies per attempt;
/// the worker engine maps it onto the engine's reporting calls.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    /// Write the variables back and complete the job.
    Success {
        variables: Vec<Variable>,
        local_variables: Option<Vec<Variable>>,
    },
    /// Transient failure; fail the job with a backoff so the engine
    /// re-offers it. `retry_after` overrides the computed backoff.
    Retry {
        message: String,
        retry_after: Option<Duration>,
    },
    /// Unrecoverable for this job; the action decides how it ends.
    Final(FinalFailureAction),
}

impl JobOutcome {
    pub fn success(variables: Vec<Variable>) -> Self {
        Self::Success {
            variables,
            local_variables: None,
        }
    }

    pub fn retry(message: impl Into<String>) -> Self {
        Self::Retry {
            message: message.into(),
            retry_after: None,
        }
    }
}

/// How a final failure is reported to the engine. Chosen by the
/// handler, never inferred.
#[derive(Debug, Clone)]
pub enum FinalFailureAction {
    /// Technical fault requiring operator attention; retries go to zero.
    Incident {
        message: String,
        variables: Vec<Variable>,
    },
    /// Give up but complete the job with the given variables.
    Complete { variables: Vec<Variable> },
    /// Modeled business exception routed to a BPMN boundary event.
    BpmnError {
        code: String,
        message: String,
        variables: Vec<Variable>,
    },
}

impl FinalFailureAction {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FinalFailureAction::Incident { .. } => "incident",
            FinalFailureAction::Complete { .. } => "complete",
            FinalFailureAction::BpmnError { .. } => "bpmnError",
        }
    }
}
