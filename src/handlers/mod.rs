//! Task handlers
//!
//! The [`TaskHandler`] trait is the seam between the worker engine and
//! the unit of work. The shipped implementation forwards job payloads to
//! an HTTP endpoint; the payload shaping strategy is the only thing that
//! differs between deployments.

mod http;
mod traits;
mod types;

pub use http::{HttpHandlerOptions, HttpTaskHandler, PayloadStrategy};
pub use traits::{HandlerError, TaskHandler};
pub use types::{FinalFailureAction, JobOutcome};
