//! Workflow engine integration: wire model and REST client

mod client;
mod job;

pub use client::{EngineClient, EngineError};
pub use job::{AcquireRequest, Job, Variable};
