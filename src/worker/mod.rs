//! Worker engine: the poll/acquire/dispatch loop
//!
//! One `WorkerEngine` per configured worker. Each tick acquires a batch
//! of jobs under the engine lock, runs them through the handler with a
//! bounded concurrency limiter, and maps every outcome onto exactly one
//! engine reporting call. The loop sleeps one poll interval between
//! ticks regardless of how long a tick took; ticks never overlap.

mod window;

pub use window::{PauseWindow, WindowError};

use crate::config::WorkerConfig;
use crate::engine::{AcquireRequest, EngineClient, Job};
use crate::handlers::{FinalFailureAction, JobOutcome, TaskHandler};
use crate::retry::{RetryPolicy, format_iso_duration};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{Instrument, error, info, warn};

/// Shared state for the spawned per-job units.
struct WorkerContext {
    engine: EngineClient,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
}

pub struct WorkerEngine {
    ctx: Arc<WorkerContext>,
    window: PauseWindow,
    limiter: Arc<Semaphore>,
    shutdown: watch::Receiver<bool>,
}

impl WorkerEngine {
    pub fn new(
        engine: EngineClient,
        handler: Arc<dyn TaskHandler>,
        config: WorkerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Self, WindowError> {
        let window = PauseWindow::from_config(&config.pause)?;
        let limiter = Arc::new(Semaphore::new(config.max_concurrency));
        Ok(Self {
            ctx: Arc::new(WorkerContext {
                engine,
                handler,
                config,
            }),
            window,
            limiter,
            shutdown,
        })
    }

    /// Run the poll loop until shutdown is signaled. In-flight report
    /// calls finish before this returns.
    pub async fn run(mut self) {
        {
            let cfg = &self.ctx.config;
            info!(
                topic = %cfg.topic,
                worker = %cfg.worker_id,
                poll_secs = cfg.poll_period_secs,
                max_concurrency = cfg.max_concurrency,
                max_jobs = cfg.max_jobs_per_tick,
                lock = %cfg.lock_duration,
                "Worker starting"
            );
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            if self.window.should_pause(Utc::now()) {
                info!(worker = %self.ctx.config.worker_id, "Paused by configured window");
            } else {
                self.tick().await;
            }

            if self.sleep_one_interval().await {
                break;
            }
        }

        info!(worker = %self.ctx.config.worker_id, "Worker stopped");
    }

    /// Resolves once the shutdown flag flips. A dropped sender counts as
    /// shutdown.
    async fn shutdown_signal(rx: &mut watch::Receiver<bool>) {
        let _ = rx.wait_for(|stop| *stop).await;
    }

    /// Sleep exactly one poll interval; returns true when shutdown fired
    /// during the sleep.
    async fn sleep_one_interval(&mut self) -> bool {
        let interval = Duration::from_secs(self.ctx.config.poll_period_secs);
        tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            _ = Self::shutdown_signal(&mut self.shutdown) => true,
        }
    }

    /// One acquisition tick. Acquisition failures are logged and treated
    /// as an empty batch; nothing propagates past the tick.
    async fn tick(&self) {
        let cfg = &self.ctx.config;
        let request = AcquireRequest {
            worker_id: cfg.worker_id.clone(),
            max_jobs: cfg.max_jobs_per_tick,
            lock_duration: cfg.lock_duration.clone(),
            topic: cfg.topic.clone(),
            fetch_variables: true,
        };

        let jobs = match self.ctx.engine.acquire_jobs(&request).await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(error = %err, worker = %cfg.worker_id, "Acquire failed");
                return;
            }
        };

        if jobs.is_empty() {
            return;
        }
        info!(count = jobs.len(), worker = %cfg.worker_id, "Acquired jobs");

        let mut units = JoinSet::new();
        for job in jobs {
            let ctx = Arc::clone(&self.ctx);
            let limiter = Arc::clone(&self.limiter);
            let shutdown = self.shutdown.clone();
            let span = tracing::info_span!(
                "job",
                job_id = %job.id,
                process_instance = %job.process_instance_id,
                execution = %job.execution_id,
            );
            units.spawn(
                async move {
                    // Slot held for the full handle + report cycle.
                    let Ok(_permit) = limiter.acquire_owned().await else {
                        return;
                    };
                    Self::process_job(ctx, shutdown, job).await;
                }
                .instrument(span),
            );
        }

        while let Some(result) = units.join_next().await {
            if let Err(err) = result {
                error!(error = %err, "Job unit panicked");
            }
        }
    }

    async fn process_job(ctx: Arc<WorkerContext>, mut shutdown: watch::Receiver<bool>, job: Job) {
        let variables = job.variable_map();

        // Shutdown cancels the in-flight handler call; a handler that
        // already finished still gets its outcome reported.
        let outcome = tokio::select! {
            result = ctx.handler.handle(&job, &variables) => match result {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(error = %err, "Handler failed unexpectedly");
                    JobOutcome::retry(err.to_string())
                }
            },
            _ = Self::shutdown_signal(&mut shutdown) => {
                info!("Shutdown requested, abandoning job mid-flight");
                return;
            }
        };

        Self::report_outcome(&ctx, &job, outcome).await;
    }

    /// Map an outcome onto exactly one engine call. Report failures are
    /// logged loudly but never retried within the tick; the job's lock
    /// expires and the engine re-offers it.
    async fn report_outcome(ctx: &WorkerContext, job: &Job, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Success {
                variables,
                local_variables,
            } => {
                let result = ctx
                    .engine
                    .complete_job(
                        &job.id,
                        &ctx.config.worker_id,
                        &variables,
                        local_variables.as_deref(),
                    )
                    .await;
                match result {
                    Ok(()) => info!(worker = %ctx.config.worker_id, "Job completed"),
                    Err(err) => error!(error = %err, "Complete request rejected by engine"),
                }
            }

            JobOutcome::Retry {
                message,
                retry_after,
            } => {
                let remaining = job.retries - 1;
                if remaining <= 0 {
                    warn!(job_id = %job.id, "Retry budget exhausted, escalating to incident");
                    Self::final_failure(
                        ctx,
                        job,
                        FinalFailureAction::Incident {
                            message,
                            variables: vec![],
                        },
                    )
                    .await;
                    return;
                }

                let attempt = RetryPolicy::attempt_for(ctx.config.initial_retries, job.retries);
                let timeout =
                    retry_after.unwrap_or_else(|| ctx.config.retry.compute_backoff(attempt));
                let result = ctx
                    .engine
                    .fail_job(
                        &job.id,
                        &ctx.config.worker_id,
                        remaining,
                        &format_iso_duration(timeout),
                        &message,
                    )
                    .await;
                match result {
                    Ok(()) => warn!(
                        retries_left = remaining,
                        backoff_secs = timeout.as_secs(),
                        "Job failed, retry scheduled"
                    ),
                    Err(err) => error!(error = %err, "Fail request rejected by engine"),
                }
            }

            JobOutcome::Final(action) => Self::final_failure(ctx, job, action).await,
        }
    }

    async fn final_failure(ctx: &WorkerContext, job: &Job, action: FinalFailureAction) {
        ctx.handler.on_final_failure(job, &action).await;

        match action {
            FinalFailureAction::Complete { variables } => {
                let result = ctx
                    .engine
                    .complete_job(&job.id, &ctx.config.worker_id, &variables, None)
                    .await;
                match result {
                    Ok(()) => info!("Job completed by final-failure action"),
                    Err(err) => error!(error = %err, "Complete request rejected by engine"),
                }
            }

            FinalFailureAction::BpmnError {
                code,
                message,
                variables,
            } => {
                let result = ctx
                    .engine
                    .raise_bpmn_error(&job.id, &ctx.config.worker_id, &code, &message, &variables)
                    .await;
                match result {
                    Ok(()) => warn!(error_code = %code, "Business error raised"),
                    Err(err) => error!(error = %err, "BpmnError request rejected by engine"),
                }
            }

            // Diagnostic variables stay with the observability hook; the
            // engine's fail endpoint only carries the message.
            FinalFailureAction::Incident { message, .. } => {
                let timeout = Duration::from_secs(ctx.config.retry.initial_delay_secs);
                let result = ctx
                    .engine
                    .fail_job(
                        &job.id,
                        &ctx.config.worker_id,
                        0,
                        &format_iso_duration(timeout),
                        &message,
                    )
                    .await;
                match result {
                    Ok(()) => warn!(message = %message, "Incident raised, retries exhausted"),
                    Err(err) => error!(error = %err, "Fail request rejected by engine"),
                }
            }
        }
    }
}
