//! Polling job worker for service tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::job::{ActivateJobs, ActivatedJob, FailJob};
use crate::launcher::SERVICE_TASK_JOB_TYPE;
use crate::session::TokenSession;
use crate::types::Variables;

/// Tracing target for the job worker.
pub const TRACING_TARGET: &str = "critter_camunda::worker";

/// Default lock duration of activated jobs.
///
/// Slow third-party services can take up to 45 seconds to answer, so the
/// lock is held for a full minute.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of jobs activated per poll.
pub const DEFAULT_MAX_JOBS: u32 = 5;

/// Default pause between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// What a [`JobHandler`] decided for a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Complete the job with these output variables.
    Complete(Variables),
    /// Fail the job.
    Fail {
        /// Reason reported to the engine.
        message: String,
        /// Retries left; `None` decrements the job's current retries.
        retries: Option<i32>,
    },
}

impl JobOutcome {
    /// Fails the job, decrementing its retries.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail {
            message: message.into(),
            retries: None,
        }
    }
}

/// Business logic executed for each activated job.
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    /// Handles one job. An error fails the job with the error's message.
    async fn handle(&self, job: &ActivatedJob) -> Result<JobOutcome>;
}

/// Handler completing every job with the same variables.
#[derive(Debug, Clone, Default)]
pub struct StaticVariablesHandler {
    variables: Variables,
}

impl StaticVariablesHandler {
    /// Creates a handler completing jobs with `variables`.
    pub fn new(variables: Variables) -> Self {
        Self { variables }
    }
}

#[async_trait::async_trait]
impl JobHandler for StaticVariablesHandler {
    async fn handle(&self, _job: &ActivatedJob) -> Result<JobOutcome> {
        Ok(JobOutcome::Complete(self.variables.clone()))
    }
}

/// Worker settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Job type to activate.
    pub job_type: String,
    /// Name reported to the engine.
    pub worker_name: String,
    /// Lock duration of activated jobs.
    pub job_timeout: Duration,
    /// Jobs activated per poll.
    pub max_jobs: u32,
    /// Pause between polls.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            job_type: SERVICE_TASK_JOB_TYPE.to_owned(),
            worker_name: format!("critter-worker-{}", std::process::id()),
            job_timeout: DEFAULT_JOB_TIMEOUT,
            max_jobs: DEFAULT_MAX_JOBS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Summary of one poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Jobs activated.
    pub activated: usize,
    /// Jobs completed.
    pub completed: usize,
    /// Jobs reported as failed.
    pub failed: usize,
    /// Jobs whose completion or failure could not be reported.
    pub errors: usize,
}

/// Activates jobs of one type and dispatches them to a [`JobHandler`].
pub struct JobWorker {
    session: TokenSession,
    handler: Arc<dyn JobHandler>,
    config: WorkerConfig,
}

impl std::fmt::Debug for JobWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl JobWorker {
    /// Creates a worker.
    pub fn new(session: TokenSession, handler: impl JobHandler + 'static, config: WorkerConfig) -> Self {
        Self {
            session,
            handler: Arc::new(handler),
            config,
        }
    }

    /// Returns the worker settings.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Activates one batch of jobs and handles each of them.
    ///
    /// Failing to report the outcome of one job is logged and does not stop
    /// the rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns an error if no token can be obtained or activation fails.
    pub async fn poll_once(&self) -> Result<PollReport> {
        self.session.ensure_token().await?;
        let client = self.session.client();

        let activation = ActivateJobs::new(
            self.config.job_type.clone(),
            self.config.job_timeout,
            self.config.max_jobs,
        )
        .with_worker(self.config.worker_name.clone());

        let jobs = client.activate_jobs(&activation).await?;
        let mut report = PollReport {
            activated: jobs.len(),
            ..PollReport::default()
        };

        for job in &jobs {
            tracing::debug!(
                target: TRACING_TARGET,
                job_key = %job.job_key,
                process_instance_key = %job.process_instance_key,
                "Handling job"
            );

            let outcome = match self.handler.handle(job).await {
                Ok(outcome) => outcome,
                Err(e) => JobOutcome::fail(e.to_string()),
            };

            let reported = match outcome {
                JobOutcome::Complete(variables) => client
                    .complete_job(&job.job_key, &variables)
                    .await
                    .map(|()| report.completed += 1),
                JobOutcome::Fail { message, retries } => {
                    let retries = retries.unwrap_or((job.retries - 1).max(0));
                    client
                        .fail_job(&job.job_key, &FailJob::new(message, retries))
                        .await
                        .map(|()| report.failed += 1)
                }
            };

            if let Err(e) = reported {
                report.errors += 1;
                tracing::error!(
                    target: TRACING_TARGET,
                    job_key = %job.job_key,
                    error = %e,
                    "Failed to report job outcome"
                );
            }
        }

        tracing::info!(
            target: TRACING_TARGET,
            activated = report.activated,
            completed = report.completed,
            failed = report.failed,
            errors = report.errors,
            "Poll finished"
        );

        Ok(report)
    }

    /// Polls until `cancel_token` fires.
    ///
    /// Errors of a single poll are logged and the loop continues after the
    /// poll interval.
    #[tracing::instrument(
        skip(self, cancel_token),
        fields(job_type = %self.config.job_type, worker = %self.config.worker_name),
        target = TRACING_TARGET,
        name = "job_worker"
    )]
    pub async fn run(self, cancel_token: CancellationToken) {
        tracing::info!(target: TRACING_TARGET, "Starting job worker");

        loop {
            if let Err(e) = self.poll_once().await {
                tracing::error!(target: TRACING_TARGET, error = %e, "Poll failed");
            }

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::info!(target: TRACING_TARGET, "Shutdown requested, stopping job worker");
                    break;
                }
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }

    /// Spawns the worker as a background task.
    pub fn spawn(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel_token))
    }
}
