//! `critter worker`: serves the image retrieval task until shutdown.

use std::time::Duration;

use critter_camunda::{JobWorker, StaticVariablesHandler, TokenSession, WorkerConfig};

use crate::config::{WorkerArgs, into_variables};
use crate::shutdown::cancel_on_shutdown;
use crate::{TRACING_TARGET_COMMAND, TRACING_TARGET_SHUTDOWN};

pub async fn run(session: TokenSession, args: WorkerArgs) -> anyhow::Result<()> {
    // Fail fast on bad credentials instead of logging them every poll.
    session.ensure_token().await?;

    let variables = into_variables(&args.variables);
    if variables.is_empty() {
        tracing::warn!(
            target: TRACING_TARGET_COMMAND,
            "No --set variables given, jobs are completed without output variables"
        );
    }

    let mut config = WorkerConfig {
        job_type: args.job_type.clone(),
        job_timeout: Duration::from_secs(args.job_timeout),
        max_jobs: args.max_jobs,
        poll_interval: args.poll_interval(),
        ..WorkerConfig::default()
    };
    if let Some(name) = args.worker_name {
        config.worker_name = name;
    }

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        job_type = %config.job_type,
        worker = %config.worker_name,
        poll_interval_secs = config.poll_interval.as_secs(),
        variables = ?variables.keys().collect::<Vec<_>>(),
        "Worker configured"
    );

    let worker = JobWorker::new(session, StaticVariablesHandler::new(variables), config);
    worker.spawn(cancel_on_shutdown()).await?;

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "Worker stopped");
    Ok(())
}
