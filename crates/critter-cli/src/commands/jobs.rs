//! `critter jobs` subcommands.

use std::io::Write;
use std::time::Duration;

use critter_camunda::{ActivateJobs, FailJob, JobKey, ProcessInstanceKey, TokenSession};
use serde_json::json;

use super::print_json;
use crate::config::{JobsCommand, into_variables};

pub async fn execute<W: Write>(
    session: &TokenSession,
    command: JobsCommand,
    out: &mut W,
) -> anyhow::Result<()> {
    session.ensure_token().await?;
    let client = session.client();

    match command {
        JobsCommand::Search { key, job_type } => {
            let jobs = client
                .search_jobs(&ProcessInstanceKey::new(key), &job_type)
                .await?;
            print_json(out, &jobs)
        }
        JobsCommand::Activate {
            job_type,
            max_jobs,
            timeout,
            worker,
        } => {
            let activation = ActivateJobs::new(job_type, Duration::from_secs(timeout), max_jobs)
                .with_worker(worker);
            let jobs = client.activate_jobs(&activation).await?;
            print_json(out, &jobs)
        }
        JobsCommand::Complete { key, variables } => {
            let key = JobKey::new(key);
            client.complete_job(&key, &into_variables(&variables)).await?;
            print_json(out, &json!({ "jobKey": key, "completed": true }))
        }
        JobsCommand::Fail {
            key,
            message,
            retries,
        } => {
            let key = JobKey::new(key);
            client.fail_job(&key, &FailJob::new(message, retries)).await?;
            print_json(out, &json!({ "jobKey": key, "failed": true, "retries": retries }))
        }
    }
}
