//! Job search, activation, completion and failure.

use std::time::Duration;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{CamundaClient, TRACING_TARGET};
use crate::error::Result;
use crate::types::{JobKey, ProcessDefinitionKey, ProcessInstanceKey, SearchResult, Variables};

/// Job as returned by job search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobItem {
    pub job_key: JobKey,
    #[serde(rename = "type")]
    pub job_type: String,
    pub process_instance_key: ProcessInstanceKey,
    #[serde(default)]
    pub element_id: Option<String>,
    /// `CREATED`, `COMPLETED`, `FAILED`, ...
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub retries: Option<i32>,
    #[serde(default)]
    pub worker: Option<String>,
}

/// Job handed to a worker by activation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedJob {
    /// Key of the job, used to complete or fail it.
    pub job_key: JobKey,
    /// Job type, i.e. the service task type.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Process instance the job belongs to.
    pub process_instance_key: ProcessInstanceKey,
    /// Process definition the job belongs to.
    #[serde(default)]
    pub process_definition_key: Option<ProcessDefinitionKey>,
    /// BPMN process id.
    #[serde(default)]
    pub process_definition_id: Option<String>,
    /// Id of the service task element.
    #[serde(default)]
    pub element_id: Option<String>,
    /// Remaining retries.
    #[serde(default)]
    pub retries: i32,
    /// Worker the job was activated for.
    #[serde(default)]
    pub worker: Option<String>,
    /// Custom task headers.
    #[serde(default)]
    pub custom_headers: serde_json::Map<String, serde_json::Value>,
    /// Variables visible to the job.
    #[serde(default)]
    pub variables: Variables,
}

impl ActivatedJob {
    /// Returns a string variable of the job.
    #[must_use]
    pub fn variable_str(&self, name: &str) -> Option<&str> {
        self.variables.get(name).and_then(serde_json::Value::as_str)
    }
}

/// Parameters of a job activation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateJobs {
    /// Job type to activate.
    #[serde(rename = "type")]
    pub job_type: String,
    /// Lock duration in milliseconds.
    pub timeout: u64,
    /// Maximum number of jobs returned.
    pub max_jobs_to_activate: u32,
    /// Name of the worker activating the jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker: Option<String>,
    /// Variables to fetch; all variables when empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fetch_variable: Vec<String>,
    /// Long-polling duration in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
}

impl ActivateJobs {
    /// Creates an activation request for a job type.
    pub fn new(job_type: impl Into<String>, timeout: Duration, max_jobs_to_activate: u32) -> Self {
        Self {
            job_type: job_type.into(),
            timeout: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            max_jobs_to_activate,
            worker: None,
            fetch_variable: Vec::new(),
            request_timeout: None,
        }
    }

    /// Sets the worker name reported to the engine.
    #[must_use]
    pub fn with_worker(mut self, worker: impl Into<String>) -> Self {
        self.worker = Some(worker.into());
        self
    }

    /// Restricts the variables fetched with each job.
    #[must_use]
    pub fn with_fetch_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetch_variable = names.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Deserialize)]
struct ActivatedJobs {
    #[serde(default)]
    jobs: Vec<ActivatedJob>,
}

/// Parameters of a job failure.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailJob {
    /// Retries left after this failure; zero raises an incident.
    pub retries: i32,
    /// Reason of the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Back-off before the job is retried, in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_back_off: Option<u64>,
    /// Variables set on the failing task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Variables>,
}

impl FailJob {
    /// Creates a failure with the given message and remaining retries.
    pub fn new(error_message: impl Into<String>, retries: i32) -> Self {
        Self {
            retries,
            error_message: Some(error_message.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobFilter<'a> {
    process_instance_key: &'a ProcessInstanceKey,
    #[serde(rename = "type")]
    job_type: &'a str,
}

#[derive(Debug, Serialize)]
struct JobSearch<'a> {
    filter: JobFilter<'a>,
}

#[derive(Debug, Serialize)]
struct CompleteJob<'a> {
    variables: &'a Variables,
}

impl CamundaClient {
    /// Searches the jobs of a given type within a process instance.
    pub async fn search_jobs(
        &self,
        process_instance_key: &ProcessInstanceKey,
        job_type: &str,
    ) -> Result<SearchResult<JobItem>> {
        let body = JobSearch {
            filter: JobFilter {
                process_instance_key,
                job_type,
            },
        };

        let request = self.request_json(Method::POST, &["jobs", "search"], &body).await?;
        let result: SearchResult<JobItem> = self.send_json(request, "search jobs").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            %process_instance_key,
            job_type,
            found = result.items.len(),
            "Jobs searched"
        );

        Ok(result)
    }

    /// Returns the key of the first job of a type within a process instance.
    pub async fn first_job_key(
        &self,
        process_instance_key: &ProcessInstanceKey,
        job_type: &str,
    ) -> Result<Option<JobKey>> {
        let result = self.search_jobs(process_instance_key, job_type).await?;
        Ok(result.items.into_iter().next().map(|job| job.job_key))
    }

    /// Activates jobs of a type for this worker.
    pub async fn activate_jobs(&self, activation: &ActivateJobs) -> Result<Vec<ActivatedJob>> {
        let request = self
            .request_json(Method::POST, &["jobs", "activation"], activation)
            .await?;
        let activated: ActivatedJobs = self.send_json(request, "activate jobs").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            job_type = %activation.job_type,
            activated = activated.jobs.len(),
            "Jobs activated"
        );

        Ok(activated.jobs)
    }

    /// Completes a job, merging `variables` into the process instance.
    pub async fn complete_job(&self, job_key: &JobKey, variables: &Variables) -> Result<()> {
        let path = ["jobs", job_key.as_str(), "completion"];
        let request = self
            .request_json(Method::POST, &path, &CompleteJob { variables })
            .await?;
        self.send_empty(request, "complete job").await?;

        tracing::info!(target: TRACING_TARGET, %job_key, "Job completed");
        Ok(())
    }

    /// Reports a job as failed.
    pub async fn fail_job(&self, job_key: &JobKey, failure: &FailJob) -> Result<()> {
        let path = ["jobs", job_key.as_str(), "failure"];
        let request = self.request_json(Method::POST, &path, failure).await?;
        self.send_empty(request, "fail job").await?;

        tracing::warn!(
            target: TRACING_TARGET,
            %job_key,
            retries = failure.retries,
            error_message = failure.error_message.as_deref().unwrap_or_default(),
            "Job failed"
        );
        Ok(())
    }
}
