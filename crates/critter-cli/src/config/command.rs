//! Subcommands and their arguments.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use critter_camunda::launcher::{ASSET_DIR, OUTPUT_ANIMAL_URL_VAR, SERVICE_TASK_JOB_TYPE};
use critter_camunda::worker::{DEFAULT_JOB_TIMEOUT, DEFAULT_MAX_JOBS, DEFAULT_POLL_INTERVAL};
use critter_camunda::{Animal, Variables};

/// Commands understood by `critter`.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Checks the cached access token and refreshes it when needed.
    Token,
    /// Prints the cluster topology.
    Topology,
    /// Deploys every file of the asset directory.
    Deploy {
        /// Directory holding the BPMN process and form.
        #[arg(long, env = "CRITTER_ASSETS", default_value = ASSET_DIR)]
        assets: PathBuf,
    },
    /// Deploys the assets and starts a process instance for an animal.
    Start(StartArgs),
    /// Prints a process instance.
    Instance {
        /// Process instance key.
        key: String,
    },
    /// Lists deployed process definitions.
    Definitions {
        /// Restrict to one BPMN process id.
        #[arg(long)]
        process_id: Option<String>,
    },
    /// Job operations.
    #[command(subcommand)]
    Jobs(JobsCommand),
    /// Prints the decoded value of a process variable.
    Variable {
        /// Process instance key.
        key: String,
        /// Variable name.
        name: String,
    },
    /// Runs a job worker until interrupted.
    Worker(WorkerArgs),
}

impl Command {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Topology => "topology",
            Self::Deploy { .. } => "deploy",
            Self::Start(_) => "start",
            Self::Instance { .. } => "instance",
            Self::Definitions { .. } => "definitions",
            Self::Jobs(_) => "jobs",
            Self::Variable { .. } => "variable",
            Self::Worker(_) => "worker",
        }
    }
}

/// Arguments of `critter start`.
#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Animal to retrieve an image of.
    #[arg(long, value_parser = parse_animal)]
    pub animal: Animal,

    /// Directory holding the BPMN process and form.
    #[arg(long, env = "CRITTER_ASSETS", default_value = ASSET_DIR)]
    pub assets: PathBuf,

    /// Waits until the image URL variable is set and prints it.
    #[arg(long)]
    pub wait: bool,

    /// Seconds between two checks of the image URL variable.
    #[arg(long, default_value_t = 2)]
    pub wait_interval: u64,

    /// Number of checks before giving up.
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..))]
    pub wait_attempts: u32,

    /// Variable to wait for.
    #[arg(long, default_value = OUTPUT_ANIMAL_URL_VAR)]
    pub wait_variable: String,
}

/// `critter jobs` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum JobsCommand {
    /// Finds the jobs of a type within a process instance.
    Search {
        /// Process instance key.
        key: String,
        /// Job type.
        #[arg(long, default_value = SERVICE_TASK_JOB_TYPE)]
        job_type: String,
    },
    /// Activates jobs of a type and prints them.
    Activate {
        /// Job type.
        #[arg(long, default_value = SERVICE_TASK_JOB_TYPE)]
        job_type: String,
        /// Maximum number of jobs to activate.
        #[arg(long, default_value_t = DEFAULT_MAX_JOBS)]
        max_jobs: u32,
        /// Lock duration in seconds.
        #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT.as_secs())]
        timeout: u64,
        /// Worker name reported to the engine.
        #[arg(long, default_value = "critter-cli")]
        worker: String,
    },
    /// Completes a job.
    Complete {
        /// Job key.
        key: String,
        /// Output variable, repeatable.
        #[arg(long = "set", value_name = "NAME=VALUE")]
        variables: Vec<VariableAssignment>,
    },
    /// Reports a job as failed.
    Fail {
        /// Job key.
        key: String,
        /// Failure reason.
        #[arg(long)]
        message: String,
        /// Retries left after this failure.
        #[arg(long, default_value_t = 0)]
        retries: i32,
    },
}

/// Arguments of `critter worker`.
#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    /// Job type to serve.
    #[arg(long, default_value = SERVICE_TASK_JOB_TYPE)]
    pub job_type: String,

    /// Variable every job is completed with, repeatable.
    #[arg(long = "set", value_name = "NAME=VALUE")]
    pub variables: Vec<VariableAssignment>,

    /// Seconds between two polls.
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    pub poll_interval: u64,

    /// Lock duration of activated jobs in seconds.
    #[arg(long, default_value_t = DEFAULT_JOB_TIMEOUT.as_secs())]
    pub job_timeout: u64,

    /// Jobs activated per poll.
    #[arg(long, default_value_t = DEFAULT_MAX_JOBS)]
    pub max_jobs: u32,

    /// Worker name reported to the engine.
    #[arg(long)]
    pub worker_name: Option<String>,
}

impl WorkerArgs {
    /// Pause between two polls.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

/// `NAME=VALUE` pair given on the command line.
///
/// The value is parsed as JSON when possible and kept as a string otherwise,
/// so `--set count=3` sets a number and `--set animal_url=https://...` a
/// string.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub name: String,
    pub value: serde_json::Value,
}

impl FromStr for VariableAssignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;

        let name = name.trim();
        if name.is_empty() {
            return Err(format!("variable name missing in '{s}'"));
        }

        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_owned()));

        Ok(Self {
            name: name.to_owned(),
            value,
        })
    }
}

/// Collects assignments into a variable map; later assignments win.
pub fn into_variables(assignments: &[VariableAssignment]) -> Variables {
    assignments
        .iter()
        .map(|assignment| (assignment.name.clone(), assignment.value.clone()))
        .collect()
}

fn parse_animal(s: &str) -> Result<Animal, String> {
    Animal::from_str(s).map_err(|_| format!("unknown animal '{s}', expected dog, duck or fox"))
}
