#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod auth;
mod client;
mod config;
mod deployment;
mod error;
mod job;
mod process;
mod topology;
mod types;
mod variable;

pub mod launcher;
pub mod session;
pub mod worker;

pub use crate::auth::AccessToken;
pub use crate::client::{CamundaClient, TRACING_TARGET};
pub use crate::config::{CamundaConfig, DEFAULT_TIMEOUT_SECS};
pub use crate::deployment::{
    DeployedForm, DeployedProcess, Deployment, DeploymentMetadata, collect_resources,
};
pub use crate::error::{BoxedError, Error, ErrorKind, Result};
pub use crate::job::{ActivateJobs, ActivatedJob, FailJob, JobItem};
pub use crate::launcher::{Animal, Launch, ProcessLauncher};
pub use crate::process::{
    CreatedProcessInstance, ProcessDefinition, ProcessDefinitionFilter, ProcessInstance,
};
pub use crate::session::{FileTokenStore, MemoryTokenStore, TokenSession, TokenStatus, TokenStore};
pub use crate::topology::{Broker, Partition, Topology};
pub use crate::types::{
    DeploymentKey, FormKey, JobKey, ProcessDefinitionKey, ProcessInstanceKey, SearchPage,
    SearchResult, VariableKey, Variables,
};
pub use crate::variable::Variable;
pub use crate::worker::{JobHandler, JobOutcome, JobWorker, StaticVariablesHandler, WorkerConfig};
