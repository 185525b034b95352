//! Starts the animal image retrieval process for a user selection.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

use crate::deployment::{Deployment, collect_resources};
use crate::error::{Error, ErrorKind, Result};
use crate::process::CreatedProcessInstance;
use crate::session::{TokenSession, TokenStatus};
use crate::types::{ProcessInstanceKey, Variables};

/// Tracing target for launcher operations.
pub const TRACING_TARGET: &str = "critter_camunda::launcher";

/// BPMN process id of the animal image retrieval process.
pub const PROCESS_MODEL: &str = "Process_AnimalImageRetrieval";

/// Input variable holding the selected animal.
pub const INPUT_ANIMAL_VAR: &str = "animal";

/// Output variable holding the retrieved image URL.
pub const OUTPUT_ANIMAL_URL_VAR: &str = "animal_url";

/// Service task type served by the image retrieval worker.
pub const SERVICE_TASK_JOB_TYPE: &str = "retrieve-animal-image";

/// Default directory holding the deployment resources.
pub const ASSET_DIR: &str = "assets";

/// Animals offered by the selection form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumIter, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Animal {
    Dog,
    Duck,
    Fox,
}

/// Outcome of a launch.
#[derive(Debug, Clone, Serialize)]
pub struct Launch {
    /// Whether a cached token was reused.
    pub token: TokenStatus,
    /// The deployment made before starting the instance.
    pub deployment: Deployment,
    /// The started process instance.
    pub process_instance: CreatedProcessInstance,
}

/// Deploys the process resources and starts a process instance per selection.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    session: TokenSession,
    asset_dir: PathBuf,
    process_model: String,
}

impl ProcessLauncher {
    /// Creates a launcher deploying resources from `asset_dir`.
    pub fn new(session: TokenSession, asset_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            asset_dir: asset_dir.into(),
            process_model: PROCESS_MODEL.to_owned(),
        }
    }

    /// Overrides the BPMN process id that is started.
    #[must_use]
    pub fn with_process_model(mut self, process_model: impl Into<String>) -> Self {
        self.process_model = process_model.into();
        self
    }

    /// Returns the token session used by the launcher.
    pub fn session(&self) -> &TokenSession {
        &self.session
    }

    /// Deploys the asset directory and starts a process instance for `animal`.
    ///
    /// # Errors
    ///
    /// Fails if no valid token can be obtained, if the deployment fails
    /// ("Failed to deploy resources") or if the instance cannot be created
    /// ("Failed to create process instance").
    pub async fn launch(&self, animal: Animal) -> Result<Launch> {
        tracing::info!(target: TRACING_TARGET, %animal, "Animal selected");

        let token = self.session.ensure_token().await?;
        let client = self.session.client();

        let resources = collect_resources(&self.asset_dir)
            .await
            .map_err(deployment_failed)?;
        tracing::info!(
            target: TRACING_TARGET,
            resources = ?resources,
            "Retrieved deployment resources"
        );

        let deployment = client
            .deploy_resources(&resources)
            .await
            .map_err(deployment_failed)?;

        let mut variables = Variables::new();
        variables.insert(INPUT_ANIMAL_VAR.to_owned(), animal.as_ref().into());

        let process_instance = client
            .create_process_instance(&self.process_model, &variables)
            .await
            .map_err(|e| {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %e,
                    "Failed to create process instance"
                );
                Error::new(e.kind)
                    .with_message("Failed to create process instance")
                    .with_source(e)
            })?;

        tracing::info!(
            target: TRACING_TARGET,
            deployment_key = %deployment.deployment_key,
            process_instance_key = %process_instance.process_instance_key,
            "Successfully created process instance"
        );

        Ok(Launch {
            token,
            deployment,
            process_instance,
        })
    }

    /// Polls a process instance until `name` is set.
    ///
    /// # Errors
    ///
    /// Returns a [`Timeout`](ErrorKind::Timeout) error if the variable did
    /// not appear within `attempts` polls. The engine is polled at least once.
    pub async fn wait_for_variable(
        &self,
        process_instance_key: &ProcessInstanceKey,
        name: &str,
        interval: Duration,
        attempts: u32,
    ) -> Result<serde_json::Value> {
        let client = self.session.client();
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            if let Some(value) = client.get_variable(process_instance_key, name).await? {
                tracing::info!(
                    target: TRACING_TARGET,
                    %process_instance_key,
                    variable = name,
                    attempt,
                    "Variable available"
                );
                return Ok(value);
            }

            tracing::debug!(
                target: TRACING_TARGET,
                %process_instance_key,
                variable = name,
                attempt,
                "Variable not set yet"
            );

            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(Error::new(ErrorKind::Timeout).with_message(format!(
            "Variable '{name}' not set on process instance {process_instance_key} after {attempts} attempts"
        )))
    }
}

fn deployment_failed(error: Error) -> Error {
    tracing::error!(target: TRACING_TARGET, error = %error, "Failed to deploy resources");
    Error::new(error.kind)
        .with_message("Failed to deploy resources")
        .with_source(error)
}
