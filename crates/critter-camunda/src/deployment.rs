//! Deployment of BPMN, DMN and form resources.

use std::path::{Path, PathBuf};

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

use crate::client::{CamundaClient, TRACING_TARGET};
use crate::error::{Error, Result};
use crate::types::{DeploymentKey, FormKey, ProcessDefinitionKey};

/// Deployed process definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedProcess {
    /// BPMN process id.
    pub process_definition_id: String,
    /// Version assigned by the engine.
    pub process_definition_version: i32,
    /// Key assigned by the engine.
    pub process_definition_key: ProcessDefinitionKey,
    /// Name of the resource the process came from.
    pub resource_name: String,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Deployed form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedForm {
    /// Form id.
    pub form_id: String,
    /// Version assigned by the engine.
    pub version: i32,
    /// Key assigned by the engine.
    pub form_key: FormKey,
    /// Name of the resource the form came from.
    pub resource_name: String,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// One entry of a deployment; exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_definition: Option<DeployedProcess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<DeployedForm>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_definition: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_requirements: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<serde_json::Value>,
}

/// Result of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    /// Key of the deployment.
    pub deployment_key: DeploymentKey,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Deployed resources.
    #[serde(default)]
    pub deployments: Vec<DeploymentMetadata>,
}

impl Deployment {
    /// Returns the deployed process definitions.
    pub fn processes(&self) -> impl Iterator<Item = &DeployedProcess> {
        self.deployments
            .iter()
            .filter_map(|entry| entry.process_definition.as_ref())
    }

    /// Returns the deployed forms.
    pub fn forms(&self) -> impl Iterator<Item = &DeployedForm> {
        self.deployments.iter().filter_map(|entry| entry.form.as_ref())
    }
}

/// Lists the deployable files of an asset directory, sorted by name.
///
/// Subdirectories are skipped.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or holds no files.
pub async fn collect_resources(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::from(e).with_context(format!("asset directory {}", dir.display())))?;

    let mut resources = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            resources.push(entry.path());
        }
    }
    resources.sort();

    if resources.is_empty() {
        return Err(Error::invalid_input().with_message(format!(
            "No deployment resources found in {}",
            dir.display()
        )));
    }

    tracing::info!(
        target: TRACING_TARGET,
        dir = %dir.display(),
        count = resources.len(),
        "Collected deployment resources"
    );

    Ok(resources)
}

impl CamundaClient {
    /// Deploys the given resource files in a single deployment.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read, if `paths` is empty, or if
    /// the engine rejects the deployment.
    pub async fn deploy_resources<P>(&self, paths: &[P]) -> Result<Deployment>
    where
        P: AsRef<Path>,
    {
        self.deploy_resources_for_tenant(paths, None).await
    }

    /// Deploys the given resource files for a specific tenant.
    pub async fn deploy_resources_for_tenant<P>(
        &self,
        paths: &[P],
        tenant_id: Option<&str>,
    ) -> Result<Deployment>
    where
        P: AsRef<Path>,
    {
        if paths.is_empty() {
            return Err(Error::invalid_input().with_message("No resources to deploy"));
        }

        let mut form = Form::new();
        for path in paths {
            let path = path.as_ref();
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| {
                    Error::invalid_input()
                        .with_message(format!("Invalid resource path {}", path.display()))
                })?
                .to_owned();

            let content = tokio::fs::read(path).await.map_err(|e| {
                Error::from(e).with_context(format!("resource {}", path.display()))
            })?;

            tracing::debug!(
                target: TRACING_TARGET,
                resource = %file_name,
                size = content.len(),
                "Adding deployment resource"
            );

            let part = Part::bytes(content)
                .file_name(file_name)
                .mime_str("application/octet-stream")?;
            form = form.part("resources", part);
        }

        if let Some(tenant_id) = tenant_id {
            form = form.text("tenantId", tenant_id.to_owned());
        }

        let request = self
            .request_multipart(Method::POST, &["deployments"], form)
            .await?;
        let deployment: Deployment = self.send_json(request, "deploy resources").await?;

        tracing::info!(
            target: TRACING_TARGET,
            deployment_key = %deployment.deployment_key,
            resources = deployment.deployments.len(),
            "Resources deployed"
        );

        Ok(deployment)
    }
}
