//! Process definitions and process instances.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{CamundaClient, TRACING_TARGET};
use crate::error::Result;
use crate::types::{ProcessDefinitionKey, ProcessInstanceKey, SearchResult, Variables};

/// Body of a process instance creation request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProcessInstance<'a> {
    process_definition_id: &'a str,
    variables: &'a Variables,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_id: Option<&'a str>,
}

/// Process instance returned right after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedProcessInstance {
    /// Key of the new process instance.
    pub process_instance_key: ProcessInstanceKey,
    /// Key of the process definition that was started.
    pub process_definition_key: ProcessDefinitionKey,
    /// BPMN process id.
    pub process_definition_id: String,
    /// Version of the process definition that was started.
    #[serde(default)]
    pub process_definition_version: i32,
    /// Owning tenant.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Variables of the instance at creation time.
    #[serde(default)]
    pub variables: Variables,
}

/// Process instance as stored by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub process_instance_key: ProcessInstanceKey,
    pub process_definition_id: String,
    #[serde(default)]
    pub process_definition_name: Option<String>,
    #[serde(default)]
    pub process_definition_version: i32,
    pub process_definition_key: ProcessDefinitionKey,
    /// `ACTIVE`, `COMPLETED` or `TERMINATED`.
    pub state: String,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub has_incident: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl ProcessInstance {
    /// Returns `true` once the instance reached the end event.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state.eq_ignore_ascii_case("COMPLETED")
    }
}

/// Deployed process definition as returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    pub process_definition_key: ProcessDefinitionKey,
    pub process_definition_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub version_tag: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

/// Filter for process definition search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinitionFilter {
    /// Restrict to one BPMN process id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_definition_id: Option<String>,
    /// Restrict to the latest version of each definition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_latest_version: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SearchQuery<'a, F> {
    filter: &'a F,
}

impl CamundaClient {
    /// Creates and starts a process instance of the latest version of a
    /// process definition.
    pub async fn create_process_instance(
        &self,
        process_definition_id: &str,
        variables: &Variables,
    ) -> Result<CreatedProcessInstance> {
        self.create_process_instance_for_tenant(process_definition_id, variables, None)
            .await
    }

    /// Creates and starts a process instance for a specific tenant.
    pub async fn create_process_instance_for_tenant(
        &self,
        process_definition_id: &str,
        variables: &Variables,
        tenant_id: Option<&str>,
    ) -> Result<CreatedProcessInstance> {
        let body = CreateProcessInstance {
            process_definition_id,
            variables,
            tenant_id,
        };

        let request = self
            .request_json(Method::POST, &["process-instances"], &body)
            .await?;
        let created: CreatedProcessInstance =
            self.send_json(request, "create process instance").await?;

        tracing::info!(
            target: TRACING_TARGET,
            process_definition_id,
            process_instance_key = %created.process_instance_key,
            "Process instance created"
        );

        Ok(created)
    }

    /// Retrieves a process instance by key.
    pub async fn get_process_instance(&self, key: &ProcessInstanceKey) -> Result<ProcessInstance> {
        let request = self
            .request(Method::GET, &["process-instances", key.as_str()])
            .await?;
        self.send_json(request, "get process instance").await
    }

    /// Searches deployed process definitions.
    pub async fn search_process_definitions(
        &self,
        filter: Option<&ProcessDefinitionFilter>,
    ) -> Result<SearchResult<ProcessDefinition>> {
        let request = match filter {
            Some(filter) => {
                self.request_json(
                    Method::POST,
                    &["process-definitions", "search"],
                    &SearchQuery { filter },
                )
                .await?
            }
            None => {
                self.request_json(
                    Method::POST,
                    &["process-definitions", "search"],
                    &serde_json::json!({}),
                )
                .await?
            }
        };

        let result: SearchResult<ProcessDefinition> =
            self.send_json(request, "search process definitions").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            total = result.page.total_items,
            "Process definitions retrieved"
        );

        Ok(result)
    }
}
