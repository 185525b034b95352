//! Process variable retrieval.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{CamundaClient, TRACING_TARGET};
use crate::error::Result;
use crate::types::{ProcessInstanceKey, SearchResult, VariableKey};

/// Variable as returned by variable search.
///
/// The engine returns `value` as the JSON encoding of the variable, so a
/// string variable arrives as `"\"fox\""`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub variable_key: VariableKey,
    pub name: String,
    pub value: String,
    pub process_instance_key: ProcessInstanceKey,
    #[serde(default)]
    pub scope_key: Option<String>,
    #[serde(default)]
    pub is_truncated: bool,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl Variable {
    /// Decodes the JSON-encoded value, keeping the raw text when it is not
    /// valid JSON.
    #[must_use]
    pub fn decoded_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.value)
            .unwrap_or_else(|_| serde_json::Value::String(self.value.clone()))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VariableFilter<'a> {
    process_instance_key: &'a ProcessInstanceKey,
}

#[derive(Debug, Serialize)]
struct VariableSearch<'a> {
    filter: VariableFilter<'a>,
}

impl CamundaClient {
    /// Searches the variables of a process instance.
    pub async fn search_variables(
        &self,
        process_instance_key: &ProcessInstanceKey,
    ) -> Result<SearchResult<Variable>> {
        let body = VariableSearch {
            filter: VariableFilter {
                process_instance_key,
            },
        };

        let request = self
            .request_json(Method::POST, &["variables", "search"], &body)
            .await?;
        let result: SearchResult<Variable> = self.send_json(request, "search variables").await?;

        tracing::debug!(
            target: TRACING_TARGET,
            %process_instance_key,
            found = result.items.len(),
            "Variables searched"
        );

        Ok(result)
    }

    /// Returns the decoded value of a named variable of a process instance.
    ///
    /// Returns `None` if the instance has no variable with that name.
    pub async fn get_variable(
        &self,
        process_instance_key: &ProcessInstanceKey,
        name: &str,
    ) -> Result<Option<serde_json::Value>> {
        let result = self.search_variables(process_instance_key).await?;
        Ok(result
            .items
            .iter()
            .find(|variable| variable.name == name)
            .map(Variable::decoded_value))
    }
}
