//! Cluster topology, also used as a cheap token validity probe.

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::client::{CamundaClient, TRACING_TARGET};
use crate::error::Result;

/// Partition hosted by a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partition {
    /// Partition identifier.
    pub partition_id: i32,
    /// Role of the broker for this partition (`leader`, `follower`, `inactive`).
    pub role: String,
    /// Partition health (`healthy`, `unhealthy`, `dead`).
    pub health: String,
}

/// Broker of the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broker {
    /// Broker node identifier.
    pub node_id: i32,
    /// Hostname the broker listens on.
    pub host: String,
    /// Port the broker listens on.
    pub port: u16,
    /// Partitions hosted by the broker.
    #[serde(default)]
    pub partitions: Vec<Partition>,
    /// Broker version.
    #[serde(default)]
    pub version: String,
}

/// Topology of the cluster as reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Brokers of the cluster.
    #[serde(default)]
    pub brokers: Vec<Broker>,
    /// Number of brokers in the cluster.
    #[serde(default)]
    pub cluster_size: u32,
    /// Number of partitions.
    #[serde(default)]
    pub partitions_count: u32,
    /// Configured replication factor.
    #[serde(default)]
    pub replication_factor: u32,
    /// Version of the gateway.
    #[serde(default)]
    pub gateway_version: String,
}

impl CamundaClient {
    /// Retrieves the cluster topology.
    pub async fn get_cluster_topology(&self) -> Result<Topology> {
        let request = self.request(Method::GET, &["topology"]).await?;
        self.send_json(request, "get cluster topology").await
    }

    /// Checks whether the current access token is accepted by the engine.
    ///
    /// Returns `Ok(false)` when the engine answers with any non-success
    /// status (including a missing token), and an error only when the
    /// engine cannot be reached.
    pub async fn verify_token(&self) -> Result<bool> {
        let request = match self.request(Method::GET, &["topology"]).await {
            Ok(request) => request,
            Err(error) if error.is_unauthorized() => return Ok(false),
            Err(error) => return Err(error),
        };

        let response = request.send().await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET,
                error = %e,
                "Failed to connect to engine to check token validity"
            );
            crate::Error::from(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                target: TRACING_TARGET,
                status = status.as_u16(),
                "Failed to get cluster topology"
            );
            return Ok(false);
        }

        Ok(true)
    }
}
