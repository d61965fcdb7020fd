//! Resource groups and template deployments

use crate::client::{ArmClient, decode, is_conflict};
use async_trait::async_trait;
use clusterbase_cloud::{
    Deployment, DeploymentsClient, ProviderError, ProviderResult, ProvisioningState, ResourceGroup,
    ResourceGroupsClient, ServiceError,
};
use std::sync::Arc;

pub const RESOURCES_API_VERSION: &str = "2021-04-01";

/// Code returned when a deployment with the same name is still running
const DEPLOYMENT_ACTIVE: &str = "DeploymentActive";

pub struct ResourceGroups {
    client: Arc<ArmClient>,
}

impl ResourceGroups {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ResourceGroupsClient for ResourceGroups {
    async fn get(&self, name: &str) -> ProviderResult<ResourceGroup> {
        self.client
            .get_json(&self.client.resource_group_path(name), RESOURCES_API_VERSION)
            .await
    }

    async fn create_or_update(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> ProviderResult<ResourceGroup> {
        tracing::info!(resource_group = name, "Creating or updating resource group");
        self.client
            .put_json(
                &self.client.resource_group_path(name),
                RESOURCES_API_VERSION,
                group,
            )
            .await
    }
}

pub struct Deployments {
    client: Arc<ArmClient>,
}

impl Deployments {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }

    fn path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Resources/deployments/{}",
            self.client.resource_group_path(resource_group),
            name
        )
    }

    /// Poll until the deployment reaches a terminal provisioning state
    pub async fn wait(&self, resource_group: &str, name: &str) -> ProviderResult<()> {
        loop {
            let deployment = self.get(resource_group, name).await?;
            let state = deployment
                .properties
                .provisioning_state
                .unwrap_or(ProvisioningState::Unknown);

            match state {
                ProvisioningState::Succeeded => {
                    tracing::info!(resource_group, deployment = name, "Deployment succeeded");
                    return Ok(());
                }
                ProvisioningState::Failed | ProvisioningState::Canceled => {
                    let error = deployment.properties.error.unwrap_or_else(|| {
                        ServiceError::new(
                            "DeploymentFailed",
                            format!("deployment {} ended in state {:?}", name, state),
                        )
                    });
                    return Err(ProviderError::Request(error));
                }
                _ => {
                    tracing::debug!(resource_group, deployment = name, ?state, "Deployment in progress");
                    tokio::time::sleep(self.client.poll_interval()).await;
                }
            }
        }
    }
}

#[async_trait]
impl DeploymentsClient for Deployments {
    async fn create_or_update_and_wait(
        &self,
        resource_group: &str,
        name: &str,
        deployment: &Deployment,
    ) -> ProviderResult<()> {
        tracing::info!(resource_group, deployment = name, "Submitting template deployment");

        match self
            .client
            .put_raw(&self.path(resource_group, name), RESOURCES_API_VERSION, deployment)
            .await
        {
            Ok(response) => {
                let _accepted: Deployment = decode(response).await?;
            }
            Err(err) if is_conflict(&err, DEPLOYMENT_ACTIVE) => {
                tracing::info!(
                    resource_group,
                    deployment = name,
                    "Deployment already active, waiting on it"
                );
            }
            Err(err) => return Err(err),
        }

        self.wait(resource_group, name).await
    }

    async fn get(&self, resource_group: &str, name: &str) -> ProviderResult<Deployment> {
        self.client
            .get_json(&self.path(resource_group, name), RESOURCES_API_VERSION)
            .await
    }
}
