//! Azure Resource Manager clients for clusterbase
//!
//! This crate implements the clusterbase-cloud client traits over the
//! resource manager REST API.
//!
//! # Requirements
//!
//! - `AZURE_SUBSCRIPTION_ID`
//! - Either `AZURE_ACCESS_TOKEN`, or `AZURE_TENANT_ID` + `AZURE_CLIENT_ID` +
//!   `AZURE_CLIENT_SECRET` for the client-credentials grant
//!
//! # Example
//!
//! ```ignore
//! use clusterbase_cloud_azure::{AzureClients, AzureConfig};
//!
//! let clients = AzureClients::new(AzureConfig::from_env()?)?;
//! let group = clients.resource_groups.get("my-cluster-rg").await?;
//! ```

mod auth;
pub mod authorization;
pub mod client;
pub mod config;
pub mod error;
pub mod network;
pub mod resources;

pub use authorization::RoleAssignments;
pub use client::ArmClient;
pub use config::{AzureConfig, Credential};
pub use error::{AzureError, Result};
pub use network::Subnets;
pub use resources::{Deployments, ResourceGroups};

use std::sync::Arc;

/// All typed clients sharing one authenticated connection
pub struct AzureClients {
    pub resource_groups: Arc<ResourceGroups>,
    pub subnets: Arc<Subnets>,
    pub deployments: Arc<Deployments>,
    pub role_assignments: Arc<RoleAssignments>,
}

impl AzureClients {
    pub fn new(config: AzureConfig) -> Result<Self> {
        Ok(Self::from_client(Arc::new(ArmClient::new(config)?)))
    }

    pub fn from_client(client: Arc<ArmClient>) -> Self {
        Self {
            resource_groups: Arc::new(ResourceGroups::new(client.clone())),
            subnets: Arc::new(Subnets::new(client.clone())),
            deployments: Arc::new(Deployments::new(client.clone())),
            role_assignments: Arc::new(RoleAssignments::new(client)),
        }
    }
}
