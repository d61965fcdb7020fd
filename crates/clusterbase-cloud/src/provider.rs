//! Cloud API client traits and the resources they exchange
//!
//! Each trait covers one resource-manager API the orchestrator talks to.
//! Implementations perform the network I/O; cancellation is dropping the
//! returned future.

use crate::error::Result;
use crate::fault::{ProviderError, ServiceError};
use crate::template::Template;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Resource group API
#[async_trait]
pub trait ResourceGroupsClient: Send + Sync {
    /// Fetch a resource group; absence is a 404 [`ProviderError`]
    async fn get(&self, name: &str) -> ProviderResult<ResourceGroup>;

    /// Idempotent upsert by name
    async fn create_or_update(&self, name: &str, group: &ResourceGroup)
    -> ProviderResult<ResourceGroup>;
}

/// Subnet API, addressed by full resource ID
#[async_trait]
pub trait SubnetsClient: Send + Sync {
    async fn get(&self, subnet_id: &str) -> ProviderResult<Subnet>;

    async fn create_or_update(&self, subnet_id: &str, subnet: &Subnet) -> ProviderResult<()>;
}

/// Template deployment API, scoped to a resource group
#[async_trait]
pub trait DeploymentsClient: Send + Sync {
    /// Submit and block until the deployment reaches a terminal state
    async fn create_or_update_and_wait(
        &self,
        resource_group: &str,
        name: &str,
        deployment: &Deployment,
    ) -> ProviderResult<()>;

    async fn get(&self, resource_group: &str, name: &str) -> ProviderResult<Deployment>;
}

/// Role assignment API
#[async_trait]
pub trait RoleAssignmentsClient: Send + Sync {
    async fn create(
        &self,
        scope: &str,
        name: &str,
        assignment: &RoleAssignment,
    ) -> ProviderResult<RoleAssignment>;
}

/// Global feature flags consulted by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    DisableDenyAssignments,
}

/// Resource provider environment
#[async_trait]
pub trait Environment: Send + Sync {
    fn is_local_development_mode(&self) -> bool;

    fn feature_is_set(&self, feature: Feature) -> bool;

    /// Subscription allowed to see cluster private-link services
    fn rp_subscription_id(&self) -> &str;

    /// Private-link service the gateway private endpoint connects to
    fn gateway_private_link_service_id(&self) -> &str;

    /// Ensure the resource provider's own role assignment on a resource group
    async fn ensure_resource_group_role_assignment(&self, resource_group_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Reference to another resource by ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Subnet record. Unknown fields are preserved so a read-modify-write never
/// drops provider-owned properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub properties: SubnetProperties,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_security_group: Option<SubResource>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub service_endpoints: Vec<ServiceEndpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_endpoint_network_policies: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_link_service_network_policies: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Service endpoint binding on a subnet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(default)]
    pub locations: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServiceEndpoint {
    pub fn new(service: impl Into<String>, locations: &[&str]) -> Self {
        Self {
            service: Some(service.into()),
            locations: locations.iter().map(|l| l.to_string()).collect(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeploymentMode {
    #[default]
    Incremental,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Created,
    Creating,
    Running,
    Updating,
    Deleting,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Succeeded | ProvisioningState::Failed | ProvisioningState::Canceled
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub properties: DeploymentProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    #[serde(default)]
    pub mode: DeploymentMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<Template>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<ProvisioningState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,
}

impl Deployment {
    pub fn incremental(template: Template, parameters: Option<serde_json::Value>) -> Self {
        Self {
            properties: DeploymentProperties {
                mode: DeploymentMode::Incremental,
                template: Some(template),
                parameters,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub properties: RoleAssignmentProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleAssignmentProperties {
    pub role_definition_id: String,

    pub principal_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_type: Option<String>,
}
