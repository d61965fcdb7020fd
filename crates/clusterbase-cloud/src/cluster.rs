//! Cluster model as held in the durable cluster-state store

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    /// Full resource ID; also the ownership identity stamped on the
    /// cluster resource group
    pub id: String,

    pub name: String,

    pub location: String,

    #[serde(default)]
    pub properties: ClusterProperties,
}

impl Cluster {
    /// Name of the cluster resource group (last segment of its ID)
    pub fn resource_group_name(&self) -> &str {
        let id = &self.properties.cluster_profile.resource_group_id;
        id.rsplit('/').next().unwrap_or(id)
    }

    /// Region lower-cased, as used in resource names and locations
    pub fn region(&self) -> String {
        self.location.to_lowercase()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProperties {
    #[serde(default)]
    pub cluster_profile: ClusterProfile,

    /// Write-once; empty until generated
    #[serde(default)]
    pub infra_id: String,

    #[serde(default)]
    pub storage_suffix: String,

    #[serde(default)]
    pub image_registry_storage_account_name: String,

    #[serde(default)]
    pub network_profile: NetworkProfile,

    #[serde(default)]
    pub master_profile: MasterProfile,

    #[serde(default)]
    pub api_server_profile: ApiServerProfile,

    #[serde(default)]
    pub ingress_profiles: Vec<IngressProfile>,

    #[serde(default)]
    pub worker_profiles: Vec<WorkerProfile>,

    /// Worker profiles as observed on the running cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worker_profiles_status: Vec<WorkerProfile>,

    #[serde(default)]
    pub feature_profile: FeatureProfile,

    #[serde(default)]
    pub service_principal_profile: ServicePrincipalProfile,
}

impl ClusterProperties {
    /// Observed worker profiles when known, configured ones otherwise
    pub fn enriched_worker_profiles(&self) -> &[WorkerProfile] {
        if self.worker_profiles_status.is_empty() {
            &self.worker_profiles
        } else {
            &self.worker_profiles_status
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterProfile {
    #[serde(default)]
    pub resource_group_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboundType {
    #[default]
    Loadbalancer,
    UserDefinedRouting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreconfiguredNsg {
    Enabled,
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub outbound_type: OutboundType,

    #[serde(default, rename = "preconfiguredNSG")]
    pub preconfigured_nsg: PreconfiguredNsg,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_balancer_profile: Option<LoadBalancerProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerProfile {
    #[serde(default, rename = "managedOutboundIps", skip_serializing_if = "Option::is_none")]
    pub managed_outbound_ips: Option<ManagedOutboundIps>,

    #[serde(default, rename = "effectiveOutboundIps")]
    pub effective_outbound_ips: Vec<ResourceReference>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedOutboundIps {
    pub count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReference {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterProfile {
    #[serde(default)]
    pub subnet_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiServerProfile {
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressProfile {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerProfile {
    #[serde(default)]
    pub name: String,

    #[serde(default, rename = "vmSize")]
    pub vm_size: String,

    #[serde(default)]
    pub count: u32,

    #[serde(default)]
    pub subnet_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProfile {
    #[serde(default)]
    pub gateway_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipalProfile {
    #[serde(default)]
    pub client_id: String,

    #[serde(default, rename = "spObjectId")]
    pub sp_object_id: String,
}
