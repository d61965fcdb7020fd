use clusterbase::{Clients, Manager};
use clusterbase_cloud::fake::{FakeDeployments, FakeEnvironment, FakeResourceGroups, FakeSubnets};
use clusterbase_cloud::{
    Cluster, ClusterDocument, ClusterProfile, ClusterProperties, FileClusterStore, IngressProfile,
    LoadBalancerProfile, ManagedOutboundIps, MasterProfile, NetworkProfile,
    ServicePrincipalProfile, Subnet, WorkerProfile,
};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const CLUSTER_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/customer-rg/providers/Microsoft.RedHatOpenShift/openShiftClusters/Prod-Cluster";
pub const RESOURCE_GROUP: &str = "aro-prod";
pub const RESOURCE_GROUP_ID: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/aro-prod";
pub const MASTER_SUBNET_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/vnet-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/master";
pub const WORKER_SUBNET_ID: &str = "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/vnet-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/worker";

pub fn cluster() -> Cluster {
    Cluster {
        id: CLUSTER_ID.to_string(),
        name: "Prod-Cluster".to_string(),
        location: "westeurope".to_string(),
        properties: ClusterProperties {
            cluster_profile: ClusterProfile {
                resource_group_id: RESOURCE_GROUP_ID.to_string(),
            },
            storage_suffix: "q9z4w".to_string(),
            image_registry_storage_account_name: "imageregistryq9z4w".to_string(),
            network_profile: NetworkProfile {
                load_balancer_profile: Some(LoadBalancerProfile {
                    managed_outbound_ips: Some(ManagedOutboundIps { count: 2 }),
                    effective_outbound_ips: Vec::new(),
                }),
                ..Default::default()
            },
            master_profile: MasterProfile {
                subnet_id: MASTER_SUBNET_ID.to_string(),
            },
            ingress_profiles: vec![IngressProfile {
                name: "default".to_string(),
                ..Default::default()
            }],
            worker_profiles: vec![WorkerProfile {
                name: "worker".to_string(),
                vm_size: "Standard_D4s_v3".to_string(),
                count: 3,
                subnet_id: WORKER_SUBNET_ID.to_string(),
            }],
            service_principal_profile: ServicePrincipalProfile {
                client_id: "sp-client".to_string(),
                sp_object_id: "11111111-2222-3333-4444-555555555555".to_string(),
            },
            ..Default::default()
        },
    }
}

fn subnet(id: &str) -> Subnet {
    Subnet {
        id: Some(id.to_string()),
        name: id.rsplit('/').next().map(str::to_string),
        ..Default::default()
    }
}

/// File-backed state plus fake cloud clients shared across managers
pub struct TestProject {
    pub root: TempDir,
    pub resource_groups: Arc<FakeResourceGroups>,
    pub subnets: Arc<FakeSubnets>,
    pub deployments: Arc<FakeDeployments>,
    pub env: Arc<FakeEnvironment>,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
            resource_groups: Arc::new(FakeResourceGroups::new()),
            subnets: Arc::new(
                FakeSubnets::new()
                    .with_subnet(MASTER_SUBNET_ID, subnet(MASTER_SUBNET_ID))
                    .with_subnet(WORKER_SUBNET_ID, subnet(WORKER_SUBNET_ID)),
            ),
            deployments: Arc::new(FakeDeployments::new()),
            env: Arc::new(FakeEnvironment::new()),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn store(&self, holder: &str) -> Arc<FileClusterStore> {
        Arc::new(FileClusterStore::new(self.path(), holder))
    }

    pub async fn import(&self, cluster: Cluster) -> ClusterDocument {
        let doc = ClusterDocument::new(cluster);
        self.store("importer").create(&doc).await.unwrap();
        doc
    }

    pub fn clients(&self) -> Clients {
        Clients {
            resource_groups: self.resource_groups.clone(),
            subnets: self.subnets.clone(),
            deployments: self.deployments.clone(),
        }
    }

    pub async fn manager(&self, holder: &str) -> clusterbase_cloud::Result<Manager> {
        Manager::load(CLUSTER_ID, self.store(holder), self.env.clone(), self.clients()).await
    }

    #[allow(dead_code)]
    pub fn state_file_exists(&self, key: &str) -> bool {
        let stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        self.root
            .path()
            .join(".clusterbase")
            .join("clusters")
            .join(format!("{}.json", stem))
            .exists()
    }
}
